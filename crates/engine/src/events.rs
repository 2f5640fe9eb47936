//! Event types for review session change notifications.
//!
//! The interactive reviewer and the headless capture surface subscribe to
//! these: a rendered sheet resets their grid layout and a completed
//! highlight pass marks the surface ready. Tests use them to verify that
//! every transition emits the expected notifications in order.

/// Events emitted by [`ReviewSession`](crate::review::ReviewSession).
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEvent {
    /// A sheet was rendered (workbook load or sheet switch).
    SheetRendered { name: String },

    /// The filtered view was recomputed. The cursor is back at 0 (or empty).
    FilterChanged { visible: usize, total: usize },

    /// The active cursor moved to `position` in the filtered view.
    IssueSelected { position: usize, issue_index: usize },

    /// A highlight pass completed.
    HighlightApplied {
        generation: u64,
        marked: usize,
        unresolved: usize,
    },
}

/// Callback type for receiving review events.
pub type EventCallback = Box<dyn FnMut(&ReviewEvent)>;

/// Buffers events until the subscriber drains them with [`take`](Self::take).
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<ReviewEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: ReviewEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ReviewEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Drain everything collected so far.
    pub fn take(&mut self) -> Vec<ReviewEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Only FilterChanged events, as `(visible, total)`.
    pub fn filter_changes(&self) -> Vec<(usize, usize)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReviewEvent::FilterChanged { visible, total } => Some((*visible, *total)),
                _ => None,
            })
            .collect()
    }

    /// Only IssueSelected events, as view positions.
    pub fn selections(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReviewEvent::IssueSelected { position, .. } => Some(*position),
                _ => None,
            })
            .collect()
    }
}
