//! Review session: the single owner of all review state.
//!
//! Workbook, rendered grid, issue store and highlight controller live here
//! and every transition goes through a setter on [`ReviewSession`]. Setters
//! run to completion (recompute + highlight pass + notifications) before
//! returning, so a burst of toggles just yields a burst of full passes.

use serde_json::Value;

use crate::events::{EventCallback, ReviewEvent};
use crate::filter::IssueStore;
use crate::highlight::{Cursor, HighlightController};
use crate::issue::Issue;
use crate::workbook::{RenderedSheet, Workbook};

pub struct ReviewSession {
    workbook: Workbook,
    /// Sheet selector entries, workbook order.
    sheet_selector: Vec<String>,
    grid: Option<RenderedSheet>,
    store: IssueStore,
    highlight: HighlightController,
    subscribers: Vec<EventCallback>,
}

impl Default for ReviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewSession {
    pub fn new() -> Self {
        Self {
            workbook: Workbook::default(),
            sheet_selector: Vec::new(),
            grid: None,
            store: IssueStore::new(),
            highlight: HighlightController::new(),
            subscribers: Vec::new(),
        }
    }

    /// Register a callback for every subsequent [`ReviewEvent`].
    pub fn subscribe(&mut self, callback: EventCallback) {
        self.subscribers.push(callback);
    }

    // ------------------------------------------------------------------
    // Workbook Renderer
    // ------------------------------------------------------------------

    /// Replace the workbook, repopulate the sheet selector and render the
    /// first sheet.
    pub fn load_workbook(&mut self, workbook: Workbook) {
        self.sheet_selector = workbook.sheet_names();
        self.workbook = workbook;
        self.grid = None;

        match self.sheet_selector.first().cloned() {
            Some(first) => {
                self.render_sheet(&first);
            }
            None => self.reapply(),
        }
    }

    /// Render `name`. Unknown names are ignored; returns whether a render
    /// happened.
    pub fn render_sheet(&mut self, name: &str) -> bool {
        let Some(sheet) = self.workbook.sheet(name) else {
            log::debug!("render_sheet: no sheet named '{}'", name);
            return false;
        };
        self.grid = Some(RenderedSheet::from_sheet(sheet));
        self.emit(ReviewEvent::SheetRendered { name: name.to_string() });
        self.reapply();
        true
    }

    pub fn sheet_selector(&self) -> &[String] {
        &self.sheet_selector
    }

    pub fn active_sheet(&self) -> Option<&str> {
        self.grid.as_ref().map(|g| g.name.as_str())
    }

    /// Position of the active sheet in the selector.
    pub fn active_sheet_index(&self) -> Option<usize> {
        let name = self.active_sheet()?;
        self.sheet_selector.iter().position(|s| s == name)
    }

    pub fn grid(&self) -> Option<&RenderedSheet> {
        self.grid.as_ref()
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    // ------------------------------------------------------------------
    // Issue Store & Filter Engine
    // ------------------------------------------------------------------

    pub fn load_issues(&mut self, issues: Vec<Issue>) {
        self.store.load_issues(issues);
        self.filter_changed();
    }

    /// Load from raw JSON; anything but an array is an empty list.
    pub fn load_issues_json(&mut self, value: &Value) {
        self.store.load_json(value);
        self.filter_changed();
    }

    pub fn set_show_errors(&mut self, on: bool) {
        self.store.set_show_errors(on);
        self.filter_changed();
    }

    pub fn set_show_warnings(&mut self, on: bool) {
        self.store.set_show_warnings(on);
        self.filter_changed();
    }

    pub fn set_rule_enabled(&mut self, rule: &str, on: bool) {
        self.store.set_rule_enabled(rule, on);
        self.filter_changed();
    }

    pub fn set_all_rules(&mut self, on: bool) {
        self.store.set_all_rules(on);
        self.filter_changed();
    }

    pub fn store(&self) -> &IssueStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Highlight & Navigation
    // ------------------------------------------------------------------

    pub fn highlight(&self) -> &HighlightController {
        &self.highlight
    }

    pub fn cursor(&self) -> Cursor {
        self.highlight.cursor()
    }

    pub fn set_active(&mut self, i: usize) {
        self.highlight.set_active(i);
        self.selection_changed();
    }

    pub fn move_active(&mut self, delta: isize) {
        self.highlight.move_active(delta);
        self.selection_changed();
    }

    /// Select the issue at `position` in the filtered view (list click).
    pub fn select_issue(&mut self, position: usize) {
        self.set_active(position);
    }

    /// Select by issue-list index. Returns false when the issue is filtered out.
    pub fn select_issue_index(&mut self, issue_index: usize) -> bool {
        match self.store.view().iter().position(|&i| i == issue_index) {
            Some(position) => {
                self.set_active(position);
                true
            }
            None => false,
        }
    }

    /// Select the first issue of the filtered view, if any.
    pub fn select_first(&mut self) -> bool {
        if self.store.view().is_empty() {
            return false;
        }
        self.set_active(0);
        true
    }

    /// Active issue as (position in view, issue).
    pub fn active_issue(&self) -> Option<(usize, &Issue)> {
        let position = self.highlight.active()?;
        let index = *self.store.view().get(position)?;
        self.store.issue(index).map(|issue| (position, issue))
    }

    /// Completed highlight passes; waiters compare against a previous value.
    pub fn generation(&self) -> u64 {
        self.highlight.generation()
    }

    fn filter_changed(&mut self) {
        self.highlight.reset(self.store.view().len());
        self.emit(ReviewEvent::FilterChanged {
            visible: self.store.view().len(),
            total: self.store.issues().len(),
        });
        self.reapply();
    }

    fn selection_changed(&mut self) {
        if let Some(position) = self.highlight.active() {
            if let Some(&issue_index) = self.store.view().get(position) {
                self.emit(ReviewEvent::IssueSelected { position, issue_index });
            }
        }
        self.reapply();
    }

    fn reapply(&mut self) {
        self.highlight
            .reapply(self.grid.as_ref(), self.store.issues(), self.store.view());
        let event = ReviewEvent::HighlightApplied {
            generation: self.highlight.generation(),
            marked: self.highlight.marked_cells(),
            unresolved: self.highlight.unresolved().len(),
        };
        self.emit(event);
    }

    fn emit(&mut self, event: ReviewEvent) {
        for callback in &mut self.subscribers {
            callback(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::events::EventCollector;
    use crate::highlight::Severity;
    use crate::issue::Level;
    use crate::workbook::Sheet;

    fn workbook() -> Workbook {
        let rows = |data: &[&[&str]]| -> Vec<Vec<String>> {
            data.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect()
        };
        Workbook::new(vec![
            Sheet::new("Prices", rows(&[&["Name", "Price"], &["Aspirin", "12"], &["Ibuprofen", "9"]])),
            Sheet::new("Limits", rows(&[&["Code", "Limit"], &["A", "100"]])),
        ])
    }

    fn collect(session: &mut ReviewSession) -> Rc<RefCell<EventCollector>> {
        let collector = Rc::new(RefCell::new(EventCollector::new()));
        let sink = Rc::clone(&collector);
        session.subscribe(Box::new(move |e| sink.borrow_mut().push(e.clone())));
        collector
    }

    #[test]
    fn single_error_scenario() {
        let mut s = ReviewSession::new();
        s.load_workbook(workbook());
        s.load_issues(vec![Issue::new("R1", Level::Error, 2, "Price", "too high")]);

        assert_eq!(s.store().view().len(), 1);
        assert_eq!(s.cursor(), Cursor::At(0));
        let mark = s.highlight().mark(0, 1).unwrap();
        assert_eq!(mark.severity, Severity::Error);
        assert!(mark.active);
    }

    #[test]
    fn errors_hidden_scenario() {
        let mut s = ReviewSession::new();
        s.load_workbook(workbook());
        s.load_issues(vec![Issue::new("R1", Level::Error, 2, "Price", "too high")]);
        s.set_show_errors(false);

        assert!(s.store().view().is_empty());
        assert_eq!(s.highlight().marked_cells(), 0);
        assert_eq!(s.cursor(), Cursor::Empty);
        assert!(!s.highlight().can_prev());
        assert!(!s.highlight().can_next());
    }

    #[test]
    fn unknown_sheet_is_noop() {
        let mut s = ReviewSession::new();
        s.load_workbook(workbook());
        assert!(!s.render_sheet("Nope"));
        assert_eq!(s.active_sheet(), Some("Prices"));
    }

    #[test]
    fn sheet_switch_reapplies_highlight() {
        let mut s = ReviewSession::new();
        s.load_workbook(workbook());
        s.load_issues(vec![Issue::new("R1", Level::Warning, 2, "Limit", "")]);
        assert_eq!(s.highlight().unresolved().len(), 1);

        let before = s.generation();
        assert!(s.render_sheet("Limits"));
        assert!(s.generation() > before);
        assert!(s.highlight().unresolved().is_empty());
        assert_eq!(s.highlight().mark(0, 1).map(|m| m.severity), Some(Severity::Warning));
        assert_eq!(s.active_sheet_index(), Some(1));
    }

    #[test]
    fn navigation_emits_selection_events() {
        let mut s = ReviewSession::new();
        s.load_workbook(workbook());
        let events = collect(&mut s);
        s.load_issues(vec![
            Issue::new("R1", Level::Error, 2, "Price", ""),
            Issue::new("R1", Level::Warning, 3, "Price", ""),
        ]);
        s.move_active(1);
        s.move_active(1);
        s.select_issue(0);

        let events = events.borrow();
        assert_eq!(events.filter_changes(), vec![(2, 2)]);
        assert_eq!(events.selections(), vec![1, 1, 0]);
        assert_eq!(s.active_issue().map(|(p, _)| p), Some(0));
    }

    #[test]
    fn toggle_resets_cursor() {
        let mut s = ReviewSession::new();
        s.load_workbook(workbook());
        s.load_issues(vec![
            Issue::new("R1", Level::Error, 2, "Price", ""),
            Issue::new("R2", Level::Error, 3, "Price", ""),
        ]);
        s.set_active(1);
        s.set_rule_enabled("R1", true);
        assert_eq!(s.cursor(), Cursor::At(0));
    }

    #[test]
    fn select_by_issue_index() {
        let mut s = ReviewSession::new();
        s.load_workbook(workbook());
        s.load_issues(vec![
            Issue::new("R1", Level::Warning, 2, "Price", ""),
            Issue::new("R1", Level::Error, 3, "Name", ""),
        ]);
        s.set_show_warnings(false);
        assert!(!s.select_issue_index(0));
        assert!(s.select_issue_index(1));
        assert_eq!(s.active_issue().map(|(_, i)| i.row), Some(3));
    }

    #[test]
    fn issues_before_workbook_resolve_after_render() {
        let mut s = ReviewSession::new();
        s.load_issues(vec![Issue::new("R1", Level::Error, 2, "Price", "")]);
        assert_eq!(s.highlight().unresolved().len(), 1);
        s.load_workbook(workbook());
        assert!(s.highlight().unresolved().is_empty());
        assert_eq!(s.highlight().marked_cells(), 1);
    }
}
