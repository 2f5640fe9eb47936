//! Highlight & Navigation Controller
//!
//! Maps the filtered view onto rendered cells and tracks the active issue.
//!
//! Cursor states:
//! - `Empty`: the filtered view has no items; navigation is a no-op
//! - `At(i)`: `0 <= i < len`
//!
//! Every recomputation of the filtered view lands on `At(0)` or `Empty`.

use std::collections::HashMap;

use serde::Serialize;

use crate::issue::{Issue, Level};
use crate::workbook::{CellAddress, RenderedSheet};

/// Ordered so that `Error > Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// Marking applied to one rendered cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMark {
    pub severity: Severity,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Empty,
    At(usize),
}

/// An issue whose address matched no rendered cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unresolved {
    /// Index into the issue list.
    pub issue_index: usize,
    pub address: CellAddress,
    pub reason: UnresolvedReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    NoSheet,
    UnknownColumn,
    RowOutOfRange,
}

#[derive(Debug, Clone)]
pub struct HighlightController {
    cursor: Cursor,
    view_len: usize,
    /// Keyed by grid coordinates (data row index, column index).
    marks: HashMap<(usize, usize), CellMark>,
    unresolved: Vec<Unresolved>,
    /// Grid coordinates of the active issue's cell, if it resolved.
    scroll_target: Option<(usize, usize)>,
    generation: u64,
}

impl Default for HighlightController {
    fn default() -> Self {
        Self::new()
    }
}

impl HighlightController {
    pub fn new() -> Self {
        Self {
            cursor: Cursor::Empty,
            view_len: 0,
            marks: HashMap::new(),
            unresolved: Vec::new(),
            scroll_target: None,
            generation: 0,
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn active(&self) -> Option<usize> {
        match self.cursor {
            Cursor::Empty => None,
            Cursor::At(i) => Some(i),
        }
    }

    /// The filtered view was recomputed: back to `At(0)` or `Empty`.
    pub fn reset(&mut self, view_len: usize) {
        self.view_len = view_len;
        self.cursor = if view_len == 0 { Cursor::Empty } else { Cursor::At(0) };
    }

    /// Move to `AT(clamp(i))`. No-op when empty.
    pub fn set_active(&mut self, i: usize) {
        if self.view_len == 0 {
            self.cursor = Cursor::Empty;
            return;
        }
        self.cursor = Cursor::At(i.min(self.view_len - 1));
    }

    pub fn move_active(&mut self, delta: isize) {
        let Cursor::At(i) = self.cursor else {
            return;
        };
        let target = if delta < 0 {
            i.saturating_sub(delta.unsigned_abs())
        } else {
            i.saturating_add(delta as usize)
        };
        self.set_active(target);
    }

    pub fn can_prev(&self) -> bool {
        matches!(self.cursor, Cursor::At(i) if i > 0)
    }

    pub fn can_next(&self) -> bool {
        matches!(self.cursor, Cursor::At(i) if i + 1 < self.view_len)
    }

    /// Recompute every marking from scratch for `view` (indices into
    /// `issues`) over `grid`. Returns the unresolved issues of this pass.
    pub fn reapply(
        &mut self,
        grid: Option<&RenderedSheet>,
        issues: &[Issue],
        view: &[usize],
    ) -> &[Unresolved] {
        self.marks.clear();
        self.unresolved.clear();
        self.scroll_target = None;

        // Group by exact address; error dominates warning.
        let mut grouped: HashMap<CellAddress, Severity> = HashMap::new();
        for &idx in view {
            let Some(issue) = issues.get(idx) else { continue };
            let severity = match issue.level {
                Level::Error => Severity::Error,
                Level::Warning => Severity::Warning,
                Level::Other(_) => continue,
            };
            grouped
                .entry(issue.address())
                .and_modify(|s| *s = (*s).max(severity))
                .or_insert(severity);
        }

        for &idx in view {
            let Some(issue) = issues.get(idx) else { continue };
            let addr = issue.address();
            match resolve(grid, &addr) {
                Ok(pos) => {
                    if let Some(&severity) = grouped.get(&addr) {
                        self.marks.insert(pos, CellMark { severity, active: false });
                    }
                }
                Err(reason) => {
                    log::warn!(
                        "issue {} ({}) not highlighted: {} has no rendered cell ({:?})",
                        idx, issue.rule, addr, reason
                    );
                    self.unresolved.push(Unresolved { issue_index: idx, address: addr, reason });
                }
            }
        }

        if let Some(active) = self.active() {
            if let Some(issue) = view.get(active).and_then(|&idx| issues.get(idx)) {
                if let Ok(pos) = resolve(grid, &issue.address()) {
                    if let Some(mark) = self.marks.get_mut(&pos) {
                        mark.active = true;
                    }
                    self.scroll_target = Some(pos);
                }
            }
        }

        self.generation += 1;
        &self.unresolved
    }

    pub fn mark(&self, row: usize, col: usize) -> Option<CellMark> {
        self.marks.get(&(row, col)).copied()
    }

    pub fn marked_cells(&self) -> usize {
        self.marks.len()
    }

    pub fn unresolved(&self) -> &[Unresolved] {
        &self.unresolved
    }

    pub fn scroll_target(&self) -> Option<(usize, usize)> {
        self.scroll_target
    }

    /// Completed highlight passes so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn resolve(grid: Option<&RenderedSheet>, addr: &CellAddress) -> Result<(usize, usize), UnresolvedReason> {
    let grid = grid.ok_or(UnresolvedReason::NoSheet)?;
    if !grid.has_column(&addr.column) {
        return Err(UnresolvedReason::UnknownColumn);
    }
    grid.locate(addr).ok_or(UnresolvedReason::RowOutOfRange)
}
