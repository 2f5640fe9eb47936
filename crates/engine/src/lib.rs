//! `auditgrid-engine`: review state for spreadsheet validation findings.
//!
//! Pure engine crate: receives a loaded workbook and decoded issues, owns
//! filtering, highlighting and navigation. No IO, no terminal.

pub mod events;
pub mod filter;
pub mod highlight;
pub mod issue;
pub mod review;
pub mod workbook;

pub use filter::{FilterState, IssueCounts, IssueStore};
pub use highlight::{CellMark, Cursor, HighlightController, Severity, Unresolved};
pub use issue::{Issue, Level};
pub use review::ReviewSession;
pub use workbook::{CellAddress, RenderedSheet, Sheet, Workbook};
