//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `agrid` exit codes.
//! CI pipelines branch on them, so they never change meaning.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                              |
//! |---------|-----------|------------------------------------------|
//! | 0       | Universal | Success                                  |
//! | 1       | Universal | General error (unspecified)              |
//! | 2       | Universal | CLI usage error (bad args, bad config)   |
//! | 10-19   | capture   | Audit bundle generation                  |
//! | 20-29   | gate      | Merge gate over a finished bundle        |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable config, unsupported file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Capture (10-19)
// =============================================================================

/// No report file in the reports directory names a source spreadsheet.
/// Nothing is written to the bundle root.
pub const EXIT_CAPTURE_NO_SOURCE_REF: u8 = 10;

/// The referenced source spreadsheet does not exist.
/// Nothing is written to the bundle root.
pub const EXIT_CAPTURE_SOURCE_MISSING: u8 = 11;

/// The rendering surface lacks a required attachment point or toggle.
pub const EXIT_CAPTURE_CONTRACT: u8 = 12;

/// Any other capture failure (stage timeout, render, write).
pub const EXIT_CAPTURE_FAILED: u8 = 13;

// =============================================================================
// Gate (20-29)
// =============================================================================

/// At least one error-level issue is neither resolved nor waived.
pub const EXIT_GATE_UNRESOLVED_ERROR: u8 = 20;

/// At least one acknowledgement-required warning is unresolved.
pub const EXIT_GATE_UNRESOLVED_WARNING: u8 = 21;

/// A waived warning has a missing or unapproved waiver.
pub const EXIT_GATE_INVALID_WAIVER: u8 = 22;

/// The bundle's validation report is missing or unreadable.
pub const EXIT_GATE_REPORT_INVALID: u8 = 23;
