//! Audit bundle layout and assembly.
//!
//! ```text
//! <root>/
//!   source/<stem>-<sha12>.<ext>
//!   validation/validation_report.json
//!   screenshots/01_all_issues.svg
//!   screenshots/02_errors_only.svg
//!   screenshots/03_warnings_only.svg   (only when a warning exists)
//!   manifest.json
//!   summary.html
//! ```
//!
//! All paths recorded inside the bundle are relative to `<root>` and use
//! forward slashes.

pub mod manifest;
pub mod report;
pub mod summary;

use std::fs;
use std::path::{Path, PathBuf};

use auditgrid_engine::filter::IssueCounts;
use auditgrid_engine::issue::Issue;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use manifest::{BundlePaths, Manifest, ScreenshotEntry, SourceIdentity};

pub const SOURCE_DIR: &str = "source";
pub const VALIDATION_DIR: &str = "validation";
pub const REPORT_FILE: &str = "validation_report.json";
pub const SCREENSHOTS_DIR: &str = "screenshots";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SUMMARY_FILE: &str = "summary.html";

/// A named severity-toggle configuration captured as one screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterPattern {
    pub name: &'static str,
    pub errors: bool,
    pub warnings: bool,
}

pub const ALL_ISSUES: FilterPattern = FilterPattern { name: "all_issues", errors: true, warnings: true };
pub const ERRORS_ONLY: FilterPattern = FilterPattern { name: "errors_only", errors: true, warnings: false };
pub const WARNINGS_ONLY: FilterPattern = FilterPattern { name: "warnings_only", errors: false, warnings: true };

/// Patterns in capture order; warnings-only exists iff a warning does.
pub fn patterns_for(has_warnings: bool) -> Vec<FilterPattern> {
    let mut patterns = vec![ALL_ISSUES, ERRORS_ONLY];
    if has_warnings {
        patterns.push(WARNINGS_ONLY);
    }
    patterns
}

/// `NN_<pattern>.svg`, numbered from 1.
pub fn screenshot_file_name(index: usize, pattern: &FilterPattern) -> String {
    format!("{:02}_{}.svg", index + 1, pattern.name)
}

/// A captured screenshot waiting to be written.
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// File name inside `screenshots/`.
    pub file: String,
    pub pattern: FilterPattern,
    pub bytes: Vec<u8>,
}

impl Screenshot {
    pub fn bundle_path(&self) -> String {
        format!("{}/{}", SCREENSHOTS_DIR, self.file)
    }
}

pub struct BundleInput<'a> {
    pub root: &'a Path,
    pub source_path: &'a Path,
    /// `source_file` as written in the report.
    pub source_reference: &'a str,
    pub issues: &'a [Issue],
    /// Validator JSON of `issues`, entry for entry.
    pub raw_issues: &'a [Value],
    pub screenshots: &'a [Screenshot],
    pub mapping_version: Option<String>,
    pub validator_version: String,
    pub generated_at: DateTime<Utc>,
}

/// What a finished run wrote, bundle-relative.
#[derive(Debug, Clone)]
pub struct BundleSummary {
    pub root: PathBuf,
    pub source_copy: String,
    pub validation_report: String,
    pub screenshots: Vec<String>,
    pub manifest: String,
    pub summary: String,
    pub counts: IssueCounts,
}

/// `source/<stem>-<sha12>.<ext>`
pub fn source_copy_path(source: &Path, sha256: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    let short = &sha256[..sha256.len().min(12)];
    match source.extension() {
        Some(ext) => format!("{}/{}-{}.{}", SOURCE_DIR, stem, short, ext.to_string_lossy()),
        None => format!("{}/{}-{}", SOURCE_DIR, stem, short),
    }
}

fn io_err(path: &Path, e: std::io::Error) -> String {
    format!("{}: {}", path.display(), e)
}

fn write_file(root: &Path, relative: &str, bytes: &[u8]) -> Result<(), String> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    fs::write(&path, bytes).map_err(|e| io_err(&path, e))
}

/// Screenshots of an earlier run would otherwise linger next to new ones.
fn clear_screenshots(root: &Path) -> Result<(), String> {
    let dir = root.join(SCREENSHOTS_DIR);
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
        let path = entry.map_err(|e| io_err(&dir, e))?.path();
        if path.extension().map(|e| e == "svg").unwrap_or(false) {
            fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        }
    }
    Ok(())
}

/// Write every artifact of one run.
pub fn write_bundle(input: &BundleInput) -> Result<BundleSummary, String> {
    let root = input.root;
    fs::create_dir_all(root).map_err(|e| io_err(root, e))?;

    let source_bytes = fs::read(input.source_path).map_err(|e| io_err(input.source_path, e))?;
    let sha256 = auditgrid_io::hash::sha256_hex(&source_bytes);
    let source_copy = source_copy_path(input.source_path, &sha256);
    write_file(root, &source_copy, &source_bytes)?;

    clear_screenshots(root)?;
    let mut screenshot_paths = Vec::with_capacity(input.screenshots.len());
    for shot in input.screenshots {
        let rel = shot.bundle_path();
        write_file(root, &rel, &shot.bytes)?;
        screenshot_paths.push(rel);
    }

    let generated_at = input.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let augmented = report::augment(input.issues, input.raw_issues, input.screenshots)?;

    let report_rel = format!("{}/{}", VALIDATION_DIR, REPORT_FILE);
    let report = report::ValidationReport {
        generated_at: generated_at.clone(),
        source_file: input.source_reference.to_string(),
        issues: augmented.clone(),
    };
    let report_json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    write_file(root, &report_rel, report_json.as_bytes())?;

    let counts = IssueCounts::of(input.issues);
    let source_name = input
        .source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let manifest = Manifest {
        generated_at,
        source: SourceIdentity {
            name: source_name,
            sha256,
            reference: input.source_reference.to_string(),
        },
        mapping_version: input.mapping_version.clone(),
        validator_version: input.validator_version.clone(),
        counts,
        screenshots: input
            .screenshots
            .iter()
            .map(|s| ScreenshotEntry::new(s.bundle_path(), &s.pattern))
            .collect(),
        paths: BundlePaths {
            source_copy: source_copy.clone(),
            validation_report: report_rel.clone(),
            screenshots_dir: SCREENSHOTS_DIR.to_string(),
            manifest: MANIFEST_FILE.to_string(),
            summary: SUMMARY_FILE.to_string(),
        },
    };
    let manifest_json = serde_json::to_string_pretty(&manifest).map_err(|e| e.to_string())?;
    write_file(root, MANIFEST_FILE, manifest_json.as_bytes())?;

    let html = summary::render(&manifest, &augmented);
    write_file(root, SUMMARY_FILE, html.as_bytes())?;

    Ok(BundleSummary {
        root: root.to_path_buf(),
        source_copy,
        validation_report: report_rel,
        screenshots: screenshot_paths,
        manifest: MANIFEST_FILE.to_string(),
        summary: SUMMARY_FILE.to_string(),
        counts,
    })
}
