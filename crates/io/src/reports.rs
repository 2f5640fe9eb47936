// Validation report discovery
//
// The reports directory holds one JSON file per independently-run check.
// Accepted shapes:
//   { "source_file": "...", "issues": [...] }
//   { "issues": [ { ..., "source_file": "..." }, ... ] }
//   [ issue, issue, ... ]
// Files are read in file-name order so the first source reference is stable.
// Nothing here fails on a bad file: it is skipped with a warning.

use std::path::{Path, PathBuf};

use auditgrid_engine::issue::{parse_issue_list, Issue};
use serde_json::Value;

/// One report file that parsed as JSON.
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub path: PathBuf,
    /// Source spreadsheet reference carried by this file, if any.
    pub source_file: Option<String>,
    pub issues: Vec<Issue>,
    /// The validator's own JSON for each entry of `issues`, same order.
    pub raw_issues: Vec<Value>,
    /// Entries that could not be decoded.
    pub skipped: usize,
}

/// Everything discovered in a reports directory.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub files: Vec<ReportFile>,
    /// Files that were not valid JSON (path, reason).
    pub rejected: Vec<(PathBuf, String)>,
}

impl Discovery {
    /// First source reference in file-name order: `(report path, source_file)`.
    pub fn source_reference(&self) -> Option<(&Path, &str)> {
        self.files
            .iter()
            .find_map(|f| f.source_file.as_deref().map(|s| (f.path.as_path(), s)))
    }

    /// All issues of all files, in file order then entry order.
    pub fn merged_issues(&self) -> Vec<Issue> {
        self.files.iter().flat_map(|f| f.issues.iter().cloned()).collect()
    }

    /// Raw JSON of `merged_issues`, entry for entry.
    pub fn merged_raw_issues(&self) -> Vec<Value> {
        self.files.iter().flat_map(|f| f.raw_issues.iter().cloned()).collect()
    }
}

/// Scan `dir` for `*.json` report files. A missing directory is an empty
/// discovery, not an error.
pub fn discover(dir: &Path) -> Result<Discovery, String> {
    let mut discovery = Discovery::default();
    if !dir.is_dir() {
        log::warn!("reports directory {} does not exist", dir.display());
        return Ok(discovery);
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| format!("{}: {}", dir.display(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().map(|e| e.eq_ignore_ascii_case("json")).unwrap_or(false))
        .collect();
    paths.sort();

    for path in paths {
        match read_report(&path) {
            Ok(report) => {
                if report.skipped > 0 {
                    log::warn!(
                        "{}: skipped {} issue entr{} lacking required fields",
                        path.display(),
                        report.skipped,
                        if report.skipped == 1 { "y" } else { "ies" }
                    );
                }
                discovery.files.push(report);
            }
            Err(reason) => {
                log::warn!("skipping report {}: {}", path.display(), reason);
                discovery.rejected.push((path, reason));
            }
        }
    }

    Ok(discovery)
}

/// Read one report file.
pub fn read_report(path: &Path) -> Result<ReportFile, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let value: Value = serde_json::from_str(&text).map_err(|e| format!("invalid JSON: {}", e))?;
    Ok(report_from_value(path, &value))
}

fn report_from_value(path: &Path, value: &Value) -> ReportFile {
    let empty = Value::Null;
    let list = match value {
        Value::Array(_) => value,
        Value::Object(map) => map.get("issues").unwrap_or(&empty),
        _ => &empty,
    };

    let top_level = value
        .get("source_file")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);

    let from_entries = || {
        list.as_array()?.iter().find_map(|entry| {
            entry
                .get("source_file")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
    };

    let (issues, skipped) = parse_issue_list(list);
    let raw_issues = list
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter(|(i, _)| !skipped.iter().any(|(s, _)| s == i))
                .map(|(_, entry)| entry.clone())
                .collect()
        })
        .unwrap_or_default();
    ReportFile {
        path: path.to_path_buf(),
        source_file: top_level.or_else(from_entries),
        issues,
        raw_issues,
        skipped: skipped.len(),
    }
}

/// Resolve a `source_file` reference: absolute paths as-is, relative paths
/// against `project_root` first, then against the reports directory.
pub fn resolve_source(reference: &str, project_root: &Path, reports_dir: &Path) -> PathBuf {
    let candidate = Path::new(reference);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    let from_root = project_root.join(candidate);
    if from_root.exists() {
        return from_root;
    }
    let from_reports = reports_dir.join(candidate);
    if from_reports.exists() {
        return from_reports;
    }
    from_root
}
