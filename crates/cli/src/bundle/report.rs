// validation/validation_report.json: the merged issue list, each issue
// carrying the screenshot that evidences it.

use auditgrid_engine::issue::{Issue, Level};
use serde::Serialize;
use serde_json::Value;

use super::Screenshot;

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub generated_at: String,
    pub source_file: String,
    pub issues: Vec<Value>,
}

/// Best screenshot for an issue of `level`: the severity-specific view when
/// it was captured, else the all-issues view.
pub fn screenshot_ref(level: &Level, screenshots: &[Screenshot]) -> Option<String> {
    let find = |errors: bool, warnings: bool| {
        screenshots
            .iter()
            .find(|s| s.pattern.errors == errors && s.pattern.warnings == warnings)
    };
    let all = find(true, true);
    let preferred = match level {
        Level::Error => find(true, false),
        Level::Warning => find(false, true),
        Level::Other(_) => None,
    };
    preferred.or(all).map(|s| s.bundle_path())
}

/// The validator's issue objects with `screenshot_ref` added. `raw` holds
/// the original JSON of `issues`, entry for entry; nothing else is touched.
pub fn augment(issues: &[Issue], raw: &[Value], screenshots: &[Screenshot]) -> Result<Vec<Value>, String> {
    if issues.len() != raw.len() {
        return Err(format!("{} issues but {} raw entries", issues.len(), raw.len()));
    }
    Ok(issues
        .iter()
        .zip(raw)
        .map(|(issue, original)| {
            let mut value = original.clone();
            if let Value::Object(map) = &mut value {
                let reference = screenshot_ref(&issue.level, screenshots).map(Value::String).unwrap_or(Value::Null);
                map.insert("screenshot_ref".to_string(), reference);
            }
            value
        })
        .collect())
}
