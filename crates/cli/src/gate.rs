//! Merge gate over a finished audit bundle.
//!
//! Blocks on error-level issues that are neither resolved nor waived, and on
//! `requires_ack` warnings that are unresolved or carry an invalid waiver.
//! Waivers and the approver allow-list live in the bundle manifest (added
//! by reviewers after capture); `WAIVER_ALLOWED_APPROVERS` is the fallback
//! allow-list.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::bundle::{MANIFEST_FILE, REPORT_FILE, VALIDATION_DIR};
use crate::exit_codes::{
    EXIT_GATE_INVALID_WAIVER, EXIT_GATE_REPORT_INVALID, EXIT_GATE_UNRESOLVED_ERROR, EXIT_GATE_UNRESOLVED_WARNING,
    EXIT_SUCCESS,
};

pub const GATE_FILE: &str = "merge_gate.json";
pub const APPROVERS_ENV: &str = "WAIVER_ALLOWED_APPROVERS";

#[derive(Debug)]
pub enum GateError {
    ReportMissing(PathBuf),
    ReportInvalid { path: PathBuf, reason: String },
    Write(String),
}

impl GateError {
    pub fn exit_code(&self) -> u8 {
        match self {
            GateError::ReportMissing(_) | GateError::ReportInvalid { .. } => EXIT_GATE_REPORT_INVALID,
            GateError::Write(_) => crate::exit_codes::EXIT_ERROR,
        }
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::ReportMissing(path) => write!(f, "validation report not found at {}", path.display()),
            GateError::ReportInvalid { path, reason } => write!(f, "{}: {}", path.display(), reason),
            GateError::Write(msg) => write!(f, "failed to write gate result: {}", msg),
        }
    }
}

impl std::error::Error for GateError {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedError {
    pub issue_id: String,
    pub row: Value,
    pub column: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedWarning {
    pub issue_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidWaiver {
    pub issue_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateVerdict {
    pub checked_at: String,
    pub unresolved_errors: Vec<UnresolvedError>,
    pub unresolved_warnings: Vec<UnresolvedWarning>,
    pub invalid_waivers: Vec<InvalidWaiver>,
    pub allowed_approvers: Vec<String>,
}

impl GateVerdict {
    pub fn blocked(&self) -> bool {
        !self.unresolved_errors.is_empty() || !self.unresolved_warnings.is_empty() || !self.invalid_waivers.is_empty()
    }

    /// Errors first, then invalid waivers, then warnings.
    pub fn exit_code(&self) -> u8 {
        if !self.unresolved_errors.is_empty() {
            EXIT_GATE_UNRESOLVED_ERROR
        } else if !self.invalid_waivers.is_empty() {
            EXIT_GATE_INVALID_WAIVER
        } else if !self.unresolved_warnings.is_empty() {
            EXIT_GATE_UNRESOLVED_WARNING
        } else {
            EXIT_SUCCESS
        }
    }

    /// Human-readable verdict for stdout.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if !self.blocked() {
            out.push_str("merge allowed: no unresolved blocking issues\n");
            return out;
        }

        out.push_str("merge blocked\n\n");
        if !self.unresolved_errors.is_empty() {
            let _ = writeln!(out, "Unresolved ERROR issues: {}", self.unresolved_errors.len());
            for e in &self.unresolved_errors {
                let _ = writeln!(out, "- {} (row {}, column {})", e.issue_id, plain(&e.row), plain(&e.column));
            }
            out.push('\n');
        }
        if !self.unresolved_warnings.is_empty() {
            let _ = writeln!(out, "Unresolved WARNING issues requiring ack: {}", self.unresolved_warnings.len());
            for w in &self.unresolved_warnings {
                let _ = writeln!(out, "- {}", w.issue_id);
            }
            out.push('\n');
        }
        if !self.invalid_waivers.is_empty() {
            let _ = writeln!(out, "Invalid or missing waivers: {}", self.invalid_waivers.len());
            for iv in &self.invalid_waivers {
                let _ = writeln!(out, "- {}: {}", iv.issue_id, iv.reason);
            }
            out.push('\n');
        }
        out.push_str("Resolve or waive issues before merging.\n");
        out
    }
}

fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Approver allow-list: manifest first, then the comma-separated env value.
pub fn allowed_approvers(manifest: Option<&Value>, env_value: Option<&str>) -> Vec<String> {
    let from_manifest: Vec<String> = manifest
        .and_then(|m| m.get("waiver_approved_by_allowed"))
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    if !from_manifest.is_empty() {
        return from_manifest;
    }
    env_value
        .map(|env| {
            env.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Judge a validation report. `report` is an object with `issues` or a bare
/// array.
pub fn evaluate(
    report: &Value,
    manifest: Option<&Value>,
    env_approvers: Option<&str>,
    checked_at: String,
) -> Result<GateVerdict, String> {
    let issues = match report {
        Value::Array(list) => list,
        Value::Object(map) => map
            .get("issues")
            .and_then(Value::as_array)
            .ok_or_else(|| "expected an issues array".to_string())?,
        _ => return Err("expected an object with issues or an array".to_string()),
    };

    let allowed = allowed_approvers(manifest, env_approvers);
    let waivers: HashMap<&str, &Value> = manifest
        .and_then(|m| m.get("waivers"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|w| str_field(w, "issue_id").map(|id| (id, w)))
                .collect()
        })
        .unwrap_or_default();

    let mut verdict = GateVerdict {
        checked_at,
        unresolved_errors: Vec::new(),
        unresolved_warnings: Vec::new(),
        invalid_waivers: Vec::new(),
        allowed_approvers: allowed.clone(),
    };

    for issue in issues.iter().filter(|i| i.is_object()) {
        let issue_id = str_field(issue, "issue_id")
            .or_else(|| str_field(issue, "rule"))
            .unwrap_or("")
            .to_string();
        let level = issue
            .get("level")
            .and_then(Value::as_str)
            .map(|l| l.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let requires_ack = issue.get("requires_ack").map(truthy).unwrap_or(false);
        let status = issue
            .get("resolution")
            .and_then(|r| r.get("status"))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unresolved".to_string());
        let unresolved = status != "resolved" && status != "waived";

        match level.as_str() {
            "error" => {
                if unresolved {
                    verdict.unresolved_errors.push(UnresolvedError {
                        issue_id,
                        row: issue.get("row").cloned().unwrap_or(Value::Null),
                        column: issue.get("column").cloned().unwrap_or(Value::Null),
                    });
                }
            }
            "warning" if requires_ack => match status.as_str() {
                "resolved" => {}
                "waived" => {
                    if let Some(reason) = waiver_problem(waivers.get(issue_id.as_str()).copied(), &allowed) {
                        verdict.invalid_waivers.push(InvalidWaiver { issue_id, reason });
                    }
                }
                _ => verdict.unresolved_warnings.push(UnresolvedWarning { issue_id }),
            },
            _ => {}
        }
    }

    Ok(verdict)
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

fn waiver_problem(waiver: Option<&Value>, allowed: &[String]) -> Option<String> {
    let Some(waiver) = waiver else {
        return Some("no waiver entry in manifest".to_string());
    };
    let (Some(approved_by), Some(_reason)) = (str_field(waiver, "approved_by"), str_field(waiver, "reason")) else {
        return Some("waiver missing approved_by or reason".to_string());
    };
    if !allowed.is_empty() && !allowed.iter().any(|a| a == approved_by) {
        return Some(format!("approved_by {} not in allowed approvers", approved_by));
    }
    None
}

fn read_json(path: &Path) -> Result<Option<Value>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&text).map(Some).map_err(|e| format!("invalid JSON: {}", e))
}

/// Evaluate the bundle at `bundle_root` and write `merge_gate.json` into it.
pub fn run(bundle_root: &Path, env_approvers: Option<&str>) -> Result<GateVerdict, GateError> {
    let report_path = bundle_root.join(VALIDATION_DIR).join(REPORT_FILE);
    let report = read_json(&report_path)
        .map_err(|reason| GateError::ReportInvalid { path: report_path.clone(), reason })?
        .ok_or_else(|| GateError::ReportMissing(report_path.clone()))?;

    let manifest_path = bundle_root.join(MANIFEST_FILE);
    let manifest = match read_json(&manifest_path) {
        Ok(m) => m,
        Err(reason) => {
            log::warn!("ignoring manifest {}: {}", manifest_path.display(), reason);
            None
        }
    };

    let checked_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let verdict = evaluate(&report, manifest.as_ref(), env_approvers, checked_at)
        .map_err(|reason| GateError::ReportInvalid { path: report_path, reason })?;

    let out = bundle_root.join(GATE_FILE);
    let json = serde_json::to_string_pretty(&verdict).map_err(|e| GateError::Write(e.to_string()))?;
    std::fs::write(&out, json).map_err(|e| GateError::Write(format!("{}: {}", out.display(), e)))?;
    log::debug!("gate result written to {}", out.display());

    Ok(verdict)
}
