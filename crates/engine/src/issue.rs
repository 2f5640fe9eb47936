//! Validation findings as produced by external checkers.
//!
//! Issues are immutable facts: the review engine filters, annotates and
//! displays them but never edits one. Fields the engine does not know about
//! are kept in `extra` and written back out unchanged.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::workbook::CellAddress;

/// Issue severity. Unknown levels are kept verbatim for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Level {
    Error,
    Warning,
    Other(String),
}

impl Level {
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        if t.eq_ignore_ascii_case("error") {
            Level::Error
        } else if t.eq_ignore_ascii_case("warning") {
            Level::Warning
        } else {
            Level::Other(t.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Other(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Level::Error)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Level::Warning)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Level::parse(&s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub rule: String,
    pub level: Level,
    #[serde(deserialize_with = "de_row")]
    pub row: usize,
    pub column: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// Extra diagnostics, passed through opaquely.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Issue {
    pub fn new(
        rule: impl Into<String>,
        level: Level,
        row: usize,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            level,
            row,
            column: column.into(),
            message: message.into(),
            source_file: None,
            extra: Map::new(),
        }
    }

    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.column.clone())
    }

    /// Decode one entry of an issue list.
    pub fn from_value(value: &Value) -> Result<Issue, String> {
        Issue::deserialize(value).map_err(|e| e.to_string())
    }
}

/// Decode an issue list. Anything that is not an array yields an empty list;
/// entries that fail to decode are returned as `(entry index, reason)`.
pub fn parse_issue_list(value: &Value) -> (Vec<Issue>, Vec<(usize, String)>) {
    let Some(entries) = value.as_array() else {
        return (Vec::new(), Vec::new());
    };
    let mut issues = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        match Issue::from_value(entry) {
            Ok(issue) => issues.push(issue),
            Err(reason) => skipped.push((i, reason)),
        }
    }
    (issues, skipped)
}

// Validators disagree on whether row is a number or a numeric string.
fn de_row<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| de::Error::custom(format!("row must be a positive integer, got {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<usize>()
            .map_err(|_| de::Error::custom(format!("row is not an integer: '{s}'"))),
        other => Err(de::Error::custom(format!("row must be a number, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_case_insensitive() {
        assert_eq!(Level::parse("ERROR"), Level::Error);
        assert_eq!(Level::parse(" Warning "), Level::Warning);
        assert_eq!(Level::parse("info"), Level::Other("info".into()));
    }

    #[test]
    fn decode_minimal_issue() {
        let v = json!({"rule": "R1", "level": "error", "row": 2, "column": "Price", "message": "bad"});
        let issue = Issue::from_value(&v).unwrap();
        assert_eq!(issue.address(), CellAddress::new(2, "Price"));
        assert!(issue.level.is_error());
        assert!(issue.extra.is_empty());
    }

    #[test]
    fn extra_fields_pass_through() {
        let v = json!({
            "rule": "R2", "level": "warning", "row": "7", "column": "Qty",
            "message": "m", "source_file": "data/x.xlsx",
            "requires_ack": true, "resolution": {"status": "waived"}
        });
        let issue = Issue::from_value(&v).unwrap();
        assert_eq!(issue.row, 7);
        assert_eq!(issue.source_file.as_deref(), Some("data/x.xlsx"));

        let out = serde_json::to_value(&issue).unwrap();
        assert_eq!(out["requires_ack"], json!(true));
        assert_eq!(out["resolution"]["status"], json!("waived"));
        assert_eq!(out["level"], json!("warning"));
    }

    #[test]
    fn missing_required_field_rejected() {
        let v = json!({"rule": "R1", "level": "error", "column": "Price"});
        assert!(Issue::from_value(&v).is_err());
    }

    #[test]
    fn non_array_is_empty() {
        let (issues, skipped) = parse_issue_list(&json!({"issues": []}));
        assert!(issues.is_empty());
        assert!(skipped.is_empty());
        let (issues, _) = parse_issue_list(&Value::Null);
        assert!(issues.is_empty());
    }

    #[test]
    fn bad_entries_skipped() {
        let v = json!([
            {"rule": "R1", "level": "error", "row": 2, "column": "A", "message": ""},
            {"rule": "R1"},
            "not an object"
        ]);
        let (issues, skipped) = parse_issue_list(&v);
        assert_eq!(issues.len(), 1);
        assert_eq!(skipped.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2]);
    }
}
