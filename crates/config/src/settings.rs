// Pipeline settings
// Loaded from agrid.toml: --config, then ./agrid.toml, then
// <config dir>/auditgrid/agrid.toml, then built-in defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "agrid.toml";

/// Unattended capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Viewport width in terminal columns
    pub width: u16,

    /// Grid rows rendered into each screenshot
    pub max_rows: usize,

    /// Upper bound for each named stage
    pub stage_timeout_ms: u64,

    /// Upper bound for waiting on a highlight pass after a filter change
    pub settle_timeout_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 160,
            max_rows: 500,
            stage_timeout_ms: 10_000,
            settle_timeout_ms: 2_000,
        }
    }
}

/// Interactive reviewer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    /// Rows kept per rendered sheet
    pub max_rows: usize,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self { max_rows: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Directory scanned for validation report files
    pub reports_dir: PathBuf,

    /// Output directory of a capture run
    pub bundle_root: PathBuf,

    /// Optional mapping file whose version tag goes into the manifest
    pub mapping_file: PathBuf,

    /// Overrides the validator version tag (else VALIDATOR_VERSION, else build info)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator_version: Option<String>,

    pub capture: CaptureSettings,

    pub review: ReviewSettings,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports"),
            bundle_root: PathBuf::from("artifacts"),
            mapping_file: PathBuf::from("data").join("mapping.yaml"),
            validator_version: None,
            capture: CaptureSettings::default(),
            review: ReviewSettings::default(),
        }
    }
}

impl AuditSettings {
    pub fn from_toml(input: &str) -> Result<Self, String> {
        toml::from_str(input).map_err(|e| format!("invalid settings: {}", e))
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }

    /// User-level settings path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("auditgrid").join(CONFIG_FILE_NAME))
    }

    /// Candidate files in lookup order.
    pub fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        if let Some(path) = explicit {
            return vec![path.to_path_buf()];
        }
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(user) = Self::user_config_path() {
            paths.push(user);
        }
        paths
    }

    /// Load settings. An explicit path must exist; discovered files are
    /// optional. Returns the file actually used, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), String> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(format!("config file not found: {}", path.display()));
            }
        }

        for path in Self::search_paths(explicit) {
            if !path.is_file() {
                continue;
            }
            let contents = fs::read_to_string(&path)
                .map_err(|e| format!("{}: {}", path.display(), e))?;
            let settings = Self::from_toml(&contents)
                .map_err(|e| format!("{}: {}", path.display(), e))?;
            log::debug!("settings loaded from {}", path.display());
            return Ok((settings, Some(path)));
        }

        Ok((Self::default(), None))
    }

    /// Validator version tag: setting, then `env_value`, then `fallback`.
    pub fn validator_version_or(&self, env_value: Option<String>, fallback: impl FnOnce() -> String) -> String {
        self.validator_version
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_value.filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_defaults() {
        let s = AuditSettings::from_toml("").unwrap();
        assert_eq!(s, AuditSettings::default());
        assert_eq!(s.reports_dir, PathBuf::from("reports"));
        assert_eq!(s.bundle_root, PathBuf::from("artifacts"));
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let s = AuditSettings::from_toml(
            r#"
bundle_root = "out/bundle"
validator_version = "schema-check 1.4"

[capture]
width = 200
"#,
        )
        .unwrap();
        assert_eq!(s.bundle_root, PathBuf::from("out/bundle"));
        assert_eq!(s.validator_version.as_deref(), Some("schema-check 1.4"));
        assert_eq!(s.capture.width, 200);
        assert_eq!(s.capture.stage_timeout_ms, CaptureSettings::default().stage_timeout_ms);
        assert_eq!(s.review, ReviewSettings::default());
    }

    #[test]
    fn invalid_toml_is_error() {
        let err = AuditSettings::from_toml("capture = 3").unwrap_err();
        assert!(err.starts_with("invalid settings"));
    }

    #[test]
    fn explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("agrid.toml");
        assert!(AuditSettings::load(Some(&missing)).is_err());
    }

    #[test]
    fn explicit_path_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "reports_dir = \"checks\"\n").unwrap();
        let (s, used) = AuditSettings::load(Some(&path)).unwrap();
        assert_eq!(s.reports_dir, PathBuf::from("checks"));
        assert_eq!(used, Some(path));
    }

    #[test]
    fn validator_version_precedence() {
        let mut s = AuditSettings::default();
        assert_eq!(s.validator_version_or(None, || "build".into()), "build");
        assert_eq!(s.validator_version_or(Some("env".into()), || "build".into()), "env");
        s.validator_version = Some("configured".into());
        assert_eq!(s.validator_version_or(Some("env".into()), || "build".into()), "configured");
    }

    #[test]
    fn serializes_back_to_toml() {
        let text = AuditSettings::default().to_toml().unwrap();
        let again = AuditSettings::from_toml(&text).unwrap();
        assert_eq!(again, AuditSettings::default());
    }
}
