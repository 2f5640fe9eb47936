// manifest.json: identity of one capture run

use auditgrid_engine::filter::IssueCounts;
use serde::Serialize;

use super::FilterPattern;

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    /// RFC 3339, UTC
    pub generated_at: String,
    pub source: SourceIdentity,
    /// `null` when no mapping file exists
    pub mapping_version: Option<String>,
    pub validator_version: String,
    pub counts: IssueCounts,
    pub screenshots: Vec<ScreenshotEntry>,
    pub paths: BundlePaths,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceIdentity {
    pub name: String,
    pub sha256: String,
    /// `source_file` as the report wrote it
    pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterFlags {
    pub errors: bool,
    pub warnings: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreenshotEntry {
    pub file: String,
    pub filter: FilterFlags,
}

impl ScreenshotEntry {
    pub fn new(file: String, pattern: &FilterPattern) -> Self {
        Self {
            file,
            filter: FilterFlags { errors: pattern.errors, warnings: pattern.warnings },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BundlePaths {
    pub source_copy: String,
    pub validation_report: String,
    pub screenshots_dir: String,
    pub manifest: String,
    pub summary: String,
}
