//! Unattended audit capture.
//!
//! Discovers the validation reports, drives a [`RenderSurface`] through the
//! fixed filter patterns and persists the bundle. The run is a sequence of
//! named stages; each is bounded by a timeout and every failure maps to one
//! exit code in [`crate::exit_codes`].

pub mod surface;
pub mod svg;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use auditgrid_io::reports;

use crate::bundle::{self, BundleInput, BundleSummary, FilterPattern, Screenshot};
use crate::exit_codes::{
    EXIT_CAPTURE_CONTRACT, EXIT_CAPTURE_FAILED, EXIT_CAPTURE_NO_SOURCE_REF, EXIT_CAPTURE_SOURCE_MISSING,
};
pub use surface::{Controls, HeadlessSurface, RenderSurface};

/// Poll interval while waiting on the surface's readiness generation.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DiscoverInputs,
    OpenSurface,
    AttachInputs,
    AwaitInitialRender,
    ApplyFilter,
    AwaitHighlight,
    SelectFirst,
    Capture,
    WriteBundle,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DiscoverInputs => "discover_inputs",
            Stage::OpenSurface => "open_surface",
            Stage::AttachInputs => "attach_inputs",
            Stage::AwaitInitialRender => "await_initial_render",
            Stage::ApplyFilter => "apply_filter",
            Stage::AwaitHighlight => "await_highlight",
            Stage::SelectFirst => "select_first",
            Stage::Capture => "capture",
            Stage::WriteBundle => "write_bundle",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum CaptureError {
    NoSourceReference { reports_dir: PathBuf },
    SourceMissing { reference: String, resolved: PathBuf },
    Contract { surface: String, missing: Vec<String> },
    Timeout { stage: Stage, limit: Duration },
    Stage { stage: Stage, message: String },
}

impl CaptureError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CaptureError::NoSourceReference { .. } => EXIT_CAPTURE_NO_SOURCE_REF,
            CaptureError::SourceMissing { .. } => EXIT_CAPTURE_SOURCE_MISSING,
            CaptureError::Contract { .. } => EXIT_CAPTURE_CONTRACT,
            CaptureError::Timeout { .. } | CaptureError::Stage { .. } => EXIT_CAPTURE_FAILED,
        }
    }

    pub fn hint(&self) -> Option<String> {
        match self {
            CaptureError::NoSourceReference { .. } => Some(
                "add \"source_file\" to a report, at top level or on an issue entry".to_string(),
            ),
            CaptureError::SourceMissing { .. } => {
                Some("relative paths resolve against the working directory, then the reports directory".to_string())
            }
            CaptureError::Contract { .. } => Some("increase [capture] width in agrid.toml".to_string()),
            CaptureError::Timeout { .. } => Some("raise [capture] stage_timeout_ms / settle_timeout_ms".to_string()),
            CaptureError::Stage { .. } => None,
        }
    }

    fn stage(stage: Stage, message: impl Into<String>) -> Self {
        CaptureError::Stage { stage, message: message.into() }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoSourceReference { reports_dir } => {
                write!(f, "no report in {} references a source spreadsheet", reports_dir.display())
            }
            CaptureError::SourceMissing { reference, resolved } => {
                write!(f, "source spreadsheet '{}' not found (looked at {})", reference, resolved.display())
            }
            CaptureError::Contract { surface, missing } => {
                write!(f, "{} surface is missing required controls: {}", surface, missing.join(", "))
            }
            CaptureError::Timeout { stage, limit } => {
                write!(f, "stage {} timed out after {}ms", stage, limit.as_millis())
            }
            CaptureError::Stage { stage, message } => write!(f, "stage {} failed: {}", stage, message),
        }
    }
}

impl std::error::Error for CaptureError {}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Base for relative `source_file` references.
    pub project_root: PathBuf,
    pub reports_dir: PathBuf,
    pub bundle_root: PathBuf,
    pub mapping_file: PathBuf,
    pub validator_version: String,
    pub stage_timeout: Duration,
    pub settle_timeout: Duration,
}

/// Run one capture. Nothing is written under the bundle root unless the
/// source spreadsheet was found.
pub fn run(options: &CaptureOptions, surface: &mut dyn RenderSurface) -> Result<BundleSummary, CaptureError> {
    let started = Instant::now();

    // Discovery failures happen before any output exists.
    let discovery = reports::discover(&options.reports_dir).map_err(|e| CaptureError::stage(Stage::DiscoverInputs, e))?;
    let (report_path, reference) = discovery
        .source_reference()
        .map(|(p, s)| (p.to_path_buf(), s.to_string()))
        .ok_or_else(|| CaptureError::NoSourceReference { reports_dir: options.reports_dir.clone() })?;
    log::info!("source reference '{}' from {}", reference, report_path.display());

    let source = reports::resolve_source(&reference, &options.project_root, &options.reports_dir);
    if !source.is_file() {
        return Err(CaptureError::SourceMissing { reference, resolved: source });
    }
    let issues = discovery.merged_issues();
    let raw_issues = discovery.merged_raw_issues();
    log::info!(
        "{} issue(s) from {} report file(s)",
        issues.len(),
        discovery.files.len()
    );

    let stage_timeout = options.stage_timeout;

    timed(Stage::OpenSurface, stage_timeout, || surface.open())?;

    let source_name = file_name(&source);
    timed(Stage::AttachInputs, stage_timeout, || {
        let workbook = auditgrid_io::import_workbook(&source)?;
        surface.attach(&source_name, workbook, issues.clone())
    })?;

    wait_for(Stage::AwaitInitialRender, stage_timeout, || surface.generation() >= 1)?;
    let missing = surface.controls().missing();
    if !missing.is_empty() {
        return Err(CaptureError::Contract { surface: surface.name().to_string(), missing });
    }

    let patterns = bundle::patterns_for(surface.has_warnings());
    let mut screenshots = Vec::with_capacity(patterns.len());
    for (i, pattern) in patterns.iter().enumerate() {
        let before = surface.generation();
        timed(Stage::ApplyFilter, stage_timeout, || surface.apply_filter(pattern.errors, pattern.warnings))?;
        wait_for(Stage::AwaitHighlight, options.settle_timeout, || surface.generation() > before)?;
        let selected = timed(Stage::SelectFirst, stage_timeout, || surface.select_first())?;
        if !selected {
            log::debug!("pattern {} has no visible issues", pattern.name);
        }
        let file = bundle::screenshot_file_name(i, pattern);
        let bytes = timed(Stage::Capture, stage_timeout, || surface.capture(&title(pattern, &source_name)))?;
        log::info!("captured {}", file);
        screenshots.push(Screenshot { file, pattern: *pattern, bytes });
    }

    let mapping_version = auditgrid_io::hash::mapping_version(&options.mapping_file)
        .map_err(|e| CaptureError::stage(Stage::WriteBundle, e))?;

    let input = BundleInput {
        root: &options.bundle_root,
        source_path: &source,
        source_reference: &reference,
        issues: &issues,
        raw_issues: &raw_issues,
        screenshots: &screenshots,
        mapping_version,
        validator_version: options.validator_version.clone(),
        generated_at: chrono::Utc::now(),
    };
    let summary = timed(Stage::WriteBundle, stage_timeout, || bundle::write_bundle(&input))?;

    log::info!(
        "bundle written to {} in {}ms",
        options.bundle_root.display(),
        started.elapsed().as_millis()
    );
    Ok(summary)
}

fn title(pattern: &FilterPattern, source_name: &str) -> String {
    format!("{} - {}", source_name, pattern.name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run a stage and fail it if it overran its limit.
fn timed<T>(stage: Stage, limit: Duration, f: impl FnOnce() -> Result<T, String>) -> Result<T, CaptureError> {
    let start = Instant::now();
    log::debug!("stage {} started", stage);
    let value = f().map_err(|e| CaptureError::stage(stage, e))?;
    let elapsed = start.elapsed();
    if elapsed > limit {
        return Err(CaptureError::Timeout { stage, limit });
    }
    log::debug!("stage {} done in {}ms", stage, elapsed.as_millis());
    Ok(value)
}

/// Poll `ready` until it holds or `limit` passes.
fn wait_for(stage: Stage, limit: Duration, mut ready: impl FnMut() -> bool) -> Result<(), CaptureError> {
    let deadline = Instant::now() + limit;
    loop {
        if ready() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(CaptureError::Timeout { stage, limit });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditgrid_engine::issue::Issue;
    use auditgrid_engine::workbook::Workbook;
    use serde_json::json;

    /// Surface that renders nothing and exposes no controls.
    struct BareSurface {
        generation: u64,
    }

    impl RenderSurface for BareSurface {
        fn name(&self) -> &str {
            "bare"
        }
        fn open(&mut self) -> Result<(), String> {
            Ok(())
        }
        fn attach(&mut self, _: &str, _: Workbook, _: Vec<Issue>) -> Result<(), String> {
            self.generation += 1;
            Ok(())
        }
        fn controls(&self) -> Controls {
            Controls::default()
        }
        fn generation(&self) -> u64 {
            self.generation
        }
        fn has_warnings(&self) -> bool {
            false
        }
        fn apply_filter(&mut self, _: bool, _: bool) -> Result<(), String> {
            Ok(())
        }
        fn select_first(&mut self) -> Result<bool, String> {
            Ok(false)
        }
        fn capture(&mut self, _: &str) -> Result<Vec<u8>, String> {
            Ok(Vec::new())
        }
    }

    /// Surface whose highlight pass never completes.
    struct StalledSurface(HeadlessSurface);

    impl RenderSurface for StalledSurface {
        fn name(&self) -> &str {
            "stalled"
        }
        fn open(&mut self) -> Result<(), String> {
            self.0.open()
        }
        fn attach(&mut self, n: &str, w: Workbook, i: Vec<Issue>) -> Result<(), String> {
            self.0.attach(n, w, i)
        }
        fn controls(&self) -> Controls {
            self.0.controls()
        }
        fn generation(&self) -> u64 {
            1
        }
        fn has_warnings(&self) -> bool {
            self.0.has_warnings()
        }
        fn apply_filter(&mut self, _: bool, _: bool) -> Result<(), String> {
            Ok(())
        }
        fn select_first(&mut self) -> Result<bool, String> {
            self.0.select_first()
        }
        fn capture(&mut self, t: &str) -> Result<Vec<u8>, String> {
            self.0.capture(t)
        }
    }

    fn fixture() -> (tempfile::TempDir, CaptureOptions) {
        let dir = tempfile::tempdir().unwrap();
        let reports_dir = dir.path().join("reports");
        std::fs::create_dir_all(&reports_dir).unwrap();
        std::fs::write(dir.path().join("master.csv"), "code,limit\nA,100\nB,-1\n").unwrap();
        let report = json!({
            "source_file": "master.csv",
            "issues": [
                {"rule": "NEG", "level": "error", "row": 3, "column": "limit", "message": "negative"}
            ]
        });
        std::fs::write(reports_dir.join("limits.json"), report.to_string()).unwrap();

        let options = CaptureOptions {
            project_root: dir.path().to_path_buf(),
            reports_dir,
            bundle_root: dir.path().join("artifacts"),
            mapping_file: dir.path().join("data").join("mapping.yaml"),
            validator_version: "test".to_string(),
            stage_timeout: Duration::from_secs(10),
            settle_timeout: Duration::from_millis(50),
        };
        (dir, options)
    }

    #[test]
    fn contract_violation_maps_to_exit_code() {
        let (_dir, options) = fixture();
        let err = run(&options, &mut BareSurface { generation: 0 }).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CAPTURE_CONTRACT);
        assert!(err.to_string().contains("attachment:spreadsheet"));
        assert!(err.to_string().contains("toggle:errors"));
    }

    #[test]
    fn stalled_highlight_times_out() {
        let (_dir, options) = fixture();
        let mut surface = StalledSurface(HeadlessSurface::new(120, 100));
        let err = run(&options, &mut surface).unwrap_err();
        assert!(matches!(err, CaptureError::Timeout { stage: Stage::AwaitHighlight, .. }));
        assert_eq!(err.exit_code(), EXIT_CAPTURE_FAILED);
    }

    #[test]
    fn missing_reference_writes_nothing() {
        let (dir, options) = fixture();
        std::fs::write(
            options.reports_dir.join("limits.json"),
            json!({"issues": []}).to_string(),
        )
        .unwrap();
        let err = run(&options, &mut HeadlessSurface::new(120, 100)).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_CAPTURE_NO_SOURCE_REF);
        assert!(!dir.path().join("artifacts").exists());
    }

    #[test]
    fn headless_run_produces_bundle() {
        let (_dir, options) = fixture();
        let summary = run(&options, &mut HeadlessSurface::new(120, 100)).unwrap();
        let names: Vec<&str> = summary.screenshots.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["screenshots/01_all_issues.svg", "screenshots/02_errors_only.svg"]);
        assert!(options.bundle_root.join("manifest.json").is_file());
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::AwaitInitialRender.to_string(), "await_initial_render");
        assert_eq!(Stage::WriteBundle.to_string(), "write_bundle");
    }
}
