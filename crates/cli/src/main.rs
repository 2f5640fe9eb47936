// auditgrid CLI - review spreadsheet validation findings and build audit bundles

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;

use auditgrid_cli::capture::{self, CaptureError, CaptureOptions, HeadlessSurface};
use auditgrid_cli::exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};
use auditgrid_cli::gate::{self, GateError, APPROVERS_ENV};
use auditgrid_cli::{logging, tui, util, BUILD_VERSION};
use auditgrid_config::AuditSettings;
use auditgrid_engine::filter::IssueStore;
use auditgrid_engine::issue::Issue;
use auditgrid_engine::review::ReviewSession;
use auditgrid_engine::workbook::Workbook;
use auditgrid_io::reports::{self, Discovery};

/// Environment fallback for the validator version tag.
const VALIDATOR_VERSION_ENV: &str = "VALIDATOR_VERSION";

#[derive(Parser)]
#[command(name = "agrid")]
#[command(about = "Review spreadsheet validation issues and produce audit bundles")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file (default: ./agrid.toml, then the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only on stderr
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a spreadsheet with its issues in the interactive reviewer
    #[command(after_help = "\
Examples:
  agrid review                          # source and issues from ./reports
  agrid review data/prices.xlsx --issues reports/prices.json
  agrid review data/prices.xlsx --sheet Limits

Keys:
  e / w        toggle errors / warnings
  r / a        toggle rule under cursor / enable all rules
  n p ] [      next / previous issue
  Tab          next sheet
  ?            help
  q            quit")]
    Review {
        /// Spreadsheet to open (default: the source named by the reports)
        file: Option<PathBuf>,

        /// Issue report file(s); default: every report in the reports dir
        #[arg(long, value_name = "PATH")]
        issues: Vec<PathBuf>,

        /// Reports directory (overrides settings)
        #[arg(long, value_name = "DIR")]
        reports_dir: Option<PathBuf>,

        /// Sheet to show first
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Render the fixed filter patterns headlessly and write an audit bundle
    #[command(after_help = "\
Examples:
  agrid capture
  agrid capture --reports-dir out/reports --bundle-root out/bundle
  VALIDATOR_VERSION=schema-check-1.4 agrid capture

Exit codes:
  10  no report names a source spreadsheet
  11  source spreadsheet not found
  12  render surface lacks a required control
  13  a capture stage failed or timed out")]
    Capture {
        /// Reports directory (overrides settings)
        #[arg(long, value_name = "DIR")]
        reports_dir: Option<PathBuf>,

        /// Bundle output directory (overrides settings)
        #[arg(long, value_name = "DIR")]
        bundle_root: Option<PathBuf>,

        /// Mapping file whose version is recorded in the manifest
        #[arg(long, value_name = "PATH")]
        mapping_file: Option<PathBuf>,

        /// Validator version tag (overrides settings and $VALIDATOR_VERSION)
        #[arg(long)]
        validator_version: Option<String>,
    },

    /// Check a bundle for unresolved blocking issues before merge
    #[command(after_help = "\
Examples:
  agrid gate
  agrid gate out/bundle
  WAIVER_ALLOWED_APPROVERS=alice,bob agrid gate

Exit codes:
  20  unresolved error
  21  unresolved warning that requires acknowledgement
  22  waived warning with a missing or invalid waiver
  23  validation report missing or invalid")]
    Gate {
        /// Bundle directory (default: bundle_root from settings)
        bundle: Option<PathBuf>,
    },

    /// List issues through the filter engine
    #[command(after_help = "\
Examples:
  agrid issues
  agrid issues --no-warnings
  agrid issues --rule price_positive --rule currency_code --json")]
    Issues {
        /// Hide error-level issues
        #[arg(long)]
        no_errors: bool,

        /// Hide warning-level issues
        #[arg(long)]
        no_warnings: bool,

        /// Only these rules (repeatable; default: all rules)
        #[arg(long, value_name = "RULE")]
        rule: Vec<String>,

        /// Output JSON
        #[arg(long)]
        json: bool,

        /// Reports directory (overrides settings)
        #[arg(long, value_name = "DIR")]
        reports_dir: Option<PathBuf>,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  auditgrid-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  auditgrid-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let result = load_settings(cli.config.as_deref()).and_then(|settings| match cli.command {
        None => {
            eprintln!("Usage: agrid <command> [options]");
            eprintln!("       agrid --help for more information");
            Ok(())
        }
        Some(Commands::Review { file, issues, reports_dir, sheet }) => {
            cmd_review(&settings, file, issues, reports_dir, sheet)
        }
        Some(Commands::Capture { reports_dir, bundle_root, mapping_file, validator_version }) => {
            cmd_capture(&settings, reports_dir, bundle_root, mapping_file, validator_version)
        }
        Some(Commands::Gate { bundle }) => cmd_gate(&settings, bundle),
        Some(Commands::Issues { no_errors, no_warnings, rule, json, reports_dir }) => {
            cmd_issues(&settings, no_errors, no_warnings, rule, json, reports_dir)
        }
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Exit with `code` without printing anything (the command already
    /// reported its verdict on stdout).
    pub fn silent(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }

    pub fn capture(err: CaptureError) -> Self {
        Self { code: err.exit_code(), hint: err.hint(), message: err.to_string() }
    }

    pub fn gate(err: GateError) -> Self {
        let hint = match &err {
            GateError::ReportMissing(_) => Some("run `agrid capture` first".to_string()),
            _ => None,
        };
        Self { code: err.exit_code(), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn load_settings(explicit: Option<&Path>) -> Result<AuditSettings, CliError> {
    let (settings, path) = AuditSettings::load(explicit)
        .map_err(|e| CliError::args(e).with_hint("check the TOML syntax and field names"))?;
    match path {
        Some(path) => log::debug!("using settings from {}", path.display()),
        None => log::debug!("no settings file, using defaults"),
    }
    Ok(settings)
}

fn project_root() -> Result<PathBuf, CliError> {
    std::env::current_dir().map_err(|e| CliError::io(format!("cannot read working directory: {}", e)))
}

fn discover(dir: &Path) -> Result<Discovery, CliError> {
    reports::discover(dir).map_err(CliError::io)
}

// ============================================================================
// review
// ============================================================================

/// Keep the header plus at most `max_rows` data rows per sheet (0 = all).
fn cap_rows(workbook: Workbook, max_rows: usize) -> Workbook {
    if max_rows == 0 {
        return workbook;
    }
    let sheets = workbook
        .sheets()
        .iter()
        .cloned()
        .map(|mut sheet| {
            if sheet.rows.len() > max_rows + 1 {
                log::info!(
                    "sheet '{}': showing first {} of {} rows",
                    sheet.name,
                    max_rows,
                    sheet.rows.len() - 1
                );
                sheet.rows.truncate(max_rows + 1);
            }
            sheet
        })
        .collect();
    Workbook::new(sheets)
}

fn cmd_review(
    settings: &AuditSettings,
    file: Option<PathBuf>,
    issue_files: Vec<PathBuf>,
    reports_dir: Option<PathBuf>,
    sheet: Option<String>,
) -> Result<(), CliError> {
    let root = project_root()?;
    let reports_dir = reports_dir.unwrap_or_else(|| settings.reports_dir.clone());

    let (issues, discovered_source): (Vec<Issue>, Option<PathBuf>) = if issue_files.is_empty() {
        let discovery = discover(&reports_dir)?;
        let source = discovery
            .source_reference()
            .map(|(_, reference)| reports::resolve_source(reference, &root, &reports_dir));
        (discovery.merged_issues(), source)
    } else {
        let mut issues = Vec::new();
        let mut source = None;
        for path in &issue_files {
            let report = reports::read_report(path).map_err(CliError::io)?;
            if source.is_none() {
                source = report.source_file.as_deref().map(|r| reports::resolve_source(r, &root, &reports_dir));
            }
            issues.extend(report.issues);
        }
        (issues, source)
    };

    let path = file.or(discovered_source).ok_or_else(|| {
        CliError::args("no spreadsheet given and no report names one")
            .with_hint("pass a FILE, or add \"source_file\" to a report")
    })?;

    let workbook = auditgrid_io::import_workbook(&path).map_err(CliError::io)?;
    if workbook.is_empty() {
        return Err(CliError::io(format!("{}: workbook has no sheets", path.display())));
    }

    let mut session = ReviewSession::new();
    session.load_workbook(cap_rows(workbook, settings.review.max_rows));
    session.load_issues(issues);

    if let Some(name) = sheet {
        if !session.render_sheet(&name) {
            return Err(CliError::args(format!("no sheet named '{}'", name))
                .with_hint(format!("sheets: {}", session.sheet_selector().join(", "))));
        }
    }

    log::info!(
        "{}: {}",
        path.display(),
        util::plural(session.store().issues().len(), "issue", "issues")
    );

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    tui::run(session, file_name).map_err(CliError::io)
}

// ============================================================================
// capture
// ============================================================================

fn cmd_capture(
    settings: &AuditSettings,
    reports_dir: Option<PathBuf>,
    bundle_root: Option<PathBuf>,
    mapping_file: Option<PathBuf>,
    validator_version: Option<String>,
) -> Result<(), CliError> {
    let validator_version = match validator_version {
        Some(v) => v,
        None => settings.validator_version_or(std::env::var(VALIDATOR_VERSION_ENV).ok(), || {
            BUILD_VERSION.to_string()
        }),
    };

    let options = CaptureOptions {
        project_root: project_root()?,
        reports_dir: reports_dir.unwrap_or_else(|| settings.reports_dir.clone()),
        bundle_root: bundle_root.unwrap_or_else(|| settings.bundle_root.clone()),
        mapping_file: mapping_file.unwrap_or_else(|| settings.mapping_file.clone()),
        validator_version,
        stage_timeout: Duration::from_millis(settings.capture.stage_timeout_ms),
        settle_timeout: Duration::from_millis(settings.capture.settle_timeout_ms),
    };

    let mut surface = HeadlessSurface::new(settings.capture.width, settings.capture.max_rows);
    let summary = capture::run(&options, &mut surface).map_err(CliError::capture)?;

    let mut lines = vec![
        format!("bundle: {}", summary.root.display()),
        format!(
            "issues: {} error(s), {} warning(s), {} total",
            summary.counts.errors, summary.counts.warnings, summary.counts.total
        ),
    ];
    lines.extend(summary.screenshots.iter().map(|s| format!("  {}", s)));
    lines.push(format!("  {}", summary.validation_report));
    lines.push(format!("  {}", summary.manifest));
    lines.push(format!("  {}", summary.summary));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines {
        writeln!(out, "{}", line).map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// gate
// ============================================================================

fn cmd_gate(settings: &AuditSettings, bundle: Option<PathBuf>) -> Result<(), CliError> {
    let bundle = bundle.unwrap_or_else(|| settings.bundle_root.clone());
    let env_approvers = std::env::var(APPROVERS_ENV).ok();
    let verdict = gate::run(&bundle, env_approvers.as_deref()).map_err(CliError::gate)?;

    print!("{}", verdict.render_text());
    io::stdout().flush().map_err(|e| CliError::io(e.to_string()))?;

    match verdict.exit_code() {
        EXIT_SUCCESS => Ok(()),
        code => Err(CliError::silent(code)),
    }
}

// ============================================================================
// issues
// ============================================================================

fn cmd_issues(
    settings: &AuditSettings,
    no_errors: bool,
    no_warnings: bool,
    rules: Vec<String>,
    json: bool,
    reports_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    let reports_dir = reports_dir.unwrap_or_else(|| settings.reports_dir.clone());
    let discovery = discover(&reports_dir)?;

    let mut store = IssueStore::new();
    store.load_issues(discovery.merged_issues());
    store.set_show_errors(!no_errors);
    store.set_show_warnings(!no_warnings);
    if !rules.is_empty() {
        for rule in &rules {
            if !store.rules().contains(rule) {
                return Err(CliError::args(format!("unknown rule '{}'", rule)).with_hint(format!(
                    "rules: {}",
                    store.rules().iter().cloned().collect::<Vec<_>>().join(", ")
                )));
            }
        }
        store.set_all_rules(false);
        for rule in &rules {
            store.set_rule_enabled(rule, true);
        }
    }

    let visible: Vec<&Issue> = store.visible().collect();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        let value = json!({
            "counts": store.counts(),
            "filter": store.state(),
            "issues": visible,
        });
        let text = serde_json::to_string_pretty(&value).map_err(|e| CliError::io(e.to_string()))?;
        return writeln!(out, "{}", text).map_err(|e| CliError::io(e.to_string()));
    }

    if visible.is_empty() {
        return writeln!(out, "{}", tui::view::EMPTY_STATE).map_err(|e| CliError::io(e.to_string()));
    }

    let cells: Vec<String> = visible.iter().map(|i| format!("{}!{}", i.column, i.row)).collect();
    let level_w = util::column_width("LEVEL", visible.iter().map(|i| i.level.as_str()));
    let rule_w = util::column_width("RULE", visible.iter().map(|i| i.rule.as_str()));
    let cell_w = util::column_width("CELL", cells.iter().map(|c| c.as_str()));

    let mut lines = vec![format!(
        "{}  {}  {}  MESSAGE",
        util::pad_right("LEVEL", level_w),
        util::pad_right("RULE", rule_w),
        util::pad_right("CELL", cell_w)
    )];
    for (issue, cell) in visible.iter().zip(&cells) {
        lines.push(format!(
            "{}  {}  {}  {}",
            util::pad_right(issue.level.as_str(), level_w),
            util::pad_right(&issue.rule, rule_w),
            util::pad_right(cell, cell_w),
            issue.message
        ));
    }
    lines.push(format!(
        "{} of {}",
        util::plural(visible.len(), "issue", "issues"),
        store.issues().len()
    ));

    for line in lines {
        writeln!(out, "{}", line.trim_end()).map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}
