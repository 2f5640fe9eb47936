// Stderr logger for the `log` facade
//
// Level comes from AGRID_LOG (error|warn|info|debug|trace|off, default info);
// -v / -q on the command line override it.

use log::{LevelFilter, Metadata, Record};

pub const LOG_ENV: &str = "AGRID_LOG";

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Install the logger. Safe to call more than once.
pub fn init(verbose: bool, quiet: bool) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(resolve_level(
        std::env::var(LOG_ENV).ok().as_deref(),
        verbose,
        quiet,
    ));
}

/// Change the level after init (the TUI drops to errors while in raw mode).
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}

pub fn resolve_level(env_value: Option<&str>, verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    if verbose {
        return LevelFilter::Debug;
    }
    match env_value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        Some("off") => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}
