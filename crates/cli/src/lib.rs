// auditgrid CLI library: everything `agrid` runs, exposed for tests.

pub mod bundle;
pub mod capture;
pub mod exit_codes;
pub mod gate;
pub mod logging;
pub mod tui;
pub mod util;

/// Default validator version tag recorded in manifests.
pub const BUILD_VERSION: &str = concat!("agrid ", env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")");
