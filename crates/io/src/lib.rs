// File I/O operations

pub mod csv;
pub mod hash;
pub mod reports;
pub mod xlsx;

use std::path::Path;

use auditgrid_engine::workbook::Workbook;

/// Extensions `import_workbook` accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods", "csv", "tsv"];

/// Load any supported spreadsheet into a display-string workbook.
pub fn import_workbook(path: &Path) -> Result<Workbook, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" => csv::import(path),
        "tsv" => csv::import_tsv(path),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => {
            let (workbook, result) = xlsx::import(path)?;
            for warning in &result.warnings {
                log::warn!("{}", warning);
            }
            log::info!("{}: {}", path.display(), result.summary());
            Ok(workbook)
        }
        "" => Err(format!("{}: no file extension", path.display())),
        other => Err(format!(
            "{}: unsupported format '.{}' (expected one of: {})",
            path.display(),
            other,
            SUPPORTED_EXTENSIONS.join(", ")
        )),
    }
}
