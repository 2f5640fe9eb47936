// Excel file import (xlsx, xls, xlsb, ods)
//
// One-way conversion into display strings. Values are formatted the way a
// reviewer sees them in the spreadsheet; styles, formulas and layout are not
// carried over.

use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use auditgrid_engine::workbook::{Sheet, Workbook};

/// Maximum dimensions for a sheet
const MAX_ROWS: usize = 65536;
const MAX_COLS: usize = 256;

/// Per-sheet import statistics
#[derive(Debug, Clone, Default)]
pub struct SheetStats {
    pub name: String,
    pub cells_imported: usize,
    pub dates_imported: usize,
    pub truncated_rows: usize,
    pub truncated_cols: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub sheets_imported: usize,
    pub sheet_stats: Vec<SheetStats>,
    pub truncated: bool,
    pub warnings: Vec<String>,
    pub import_duration_ms: u128,
}

impl ImportResult {
    pub fn summary(&self) -> String {
        let cells: usize = self.sheet_stats.iter().map(|s| s.cells_imported).sum();
        format!(
            "{} sheet(s), {} cell(s) in {}ms",
            self.sheets_imported, cells, self.import_duration_ms
        )
    }
}

/// Import an Excel file (xlsx, xls, xlsb, ods)
pub fn import(path: &Path) -> Result<(Workbook, ImportResult), String> {
    let start_time = Instant::now();

    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let mut result = ImportResult::default();
    let mut sheets: Vec<Sheet> = Vec::new();
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    if sheet_names.is_empty() {
        return Err("Excel file contains no sheets".to_string());
    }

    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

        let mut stats = SheetStats {
            name: sheet_name.clone(),
            ..Default::default()
        };

        let (height, width) = range.get_size();
        if height == 0 || width == 0 {
            sheets.push(Sheet::new(sheet_name.as_str(), Vec::new()));
            result.sheets_imported += 1;
            result.sheet_stats.push(stats);
            continue;
        }

        // Range start offset (data may not begin at A1). Rows keep their
        // spreadsheet numbering, so leading blank rows/cols are materialized.
        let (data_start_row, data_start_col) = range.start().unwrap_or((0, 0));
        let start_row = data_start_row as usize;
        let start_col = data_start_col as usize;

        let effective_rows = (start_row + height).min(MAX_ROWS);
        let effective_cols = (start_col + width).min(MAX_COLS);

        if start_row + height > MAX_ROWS || start_col + width > MAX_COLS {
            stats.truncated_rows = (start_row + height).saturating_sub(MAX_ROWS);
            stats.truncated_cols = (start_col + width).saturating_sub(MAX_COLS);
            result.truncated = true;
            result.warnings.push(format!(
                "Sheet '{}' truncated to {}x{}",
                sheet_name, effective_rows, effective_cols
            ));
        }

        let mut rows: Vec<Vec<String>> = vec![Vec::new(); effective_rows];

        for (row_idx, row) in range.rows().enumerate() {
            let target_row = start_row + row_idx;
            if target_row >= effective_rows {
                break;
            }
            let out = &mut rows[target_row];

            for (col_idx, cell) in row.iter().enumerate() {
                let target_col = start_col + col_idx;
                if target_col >= effective_cols {
                    break;
                }
                let value = display_value(cell, &mut stats);
                if value.is_empty() {
                    continue;
                }
                if out.len() <= target_col {
                    out.resize(target_col + 1, String::new());
                }
                out[target_col] = value;
                stats.cells_imported += 1;
            }
        }

        log::debug!(
            "imported sheet '{}': {} cells",
            sheet_name, stats.cells_imported
        );
        sheets.push(Sheet::new(sheet_name.as_str(), rows));
        result.sheets_imported += 1;
        result.sheet_stats.push(stats);
    }

    result.import_duration_ms = start_time.elapsed().as_millis();
    Ok((Workbook::new(sheets), result))
}

fn display_value(cell: &Data, stats: &mut SheetStats) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => format_number(*n),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => {
            stats.dates_imported += 1;
            format_number(dt.as_f64())
        }
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

// Integers without decimals, everything else as-is
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
