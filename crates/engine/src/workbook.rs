//! Workbook model and the addressable grid built from one of its sheets.
//!
//! Row numbering follows the source spreadsheet: the header occupies row 1,
//! so the first data row is row 2. Columns are addressed by header text, not
//! by position, so reordering columns never breaks an address as long as the
//! header text is unchanged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// File row number of the header row.
pub const HEADER_ROW: usize = 1;

/// File row number of the first data row.
pub const FIRST_DATA_ROW: usize = HEADER_ROW + 1;

/// A named sheet: row-major display strings, row 0 is the header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self { name: name.into(), rows }
    }

    /// Widest row length (the sheet is padded to this when rendered).
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }
}

/// Ordered set of named sheets. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

/// (source row number, column header text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub row: usize,
    pub column: String,
}

impl CellAddress {
    pub fn new(row: usize, column: impl Into<String>) -> Self {
        Self { row, column: column.into() }
    }
}

impl std::fmt::Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}!{}", self.column, self.row)
    }
}

/// A rendered sheet: padded grid whose data cells are tagged with their
/// [`CellAddress`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSheet {
    pub name: String,
    /// Header texts, padded to `num_cols`.
    pub col_names: Vec<String>,
    /// Data rows (header excluded), each padded to `num_cols`.
    pub rows: Vec<Vec<String>>,
    pub num_cols: usize,
    /// Header text -> first column index carrying it.
    column_index: HashMap<String, usize>,
}

impl RenderedSheet {
    /// Build the grid for `sheet`. Row 0 of the sheet is always the header;
    /// absent or short rows are padded with empty strings.
    pub fn from_sheet(sheet: &Sheet) -> Self {
        let num_cols = sheet.width();

        let mut col_names: Vec<String> = sheet.rows.first().cloned().unwrap_or_default();
        col_names.resize(num_cols, String::new());

        let mut rows: Vec<Vec<String>> = sheet.rows.iter().skip(1).cloned().collect();
        for row in &mut rows {
            row.resize(num_cols, String::new());
        }

        let mut column_index = HashMap::new();
        for (i, name) in col_names.iter().enumerate() {
            if !name.is_empty() {
                column_index.entry(name.clone()).or_insert(i);
            }
        }

        Self {
            name: sheet.name.clone(),
            col_names,
            rows,
            num_cols,
            column_index,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// File row number for data row at index `i`.
    pub fn file_row(&self, i: usize) -> usize {
        FIRST_DATA_ROW + i
    }

    /// Address carried by the data cell at (`i`, `c`).
    pub fn address_of(&self, i: usize, c: usize) -> Option<CellAddress> {
        if i >= self.rows.len() || c >= self.num_cols {
            return None;
        }
        let name = &self.col_names[c];
        if name.is_empty() {
            return None;
        }
        Some(CellAddress::new(self.file_row(i), name.clone()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    /// Resolve an address to grid coordinates (data row index, column index).
    pub fn locate(&self, addr: &CellAddress) -> Option<(usize, usize)> {
        let c = *self.column_index.get(&addr.column)?;
        let i = addr.row.checked_sub(FIRST_DATA_ROW)?;
        if i >= self.rows.len() {
            return None;
        }
        Some((i, c))
    }

    pub fn value(&self, i: usize, c: usize) -> &str {
        self.rows
            .get(i)
            .and_then(|r| r.get(c))
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> Sheet {
        Sheet::new(
            "Prices",
            rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
        )
    }

    #[test]
    fn short_rows_padded() {
        let s = sheet(&[&["Name", "Price", "Qty"], &["a", "1"], &[]]);
        let grid = RenderedSheet::from_sheet(&s);
        assert_eq!(grid.num_cols, 3);
        assert_eq!(grid.rows[0], vec!["a", "1", ""]);
        assert_eq!(grid.rows[1], vec!["", "", ""]);
    }

    #[test]
    fn short_header_padded() {
        let s = sheet(&[&["Name"], &["a", "1"]]);
        let grid = RenderedSheet::from_sheet(&s);
        assert_eq!(grid.col_names, vec!["Name", ""]);
        // Unnamed column has no address
        assert_eq!(grid.address_of(0, 1), None);
    }

    #[test]
    fn first_data_cell_is_row_two() {
        let s = sheet(&[&["Name", "Price"], &["a", "1"], &["b", "2"]]);
        let grid = RenderedSheet::from_sheet(&s);
        assert_eq!(grid.address_of(0, 1), Some(CellAddress::new(2, "Price")));
        assert_eq!(grid.address_of(1, 0), Some(CellAddress::new(3, "Name")));
    }

    #[test]
    fn locate_by_header_text() {
        let s = sheet(&[&["Qty", "Price"], &["3", "10"]]);
        let grid = RenderedSheet::from_sheet(&s);
        assert_eq!(grid.locate(&CellAddress::new(2, "Price")), Some((0, 1)));
        assert_eq!(grid.locate(&CellAddress::new(2, "Missing")), None);
        assert_eq!(grid.locate(&CellAddress::new(1, "Price")), None);
        assert_eq!(grid.locate(&CellAddress::new(3, "Price")), None);
    }

    #[test]
    fn duplicate_header_resolves_leftmost() {
        let s = sheet(&[&["A", "A"], &["x", "y"]]);
        let grid = RenderedSheet::from_sheet(&s);
        assert_eq!(grid.locate(&CellAddress::new(2, "A")), Some((0, 0)));
    }

    #[test]
    fn empty_sheet() {
        let grid = RenderedSheet::from_sheet(&Sheet::new("Empty", vec![]));
        assert_eq!(grid.num_cols, 0);
        assert_eq!(grid.num_rows(), 0);
    }

    #[test]
    fn workbook_lookup() {
        let wb = Workbook::new(vec![Sheet::new("One", vec![]), Sheet::new("Two", vec![])]);
        assert_eq!(wb.sheet_names(), vec!["One", "Two"]);
        assert!(wb.sheet("Two").is_some());
        assert!(wb.sheet("Three").is_none());
    }
}
