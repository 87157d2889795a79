// ==========================================
// Paie - tabular grid produced by the file readers
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One spreadsheet cell. Native XLSX numbers and dates keep their type;
/// CSV cells are always `Text` or `Empty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    /// Blank text counts as empty
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, CellValue::Text(s) if !s.trim().is_empty())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Int(_) | CellValue::Float(_))
    }

    /// Trimmed text rendering, None when empty
    pub fn as_text(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.to_string().trim().to_string())
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{}", *x as i64)
                } else {
                    write!(f, "{}", x)
                }
            }
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    /// 1-based row number in the source file
    pub source_row_no: usize,
    pub cells: Vec<CellValue>,
}

impl GridRow {
    pub fn cell(&self, column: usize) -> &CellValue {
        self.cells.get(column).unwrap_or(&EMPTY_CELL)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_empty)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grid {
    pub original_headers: Vec<String>,
    /// `normalize_header` of each original header, same order
    pub headers: Vec<String>,
    pub rows: Vec<GridRow>,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
    /// 0-based index of the header row among the rows read
    pub header_row_index: usize,
}

impl Grid {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// First `n` non-blank rows
    pub fn sample(&self, n: usize) -> Vec<&GridRow> {
        self.rows.iter().filter(|r| !r.is_blank()).take(n).collect()
    }

    /// All non-empty values of one column
    pub fn column_values<'a>(&self, rows: &[&'a GridRow], column: usize) -> Vec<&'a CellValue> {
        rows.iter()
            .map(|r| r.cell(column))
            .filter(|c| !c.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_cells_render_without_trailing_zero() {
        assert_eq!(CellValue::Float(1001.0).to_string(), "1001");
        assert_eq!(CellValue::Float(12.5).to_string(), "12.5");
        assert_eq!(
            CellValue::Date(NaiveDate::from_ymd_opt(2025, 8, 28).unwrap()).as_text(),
            Some("2025-08-28".to_string())
        );
        assert_eq!(CellValue::Text("  ".into()).as_text(), None);
    }

    #[test]
    fn test_missing_cell_is_empty() {
        let row = GridRow {
            source_row_no: 2,
            cells: vec![CellValue::Text("a".into())],
        };
        assert!(row.cell(5).is_empty());
        assert!(!row.is_blank());
    }
}
