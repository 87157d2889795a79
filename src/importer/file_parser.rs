// ==========================================
// Paie - file readers (XLSX / CSV) -> Grid
// ==========================================
// Stage 0 of an import: size checks, decoding, delimiter and header
// row detection. Cells keep their native type when the format has one.
// ==========================================

use crate::domain::profile::ColumnMapping;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::grid::{CellValue, Grid, GridRow};
use crate::importer::header::{is_known_alias, normalize_header};
use crate::importer::row_parser::excel_serial_to_date;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Rows scanned when looking for the header row
pub const HEADER_SCAN_ROWS: usize = 10;
/// Records sampled for delimiter detection
pub const DELIMITER_SAMPLE_ROWS: usize = 50;
pub const MIN_COLUMNS: usize = 3;
const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];
const FORMULA_PREFIXES: [char; 4] = ['=', '+', '@', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Xlsx,
    Xls,
    Xlsm,
    Csv,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "xlsx" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            "xlsm" => Some(FileFormat::Xlsm),
            "csv" => Some(FileFormat::Csv),
            _ => None,
        }
    }

    /// Hint first, then the file extension
    pub fn detect(path: &Path, hint: Option<&str>) -> ImportResult<Self> {
        let ext = match hint {
            Some(h) => h.to_string(),
            None => path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string(),
        };
        Self::from_extension(&ext).ok_or(ImportError::UnsupportedFormat(ext))
    }

    pub fn is_spreadsheet(&self) -> bool {
        !matches!(self, FileFormat::Csv)
    }
}

/// Rows as read from the file, before header detection.
/// `source_row_no` is the 1-based line (CSV) or sheet row (Excel).
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub rows: Vec<GridRow>,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
}

pub trait FileParser {
    fn parse_raw(&self, path: &Path) -> ImportResult<RawSheet>;
}

// ==========================================
// CSV
// ==========================================
pub struct CsvParser;

/// Decodes `bytes`, returning the text and the encoding name.
/// Order: utf-8-sig, utf-8, latin-1 (no C1 bytes), windows-1252.
pub fn decode_text(bytes: &[u8]) -> ImportResult<(String, &'static str)> {
    if bytes.starts_with(&[0xFF, 0xFE]) || bytes.starts_with(&[0xFE, 0xFF]) {
        return Err(ImportError::DecodingFailed("UTF-16 byte order mark".to_string()));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return std::str::from_utf8(rest)
            .map(|s| (s.to_string(), "utf-8-sig"))
            .map_err(|e| ImportError::DecodingFailed(format!("utf-8-sig: {}", e)));
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Ok((s.to_string(), "utf-8"));
    }
    if !bytes.iter().any(|b| (0x80..=0x9F).contains(b)) {
        return Ok((bytes.iter().map(|&b| b as char).collect(), "latin-1"));
    }
    encoding_rs::WINDOWS_1252
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|s| (s.into_owned(), "windows-1252"))
        .ok_or_else(|| ImportError::DecodingFailed("no candidate encoding matched".to_string()))
}

/// Records with their 1-based physical starting line; blank lines are
/// skipped by the reader but still counted
fn read_records(text: &str, delimiter: u8, limit: Option<usize>) -> ImportResult<Vec<(usize, Vec<String>)>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    // the reader stamps a record's position before skipping the blank
    // lines ahead of it, so step past line terminators and count newlines
    let bytes = text.as_bytes();
    let newlines: Vec<usize> = bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .map(|(i, _)| i)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = match record.position() {
            Some(pos) => {
                let mut start = pos.byte() as usize;
                while start < bytes.len() && matches!(bytes[start], b'\r' | b'\n') {
                    start += 1;
                }
                newlines.partition_point(|&nl| nl < start) + 1
            }
            None => rows.len() + 1,
        };
        rows.push((line, record.iter().map(|v| v.to_string()).collect()));
        if limit.map(|l| rows.len() >= l).unwrap_or(false) {
            break;
        }
    }
    Ok(rows)
}

/// Delimiter giving the widest column count shared by most sampled rows
pub fn detect_delimiter(text: &str) -> ImportResult<(u8, usize)> {
    let mut best: Option<(u8, usize)> = None;
    for delimiter in DELIMITERS {
        let sample = match read_records(text, delimiter, Some(DELIMITER_SAMPLE_ROWS)) {
            Ok(rows) => rows,
            Err(_) => continue,
        };
        let widths: Vec<usize> = sample
            .iter()
            .filter(|(_, r)| r.iter().any(|v| !v.trim().is_empty()))
            .map(|(_, r)| r.len())
            .collect();
        if widths.is_empty() {
            continue;
        }
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for w in &widths {
            *counts.entry(*w).or_insert(0) += 1;
        }
        let (mode, freq) = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
            .map(|(w, f)| (*w, *f))
            .unwrap_or((1, 0));
        let consistent = if freq * 2 >= widths.len() { mode } else { 1 };
        if best.map(|(_, w)| consistent > w).unwrap_or(true) {
            best = Some((delimiter, consistent));
        }
    }

    match best {
        Some((delimiter, width)) if width >= MIN_COLUMNS => Ok((delimiter, width)),
        Some((_, width)) => Err(ImportError::TooFewColumns { found: width }),
        None => Err(ImportError::TooFewColumns { found: 0 }),
    }
}

impl FileParser for CsvParser {
    fn parse_raw(&self, path: &Path) -> ImportResult<RawSheet> {
        let bytes = fs::read(path)?;
        let (text, encoding) = decode_text(&bytes)?;
        let (delimiter, width) = detect_delimiter(&text)?;
        debug!(encoding, delimiter = %(delimiter as char), width, "csv layout detected");

        let rows = read_records(&text, delimiter, None)?
            .into_iter()
            .map(|(line, record)| GridRow {
                source_row_no: line,
                cells: record
                    .into_iter()
                    .map(|v| {
                        if v.trim().is_empty() {
                            CellValue::Empty
                        } else {
                            CellValue::Text(v)
                        }
                    })
                    .collect(),
            })
            .collect();

        Ok(RawSheet {
            rows,
            encoding: Some(encoding.to_string()),
            delimiter: Some(delimiter as char),
        })
    }
}

// ==========================================
// Excel (xlsx / xls / xlsm)
// ==========================================
pub struct ExcelParser {
    pub sheet_name: Option<String>,
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => {
            if s.trim().is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            match excel_serial_to_date(serial.trunc() as i64) {
                Ok(date) => CellValue::Date(date),
                Err(_) => CellValue::Float(serial),
            }
        }
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

impl FileParser for ExcelParser {
    fn parse_raw(&self, path: &Path) -> ImportResult<RawSheet> {
        let mut workbook = open_workbook_auto(path)?;

        let sheet_names = workbook.sheet_names();
        let sheet = match &self.sheet_name {
            Some(name) => {
                if !sheet_names.iter().any(|s| s == name) {
                    return Err(ImportError::SheetNotFound(name.clone()));
                }
                name.clone()
            }
            None => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| ImportError::ExcelParseError("workbook has no worksheet".to_string()))?,
        };

        let range = workbook.worksheet_range(&sheet)?;
        let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
        let rows = range
            .rows()
            .enumerate()
            .map(|(idx, row)| GridRow {
                source_row_no: first_row + idx + 1,
                cells: row.iter().map(convert_cell).collect(),
            })
            .collect();

        Ok(RawSheet {
            rows,
            encoding: None,
            delimiter: None,
        })
    }
}

// ==========================================
// Header row detection and grid assembly
// ==========================================

/// Share of text cells + share of distinct values + alias hits
fn header_row_score(row: &[CellValue]) -> f64 {
    let filled: Vec<&CellValue> = row.iter().filter(|c| !c.is_empty()).collect();
    if filled.is_empty() {
        return 0.0;
    }
    let n = filled.len() as f64;
    let text_share = filled.iter().filter(|c| c.is_text()).count() as f64 / n;
    let distinct: HashSet<String> = filled.iter().map(|c| c.to_string().trim().to_lowercase()).collect();
    let distinct_share = distinct.len() as f64 / n;
    let alias_hits = filled
        .iter()
        .filter(|c| c.is_text() && is_known_alias(&normalize_header(&c.to_string())))
        .count() as f64;
    text_share + distinct_share + alias_hits
}

/// Index of the header row among the first non-empty rows
pub fn detect_header_row(rows: &[GridRow]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, row) in rows
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_blank())
        .take(HEADER_SCAN_ROWS)
    {
        let score = header_row_score(&row.cells);
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

pub fn build_grid(raw: RawSheet) -> ImportResult<Grid> {
    let header_idx = detect_header_row(&raw.rows)
        .ok_or_else(|| ImportError::EmptyFile("no non-empty row".to_string()))?;

    let mut header_cells = raw.rows[header_idx].cells.clone();
    while header_cells.last().map(CellValue::is_empty).unwrap_or(false) {
        header_cells.pop();
    }
    if header_cells.len() < MIN_COLUMNS {
        return Err(ImportError::TooFewColumns {
            found: header_cells.len(),
        });
    }

    let original_headers: Vec<String> = header_cells
        .iter()
        .map(|c| c.to_string().trim().to_string())
        .collect();
    let headers: Vec<String> = original_headers.iter().map(|h| normalize_header(h)).collect();
    let width = headers.len();

    let rows = raw
        .rows
        .into_iter()
        .skip(header_idx + 1)
        .map(|mut row| {
            row.cells.truncate(width);
            row
        })
        .collect();

    Ok(Grid {
        original_headers,
        headers,
        rows,
        encoding: raw.encoding,
        delimiter: raw.delimiter,
        header_row_index: header_idx,
    })
}

/// Reads any supported file into a grid after the size checks
pub struct UniversalFileParser {
    pub max_file_size_bytes: u64,
    pub sheet_name: Option<String>,
}

impl UniversalFileParser {
    pub fn new(max_file_size_bytes: u64, sheet_name: Option<String>) -> Self {
        Self {
            max_file_size_bytes,
            sheet_name,
        }
    }

    pub fn check_file(&self, path: &Path) -> ImportResult<u64> {
        let meta = fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ImportError::FileNotFound(path.display().to_string()),
            _ => ImportError::FileReadError(e.to_string()),
        })?;
        let size = meta.len();
        if size == 0 {
            return Err(ImportError::EmptyFile(path.display().to_string()));
        }
        if size > self.max_file_size_bytes {
            return Err(ImportError::FileTooLarge {
                size,
                max: self.max_file_size_bytes,
            });
        }
        Ok(size)
    }

    pub fn parse(&self, path: &Path, hint: Option<&str>) -> ImportResult<Grid> {
        self.check_file(path)?;
        let format = FileFormat::detect(path, hint)?;
        let raw = if format.is_spreadsheet() {
            ExcelParser {
                sheet_name: self.sheet_name.clone(),
            }
            .parse_raw(path)?
        } else {
            CsvParser.parse_raw(path)?
        };
        let grid = build_grid(raw)?;
        debug!(
            columns = grid.column_count(),
            rows = grid.rows.len(),
            header_row = grid.header_row_index,
            "grid built"
        );
        Ok(grid)
    }
}

// ==========================================
// Formula-injection filter
// ==========================================

/// Rejects text cells starting with = + @ | outside monetary columns
pub fn check_formula_injection(grid: &Grid, mapping: &ColumnMapping) -> ImportResult<()> {
    let guarded: Vec<usize> = (0..grid.column_count())
        .filter(|c| {
            mapping
                .field_for_column(*c)
                .map(|f| !f.is_monetary())
                .unwrap_or(true)
        })
        .collect();

    for row in &grid.rows {
        for &c in &guarded {
            if let CellValue::Text(s) = row.cell(c) {
                if s.trim_start().starts_with(FORMULA_PREFIXES) {
                    let column = match grid.original_headers.get(c) {
                        Some(h) if !h.is_empty() => h.clone(),
                        _ => format!("#{}", c + 1),
                    };
                    return Err(ImportError::FormulaInjection {
                        row: row.source_row_no,
                        column,
                    });
                }
            }
        }
    }
    Ok(())
}
