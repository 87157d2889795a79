// ==========================================
// Paie - amount/date parsers and row parser
// ==========================================
// parse_amount: locale tolerant, "(x)" = -x
// parse_date: ISO prefix, EU d/m/Y, Excel serial [36526, 55154],
//             years 2000..=2050 only
// parse_rows: typed rows + per-row rejection reasons
// ==========================================

use crate::domain::employee::EmployeeIdentity;
use crate::domain::import::RejectedRow;
use crate::domain::profile::ColumnMapping;
use crate::domain::transaction::STAGING_COLUMNS;
use crate::domain::types::LogicalField;
use crate::importer::grid::{CellValue, Grid, GridRow};
use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2050;
/// Serial of 2000-01-01
pub const MIN_EXCEL_SERIAL: i64 = 36_526;
/// Upper serial bound; 55154 itself is 2051-01-01 and fails the year check
pub const MAX_EXCEL_SERIAL: i64 = 55_154;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("valid ISO date regex"));
static EU_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4})$").expect("valid EU date regex")
});
static INTEGRAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("valid integer regex"));

// ==========================================
// Amounts
// ==========================================

const CURRENCY_CODES: [&str; 4] = ["CAD", "USD", "EUR", "CA"];

fn strip_currency(s: &str) -> String {
    let mut out: String = s
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '$' | '€' | '£' | ' ' | '\u{00A0}' | '\u{202F}' | '\u{2009}' | '\t'
            )
        })
        .collect::<String>()
        .to_uppercase();

    // repeat until stable so stripping is idempotent
    loop {
        let before = out.len();
        for code in CURRENCY_CODES {
            out = out.replace(code, "");
        }
        if out.len() == before {
            return out;
        }
    }
}

fn parse_amount_str(raw: &str) -> Option<f64> {
    let s = strip_currency(raw.trim());
    if s.is_empty() {
        return None;
    }

    if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        return parse_amount_str(inner).map(|v| -v);
    }

    let normalized = match (s.contains('.'), s.contains(',')) {
        (true, true) => s.replace('.', "").replace(',', "."),
        (false, true) => s.replace(',', "."),
        _ => s,
    };

    let body = normalized
        .strip_prefix('-')
        .or_else(|| normalized.strip_prefix('+'))
        .unwrap_or(&normalized);
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    let dots = body.chars().filter(|c| *c == '.').count();
    if digits == 0 || dots > 1 || digits + dots != body.len() {
        return None;
    }

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_amount(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Int(i) => Some(*i as f64),
        CellValue::Float(x) if x.is_finite() => Some(*x),
        CellValue::Text(s) => parse_amount_str(s),
        _ => None,
    }
}

/// round(x * 100), half away from zero. The intermediate rounding to
/// 1e-6 cent absorbs binary noise such as 0.145 * 100 = 14.4999...
pub fn to_cents(amount: f64) -> i64 {
    let cents = amount * 100.0;
    ((cents * 1e6).round() / 1e6).round() as i64
}

// ==========================================
// Dates
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateRejection {
    Empty,
    Unrecognized(String),
    InvalidCalendar(String),
    SerialOutOfRange(i64),
    YearOutOfRange(NaiveDate),
}

impl fmt::Display for DateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRejection::Empty => write!(f, "empty date"),
            DateRejection::Unrecognized(s) => write!(f, "unrecognized date: {}", s),
            DateRejection::InvalidCalendar(s) => write!(f, "invalid calendar date: {}", s),
            DateRejection::SerialOutOfRange(n) => write!(
                f,
                "excel serial {} outside [{}, {}]",
                n, MIN_EXCEL_SERIAL, MAX_EXCEL_SERIAL
            ),
            DateRejection::YearOutOfRange(d) => {
                write!(f, "year {} outside [{}, {}]", d.year(), MIN_YEAR, MAX_YEAR)
            }
        }
    }
}

fn check_year(date: NaiveDate) -> Result<NaiveDate, DateRejection> {
    if (MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        Ok(date)
    } else {
        Err(DateRejection::YearOutOfRange(date))
    }
}

/// 1899-12-31 + n days, minus the phantom 1900-02-29 when n > 60
pub fn excel_serial_to_date(serial: i64) -> Result<NaiveDate, DateRejection> {
    if !(MIN_EXCEL_SERIAL..=MAX_EXCEL_SERIAL).contains(&serial) {
        return Err(DateRejection::SerialOutOfRange(serial));
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 31)
        .ok_or_else(|| DateRejection::InvalidCalendar("1899-12-31".into()))?;
    let offset = if serial > 60 { serial - 1 } else { serial };
    check_year(base + Duration::days(offset))
}

fn parse_date_str(raw: &str) -> Result<NaiveDate, DateRejection> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(DateRejection::Empty);
    }

    if let Some(caps) = ISO_DATE.captures(s) {
        let (y, m, d) = (caps[1].parse::<i32>(), caps[2].parse::<u32>(), caps[3].parse::<u32>());
        return match (y, m, d) {
            (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d)
                .ok_or_else(|| DateRejection::InvalidCalendar(s.to_string()))
                .and_then(check_year),
            _ => Err(DateRejection::Unrecognized(s.to_string())),
        };
    }

    if let Some(caps) = EU_DATE.captures(s) {
        let (d, m, y) = (caps[1].parse::<u32>(), caps[2].parse::<u32>(), caps[3].parse::<i32>());
        return match (d, m, y) {
            (Ok(d), Ok(m), Ok(y)) if (1..=31).contains(&d) && (1..=12).contains(&m) => {
                NaiveDate::from_ymd_opt(y, m, d)
                    .ok_or_else(|| DateRejection::InvalidCalendar(s.to_string()))
                    .and_then(check_year)
            }
            _ => Err(DateRejection::InvalidCalendar(s.to_string())),
        };
    }

    if INTEGRAL.is_match(s) {
        return match s.parse::<i64>() {
            Ok(n) => excel_serial_to_date(n),
            Err(_) => Err(DateRejection::SerialOutOfRange(i64::MAX)),
        };
    }

    Err(DateRejection::Unrecognized(s.to_string()))
}

pub fn parse_date(cell: &CellValue) -> Result<NaiveDate, DateRejection> {
    match cell {
        CellValue::Empty => Err(DateRejection::Empty),
        CellValue::Date(d) => check_year(*d),
        CellValue::Int(n) => excel_serial_to_date(*n),
        CellValue::Float(x) if x.is_finite() => excel_serial_to_date(x.trunc() as i64),
        CellValue::Text(s) => parse_date_str(s),
        other => Err(DateRejection::Unrecognized(other.to_string())),
    }
}

// ==========================================
// Rows
// ==========================================

/// Reason codes; fatal ones reject the row
pub mod reasons {
    pub const MISSING_REQUIRED: &str = "missing_required";
    pub const INVALID_DATE: &str = "invalid_date";
    pub const INVALID_AMOUNT: &str = "invalid_amount";
    pub const MISSING_OPTIONAL: &str = "missing_optional";
    pub const INVALID_EMPLOYER_SHARE: &str = "invalid_employer_share";
    pub const DATE_MISMATCH: &str = "date_mismatch";
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub source_row_no: usize,
    pub identity: EmployeeIdentity,
    pub pay_code: String,
    pub pay_code_label: Option<String>,
    pub pay_category: Option<String>,
    pub budget_post: Option<String>,
    pub budget_post_label: Option<String>,
    pub job_category: Option<String>,
    /// Source sign; the sign policy runs afterwards
    pub amount_cents: i64,
    /// Always >= 0
    pub employer_cents: i64,
    /// Text mirror in canonical column order, for staging
    pub raw: [Option<String>; STAGING_COLUMNS],
}

#[derive(Debug, Clone, Default)]
pub struct ParsedRows {
    pub accepted: Vec<ParsedRow>,
    pub rejected: Vec<RejectedRow>,
    /// Non-fatal reason -> occurrences
    pub warnings: BTreeMap<String, usize>,
}

impl ParsedRows {
    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }
}

fn text_of(row: &GridRow, mapping: &ColumnMapping, field: LogicalField) -> Option<String> {
    mapping.get(field).and_then(|c| row.cell(c).as_text())
}

fn parse_row(
    row: &GridRow,
    mapping: &ColumnMapping,
    pay_date: NaiveDate,
    warnings: &mut BTreeMap<String, usize>,
) -> Result<ParsedRow, Vec<String>> {
    let mut fatal = Vec::new();
    let mut warn = |reason: String| *warnings.entry(reason).or_insert(0) += 1;

    for field in LogicalField::CANONICAL_ORDER {
        let Some(column) = mapping.get(field) else { continue };
        if !row.cell(column).is_empty() {
            continue;
        }
        if field.is_required() {
            fatal.push(format!("{}:{}", reasons::MISSING_REQUIRED, field));
        } else {
            warn(format!("{}:{}", reasons::MISSING_OPTIONAL, field));
        }
    }

    if let Some(column) = mapping.get(LogicalField::PayDate) {
        let cell = row.cell(column);
        if !cell.is_empty() {
            match parse_date(cell) {
                Ok(d) if d != pay_date => warn(reasons::DATE_MISMATCH.to_string()),
                Ok(_) => {}
                Err(_) => fatal.push(reasons::INVALID_DATE.to_string()),
            }
        }
    }

    let amount = mapping.get(LogicalField::Amount).map(|c| row.cell(c));
    let amount_cents = match amount {
        Some(cell) if !cell.is_empty() => match parse_amount(cell) {
            Some(v) => Some(to_cents(v)),
            None => {
                fatal.push(reasons::INVALID_AMOUNT.to_string());
                None
            }
        },
        _ => None,
    };

    let employer_cents = match mapping.get(LogicalField::EmployerShare).map(|c| row.cell(c)) {
        Some(cell) if !cell.is_empty() => match parse_amount(cell) {
            Some(v) => to_cents(v).abs(),
            None => {
                warn(reasons::INVALID_EMPLOYER_SHARE.to_string());
                0
            }
        },
        _ => 0,
    };

    if !fatal.is_empty() {
        return Err(fatal);
    }

    let matricule = text_of(row, mapping, LogicalField::Matricule).unwrap_or_default();
    let full_name = text_of(row, mapping, LogicalField::EmployeeName).unwrap_or_default();
    let mut raw: [Option<String>; STAGING_COLUMNS] = Default::default();
    for field in LogicalField::CANONICAL_ORDER {
        raw[field.staging_index()] = text_of(row, mapping, field);
    }

    Ok(ParsedRow {
        source_row_no: row.source_row_no,
        identity: EmployeeIdentity::from_source(&matricule, &full_name),
        pay_code: text_of(row, mapping, LogicalField::PayCode).unwrap_or_default(),
        pay_code_label: text_of(row, mapping, LogicalField::PayCodeLabel),
        pay_category: text_of(row, mapping, LogicalField::PayCategory),
        budget_post: text_of(row, mapping, LogicalField::BudgetPost),
        budget_post_label: text_of(row, mapping, LogicalField::BudgetPostLabel),
        job_category: text_of(row, mapping, LogicalField::JobCategory),
        amount_cents: amount_cents.unwrap_or(0),
        employer_cents,
        raw,
    })
}

/// Parses every non-blank row. The declared `pay_date` wins over the
/// row's own date.
pub fn parse_rows(grid: &Grid, mapping: &ColumnMapping, pay_date: NaiveDate) -> ParsedRows {
    let mut out = ParsedRows::default();
    for row in grid.rows.iter().filter(|r| !r.is_blank()) {
        match parse_row(row, mapping, pay_date, &mut out.warnings) {
            Ok(parsed) => out.accepted.push(parsed),
            Err(reasons) => out.rejected.push(RejectedRow {
                row_no: row.source_row_no,
                reasons,
            }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_amount_formats() {
        assert_eq!(parse_amount(&text("1 234,56 $")), Some(1234.56));
        assert_eq!(parse_amount(&text("1.234,56")), Some(1234.56));
        assert_eq!(parse_amount(&text("12.5")), Some(12.5));
        assert_eq!(parse_amount(&text("CAD 100")), Some(100.0));
        assert_eq!(parse_amount(&text("1\u{202F}000 €")), Some(1000.0));
        assert_eq!(parse_amount(&text("(45,10)")), Some(-45.1));
        assert_eq!(parse_amount(&text("-3")), Some(-3.0));
        assert_eq!(parse_amount(&CellValue::Int(7)), Some(7.0));
        assert_eq!(parse_amount(&CellValue::Float(f64::NAN)), None);
        assert_eq!(parse_amount(&text("abc")), None);
        assert_eq!(parse_amount(&text("1.2.3")), None);
        assert_eq!(parse_amount(&text("")), None);
    }

    #[test]
    fn test_parentheses_negate() {
        for s in ["12", "1 234,56", "-7.25", "(3)", "x", "5)", "$ 9,99", "CCAA5", "", "()"] {
            let wrapped = parse_amount(&text(&format!("({})", s)));
            assert_eq!(wrapped, parse_amount(&text(s)).map(|v| -v), "input {:?}", s);
        }
    }

    #[test]
    fn test_to_cents_rounds_half_away_from_zero() {
        assert_eq!(to_cents(0.145), 15);
        assert_eq!(to_cents(-0.145), -15);
        assert_eq!(to_cents(1234.56), 123456);
        assert_eq!(to_cents(0.004), 0);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(parse_date(&text("2025-08-28")), Ok(ymd(2025, 8, 28)));
        assert_eq!(parse_date(&text("2025-08-28 00:00:00")), Ok(ymd(2025, 8, 28)));
        assert_eq!(parse_date(&text("28/08/2025")), Ok(ymd(2025, 8, 28)));
        assert_eq!(parse_date(&text("1-2-2024")), Ok(ymd(2024, 2, 1)));
        assert_eq!(parse_date(&CellValue::Date(ymd(2025, 1, 2))), Ok(ymd(2025, 1, 2)));
        assert!(matches!(parse_date(&text("31/02/2025")), Err(DateRejection::InvalidCalendar(_))));
        assert!(matches!(parse_date(&text("13/13/2025")), Err(DateRejection::InvalidCalendar(_))));
        assert!(matches!(parse_date(&text("1999-12-31")), Err(DateRejection::YearOutOfRange(_))));
        assert!(matches!(parse_date(&text("hier")), Err(DateRejection::Unrecognized(_))));
    }

    #[test]
    fn test_excel_serial_bounds() {
        assert_eq!(parse_date(&CellValue::Int(36_526)), Ok(ymd(2000, 1, 1)));
        assert_eq!(parse_date(&CellValue::Int(55_153)), Ok(ymd(2050, 12, 31)));
        assert!(matches!(
            parse_date(&CellValue::Int(55_154)),
            Err(DateRejection::YearOutOfRange(_))
        ));
        assert_eq!(parse_date(&text("45897")), Ok(ymd(2025, 8, 28)));
        assert_eq!(
            parse_date(&CellValue::Int(36_525)),
            Err(DateRejection::SerialOutOfRange(36_525))
        );
        assert_eq!(
            parse_date(&text("55155")),
            Err(DateRejection::SerialOutOfRange(55_155))
        );
    }

    #[test]
    fn test_formatted_dates_round_trip() {
        let mut d = ymd(2000, 1, 1);
        while d.year() <= 2050 {
            assert_eq!(parse_date(&text(&d.format("%Y-%m-%d").to_string())), Ok(d));
            assert_eq!(parse_date(&text(&d.format("%d/%m/%Y").to_string())), Ok(d));
            d += Duration::days(97);
        }
    }

    fn mapping_all() -> ColumnMapping {
        let mut m = ColumnMapping::new();
        for (i, f) in LogicalField::CANONICAL_ORDER.iter().enumerate() {
            m.set(*f, i);
        }
        m
    }

    fn row(no: usize, values: [&str; 15]) -> GridRow {
        GridRow {
            source_row_no: no,
            cells: values
                .iter()
                .map(|v| if v.is_empty() { CellValue::Empty } else { text(v) })
                .collect(),
        }
    }

    #[test]
    fn test_parse_rows_collects_reasons() {
        let good = [
            "1", "Cadre", "C01", "Analyste", "2025-08-28", "A1", "Roy, Luc", "Gains", "100",
            "Salaire", "0-101", "Admin", "1 000,00", "(50)", "",
        ];
        let mut bad_amount = good;
        bad_amount[12] = "mille";
        let mut missing_code = good;
        missing_code[8] = "";
        let mut other_date = good;
        other_date[4] = "29/08/2025";
        let blank = [""; 15];

        let grid = Grid {
            rows: vec![
                row(2, good),
                row(3, bad_amount),
                row(4, missing_code),
                row(5, other_date),
                row(6, blank),
            ],
            ..Default::default()
        };

        let parsed = parse_rows(&grid, &mapping_all(), ymd(2025, 8, 28));
        assert_eq!(parsed.accepted.len(), 2);
        assert_eq!(parsed.rejected.len(), 2);
        assert_eq!(parsed.total(), 4);

        let first = &parsed.accepted[0];
        assert_eq!(first.amount_cents, 100_000);
        assert_eq!(first.employer_cents, 5_000);
        assert_eq!(first.identity.nom.as_deref(), Some("Roy"));
        assert_eq!(first.raw[LogicalField::PayCode.staging_index()].as_deref(), Some("100"));

        assert_eq!(parsed.rejected[0].reasons, vec!["invalid_amount".to_string()]);
        assert_eq!(parsed.rejected[1].reasons, vec!["missing_required:pay_code".to_string()]);
        assert_eq!(parsed.warnings.get("date_mismatch"), Some(&1));
    }
}
