// ==========================================
// Test helpers
// ==========================================
// Temporary databases, payroll CSV builder, committed fixtures
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use payroll_ingest::config::config_keys;
use payroll_ingest::db::DatabaseConfig;
use payroll_ingest::domain::LogicalField;
use payroll_ingest::AppState;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Application state on a fresh temporary database
///
/// The NamedTempFile must outlive the state.
pub fn create_test_state() -> (NamedTempFile, AppState) {
    let db = NamedTempFile::new().expect("temp db");
    let state = AppState::new(DatabaseConfig::new(db.path().to_str().expect("utf-8 path")))
        .expect("app state");
    (db, state)
}

/// Same as create_test_state with a small chunk size, so loads run
/// through several chunks
pub fn create_chunked_state(chunk_size: usize) -> (NamedTempFile, AppState) {
    let (db, state) = create_test_state();
    state
        .config_manager
        .set_config_value(config_keys::CHUNK_SIZE, &chunk_size.to_string())
        .expect("chunk size");
    (db, state)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// COUNT(*)-style scalar query
pub fn scalar(state: &AppState, sql: &str) -> i64 {
    state
        .store
        .query(sql, [], |r| r.get::<_, Option<i64>>(0))
        .expect("scalar query")
        .first()
        .copied()
        .flatten()
        .unwrap_or(0)
}

// ==========================================
// CSV builder
// ==========================================

#[derive(Debug, Clone)]
pub struct PayLine {
    pub matricule: String,
    pub name: String,
    pub pay_code: String,
    pub amount: String,
    pub pay_date: String,
    pub budget_post: String,
}

impl PayLine {
    pub fn new(matricule: &str, name: &str, pay_code: &str, amount: &str) -> Self {
        Self {
            matricule: matricule.to_string(),
            name: name.to_string(),
            pay_code: pay_code.to_string(),
            amount: amount.to_string(),
            pay_date: String::new(),
            budget_post: "P-100".to_string(),
        }
    }

    pub fn on(mut self, pay_date: &str) -> Self {
        self.pay_date = pay_date.to_string();
        self
    }

    pub fn post(mut self, budget_post: &str) -> Self {
        self.budget_post = budget_post.to_string();
        self
    }
}

/// Writes a ';'-separated payroll export with the 15 standard headers
pub struct PayrollCsv {
    lines: Vec<PayLine>,
    default_date: String,
}

impl PayrollCsv {
    pub fn new(default_date: &str) -> Self {
        Self {
            lines: Vec::new(),
            default_date: default_date.to_string(),
        }
    }

    pub fn line(mut self, line: PayLine) -> Self {
        self.lines.push(line);
        self
    }

    /// `n` distinct employees with one pay line each
    pub fn employees(mut self, n: usize, amount: &str) -> Self {
        for i in 0..n {
            self.lines.push(PayLine::new(
                &format!("E{:04}", i),
                &format!("Employe{}, Test", i),
                "100",
                amount,
            ));
        }
        self
    }

    pub fn write(&self) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("temp csv");
        let header = LogicalField::CANONICAL_ORDER
            .iter()
            .map(|f| f.label_fr())
            .collect::<Vec<_>>()
            .join(";");
        writeln!(file, "{}", header).expect("write header");
        for (i, l) in self.lines.iter().enumerate() {
            let pay_date = if l.pay_date.is_empty() { &self.default_date } else { &l.pay_date };
            writeln!(
                file,
                "{};Cadres;C01;Analyste;{};{};{};Gains;{};Salaire;{};Administration;{};0;",
                i + 1,
                pay_date,
                l.matricule,
                l.name,
                l.pay_code,
                l.budget_post,
                l.amount
            )
            .expect("write line");
        }
        file.flush().expect("flush csv");
        file
    }
}
