// ==========================================
// Paie - payroll line models
// ==========================================
// StagingRow: 15-column text mirror of the source row
// PayrollTransaction: canonical line, amounts in cents
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of raw columns mirrored in staging
pub const STAGING_COLUMNS: usize = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingRow {
    pub file_id: String,
    pub source_row_no: i64,
    pub pay_date: NaiveDate,
    /// Raw values in canonical column order (see `LogicalField::CANONICAL_ORDER`)
    pub raw: [Option<String>; STAGING_COLUMNS],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayrollTransaction {
    pub transaction_id: String,
    pub batch_id: String,
    pub employee_id: String,
    pub period_id: String,
    pub pay_date: NaiveDate,
    pub pay_code: String,
    pub budget_post: Option<String>,
    pub pay_category: Option<String>,
    pub job_category: Option<String>,
    pub amount_employee_cents: i64,
    pub amount_employer_cents: i64,
    pub source_file: String,
    pub source_row_no: i64,
}

/// Row of `get_table`: transaction joined with employee and period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub transaction_id: String,
    pub pay_date: NaiveDate,
    pub period_status: String,
    pub matricule: String,
    pub nom_complet: String,
    pub pay_code: String,
    pub pay_code_label: Option<String>,
    pub pay_category: Option<String>,
    pub budget_post: Option<String>,
    pub job_category: Option<String>,
    pub amount_employee_cents: i64,
    pub amount_employer_cents: i64,
    pub source_file: String,
    pub source_row_no: i64,
}
