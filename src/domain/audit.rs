// ==========================================
// Paie - period deletion audit
// ==========================================
// deleted_period_audit is append-only (triggers reject UPDATE/DELETE)
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedPeriodAudit {
    pub audit_id: String,
    pub period_id: String,
    pub pay_date: NaiveDate,
    pub period_status: String,
    pub transactions_count: i64,
    pub employees_count: i64,
    pub orphan_employees_count: i64,
    pub batches_count: i64,
    pub staging_rows_count: i64,
    pub deleted_at: DateTime<Utc>,
    pub deleted_by: String,
    pub notes: Option<String>,
}

/// What `delete_period` removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionCounts {
    pub audit_id: String,
    pub transactions_deleted: i64,
    pub staging_rows_deleted: i64,
    pub batches_deleted: i64,
    pub employees_deleted: i64,
    pub employees_preserved: i64,
}
