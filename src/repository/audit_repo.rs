// ==========================================
// Paie - deleted_period_audit repository
// ==========================================
// Insert and read only: the table is append-only
// ==========================================

use crate::domain::audit::DeletedPeriodAudit;
use crate::repository::error::RepositoryResult;
use crate::repository::store::query_all;
use rusqlite::{params, Connection, OptionalExtension, Row};

const AUDIT_COLUMNS: &str = "audit_id, period_id, pay_date, period_status, transactions_count, \
     employees_count, orphan_employees_count, batches_count, staging_rows_count, deleted_at, \
     deleted_by, notes";

pub struct AuditRepository<'c> {
    conn: &'c Connection,
}

impl<'c> AuditRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<DeletedPeriodAudit> {
        Ok(DeletedPeriodAudit {
            audit_id: row.get(0)?,
            period_id: row.get(1)?,
            pay_date: row.get(2)?,
            period_status: row.get(3)?,
            transactions_count: row.get(4)?,
            employees_count: row.get(5)?,
            orphan_employees_count: row.get(6)?,
            batches_count: row.get(7)?,
            staging_rows_count: row.get(8)?,
            deleted_at: row.get(9)?,
            deleted_by: row.get(10)?,
            notes: row.get(11)?,
        })
    }

    pub fn insert(&self, audit: &DeletedPeriodAudit) -> RepositoryResult<()> {
        let sql = format!(
            "INSERT INTO deleted_period_audit ({})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            AUDIT_COLUMNS
        );
        self.conn.execute(
            &sql,
            params![
                audit.audit_id,
                audit.period_id,
                audit.pay_date,
                audit.period_status,
                audit.transactions_count,
                audit.employees_count,
                audit.orphan_employees_count,
                audit.batches_count,
                audit.staging_rows_count,
                audit.deleted_at,
                audit.deleted_by,
                audit.notes
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, audit_id: &str) -> RepositoryResult<Option<DeletedPeriodAudit>> {
        let sql = format!(
            "SELECT {} FROM deleted_period_audit WHERE audit_id = ?1",
            AUDIT_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![audit_id], Self::map_row)
            .optional()?)
    }

    /// Most recent first
    pub fn list(&self) -> RepositoryResult<Vec<DeletedPeriodAudit>> {
        let sql = format!(
            "SELECT {} FROM deleted_period_audit ORDER BY deleted_at DESC",
            AUDIT_COLUMNS
        );
        query_all(self.conn, &sql, [], Self::map_row)
    }
}
