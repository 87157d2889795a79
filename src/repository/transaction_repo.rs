// ==========================================
// Paie - staging and transaction loaders
// ==========================================
// staging_row: raw text mirror, no employee foreign key
// payroll_transaction: canonical lines, guarded by triggers
// (closed period, pay_date = period pay_date, partition exists)
// ==========================================

use crate::domain::transaction::{PayrollTransaction, StagingRow};
use crate::repository::error::RepositoryResult;
use crate::repository::store::bulk_insert;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};

const INSERT_STAGING_SQL: &str = r#"
INSERT INTO staging_row (
    file_id, source_row_no, pay_date,
    line_number, job_category, job_code, job_title, pay_date_raw, matricule,
    employee_name, pay_category, pay_code, pay_code_label, budget_post,
    budget_post_label, amount, employer_share, combined_amount, created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
"#;

const INSERT_TRANSACTION_SQL: &str = r#"
INSERT INTO payroll_transaction (
    transaction_id, batch_id, employee_id, period_id, pay_date, pay_code,
    budget_post, pay_category, job_category, amount_employee_cents,
    amount_employer_cents, source_file, source_row_no, created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
"#;

pub struct TransactionRepository<'c> {
    conn: &'c Connection,
}

impl<'c> TransactionRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn insert_staging<C>(&self, rows: &[StagingRow], chunk_size: usize, on_chunk: C) -> RepositoryResult<usize>
    where
        C: FnMut(usize) -> RepositoryResult<()>,
    {
        let now = Utc::now();
        bulk_insert(
            self.conn,
            INSERT_STAGING_SQL,
            rows,
            chunk_size,
            |stmt, row| {
                let r = &row.raw;
                stmt.execute(params![
                    row.file_id,
                    row.source_row_no,
                    row.pay_date,
                    r[0], r[1], r[2], r[3], r[4], r[5], r[6], r[7],
                    r[8], r[9], r[10], r[11], r[12], r[13], r[14],
                    now
                ])
            },
            on_chunk,
        )
    }

    pub fn insert_transactions<C>(
        &self,
        rows: &[PayrollTransaction],
        chunk_size: usize,
        on_chunk: C,
    ) -> RepositoryResult<usize>
    where
        C: FnMut(usize) -> RepositoryResult<()>,
    {
        let now = Utc::now();
        bulk_insert(
            self.conn,
            INSERT_TRANSACTION_SQL,
            rows,
            chunk_size,
            |stmt, t| {
                stmt.execute(params![
                    t.transaction_id,
                    t.batch_id,
                    t.employee_id,
                    t.period_id,
                    t.pay_date,
                    t.pay_code,
                    t.budget_post,
                    t.pay_category,
                    t.job_category,
                    t.amount_employee_cents,
                    t.amount_employer_cents,
                    t.source_file,
                    t.source_row_no,
                    now
                ])
            },
            on_chunk,
        )
    }

    pub fn count_for_period(&self, period_id: &str) -> RepositoryResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM payroll_transaction WHERE period_id = ?1",
            params![period_id],
            |row| row.get(0),
        )?)
    }

    pub fn count_for_batch(&self, batch_id: &str) -> RepositoryResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM payroll_transaction WHERE batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?)
    }

    pub fn count_staging_for_pay_date(&self, pay_date: NaiveDate) -> RepositoryResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM staging_row WHERE pay_date = ?1",
            params![pay_date],
            |row| row.get(0),
        )?)
    }

    pub fn delete_for_period(&self, period_id: &str) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM payroll_transaction WHERE period_id = ?1",
            params![period_id],
        )?)
    }

    pub fn delete_staging_for_pay_date(&self, pay_date: NaiveDate) -> RepositoryResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM staging_row WHERE pay_date = ?1", params![pay_date])?)
    }
}
