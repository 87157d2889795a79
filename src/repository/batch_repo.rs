// ==========================================
// Paie - import_batch repository
// ==========================================

use crate::domain::batch::ImportBatch;
use crate::domain::types::BatchStatus;
use crate::repository::error::RepositoryResult;
use crate::repository::store::query_all;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const BATCH_COLUMNS: &str = "batch_id, period_id, file_name, checksum, rows_count, status, \
     error_message, imported_by, created_at, completed_at";

pub struct BatchRepository<'c> {
    conn: &'c Connection,
}

impl<'c> BatchRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ImportBatch> {
        let status: String = row.get(5)?;
        Ok(ImportBatch {
            batch_id: row.get(0)?,
            period_id: row.get(1)?,
            file_name: row.get(2)?,
            checksum: row.get(3)?,
            rows_count: row.get(4)?,
            status: status.parse().unwrap_or(BatchStatus::Error),
            error_message: row.get(6)?,
            imported_by: row.get(7)?,
            created_at: row.get(8)?,
            completed_at: row.get(9)?,
        })
    }

    /// Fails with a unique violation when a non-error batch already holds
    /// (period_id, checksum)
    pub fn insert_pending(
        &self,
        batch_id: &str,
        period_id: &str,
        file_name: &str,
        checksum: &str,
        imported_by: &str,
    ) -> RepositoryResult<()> {
        self.conn.execute(
            "INSERT INTO import_batch (batch_id, period_id, file_name, checksum, rows_count,
                                       status, imported_by, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, 'pending', ?5, ?6)",
            params![batch_id, period_id, file_name, checksum, imported_by, Utc::now()],
        )?;
        Ok(())
    }

    pub fn mark_processed(&self, batch_id: &str, rows_count: usize) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "UPDATE import_batch SET status = 'processed', rows_count = ?2, completed_at = ?3
             WHERE batch_id = ?1 AND status = 'pending'",
            params![batch_id, rows_count as i64, Utc::now()],
        )?)
    }

    /// Post-mortem row written after the import transaction rolled back
    pub fn insert_error(
        &self,
        batch_id: &str,
        period_id: &str,
        file_name: &str,
        checksum: &str,
        imported_by: &str,
        error_message: &str,
    ) -> RepositoryResult<()> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO import_batch (batch_id, period_id, file_name, checksum, rows_count,
                                       status, error_message, imported_by, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, 0, 'error', ?5, ?6, ?7, ?7)",
            params![batch_id, period_id, file_name, checksum, error_message, imported_by, now],
        )?;
        Ok(())
    }

    pub fn find(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatch>> {
        let sql = format!("SELECT {} FROM import_batch WHERE batch_id = ?1", BATCH_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![batch_id], Self::map_row)
            .optional()?)
    }

    pub fn find_processed(&self, period_id: &str, checksum: &str) -> RepositoryResult<Option<ImportBatch>> {
        let sql = format!(
            "SELECT {} FROM import_batch
             WHERE period_id = ?1 AND checksum = ?2 AND status <> 'error'",
            BATCH_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![period_id, checksum], Self::map_row)
            .optional()?)
    }

    pub fn list_for_period(&self, period_id: &str) -> RepositoryResult<Vec<ImportBatch>> {
        let sql = format!(
            "SELECT {} FROM import_batch WHERE period_id = ?1 ORDER BY created_at",
            BATCH_COLUMNS
        );
        query_all(self.conn, &sql, params![period_id], Self::map_row)
    }

    pub fn count_for_period(&self, period_id: &str) -> RepositoryResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM import_batch WHERE period_id = ?1",
            params![period_id],
            |row| row.get(0),
        )?)
    }

    pub fn delete_for_period(&self, period_id: &str) -> RepositoryResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM import_batch WHERE period_id = ?1", params![period_id])?)
    }
}
