// ==========================================
// Paie - pay_period repository
// ==========================================
// Borrows a connection so the same calls run inside the coordinator's
// transaction or the deletion transaction
// ==========================================

use crate::domain::period::{date_components, PayPeriod, PeriodSummary};
use crate::domain::types::PeriodStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::query_all;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PERIOD_COLUMNS: &str = "period_id, pay_date, pay_day, pay_month, pay_year, \
     period_seq_in_year, status, closed_at, closed_by, created_at";

pub struct PeriodRepository<'c> {
    conn: &'c Connection,
}

impl<'c> PeriodRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<PayPeriod> {
        let status: String = row.get(6)?;
        Ok(PayPeriod {
            period_id: row.get(0)?,
            pay_date: row.get(1)?,
            pay_day: row.get(2)?,
            pay_month: row.get(3)?,
            pay_year: row.get(4)?,
            period_seq_in_year: row.get(5)?,
            status: status.parse().unwrap_or(PeriodStatus::Open),
            closed_at: row.get::<_, Option<DateTime<Utc>>>(7)?,
            closed_by: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    pub fn find_by_pay_date(&self, pay_date: NaiveDate) -> RepositoryResult<Option<PayPeriod>> {
        let sql = format!("SELECT {} FROM pay_period WHERE pay_date = ?1", PERIOD_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![pay_date], Self::map_row)
            .optional()?)
    }

    pub fn find(&self, period_id: &str) -> RepositoryResult<Option<PayPeriod>> {
        let sql = format!("SELECT {} FROM pay_period WHERE period_id = ?1", PERIOD_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![period_id], Self::map_row)
            .optional()?)
    }

    pub fn get(&self, period_id: &str) -> RepositoryResult<PayPeriod> {
        self.find(period_id)?
            .ok_or_else(|| RepositoryError::not_found("pay_period", period_id))
    }

    pub fn latest(&self) -> RepositoryResult<Option<PayPeriod>> {
        let sql = format!(
            "SELECT {} FROM pay_period ORDER BY pay_date DESC LIMIT 1",
            PERIOD_COLUMNS
        );
        Ok(self.conn.query_row(&sql, [], Self::map_row).optional()?)
    }

    /// Periods of `pay_year` strictly before `pay_date`
    pub fn count_earlier_in_year(&self, pay_year: i32, pay_date: NaiveDate) -> RepositoryResult<u32> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM pay_period WHERE pay_year = ?1 AND pay_date < ?2",
            params![pay_year, pay_date],
            |row| row.get(0),
        )?)
    }

    pub fn count_in_year(&self, pay_year: i32) -> RepositoryResult<u32> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM pay_period WHERE pay_year = ?1",
            params![pay_year],
            |row| row.get(0),
        )?)
    }

    /// Moves every period of the year after `pay_date` one slot up.
    /// Highest sequence first so (pay_year, seq) never collides.
    pub fn shift_later_up(&self, pay_year: i32, pay_date: NaiveDate) -> RepositoryResult<usize> {
        let later: Vec<(String, u32)> = query_all(
            self.conn,
            "SELECT period_id, period_seq_in_year FROM pay_period
             WHERE pay_year = ?1 AND pay_date > ?2
             ORDER BY period_seq_in_year DESC",
            params![pay_year, pay_date],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = self
            .conn
            .prepare_cached("UPDATE pay_period SET period_seq_in_year = ?1 WHERE period_id = ?2")?;
        for (period_id, seq) in &later {
            stmt.execute(params![seq + 1, period_id])?;
        }
        Ok(later.len())
    }

    /// Closes the gap left by a deleted period (lowest sequence first)
    pub fn shift_later_down(&self, pay_year: i32, pay_date: NaiveDate) -> RepositoryResult<usize> {
        let later: Vec<(String, u32)> = query_all(
            self.conn,
            "SELECT period_id, period_seq_in_year FROM pay_period
             WHERE pay_year = ?1 AND pay_date > ?2
             ORDER BY period_seq_in_year ASC",
            params![pay_year, pay_date],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = self
            .conn
            .prepare_cached("UPDATE pay_period SET period_seq_in_year = ?1 WHERE period_id = ?2")?;
        for (period_id, seq) in &later {
            stmt.execute(params![seq - 1, period_id])?;
        }
        Ok(later.len())
    }

    pub fn insert(&self, period_id: &str, pay_date: NaiveDate, seq: u32) -> RepositoryResult<()> {
        let (day, month, year) = date_components(pay_date);
        self.conn.execute(
            "INSERT INTO pay_period (period_id, pay_date, pay_day, pay_month, pay_year,
                                     period_seq_in_year, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', ?7)",
            params![period_id, pay_date, day, month, year, seq, Utc::now()],
        )?;
        Ok(())
    }

    pub fn set_closed(&self, period_id: &str, closed_by: &str) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "UPDATE pay_period SET status = 'closed', closed_at = ?2, closed_by = ?3
             WHERE period_id = ?1",
            params![period_id, Utc::now(), closed_by],
        )?)
    }

    pub fn set_open(&self, period_id: &str) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "UPDATE pay_period SET status = 'open', closed_at = NULL, closed_by = NULL
             WHERE period_id = ?1",
            params![period_id],
        )?)
    }

    pub fn delete(&self, period_id: &str) -> RepositoryResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM pay_period WHERE period_id = ?1", params![period_id])?)
    }

    /// Most recent first
    pub fn list_summaries(&self) -> RepositoryResult<Vec<PeriodSummary>> {
        query_all(
            self.conn,
            "SELECT p.period_id, p.pay_date, p.status, p.period_seq_in_year,
                    (SELECT COUNT(*) FROM payroll_transaction t WHERE t.period_id = p.period_id)
             FROM pay_period p
             ORDER BY p.pay_date DESC",
            [],
            |row| {
                let status: String = row.get(2)?;
                Ok(PeriodSummary {
                    period_id: row.get(0)?,
                    pay_date: row.get(1)?,
                    status: status.parse().unwrap_or(PeriodStatus::Open),
                    period_seq_in_year: row.get(3)?,
                    transaction_count: row.get(4)?,
                })
            },
        )
    }

    /// Sequences of a year ordered by pay date
    pub fn sequences_in_year(&self, pay_year: i32) -> RepositoryResult<Vec<u32>> {
        query_all(
            self.conn,
            "SELECT period_seq_in_year FROM pay_period WHERE pay_year = ?1 ORDER BY pay_date",
            params![pay_year],
            |row| row.get(0),
        )
    }
}
