// ==========================================
// Paie - KPI aggregates and snapshot cache
// ==========================================
// Aggregates are computed per pay_date (partition-friendly filter).
// kpi_snapshot.data holds the serialized KpiSnapshot.
// ==========================================

use crate::domain::kpi::{AnomalyRow, BreakdownRow, KpiSnapshot};
use crate::repository::error::RepositoryResult;
use crate::repository::store::query_all;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

/// Raw sums of one pay date, before derived figures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KpiAggregates {
    pub gains_cents: i64,
    pub deductions_cents: i64,
    pub net_cents: i64,
    pub employer_cents: i64,
    pub employees: i64,
    pub transactions: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakdownDimension {
    PayCode,
    BudgetPost,
    JobCategory,
}

impl BreakdownDimension {
    fn sql(&self) -> &'static str {
        match self {
            BreakdownDimension::PayCode => {
                "SELECT t.pay_code, d.label, SUM(t.amount_employee_cents) AS total,
                        COUNT(*), COUNT(DISTINCT t.employee_id)
                 FROM payroll_transaction t
                 LEFT JOIN pay_code_dim d ON d.pay_code = t.pay_code
                 WHERE t.pay_date = ?1
                 GROUP BY t.pay_code
                 ORDER BY ABS(total) DESC, t.pay_code
                 LIMIT ?2"
            }
            BreakdownDimension::BudgetPost => {
                "SELECT COALESCE(t.budget_post, ''), b.label, SUM(t.amount_employee_cents) AS total,
                        COUNT(*), COUNT(DISTINCT t.employee_id)
                 FROM payroll_transaction t
                 LEFT JOIN budget_post_dim b ON b.code = t.budget_post
                 WHERE t.pay_date = ?1
                 GROUP BY COALESCE(t.budget_post, '')
                 ORDER BY ABS(total) DESC, 1
                 LIMIT ?2"
            }
            BreakdownDimension::JobCategory => {
                "SELECT COALESCE(t.job_category, ''), NULL, SUM(t.amount_employee_cents) AS total,
                        COUNT(*), COUNT(DISTINCT t.employee_id)
                 FROM payroll_transaction t
                 WHERE t.pay_date = ?1
                 GROUP BY COALESCE(t.job_category, '')
                 ORDER BY ABS(total) DESC, 1
                 LIMIT ?2"
            }
        }
    }
}

pub struct KpiRepository<'c> {
    conn: &'c Connection,
}

impl<'c> KpiRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn aggregates(&self, pay_date: NaiveDate) -> RepositoryResult<KpiAggregates> {
        Ok(self.conn.query_row(
            "SELECT
                 COALESCE(SUM(CASE WHEN amount_employee_cents > 0 THEN amount_employee_cents END), 0),
                 COALESCE(SUM(CASE WHEN amount_employee_cents < 0 THEN amount_employee_cents END), 0),
                 COALESCE(SUM(amount_employee_cents), 0),
                 COALESCE(SUM(amount_employer_cents), 0),
                 COUNT(DISTINCT employee_id),
                 COUNT(*)
             FROM payroll_transaction
             WHERE pay_date = ?1",
            params![pay_date],
            |row| {
                Ok(KpiAggregates {
                    gains_cents: row.get(0)?,
                    deductions_cents: row.get(1)?,
                    net_cents: row.get(2)?,
                    employer_cents: row.get(3)?,
                    employees: row.get(4)?,
                    transactions: row.get(5)?,
                })
            },
        )?)
    }

    /// Ranked by |sum|; `limit` None returns every group
    pub fn breakdown(
        &self,
        dimension: BreakdownDimension,
        pay_date: NaiveDate,
        limit: Option<usize>,
    ) -> RepositoryResult<Vec<BreakdownRow>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        query_all(self.conn, dimension.sql(), params![pay_date, limit], |row| {
            Ok(BreakdownRow {
                key: row.get(0)?,
                label: row.get(1)?,
                total_cents: row.get(2)?,
                lines: row.get(3)?,
                employees: row.get(4)?,
            })
        })
    }

    /// Lines below `threshold_cents`, most negative first
    pub fn anomalies(
        &self,
        pay_date: NaiveDate,
        threshold_cents: i64,
        limit: usize,
    ) -> RepositoryResult<Vec<AnomalyRow>> {
        query_all(
            self.conn,
            "SELECT e.matricule_raw, e.nom_complet, t.pay_code, t.amount_employee_cents
             FROM payroll_transaction t
             JOIN employee e ON e.employee_id = t.employee_id
             WHERE t.pay_date = ?1 AND t.amount_employee_cents < ?2
             ORDER BY t.amount_employee_cents ASC, t.source_row_no
             LIMIT ?3",
            params![pay_date, threshold_cents, limit as i64],
            |row| {
                Ok(AnomalyRow {
                    matricule: row.get(0)?,
                    nom_complet: row.get(1)?,
                    pay_code: row.get(2)?,
                    amount_employee_cents: row.get(3)?,
                })
            },
        )
    }

    pub fn upsert_snapshot(&self, snapshot: &KpiSnapshot) -> RepositoryResult<()> {
        let data = serde_json::to_string(snapshot)?;
        self.conn.execute(
            "INSERT INTO kpi_snapshot (period, period_id, data, calculated_at, row_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(period) DO UPDATE SET
                 period_id = excluded.period_id,
                 data = excluded.data,
                 calculated_at = excluded.calculated_at,
                 row_count = excluded.row_count",
            params![
                snapshot.period,
                snapshot.period_id,
                data,
                snapshot.calculated_at,
                snapshot.row_count
            ],
        )?;
        Ok(())
    }

    pub fn get_snapshot(&self, pay_date: NaiveDate) -> RepositoryResult<Option<KpiSnapshot>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM kpi_snapshot WHERE period = ?1",
                params![pay_date.format("%Y-%m-%d").to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn delete_snapshot(&self, pay_date: NaiveDate) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM kpi_snapshot WHERE period = ?1",
            params![pay_date.format("%Y-%m-%d").to_string()],
        )?)
    }
}
