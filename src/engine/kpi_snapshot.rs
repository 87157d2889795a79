// ==========================================
// Paie - KPI snapshot service
// ==========================================
// compute: read-only, any connection
// recompute: compute + upsert, called inside the import transaction
// ==========================================

use crate::domain::kpi::{KpiCards, KpiDetails, KpiSnapshot, KpiSummary};
use crate::repository::{BreakdownDimension, KpiRepository, RepositoryResult};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use tracing::debug;

pub const TOP_N: usize = 10;
/// Lines below -1000.00 are flagged
pub const ANOMALY_THRESHOLD_CENTS: i64 = -100_000;
pub const MAX_ANOMALIES: usize = 20;

pub struct KpiSnapshotService;

impl KpiSnapshotService {
    pub fn compute(
        conn: &Connection,
        pay_date: NaiveDate,
        period_id: Option<&str>,
    ) -> RepositoryResult<KpiSnapshot> {
        let repo = KpiRepository::new(conn);
        let agg = repo.aggregates(pay_date)?;

        let net_moyen_cents = if agg.employees > 0 {
            agg.net_cents / agg.employees
        } else {
            0
        };

        Ok(KpiSnapshot {
            period: pay_date.format("%Y-%m-%d").to_string(),
            period_id: period_id.map(str::to_string),
            cards: KpiCards {
                masse_salariale_cents: agg.gains_cents,
                deductions_cents: agg.deductions_cents,
                salaire_net_cents: agg.net_cents,
                masse_employeur_cents: agg.employer_cents,
                net_moyen_cents,
                nb_employes: agg.employees,
                nb_transactions: agg.transactions,
            },
            codes_top: repo.breakdown(BreakdownDimension::PayCode, pay_date, Some(TOP_N))?,
            postes_top: repo.breakdown(BreakdownDimension::BudgetPost, pay_date, Some(TOP_N))?,
            anomalies: repo.anomalies(pay_date, ANOMALY_THRESHOLD_CENTS, MAX_ANOMALIES)?,
            calculated_at: Utc::now(),
            row_count: agg.transactions,
        })
    }

    pub fn recompute(
        conn: &Connection,
        pay_date: NaiveDate,
        period_id: Option<&str>,
    ) -> RepositoryResult<KpiSnapshot> {
        let snapshot = Self::compute(conn, pay_date, period_id)?;
        KpiRepository::new(conn).upsert_snapshot(&snapshot)?;
        debug!(%pay_date, rows = snapshot.row_count, "kpi snapshot stored");
        Ok(snapshot)
    }

    /// Stored snapshot, or an on-the-fly computation that is not written
    pub fn summary(conn: &Connection, pay_date: NaiveDate) -> RepositoryResult<KpiSummary> {
        if let Some(snapshot) = KpiRepository::new(conn).get_snapshot(pay_date)? {
            return Ok(KpiSummary {
                pay_date,
                cards: snapshot.cards,
                from_snapshot: true,
                calculated_at: snapshot.calculated_at,
            });
        }
        let computed = Self::compute(conn, pay_date, None)?;
        Ok(KpiSummary {
            pay_date,
            cards: computed.cards,
            from_snapshot: false,
            calculated_at: computed.calculated_at,
        })
    }

    /// Full breakdowns, not limited to the top N
    pub fn details(conn: &Connection, pay_date: NaiveDate) -> RepositoryResult<KpiDetails> {
        let repo = KpiRepository::new(conn);
        Ok(KpiDetails {
            pay_date,
            by_pay_code: repo.breakdown(BreakdownDimension::PayCode, pay_date, None)?,
            by_budget_post: repo.breakdown(BreakdownDimension::BudgetPost, pay_date, None)?,
            by_job_category: repo.breakdown(BreakdownDimension::JobCategory, pay_date, None)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::init_schema;
    use rusqlite::params;

    fn seeded() -> (Connection, NaiveDate) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        init_schema(&conn, false).unwrap();
        let pay_date = NaiveDate::from_ymd_opt(2025, 8, 28).unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO pay_period (period_id, pay_date, pay_day, pay_month, pay_year,
                                     period_seq_in_year, status, created_at)
             VALUES ('p1', ?1, 28, 8, 2025, 1, 'open', ?2)",
            params![pay_date, now],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO import_batch (batch_id, period_id, file_name, checksum, rows_count,
                                       status, created_at)
             VALUES ('b1', 'p1', 'paie.csv', 'abc', 3, 'processed', ?1)",
            params![now],
        )
        .unwrap();
        for (id, mat) in [("e1", "a1"), ("e2", "a2")] {
            conn.execute(
                "INSERT INTO employee (employee_id, matricule_raw, matricule_norm, nom_complet,
                                       statut, created_at, updated_at)
                 VALUES (?1, ?2, ?2, ?2, 'active', ?3, ?3)",
                params![id, mat, now],
            )
            .unwrap();
        }
        let lines = [
            ("t1", "e1", "100", 150_000i64, 12_000i64),
            ("t2", "e1", "510", -250_000, 0),
            ("t3", "e2", "100", 98_010, 7_540),
        ];
        for (i, (tid, emp, code, amount, employer)) in lines.iter().enumerate() {
            conn.execute(
                "INSERT INTO payroll_transaction (transaction_id, batch_id, employee_id, period_id,
                     pay_date, pay_code, amount_employee_cents, amount_employer_cents,
                     source_file, source_row_no, created_at)
                 VALUES (?1, 'b1', ?2, 'p1', ?3, ?4, ?5, ?6, 'paie.csv', ?7, ?8)",
                params![tid, emp, pay_date, code, amount, employer, i as i64 + 2, now],
            )
            .unwrap();
        }
        (conn, pay_date)
    }

    #[test]
    fn test_cards_and_anomalies() {
        let (conn, pay_date) = seeded();
        let snap = KpiSnapshotService::compute(&conn, pay_date, Some("p1")).unwrap();

        assert_eq!(snap.cards.masse_salariale_cents, 248_010);
        assert_eq!(snap.cards.deductions_cents, -250_000);
        assert_eq!(snap.cards.salaire_net_cents, -1_990);
        assert_eq!(snap.cards.masse_employeur_cents, 19_540);
        assert_eq!(snap.cards.nb_employes, 2);
        assert_eq!(snap.cards.net_moyen_cents, -995);
        assert_eq!(snap.anomalies.len(), 1);
        assert_eq!(snap.anomalies[0].pay_code, "510");
        assert_eq!(snap.codes_top[0].key, "510");
        assert_eq!(snap.codes_top[1].total_cents, 248_010);
    }

    #[test]
    fn test_summary_falls_back_without_writing() {
        let (conn, pay_date) = seeded();
        let live = KpiSnapshotService::summary(&conn, pay_date).unwrap();
        assert!(!live.from_snapshot);
        assert!(KpiRepository::new(&conn).get_snapshot(pay_date).unwrap().is_none());

        KpiSnapshotService::recompute(&conn, pay_date, Some("p1")).unwrap();
        let stored = KpiSnapshotService::summary(&conn, pay_date).unwrap();
        assert!(stored.from_snapshot);
        assert_eq!(stored.cards, live.cards);
    }
}
