// ==========================================
// Paie - period coordinator
// ==========================================
// ensure_period is idempotent: concurrent callers for the same pay date
// get the same period_id. Creation runs under the per-year lock and an
// IMMEDIATE transaction so sequence renumbering never interleaves.
// ==========================================

use crate::domain::period::PayPeriod;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{PayrollStore, PeriodRepository, RepositoryError};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

pub const MAX_PERIODS_PER_YEAR: u32 = 53;

/// One mutex per pay year, shared by every writer of this process
#[derive(Debug, Default)]
pub struct YearLocks {
    locks: Mutex<HashMap<i32, Arc<Mutex<()>>>>,
}

impl YearLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, year: i32) -> ImportResult<Arc<Mutex<()>>> {
        let mut map = self
            .locks
            .lock()
            .map_err(|e| ImportError::LockFailed(format!("year lock table poisoned: {}", e)))?;
        Ok(map.entry(year).or_default().clone())
    }

    /// Runs `f` while holding the lock of `year`
    pub fn with_year<T>(&self, year: i32, f: impl FnOnce() -> ImportResult<T>) -> ImportResult<T> {
        let lock = self.lock_for(year)?;
        let _guard = lock
            .lock()
            .map_err(|e| ImportError::LockFailed(format!("year {} lock poisoned: {}", year, e)))?;
        f()
    }
}

#[derive(Clone)]
pub struct PeriodCoordinator {
    store: PayrollStore,
    locks: Arc<YearLocks>,
}

impl PeriodCoordinator {
    pub fn new(store: PayrollStore, locks: Arc<YearLocks>) -> Self {
        Self { store, locks }
    }

    pub fn locks(&self) -> &Arc<YearLocks> {
        &self.locks
    }

    /// Returns the period of `pay_date`, creating it (and renumbering the
    /// later periods of the year) when absent
    pub fn ensure_period(&self, pay_date: NaiveDate) -> ImportResult<PayPeriod> {
        if let Some(existing) = self
            .store
            .with_conn(|conn| PeriodRepository::new(conn).find_by_pay_date(pay_date))?
        {
            return Ok(existing);
        }

        let year = pay_date.year();
        self.locks.with_year(year, || {
            let period = self.store.with_write_tx(|tx| {
                let repo = PeriodRepository::new(tx);
                if let Some(existing) = repo.find_by_pay_date(pay_date)? {
                    return Ok(existing);
                }

                if repo.count_in_year(year)? >= MAX_PERIODS_PER_YEAR {
                    return Err(RepositoryError::BusinessRuleViolation(format!(
                        "sequence overflow: year {} already has {} periods",
                        year, MAX_PERIODS_PER_YEAR
                    )));
                }

                let seq = 1 + repo.count_earlier_in_year(year, pay_date)?;
                let shifted = repo.shift_later_up(year, pay_date)?;
                let period_id = Uuid::new_v4().to_string();
                repo.insert(&period_id, pay_date, seq)?;
                info!(%pay_date, seq, shifted, period_id = %period_id, "pay period created");
                repo.get(&period_id)
            });

            period.map_err(|e| match e {
                RepositoryError::BusinessRuleViolation(msg) if msg.starts_with("sequence overflow") => {
                    ImportError::SequenceOverflow { year }
                }
                other => other.into(),
            })
        })
    }

    pub fn get_period(&self, period_id: &str) -> ImportResult<PayPeriod> {
        Ok(self
            .store
            .with_conn(|conn| PeriodRepository::new(conn).get(period_id))?)
    }

    pub fn find_by_pay_date(&self, pay_date: NaiveDate) -> ImportResult<Option<PayPeriod>> {
        Ok(self
            .store
            .with_conn(|conn| PeriodRepository::new(conn).find_by_pay_date(pay_date))?)
    }

    pub fn close_period(&self, period_id: &str, closed_by: &str) -> ImportResult<PayPeriod> {
        let period = self.store.with_write_tx(|tx| {
            let repo = PeriodRepository::new(tx);
            repo.get(period_id)?;
            repo.set_closed(period_id, closed_by)?;
            repo.get(period_id)
        })?;
        info!(period_id, closed_by, "pay period closed");
        Ok(period)
    }

    pub fn reopen_period(&self, period_id: &str) -> ImportResult<PayPeriod> {
        let period = self.store.with_write_tx(|tx| {
            let repo = PeriodRepository::new(tx);
            repo.get(period_id)?;
            repo.set_open(period_id)?;
            repo.get(period_id)
        })?;
        debug!(period_id, "pay period reopened");
        Ok(period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionPool, DatabaseConfig};
    use crate::repository::init_schema;
    use tempfile::NamedTempFile;

    fn coordinator() -> (NamedTempFile, PeriodCoordinator) {
        let file = NamedTempFile::new().unwrap();
        let pool = ConnectionPool::open(DatabaseConfig::new(file.path().to_str().unwrap())).unwrap();
        let store = PayrollStore::new(Arc::new(pool));
        store.with_conn(|c| Ok(init_schema(c, false)?)).unwrap();
        (file, PeriodCoordinator::new(store, Arc::new(YearLocks::new())))
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_ensure_period_is_idempotent() {
        let (_f, c) = coordinator();
        let a = c.ensure_period(d(2025, 8, 28)).unwrap();
        let b = c.ensure_period(d(2025, 8, 28)).unwrap();
        assert_eq!(a.period_id, b.period_id);
        assert_eq!(a.period_seq_in_year, 1);
        assert_eq!((a.pay_day, a.pay_month, a.pay_year), (28, 8, 2025));
    }

    #[test]
    fn test_out_of_order_insert_renumbers_later_periods() {
        let (_f, c) = coordinator();
        let late = c.ensure_period(d(2025, 3, 1)).unwrap();
        let early = c.ensure_period(d(2025, 1, 15)).unwrap();
        let middle = c.ensure_period(d(2025, 2, 1)).unwrap();

        assert_eq!(early.period_seq_in_year, 1);
        assert_eq!(middle.period_seq_in_year, 2);
        assert_eq!(c.get_period(&late.period_id).unwrap().period_seq_in_year, 3);
    }

    #[test]
    fn test_54th_period_overflows() {
        let (_f, c) = coordinator();
        let start = d(2024, 1, 1);
        for i in 0..53 {
            c.ensure_period(start + chrono::Duration::days(i)).unwrap();
        }
        let err = c.ensure_period(d(2024, 12, 31)).unwrap_err();
        assert!(matches!(err, ImportError::SequenceOverflow { year: 2024 }));
    }

    #[test]
    fn test_close_and_reopen() {
        let (_f, c) = coordinator();
        let p = c.ensure_period(d(2025, 8, 28)).unwrap();
        let closed = c.close_period(&p.period_id, "admin").unwrap();
        assert!(closed.is_closed());
        assert_eq!(closed.closed_by.as_deref(), Some("admin"));
        assert!(!c.reopen_period(&p.period_id).unwrap().is_closed());

        assert!(matches!(
            c.close_period("missing", "admin"),
            Err(ImportError::PeriodNotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_creation_yields_one_period() {
        let (_f, c) = coordinator();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = c.clone();
                std::thread::spawn(move || c.ensure_period(d(2025, 6, 5)).unwrap().period_id)
            })
            .collect();
        let ids: std::collections::HashSet<String> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 1);
    }
}
