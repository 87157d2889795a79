// ==========================================
// Paie - period deletion / reconciliation
// ==========================================
// One IMMEDIATE transaction, in this order:
//   counts + orphan set -> audit -> transactions -> staging -> batches
//   -> orphan employees -> period (+ renumber year) -> KPI snapshot
// Employees still referenced by another period are kept.
// ==========================================

use crate::domain::audit::{DeletedPeriodAudit, DeletionCounts};
use crate::engine::period_coordinator::YearLocks;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::{
    AuditRepository, BatchRepository, EmployeeRepository, KpiRepository, PayrollStore,
    PeriodRepository, TransactionRepository,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Counts captured before anything is deleted
#[derive(Debug, Clone, Default)]
struct PreCounts {
    transactions: i64,
    staging_rows: i64,
    batches: i64,
    employees: i64,
    orphans: Vec<String>,
}

#[derive(Clone)]
pub struct DeletionEngine {
    store: PayrollStore,
    locks: Arc<YearLocks>,
}

impl DeletionEngine {
    pub fn new(store: PayrollStore, locks: Arc<YearLocks>) -> Self {
        Self { store, locks }
    }

    pub fn delete_period(
        &self,
        period_id: &str,
        deleted_by: &str,
        notes: Option<&str>,
    ) -> ImportResult<DeletionCounts> {
        let period = self
            .store
            .with_conn(|conn| PeriodRepository::new(conn).get(period_id))?;
        let year = period.pay_year;

        let mut captured = PreCounts::default();
        let result = self.locks.with_year(year, || {
            Ok(self.store.with_write_tx(|tx| {
                let periods = PeriodRepository::new(tx);
                let employees = EmployeeRepository::new(tx);
                let transactions = TransactionRepository::new(tx);
                let batches = BatchRepository::new(tx);

                // status may have changed since the lookup above
                let period = periods.get(period_id)?;

                captured = PreCounts {
                    transactions: transactions.count_for_period(period_id)?,
                    staging_rows: transactions.count_staging_for_pay_date(period.pay_date)?,
                    batches: batches.count_for_period(period_id)?,
                    employees: employees.count_for_period(period_id)?,
                    orphans: employees.orphan_ids_for_period(period_id)?,
                };

                let audit = DeletedPeriodAudit {
                    audit_id: Uuid::new_v4().to_string(),
                    period_id: period.period_id.clone(),
                    pay_date: period.pay_date,
                    period_status: period.status.as_str().to_string(),
                    transactions_count: captured.transactions,
                    employees_count: captured.employees,
                    orphan_employees_count: captured.orphans.len() as i64,
                    batches_count: captured.batches,
                    staging_rows_count: captured.staging_rows,
                    deleted_at: Utc::now(),
                    deleted_by: deleted_by.to_string(),
                    notes: notes.map(str::to_string),
                };
                AuditRepository::new(tx).insert(&audit)?;

                let transactions_deleted = transactions.delete_for_period(period_id)?;
                let staging_deleted = transactions.delete_staging_for_pay_date(period.pay_date)?;
                let batches_deleted = batches.delete_for_period(period_id)?;
                let employees_deleted = employees.delete_ids(&captured.orphans)?;

                periods.delete(period_id)?;
                let renumbered = periods.shift_later_down(period.pay_year, period.pay_date)?;
                KpiRepository::new(tx).delete_snapshot(period.pay_date)?;

                info!(
                    period_id,
                    pay_date = %period.pay_date,
                    transactions_deleted,
                    staging_deleted,
                    batches_deleted,
                    employees_deleted,
                    renumbered,
                    audit_id = %audit.audit_id,
                    "pay period deleted"
                );

                Ok(DeletionCounts {
                    audit_id: audit.audit_id,
                    transactions_deleted: transactions_deleted as i64,
                    staging_rows_deleted: staging_deleted as i64,
                    batches_deleted: batches_deleted as i64,
                    employees_deleted: employees_deleted as i64,
                    employees_preserved: captured.employees - employees_deleted as i64,
                })
            })?)
        });

        if let Err(e) = &result {
            error!(
                period_id,
                deleted_by,
                error = %e,
                transactions = captured.transactions,
                staging_rows = captured.staging_rows,
                batches = captured.batches,
                employees = captured.employees,
                orphans = captured.orphans.len(),
                "period deletion rolled back"
            );
        }
        result
    }

    /// Deletes the period of `pay_date`
    pub fn delete_pay_date(
        &self,
        pay_date: chrono::NaiveDate,
        deleted_by: &str,
        notes: Option<&str>,
    ) -> ImportResult<DeletionCounts> {
        let period = self
            .store
            .with_conn(|conn| PeriodRepository::new(conn).find_by_pay_date(pay_date))?
            .ok_or_else(|| ImportError::PeriodNotFound(pay_date.to_string()))?;
        self.delete_period(&period.period_id, deleted_by, notes)
    }
}
