// ==========================================
// Paie - period API
// ==========================================
// list / ensure / close / reopen / delete (with audit)
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::audit::{DeletedPeriodAudit, DeletionCounts};
use crate::domain::period::{PayPeriod, PeriodSummary};
use crate::engine::deletion::DeletionEngine;
use crate::engine::period_coordinator::PeriodCoordinator;
use crate::repository::{AuditRepository, PayrollStore, PeriodRepository};
use chrono::NaiveDate;
use tracing::info;

pub struct PeriodApi {
    store: PayrollStore,
    coordinator: PeriodCoordinator,
    deletion: DeletionEngine,
}

impl PeriodApi {
    pub fn new(store: PayrollStore, coordinator: PeriodCoordinator, deletion: DeletionEngine) -> Self {
        Self {
            store,
            coordinator,
            deletion,
        }
    }

    /// Most recent first
    pub fn list_periods(&self) -> ApiResult<Vec<PeriodSummary>> {
        Ok(self
            .store
            .with_conn(|conn| PeriodRepository::new(conn).list_summaries())?)
    }

    pub fn get_period(&self, period_id: &str) -> ApiResult<PayPeriod> {
        Ok(self.coordinator.get_period(period_id)?)
    }

    pub fn find_by_pay_date(&self, pay_date: NaiveDate) -> ApiResult<Option<PayPeriod>> {
        Ok(self.coordinator.find_by_pay_date(pay_date)?)
    }

    pub fn ensure_period(&self, pay_date: NaiveDate) -> ApiResult<PayPeriod> {
        Ok(self.coordinator.ensure_period(pay_date)?)
    }

    pub fn close_period(&self, period_id: &str, closed_by: &str) -> ApiResult<PayPeriod> {
        require("closed_by", closed_by)?;
        Ok(self.coordinator.close_period(period_id, closed_by)?)
    }

    pub fn reopen_period(&self, period_id: &str) -> ApiResult<PayPeriod> {
        Ok(self.coordinator.reopen_period(period_id)?)
    }

    pub fn delete_period(&self, period_id: &str, deleted_by: &str, notes: Option<&str>) -> ApiResult<DeletionCounts> {
        require("deleted_by", deleted_by)?;
        let counts = self.deletion.delete_period(period_id, deleted_by, notes)?;
        info!(period_id, audit_id = %counts.audit_id, "period deletion committed");
        Ok(counts)
    }

    pub fn delete_pay_date(&self, pay_date: NaiveDate, deleted_by: &str, notes: Option<&str>) -> ApiResult<DeletionCounts> {
        require("deleted_by", deleted_by)?;
        Ok(self.deletion.delete_pay_date(pay_date, deleted_by, notes)?)
    }

    pub fn list_deletion_audits(&self) -> ApiResult<Vec<DeletedPeriodAudit>> {
        Ok(self.store.with_conn(|conn| AuditRepository::new(conn).list())?)
    }
}

fn require(name: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        Err(ApiError::InvalidInput(name.to_string()))
    } else {
        Ok(())
    }
}
