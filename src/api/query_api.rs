// ==========================================
// Paie - query API
// ==========================================
// Read side: KPIs, periods, employees, transaction table.
// Without a pay date, KPI calls use the latest period.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::kpi::{KpiDetails, KpiSummary};
use crate::domain::query::{EmployeeFilter, EmployeeRow, Page, TablePage, TransactionFilter};
use crate::engine::kpi_snapshot::KpiSnapshotService;
use crate::repository::{EmployeeRepository, PayrollStore, PeriodRepository, QueryRepository};
use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::info;

pub struct QueryApi {
    store: PayrollStore,
}

impl QueryApi {
    pub fn new(store: PayrollStore) -> Self {
        Self { store }
    }

    fn resolve_pay_date(conn: &Connection, pay_date: Option<NaiveDate>) -> ApiResult<NaiveDate> {
        if let Some(d) = pay_date {
            return Ok(d);
        }
        PeriodRepository::new(conn)
            .latest()?
            .map(|p| p.pay_date)
            .ok_or_else(|| ApiError::NotFound("pay_period latest".to_string()))
    }

    pub fn get_kpis(&self, pay_date: Option<NaiveDate>) -> ApiResult<KpiSummary> {
        let conn = self.store.acquire()?;
        let pay_date = Self::resolve_pay_date(&conn, pay_date)?;
        Ok(KpiSnapshotService::summary(&conn, pay_date)?)
    }

    pub fn get_kpi_details(&self, pay_date: Option<NaiveDate>) -> ApiResult<KpiDetails> {
        let conn = self.store.acquire()?;
        let pay_date = Self::resolve_pay_date(&conn, pay_date)?;
        Ok(KpiSnapshotService::details(&conn, pay_date)?)
    }

    /// `page` is 1-based, `page_size` is clamped to 1..=500
    pub fn list_employees(
        &self,
        period_id: Option<&str>,
        filter: &EmployeeFilter,
        page: usize,
        page_size: usize,
    ) -> ApiResult<Page<EmployeeRow>> {
        Ok(self
            .store
            .with_conn(|conn| QueryRepository::new(conn).list_employees(period_id, filter, page, page_size))?)
    }

    /// `limit` is clamped to 1..=1000
    pub fn get_table(&self, offset: usize, limit: usize, filter: &TransactionFilter) -> ApiResult<TablePage> {
        Ok(self
            .store
            .with_conn(|conn| QueryRepository::new(conn).get_table(offset, limit, filter))?)
    }

    /// Refused while transactions still reference the employee
    pub fn deactivate_employee(&self, employee_id: &str) -> ApiResult<()> {
        self.store
            .with_write_tx(|tx| EmployeeRepository::new(tx).deactivate(employee_id))?;
        info!(employee_id, "employee deactivated");
        Ok(())
    }
}
