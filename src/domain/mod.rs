// ==========================================
// Paie - domain layer
// ==========================================
// Entities and value types only: no SQL, no file access
// ==========================================

pub mod audit;
pub mod batch;
pub mod employee;
pub mod import;
pub mod kpi;
pub mod period;
pub mod profile;
pub mod query;
pub mod transaction;
pub mod types;

pub use audit::{DeletedPeriodAudit, DeletionCounts};
pub use batch::ImportBatch;
pub use employee::{normalize_matricule, split_full_name, Employee, EmployeeIdentity};
pub use import::{
    EnvelopeStatus, ImportEnvelope, ImportRequest, RejectedRow, RejectedRowsSummary,
};
pub use kpi::{AnomalyRow, BreakdownRow, KpiCards, KpiDetails, KpiSnapshot, KpiSummary};
pub use period::{PayPeriod, PeriodSummary};
pub use profile::{ColumnMapping, IngestionProfile};
pub use query::{EmployeeFilter, EmployeeRow, Page, TablePage, TransactionFilter};
pub use transaction::{PayrollTransaction, StagingRow, TransactionView, STAGING_COLUMNS};
pub use types::{BatchStatus, EmployeeStatus, LogicalField, PeriodStatus, SignCategory};
