// ==========================================
// Paie - data access layer
// ==========================================
// Repositories hold no business rules. They borrow a connection
// (plain or transaction) handed out by PayrollStore.
// All SQL is parameterized.
// ==========================================

pub mod audit_repo;
pub mod batch_repo;
pub mod dimension_repo;
pub mod employee_repo;
pub mod error;
pub mod kpi_repo;
pub mod period_repo;
pub mod profile_repo;
pub mod query_repo;
pub mod schema;
pub mod sign_policy_repo;
pub mod store;
pub mod transaction_repo;

pub use audit_repo::AuditRepository;
pub use batch_repo::BatchRepository;
pub use dimension_repo::{DimensionRepository, DimensionSet};
pub use employee_repo::{EmployeeRepository, UpsertOutcome};
pub use error::{RepositoryError, RepositoryResult};
pub use kpi_repo::{BreakdownDimension, KpiAggregates, KpiRepository};
pub use period_repo::PeriodRepository;
pub use profile_repo::ProfileRepository;
pub use query_repo::QueryRepository;
pub use schema::init_schema;
pub use sign_policy_repo::SignPolicyRepository;
pub use store::{bulk_insert, query_all, PayrollStore, DEFAULT_CHUNK_SIZE};
pub use transaction_repo::TransactionRepository;
