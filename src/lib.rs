// ==========================================
// Paie - ingestion core library
// ==========================================
// Loads client payroll spreadsheets (XLSX/CSV) into the pay-period
// model: period registry, staging, employees, transactions, KPI.
// ==========================================

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "fr");

// ==========================================
// Modules
// ==========================================

// Domain layer - entities and types
pub mod domain;

// Repository layer - data access
pub mod repository;

// Engine layer - periods, deletion, KPI
pub mod engine;

// Import layer - files to rows
pub mod importer;

// Configuration layer
pub mod config;

// Database infrastructure (pool, PRAGMAs)
pub mod db;

// Logging
pub mod logging;

// Internationalization
pub mod i18n;

// API layer
pub mod api;

// Application layer - lifecycle
pub mod app;

// ==========================================
// Re-exports
// ==========================================

pub use domain::types::{BatchStatus, EmployeeStatus, LogicalField, PeriodStatus, SignCategory};

pub use domain::{
    Employee, ImportBatch, ImportEnvelope, ImportRequest, IngestionProfile, KpiSnapshot, PayPeriod,
    PayrollTransaction,
};

pub use engine::{DeletionEngine, KpiSnapshotService, PeriodCoordinator};

pub use importer::{IngestionEngine, PayrollImporter, ProgressSink};

pub use api::{ConfigApi, ImportApi, PeriodApi, QueryApi};

pub use app::AppState;

pub use db::DatabaseConfig;

// ==========================================
// Constants
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "Paie - ingestion";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(APP_NAME.starts_with("Paie"));
    }
}
