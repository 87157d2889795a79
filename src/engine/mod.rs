// ==========================================
// Paie - engine layer
// ==========================================
// Business rules over the repositories: period lifecycle, deletion
// cascade, KPI snapshots. The import pipeline lives in importer/.
// ==========================================

pub mod deletion;
pub mod kpi_snapshot;
pub mod period_coordinator;

pub use deletion::DeletionEngine;
pub use kpi_snapshot::KpiSnapshotService;
pub use period_coordinator::{PeriodCoordinator, YearLocks, MAX_PERIODS_PER_YEAR};
