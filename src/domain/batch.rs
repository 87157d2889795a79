// ==========================================
// Paie - import batch model
// ==========================================
// One row per ingestion attempt of a file for a period.
// (period_id, checksum) is unique among non-error batches
// ==========================================

use crate::domain::types::BatchStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,
    pub period_id: String,
    pub file_name: String,
    pub checksum: String,
    pub rows_count: i64,
    pub status: BatchStatus,
    pub error_message: Option<String>,
    pub imported_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
