// ==========================================
// Paie - import settings reader trait
// ==========================================
// Read side only: the ingestion engine depends on this trait, not on
// ConfigManager, so tests can hand it fixed settings
// ==========================================

use crate::domain::types::SignCategory;
use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_SAMPLE_ROWS: usize = 200;
pub const DEFAULT_ACCEPT_THRESHOLD: f64 = 0.70;
pub const DEFAULT_WARN_THRESHOLD: f64 = 0.50;
pub const DEFAULT_CLIENT_KEY: &str = "default";

/// Typed view of the import-related config_kv entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSettings {
    pub max_file_size_bytes: u64,
    pub sample_rows: usize,
    pub accept_threshold: f64,
    pub warn_threshold: f64,
    pub chunk_size: usize,
    /// Worksheet to read; first sheet when None
    pub sheet_name: Option<String>,
    pub client_key: String,
    pub allow_past_partition: bool,
    /// Category of pay codes absent from sign_policy
    pub default_sign: SignCategory,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            warn_threshold: DEFAULT_WARN_THRESHOLD,
            chunk_size: crate::repository::store::DEFAULT_CHUNK_SIZE,
            sheet_name: None,
            client_key: DEFAULT_CLIENT_KEY.to_string(),
            allow_past_partition: false,
            default_sign: SignCategory::Neutral,
        }
    }
}

pub trait ImportConfigReader: Send + Sync {
    /// Settings with defaults filled in for absent or malformed keys
    fn ingest_settings(&self) -> RepositoryResult<IngestSettings>;
}

/// Fixed settings, no database
impl ImportConfigReader for IngestSettings {
    fn ingest_settings(&self) -> RepositoryResult<IngestSettings> {
        Ok(self.clone())
    }
}
