// ==========================================
// Paie - importer trait
// ==========================================
// Callers (api, CLI) depend on this trait; IngestionEngine is the
// only implementation
// ==========================================

use crate::domain::import::{ImportEnvelope, ImportRequest};
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::MappingPreview;
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait PayrollImporter: Send + Sync {
    /// Runs a full import on a blocking worker.
    ///
    /// User-level failures come back inside the envelope
    /// (`status = error`); this never returns Err.
    async fn import_payroll_file(&self, request: ImportRequest) -> ImportEnvelope;

    /// Reads the file and proposes a mapping without writing anything
    async fn preview_file(&self, path: PathBuf, client_key: Option<String>) -> ImportResult<MappingPreview>;

    /// Requests cancellation of the import in progress
    fn cancel(&self);
}
