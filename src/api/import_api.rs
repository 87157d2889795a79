// ==========================================
// Paie - import API
// ==========================================
// Thin async facade over PayrollImporter: requests are validated here,
// everything else is reported in the envelope
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::import::{ImportEnvelope, ImportRequest};
use crate::importer::field_mapper::MappingPreview;
use crate::importer::payroll_importer_trait::PayrollImporter;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct ImportApi {
    importer: Arc<dyn PayrollImporter>,
}

impl ImportApi {
    pub fn new(importer: Arc<dyn PayrollImporter>) -> Self {
        Self { importer }
    }

    /// Runs the import; Err only for malformed requests
    pub async fn import_file(&self, request: ImportRequest) -> ApiResult<ImportEnvelope> {
        if request.user_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("user_id".to_string()));
        }
        if request.file_path.as_os_str().is_empty() {
            return Err(ApiError::InvalidInput("file_path".to_string()));
        }
        info!(file = %request.file_path.display(), pay_date = %request.pay_date, "import requested");
        Ok(self.importer.import_payroll_file(request).await)
    }

    pub async fn preview(&self, path: PathBuf, client_key: Option<String>) -> ApiResult<MappingPreview> {
        Ok(self.importer.preview_file(path, client_key).await?)
    }

    pub fn cancel(&self) {
        self.importer.cancel();
    }
}
