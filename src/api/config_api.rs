// ==========================================
// Paie - configuration API
// ==========================================
// config_kv entries and the pay-code sign policy
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader, IngestSettings};
use crate::domain::types::SignCategory;
use crate::repository::{PayrollStore, SignPolicyRepository};
use tracing::info;

pub struct ConfigApi {
    store: PayrollStore,
    config_manager: ConfigManager,
}

impl ConfigApi {
    pub fn new(store: PayrollStore, config_manager: ConfigManager) -> Self {
        Self { store, config_manager }
    }

    /// Effective settings, defaults filled in
    pub fn get_settings(&self) -> ApiResult<IngestSettings> {
        Ok(self.config_manager.ingest_settings()?)
    }

    pub fn get_config_value(&self, key: &str) -> ApiResult<Option<String>> {
        Ok(self.config_manager.get_config_value(key)?)
    }

    pub fn set_config_value(&self, key: &str, value: &str) -> ApiResult<()> {
        if key.trim().is_empty() {
            return Err(ApiError::InvalidInput("key".to_string()));
        }
        self.config_manager.set_config_value(key, value)?;
        info!(key, value, "config value updated");
        Ok(())
    }

    /// All global entries as a JSON object
    pub fn get_config_snapshot(&self) -> ApiResult<String> {
        Ok(self.config_manager.get_config_snapshot()?)
    }

    pub fn list_sign_policy(&self) -> ApiResult<Vec<(String, SignCategory)>> {
        Ok(self.store.with_conn(|conn| SignPolicyRepository::new(conn).list())?)
    }

    pub fn set_sign_policy(&self, pay_code: &str, category: SignCategory) -> ApiResult<()> {
        if pay_code.trim().is_empty() {
            return Err(ApiError::InvalidInput("pay_code".to_string()));
        }
        self.store
            .with_write_tx(|tx| SignPolicyRepository::new(tx).set(pay_code.trim(), category))?;
        info!(pay_code, category = ?category, "sign policy updated");
        Ok(())
    }
}
