// ==========================================
// Paie - configuration manager
// ==========================================
// Storage: config_kv (scope_id, key) -> value, scope 'global'
// Absent or malformed values fall back to the IngestSettings defaults
// ==========================================

use crate::config::import_config_trait::{ImportConfigReader, IngestSettings};
use crate::domain::types::SignCategory;
use crate::repository::error::RepositoryResult;
use crate::repository::store::PayrollStore;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

pub const GLOBAL_SCOPE: &str = "global";

// ==========================================
// Config keys
// ==========================================
pub mod config_keys {
    // file reader
    pub const MAX_FILE_SIZE_BYTES: &str = "max_file_size_bytes";
    pub const SHEET_NAME: &str = "sheet_name";

    // mapper
    pub const SAMPLE_ROWS: &str = "sample_rows";
    pub const ACCEPT_THRESHOLD: &str = "accept_threshold";
    pub const WARN_THRESHOLD: &str = "warn_threshold";
    pub const CLIENT_KEY: &str = "client_key";

    // loader
    pub const CHUNK_SIZE: &str = "chunk_size";
    pub const ALLOW_PAST_PARTITION: &str = "allow_past_partition";

    // sign policy
    pub const SIGN_POLICY_DEFAULT: &str = "sign_policy.default";
}

// ==========================================
// ConfigManager
// ==========================================
#[derive(Clone)]
pub struct ConfigManager {
    store: PayrollStore,
}

impl ConfigManager {
    pub fn new(store: PayrollStore) -> Self {
        Self { store }
    }

    /// Global value of `key`, None when unset
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        self.store.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                    params![GLOBAL_SCOPE, key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })
    }

    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        self.store.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value,
                                                      updated_at = excluded.updated_at",
            params![GLOBAL_SCOPE, key, value, Utc::now()],
        )?;
        Ok(())
    }

    /// All global entries as a JSON object
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let pairs: Vec<(String, String)> = self.store.query(
            "SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key",
            params![GLOBAL_SCOPE],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let map: BTreeMap<String, String> = pairs.into_iter().collect();
        Ok(serde_json::to_string(&json!(map))?)
    }

    fn parsed_or<T: FromStr>(&self, key: &str, default: T) -> RepositoryResult<T> {
        match self.get_config_value(key)? {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warn!(key, value = %raw, "malformed config value, using default");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }
}

impl ImportConfigReader for ConfigManager {
    fn ingest_settings(&self) -> RepositoryResult<IngestSettings> {
        let defaults = IngestSettings::default();

        let mut accept_threshold =
            self.parsed_or(config_keys::ACCEPT_THRESHOLD, defaults.accept_threshold)?;
        let mut warn_threshold = self.parsed_or(config_keys::WARN_THRESHOLD, defaults.warn_threshold)?;
        if !(0.0..=1.0).contains(&accept_threshold)
            || !(0.0..=1.0).contains(&warn_threshold)
            || warn_threshold > accept_threshold
        {
            warn!(accept_threshold, warn_threshold, "inconsistent thresholds, using defaults");
            accept_threshold = defaults.accept_threshold;
            warn_threshold = defaults.warn_threshold;
        }

        let sheet_name = self
            .get_config_value(config_keys::SHEET_NAME)?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let client_key = self
            .get_config_value(config_keys::CLIENT_KEY)?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.client_key);

        Ok(IngestSettings {
            max_file_size_bytes: self
                .parsed_or(config_keys::MAX_FILE_SIZE_BYTES, defaults.max_file_size_bytes)?
                .max(1),
            sample_rows: self.parsed_or(config_keys::SAMPLE_ROWS, defaults.sample_rows)?.max(1),
            accept_threshold,
            warn_threshold,
            chunk_size: self.parsed_or(config_keys::CHUNK_SIZE, defaults.chunk_size)?.max(1),
            sheet_name,
            client_key,
            allow_past_partition: self
                .parsed_or(config_keys::ALLOW_PAST_PARTITION, defaults.allow_past_partition)?,
            default_sign: self.parsed_or::<SignCategory>(config_keys::SIGN_POLICY_DEFAULT, defaults.default_sign)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionPool, DatabaseConfig};
    use crate::repository::schema::init_schema;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn manager() -> (NamedTempFile, ConfigManager) {
        let file = NamedTempFile::new().unwrap();
        let pool = ConnectionPool::open(DatabaseConfig::new(file.path().to_str().unwrap())).unwrap();
        let store = PayrollStore::new(Arc::new(pool));
        store.with_conn(|conn| Ok(init_schema(conn, false)?)).unwrap();
        (file, ConfigManager::new(store))
    }

    #[test]
    fn test_defaults_when_table_empty() {
        let (_f, config) = manager();
        assert_eq!(config.ingest_settings().unwrap(), IngestSettings::default());
    }

    #[test]
    fn test_overrides_are_read() {
        let (_f, config) = manager();
        config.set_config_value(config_keys::CHUNK_SIZE, "250").unwrap();
        config.set_config_value(config_keys::SIGN_POLICY_DEFAULT, "gain").unwrap();
        config.set_config_value(config_keys::SHEET_NAME, "Paie").unwrap();

        let settings = config.ingest_settings().unwrap();
        assert_eq!(settings.chunk_size, 250);
        assert_eq!(settings.default_sign, SignCategory::Gain);
        assert_eq!(settings.sheet_name.as_deref(), Some("Paie"));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let (_f, config) = manager();
        config.set_config_value(config_keys::SAMPLE_ROWS, "beaucoup").unwrap();
        config.set_config_value(config_keys::ACCEPT_THRESHOLD, "0.4").unwrap();

        let settings = config.ingest_settings().unwrap();
        assert_eq!(settings.sample_rows, 200);
        // accept below warn is rejected as a pair
        assert_eq!(settings.accept_threshold, 0.70);
        assert_eq!(settings.warn_threshold, 0.50);
    }

    #[test]
    fn test_snapshot_lists_entries() {
        let (_f, config) = manager();
        config.set_config_value(config_keys::CLIENT_KEY, "acme").unwrap();
        let snapshot = config.get_config_snapshot().unwrap();
        assert!(snapshot.contains("\"client_key\":\"acme\""));
    }
}
