// ==========================================
// Paie - application state
// ==========================================
// Root lifecycle object: owns the connection pool, prepares the schema,
// wires engines and APIs, drains the pool on shutdown
// ==========================================

use crate::api::{ApiResult, ConfigApi, ImportApi, PeriodApi, QueryApi};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::{read_schema_version, ConnectionPool, DatabaseConfig, CURRENT_SCHEMA_VERSION};
use crate::engine::{DeletionEngine, PeriodCoordinator, YearLocks};
use crate::i18n;
use crate::importer::{CancelHandle, IngestionEngine, ProgressReporter};
use crate::repository::schema::{ensure_partitions, init_schema};
use crate::repository::PayrollStore;
use std::sync::Arc;
use tracing::info;

pub struct AppState {
    pub db_path: String,
    pool: Arc<ConnectionPool>,
    pub store: PayrollStore,
    pub config_manager: ConfigManager,
    pub import_api: Arc<ImportApi>,
    pub period_api: Arc<PeriodApi>,
    pub query_api: Arc<QueryApi>,
    pub config_api: Arc<ConfigApi>,
    cancel: CancelHandle,
}

impl AppState {
    pub fn new(config: DatabaseConfig) -> ApiResult<Self> {
        Self::with_progress(config, ProgressReporter::none())
    }

    /// Opens the pool, checks and prepares the schema, builds the APIs
    pub fn with_progress(config: DatabaseConfig, progress: ProgressReporter) -> ApiResult<Self> {
        info!(db_path = %config.db_path, "initializing application state");
        i18n::init_default_locale();
        let db_path = config.db_path.clone();
        let allow_past_partition = config.allow_past_partition;
        let pool = Arc::new(ConnectionPool::open(config)?);
        let store = PayrollStore::new(pool.clone());

        store.with_conn(|conn| {
            if let Some(version) = read_schema_version(conn)? {
                if version > CURRENT_SCHEMA_VERSION {
                    return Err(crate::repository::RepositoryError::BusinessRuleViolation(format!(
                        "database schema v{} is newer than supported v{}",
                        version, CURRENT_SCHEMA_VERSION
                    )));
                }
            }
            init_schema(conn, allow_past_partition)?;
            Ok(())
        })?;

        let config_manager = ConfigManager::new(store.clone());
        let settings = config_manager.ingest_settings()?;
        if settings.allow_past_partition && !allow_past_partition {
            store.with_conn(|conn| Ok(ensure_partitions(conn, true)?))?;
        }

        let locks = Arc::new(YearLocks::new());
        let coordinator = PeriodCoordinator::new(store.clone(), locks.clone());
        let deletion = DeletionEngine::new(store.clone(), locks);
        let engine = IngestionEngine::new(
            store.clone(),
            Arc::new(config_manager.clone()),
            coordinator.clone(),
        )
        .with_progress(progress);
        let cancel = engine.cancel_handle();

        Ok(Self {
            import_api: Arc::new(ImportApi::new(Arc::new(engine))),
            period_api: Arc::new(PeriodApi::new(store.clone(), coordinator, deletion)),
            query_api: Arc::new(QueryApi::new(store.clone())),
            config_api: Arc::new(ConfigApi::new(store.clone(), config_manager.clone())),
            config_manager,
            store,
            pool,
            db_path,
            cancel,
        })
    }

    /// Stops the running import, if any
    pub fn cancel_import(&self) {
        self.cancel.cancel();
    }

    /// Drains the pool; later calls fail with PoolClosed
    pub fn shutdown(&self) -> usize {
        self.cancel.cancel();
        self.pool.shutdown()
    }

    pub fn is_shut_down(&self) -> bool {
        self.pool.is_closed()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").field("db_path", &self.db_path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_shutdown_closes_pool() {
        let file = NamedTempFile::new().unwrap();
        let state = AppState::new(DatabaseConfig::new(file.path().to_str().unwrap())).unwrap();
        assert!(state.period_api.list_periods().unwrap().is_empty());

        state.shutdown();
        assert!(state.is_shut_down());
        let err = state.period_api.list_periods().unwrap_err();
        assert_eq!(err.kind(), "pool_unavailable");
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        {
            let state = AppState::new(DatabaseConfig::new(&path)).unwrap();
            state
                .store
                .execute("INSERT INTO schema_version (version) VALUES (?1)", [CURRENT_SCHEMA_VERSION + 1])
                .unwrap();
            state.shutdown();
        }
        let err = AppState::new(DatabaseConfig::new(&path)).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }
}
