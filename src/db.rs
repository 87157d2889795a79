// ==========================================
// Paie - SQLite connections and pool
// ==========================================
// Goals:
// - every connection gets the same PRAGMAs (foreign keys, busy timeout)
// - the DSN is resolved here and nowhere else
// - a bounded r2d2 pool is the only path to the database; AppState owns it
//   and drains it on shutdown
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{info, warn};

/// Default busy_timeout (ms)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default pool acquisition timeout (ms)
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_POOL_SIZE: usize = 4;

/// Schema version written by `repository::schema::init_schema`
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Environment variable holding the DSN (`sqlite://path` or a plain path)
pub const DATABASE_URL_ENV: &str = "PAYROLL_DATABASE_URL";

// ==========================================
// DatabaseConfig
// ==========================================
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub db_path: String,
    pub pool_size: usize,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
    /// Keep a "past" partition for pay dates before 2000
    pub allow_past_partition: bool,
}

impl DatabaseConfig {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            pool_size: DEFAULT_POOL_SIZE,
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            allow_past_partition: false,
        }
    }

    /// Reads `PAYROLL_DATABASE_URL`, falling back to the per-user data dir
    pub fn from_env() -> Self {
        match std::env::var(DATABASE_URL_ENV) {
            Ok(dsn) if !dsn.trim().is_empty() => Self::new(parse_dsn(&dsn)),
            _ => Self::new(default_db_path()),
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_past_partition(mut self, enabled: bool) -> Self {
        self.allow_past_partition = enabled;
        self
    }
}

/// `sqlite:///var/lib/paie.db`, `sqlite://paie.db`, `sqlite:paie.db` and
/// plain paths all resolve to a file path
pub fn parse_dsn(dsn: &str) -> String {
    let dsn = dsn.trim();
    dsn.strip_prefix("sqlite://")
        .or_else(|| dsn.strip_prefix("sqlite:"))
        .unwrap_or(dsn)
        .to_string()
}

pub fn default_db_path() -> String {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("payroll-ingest")
        .join("payroll.db")
        .to_string_lossy()
        .to_string()
}

/// Applies the shared PRAGMAs
///
/// foreign_keys and busy_timeout are per-connection settings in SQLite
pub fn configure_sqlite_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    // readers keep going while an import holds the write lock
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    Ok(())
}

/// Opens a connection with the shared PRAGMAs
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn, Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(conn)
}

/// Reads schema_version (None when the table does not exist)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// ConnectionPool
// ==========================================
// r2d2 over r2d2_sqlite; PRAGMAs applied through the manager's init hook

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

/// Connection borrowed from the pool; returned on drop
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

pub struct ConnectionPool {
    config: DatabaseConfig,
    // None once shut down
    inner: RwLock<Option<SqlitePool>>,
}

impl ConnectionPool {
    /// Builds the pool and opens one connection to validate the DSN
    pub fn open(config: DatabaseConfig) -> RepositoryResult<Self> {
        if let Some(parent) = Path::new(&config.db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
            }
        }

        let busy_timeout = config.busy_timeout;
        let manager = SqliteConnectionManager::file(&config.db_path)
            .with_init(move |conn| configure_sqlite_connection(conn, busy_timeout));

        let pool = r2d2::Pool::builder()
            .max_size(config.pool_size as u32)
            .min_idle(Some(1))
            .connection_timeout(config.acquire_timeout)
            .build(manager)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        info!(db_path = %config.db_path, pool_size = config.pool_size, "connection pool opened");

        Ok(Self {
            config,
            inner: RwLock::new(Some(pool)),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn current(&self) -> RepositoryResult<SqlitePool> {
        let guard = self
            .inner
            .read()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        guard.clone().ok_or(RepositoryError::PoolClosed)
    }

    /// Hands out a connection, waiting up to `acquire_timeout`
    pub fn acquire(&self) -> RepositoryResult<PooledConnection> {
        let pool = self.current()?;
        pool.get().map_err(|e| {
            let waited_ms = self.config.acquire_timeout.as_millis() as u64;
            warn!(waited_ms, error = %e, "pool acquisition timed out");
            RepositoryError::PoolTimeout { waited_ms }
        })
    }

    /// Refuses further acquisitions and drops the pool handle.
    /// Idle connections close with it; connections still checked out
    /// close when returned. Returns the idle count at shutdown.
    pub fn shutdown(&self) -> usize {
        let taken = match self.inner.write() {
            Ok(mut guard) => guard.take(),
            Err(_) => return 0,
        };
        let Some(pool) = taken else {
            return 0;
        };
        let state = pool.state();
        let drained = state.idle_connections as usize;
        let in_use = state.connections.saturating_sub(state.idle_connections);
        drop(pool);
        info!(drained, still_in_use = in_use, "connection pool shut down");
        drained
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().map(|g| g.is_none()).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn temp_config(size: usize) -> (NamedTempFile, DatabaseConfig) {
        let file = NamedTempFile::new().unwrap();
        let config = DatabaseConfig::new(file.path().to_str().unwrap())
            .with_pool_size(size)
            .with_acquire_timeout(Duration::from_millis(100));
        (file, config)
    }

    #[test]
    fn test_parse_dsn() {
        assert_eq!(parse_dsn("sqlite:///var/lib/paie.db"), "/var/lib/paie.db");
        assert_eq!(parse_dsn("sqlite:paie.db"), "paie.db");
        assert_eq!(parse_dsn(" /tmp/x.db "), "/tmp/x.db");
    }

    #[test]
    fn test_foreign_keys_enabled_on_pooled_connections() {
        let (_file, config) = temp_config(2);
        let pool = ConnectionPool::open(config).unwrap();
        let conn = pool.acquire().unwrap();
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_acquire_times_out_when_exhausted() {
        let (_file, config) = temp_config(1);
        let pool = ConnectionPool::open(config).unwrap();
        let _held = pool.acquire().unwrap();
        let err = pool.acquire().err().unwrap();
        assert!(matches!(err, RepositoryError::PoolTimeout { .. }));
    }

    #[test]
    fn test_released_connection_is_reused() {
        let (_file, config) = temp_config(1);
        let pool = ConnectionPool::open(config).unwrap();
        {
            let _c = pool.acquire().unwrap();
        }
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn test_busy_timeout_applied_by_init_hook() {
        let (_file, config) = temp_config(2);
        let pool = ConnectionPool::open(config).unwrap();
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        for conn in [&a, &b] {
            let ms: i64 = conn.query_row("PRAGMA busy_timeout", [], |r| r.get(0)).unwrap();
            assert_eq!(ms, DEFAULT_BUSY_TIMEOUT_MS as i64);
        }
    }

    #[test]
    fn test_shutdown_refuses_new_acquisitions() {
        let (_file, config) = temp_config(2);
        let pool = ConnectionPool::open(config).unwrap();
        assert!(pool.shutdown() >= 1);
        assert!(pool.is_closed());
        assert_eq!(pool.shutdown(), 0);
        assert!(matches!(pool.acquire().err().unwrap(), RepositoryError::PoolClosed));
    }

    #[test]
    fn test_read_schema_version_without_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
