// ==========================================
// Paie - data access entry point
// ==========================================
// Every component reaches the database through PayrollStore:
// - with_conn: one pooled connection, autocommit
// - with_write_tx: BEGIN IMMEDIATE ... COMMIT, rollback on Err
// - bulk_insert: chunked prepared inserts with a per-chunk hook
// ==========================================

use crate::db::{ConnectionPool, PooledConnection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, Params, Row, Statement, Transaction, TransactionBehavior};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;

#[derive(Clone)]
pub struct PayrollStore {
    pool: Arc<ConnectionPool>,
}

impl PayrollStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn acquire(&self) -> RepositoryResult<PooledConnection> {
        self.pool.acquire()
    }

    /// Runs `f` on a pooled connection (autocommit)
    pub fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Connection) -> RepositoryResult<T>,
    {
        let conn = self.pool.acquire()?;
        f(&conn)
    }

    /// Runs `f` inside an IMMEDIATE transaction: the write lock is taken
    /// up front so writers queue on busy_timeout instead of failing at
    /// their first write.
    pub fn with_write_tx<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> RepositoryResult<T>,
    {
        let mut conn = self.pool.acquire()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Same as `with_write_tx` for callers with their own error type
    pub fn with_write_tx_as<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    {
        let mut conn = self.pool.acquire()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(RepositoryError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Parameterized read returning every mapped row
    pub fn query<T, P, F>(&self, sql: &str, params: P, f: F) -> RepositoryResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.with_conn(|conn| query_all(conn, sql, params, f))
    }

    /// Parameterized write in autocommit mode
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> RepositoryResult<usize> {
        self.with_conn(|conn| Ok(conn.execute(sql, params)?))
    }
}

/// Collects every row of a parameterized query
pub fn query_all<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> RepositoryResult<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, f)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Inserts `rows` with one cached statement, `chunk_size` rows at a time.
///
/// `on_chunk(inserted_so_far)` runs after each chunk; an Err stops the
/// load (used for cancellation and progress).
pub fn bulk_insert<R, B, C>(
    conn: &Connection,
    sql: &str,
    rows: &[R],
    chunk_size: usize,
    mut bind: B,
    mut on_chunk: C,
) -> RepositoryResult<usize>
where
    B: FnMut(&mut Statement<'_>, &R) -> rusqlite::Result<usize>,
    C: FnMut(usize) -> RepositoryResult<()>,
{
    let chunk_size = chunk_size.max(1);
    let mut stmt = conn.prepare_cached(sql)?;
    let mut inserted = 0;

    for chunk in rows.chunks(chunk_size) {
        for row in chunk {
            inserted += bind(&mut stmt, row)?;
        }
        debug!(inserted, total = rows.len(), "bulk insert chunk done");
        on_chunk(inserted)?;
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseConfig;
    use rusqlite::params;
    use tempfile::NamedTempFile;

    fn store() -> (NamedTempFile, PayrollStore) {
        let file = NamedTempFile::new().unwrap();
        let pool = ConnectionPool::open(DatabaseConfig::new(file.path().to_str().unwrap())).unwrap();
        let store = PayrollStore::new(Arc::new(pool));
        store
            .execute("CREATE TABLE t (v INTEGER NOT NULL)", [])
            .unwrap();
        (file, store)
    }

    #[test]
    fn test_write_tx_rolls_back_on_error() {
        let (_f, store) = store();
        let result: RepositoryResult<()> = store.with_write_tx(|tx| {
            tx.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Err(RepositoryError::BusinessRuleViolation("stop".into()))
        });
        assert!(result.is_err());

        let count = store
            .query("SELECT COUNT(*) FROM t", [], |r| r.get::<_, i64>(0))
            .unwrap();
        assert_eq!(count, vec![0]);
    }

    #[test]
    fn test_bulk_insert_reports_each_chunk() {
        let (_f, store) = store();
        let rows: Vec<i64> = (0..25).collect();
        let mut seen = Vec::new();

        let inserted = store
            .with_write_tx(|tx| {
                bulk_insert(
                    tx,
                    "INSERT INTO t (v) VALUES (?1)",
                    &rows,
                    10,
                    |stmt, v| stmt.execute(params![v]),
                    |n| {
                        seen.push(n);
                        Ok(())
                    },
                )
            })
            .unwrap();

        assert_eq!(inserted, 25);
        assert_eq!(seen, vec![10, 20, 25]);
    }

    #[test]
    fn test_bulk_insert_stops_when_hook_fails() {
        let (_f, store) = store();
        let rows: Vec<i64> = (0..30).collect();

        let result = store.with_write_tx(|tx| {
            bulk_insert(
                tx,
                "INSERT INTO t (v) VALUES (?1)",
                &rows,
                10,
                |stmt, v| stmt.execute(params![v]),
                |n| {
                    if n >= 10 {
                        Err(RepositoryError::Interrupted)
                    } else {
                        Ok(())
                    }
                },
            )
        });

        assert!(matches!(result, Err(RepositoryError::Interrupted)));
        let count = store
            .query("SELECT COUNT(*) FROM t", [], |r| r.get::<_, i64>(0))
            .unwrap();
        assert_eq!(count, vec![0]);
    }
}
