// ==========================================
// Paie - repository errors
// ==========================================
// Tool: thiserror
// SQLite failures are classified by result code first, then by message
// (constraint names and the RAISE texts of repository/schema.rs)
// ==========================================

use rusqlite::ErrorCode;
use thiserror::Error;

/// Message raised by the closed-period triggers
pub const CLOSED_PERIOD_MARKER: &str = "closed period";

#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== lookup =====
    #[error("record not found: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    // ===== connection / pool =====
    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    #[error("lock acquisition failed: {0}")]
    LockError(String),

    #[error("no pooled connection available after {waited_ms} ms")]
    PoolTimeout { waited_ms: u64 },

    #[error("connection pool is shut down")]
    PoolClosed,

    // ===== concurrency =====
    #[error("database busy: {0}")]
    Busy(String),

    #[error("statement interrupted")]
    Interrupted,

    // ===== statements =====
    #[error("database transaction failed: {0}")]
    DatabaseTransactionError(String),

    #[error("database query failed: {0}")]
    DatabaseQueryError(String),

    #[error("unique constraint violated: {0}")]
    UniqueConstraintViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("write into closed period rejected: {0}")]
    ClosedPeriod(String),

    // ===== business =====
    #[error("business rule violated: {0}")]
    BusinessRuleViolation(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, RepositoryError::UniqueConstraintViolation(_))
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg) => {
                let text = msg.unwrap_or_else(|| code.to_string());
                match code.code {
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                        RepositoryError::Busy(text)
                    }
                    ErrorCode::OperationInterrupted => RepositoryError::Interrupted,
                    ErrorCode::CannotOpen => RepositoryError::DatabaseConnectionError(text),
                    _ if text.contains(CLOSED_PERIOD_MARKER) => RepositoryError::ClosedPeriod(text),
                    _ if text.contains("UNIQUE") => RepositoryError::UniqueConstraintViolation(text),
                    _ if text.contains("FOREIGN KEY") => RepositoryError::ForeignKeyViolation(text),
                    _ => RepositoryError::DatabaseQueryError(text),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_unique_violation_is_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: RepositoryError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_raise_message_is_classified_as_closed_period() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE t (k TEXT);
            CREATE TRIGGER t_guard BEFORE INSERT ON t
            BEGIN SELECT RAISE(ABORT, 'closed period: test'); END;
            "#,
        )
        .unwrap();
        let err: RepositoryError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::ClosedPeriod(_)));
    }

    #[test]
    fn test_no_rows_maps_to_not_found() {
        let err: RepositoryError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
