// ==========================================
// Paie - import errors
// ==========================================
// Tool: thiserror
// Display strings are technical (logs, import_batch.error_message);
// user-facing text comes from locales/ via user_message()
// ==========================================

use crate::i18n::t_with_args;
use crate::repository::error::RepositoryError;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification used for envelopes and error translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Input,
    Mapping,
    Row,
    Integrity,
    Concurrency,
    System,
    Cancellation,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Input => "input",
            ErrorCategory::Mapping => "mapping",
            ErrorCategory::Row => "row",
            ErrorCategory::Integrity => "integrity",
            ErrorCategory::Concurrency => "concurrency",
            ErrorCategory::System => "system",
            ErrorCategory::Cancellation => "cancellation",
        }
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    // ===== input =====
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file format: {0} (expected .xlsx/.xls/.xlsm/.csv)")]
    UnsupportedFormat(String),

    #[error("file too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("file is empty: {0}")]
    EmptyFile(String),

    #[error("file read failed: {0}")]
    FileReadError(String),

    #[error("excel parse failed: {0}")]
    ExcelParseError(String),

    #[error("csv parse failed: {0}")]
    CsvParseError(String),

    #[error("could not decode file: {0}")]
    DecodingFailed(String),

    #[error("too few columns: found {found}, need at least 3")]
    TooFewColumns { found: usize },

    #[error("worksheet not found: {0}")]
    SheetNotFound(String),

    #[error("formula injection at row {row}, column {column}")]
    FormulaInjection { row: usize, column: String },

    // ===== mapping =====
    #[error("required fields unresolved: {}", fields.join(", "))]
    MappingUnresolved { fields: Vec<String> },

    // ===== rows =====
    #[error("no valid rows ({rejected} rejected)")]
    NoValidRows { rejected: usize },

    // ===== integrity =====
    #[error("file already imported for period {period_id} (checksum {checksum})")]
    DuplicateImport { period_id: String, checksum: String },

    #[error("period {pay_date} is closed")]
    ClosedPeriod { pay_date: String },

    #[error("period not found: {0}")]
    PeriodNotFound(String),

    #[error("more than 53 periods in year {year}")]
    SequenceOverflow { year: i32 },

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    // ===== concurrency =====
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),

    #[error("database busy: {0}")]
    Busy(String),

    // ===== system =====
    #[error("database error: {0}")]
    Database(String),

    #[error("database unavailable: {0}")]
    PoolUnavailable(String),

    #[error("internal error: {0}")]
    InternalError(String),

    // ===== cancellation =====
    #[error("import cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    pub fn category(&self) -> ErrorCategory {
        use ImportError::*;
        match self {
            FileNotFound(_) | UnsupportedFormat(_) | FileTooLarge { .. } | EmptyFile(_)
            | FileReadError(_) | ExcelParseError(_) | CsvParseError(_) | DecodingFailed(_)
            | TooFewColumns { .. } | SheetNotFound(_) | FormulaInjection { .. } => ErrorCategory::Input,
            MappingUnresolved { .. } => ErrorCategory::Mapping,
            NoValidRows { .. } => ErrorCategory::Row,
            DuplicateImport { .. } | ClosedPeriod { .. } | PeriodNotFound(_)
            | SequenceOverflow { .. } | ForeignKeyViolation(_) | ConstraintViolation(_) => {
                ErrorCategory::Integrity
            }
            LockFailed(_) | Busy(_) => ErrorCategory::Concurrency,
            Database(_) | PoolUnavailable(_) | InternalError(_) | Other(_) => ErrorCategory::System,
            Cancelled => ErrorCategory::Cancellation,
        }
    }

    /// Stable snake_case identifier, reported as `error_kind`
    pub fn kind(&self) -> &'static str {
        use ImportError::*;
        match self {
            FileNotFound(_) => "file_not_found",
            UnsupportedFormat(_) => "unsupported_format",
            FileTooLarge { .. } => "file_too_large",
            EmptyFile(_) => "empty_file",
            FileReadError(_) => "file_read_error",
            ExcelParseError(_) => "excel_parse_error",
            CsvParseError(_) => "csv_parse_error",
            DecodingFailed(_) => "decoding_failed",
            TooFewColumns { .. } => "too_few_columns",
            SheetNotFound(_) => "sheet_not_found",
            FormulaInjection { .. } => "formula_injection",
            MappingUnresolved { .. } => "mapping_unresolved",
            NoValidRows { .. } => "no_valid_rows",
            DuplicateImport { .. } => "duplicate_import",
            ClosedPeriod { .. } => "closed_period",
            PeriodNotFound(_) => "period_not_found",
            SequenceOverflow { .. } => "sequence_overflow",
            ForeignKeyViolation(_) => "foreign_key_violation",
            ConstraintViolation(_) => "constraint_violation",
            LockFailed(_) => "lock_failed",
            Busy(_) => "busy",
            Database(_) => "database",
            PoolUnavailable(_) => "pool_unavailable",
            InternalError(_) | Other(_) => "internal",
            Cancelled => "cancelled",
        }
    }

    /// Failures after which an `error` batch row is kept for post-mortem
    pub fn records_error_batch(&self) -> bool {
        !matches!(
            self,
            ImportError::DuplicateImport { .. } | ImportError::ClosedPeriod { .. } | ImportError::Cancelled
        )
    }
}

/// Translated message and suggested fix shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    pub message: String,
    pub solution: String,
}

impl ImportError {
    /// Translation in the current locale, keyed by `kind()`
    pub fn user_message(&self) -> UserMessage {
        let detail = self.detail();
        let args = [("path", detail.as_str()), ("detail", detail.as_str())];
        let kind = self.kind();
        UserMessage {
            message: t_with_args(&format!("error.{}.message", kind), &args),
            solution: t_with_args(&format!("error.{}.solution", kind), &args),
        }
    }

    fn detail(&self) -> String {
        use ImportError::*;
        match self {
            FileNotFound(s) | UnsupportedFormat(s) | EmptyFile(s) | SheetNotFound(s) => s.clone(),
            MappingUnresolved { fields } => fields.join(", "),
            FormulaInjection { row, column } => format!("{} ({})", column, row),
            other => other.to_string(),
        }
    }
}

impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } if entity == "pay_period" => {
                ImportError::PeriodNotFound(id)
            }
            RepositoryError::ClosedPeriod(msg) => ImportError::ClosedPeriod { pay_date: msg },
            RepositoryError::ForeignKeyViolation(msg) => ImportError::ForeignKeyViolation(msg),
            RepositoryError::UniqueConstraintViolation(msg) => ImportError::ConstraintViolation(msg),
            RepositoryError::BusinessRuleViolation(msg) => ImportError::ConstraintViolation(msg),
            RepositoryError::Busy(msg) => ImportError::Busy(msg),
            RepositoryError::LockError(msg) => ImportError::LockFailed(msg),
            RepositoryError::Interrupted => ImportError::Cancelled,
            RepositoryError::PoolTimeout { waited_ms } => {
                ImportError::PoolUnavailable(format!("no connection after {} ms", waited_ms))
            }
            RepositoryError::PoolClosed => ImportError::PoolUnavailable("pool is shut down".into()),
            RepositoryError::Other(e) => ImportError::Other(e),
            other => ImportError::Database(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::from(RepositoryError::from(err))
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ImportError::FileNotFound(err.to_string()),
            _ => ImportError::FileReadError(err.to_string()),
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::InternalError(err.to_string())
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
