// ==========================================
// Paie - API errors
// ==========================================
// Wraps ImportError and RepositoryError for the query, period and
// import surfaces. Display is technical; user_message() is translated.
// ==========================================

use crate::i18n::t_with_args;
use crate::importer::error::{ImportError, UserMessage};
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("business rule violated: {0}")]
    BusinessRuleViolation(String),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// Stable snake_case identifier
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::NotFound(_) => "not_found",
            ApiError::BusinessRuleViolation(_) => "constraint_violation",
            ApiError::Import(e) => e.kind(),
            ApiError::InternalError(_) | ApiError::Other(_) => "internal",
        }
    }

    pub fn user_message(&self) -> UserMessage {
        match self {
            ApiError::Import(e) => translate_error(e),
            ApiError::InvalidInput(detail) | ApiError::NotFound(detail) => {
                let key = self.kind();
                let args = [("detail", detail.as_str())];
                UserMessage {
                    message: t_with_args(&format!("error.{}.message", key), &args),
                    solution: t_with_args(&format!("error.{}.solution", key), &args),
                }
            }
            ApiError::BusinessRuleViolation(msg) => {
                translate_error(&ImportError::ConstraintViolation(msg.clone()))
            }
            ApiError::InternalError(msg) => translate_error(&ImportError::InternalError(msg.clone())),
            ApiError::Other(e) => translate_error(&ImportError::InternalError(e.to_string())),
        }
    }
}

/// French (current locale) message and solution for an import failure
pub fn translate_error(err: &ImportError) -> UserMessage {
    err.user_message()
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } if entity != "pay_period" => {
                ApiError::NotFound(format!("{} {}", entity, id))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            other => ApiError::Import(ImportError::from(other)),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let api_err: ApiError = RepositoryError::not_found("employee", "E001").into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("employee"));
                assert!(msg.contains("E001"));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }

        let api_err: ApiError = RepositoryError::not_found("pay_period", "p1").into();
        assert_eq!(api_err.kind(), "period_not_found");

        let api_err: ApiError = RepositoryError::Busy("locked".into()).into();
        assert_eq!(api_err.kind(), "busy");
    }

    #[test]
    fn test_translate_closed_period() {
        let _guard = crate::i18n::tests::LOCALE_TEST_LOCK.lock().unwrap();
        crate::i18n::set_locale("fr");
        let msg = translate_error(&ImportError::ClosedPeriod {
            pay_date: "2025-08-28".into(),
        });
        assert_eq!(msg.message, "Période fermée");

        let msg = ApiError::InvalidInput("page_size".into()).user_message();
        assert!(msg.message.contains("page_size"));
    }
}
