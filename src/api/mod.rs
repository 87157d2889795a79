// ==========================================
// Paie - API layer
// ==========================================
// Entry points used by the CLI and any embedding application
// ==========================================

pub mod config_api;
pub mod error;
pub mod import_api;
pub mod period_api;
pub mod query_api;

pub use config_api::ConfigApi;
pub use error::{translate_error, ApiError, ApiResult};
pub use import_api::ImportApi;
pub use period_api::PeriodApi;
pub use query_api::QueryApi;
