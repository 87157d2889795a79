// ==========================================
// Logging setup
// ==========================================
// tracing + tracing-subscriber, level from RUST_LOG
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber; false when one was already installed
///
/// # Environment
/// - RUST_LOG: filter directives (default: info)
///   e.g. RUST_LOG=debug or RUST_LOG=payroll_ingest=trace
/// - PAYROLL_LOG_FORMAT=json: one JSON object per line
///
/// # Example
/// ```no_run
/// use payroll_ingest::logging;
/// logging::init();
/// ```
pub fn init() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("PAYROLL_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let result = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .try_init()
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            // a host application owns the global subscriber; events go there
            tracing::debug!(error = %e, "global subscriber already installed, keeping it");
            false
        }
    }
}

/// Test subscriber, debug level, captured by the test harness
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_keeps_existing_subscriber() {
        init_test();
        assert!(!init());
    }
}
