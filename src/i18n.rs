// ==========================================
// Paie - i18n
// ==========================================
// rust-i18n, catalogs in locales/ (fr default, en)
// Note: rust_i18n::i18n! is initialized in lib.rs
// ==========================================

use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_LOCALE: &str = "fr";

// set once a caller picks a locale explicitly
static LOCALE_CHOSEN: AtomicBool = AtomicBool::new(false);

pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// `locale`: "fr" or "en"
pub fn set_locale(locale: &str) {
    LOCALE_CHOSEN.store(true, Ordering::SeqCst);
    rust_i18n::set_locale(locale);
}

/// Switches rust-i18n (which starts on "en") to French unless a locale
/// was already chosen through `set_locale`
pub fn init_default_locale() {
    if !LOCALE_CHOSEN.load(Ordering::SeqCst) {
        rust_i18n::set_locale(DEFAULT_LOCALE);
    }
}

/// Translates `key`
///
/// # Example
/// ```no_run
/// use payroll_ingest::i18n::t;
/// let msg = t("error.closed_period.message");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// Translates `key` and fills `%{name}` placeholders
///
/// # Example
/// ```no_run
/// use payroll_ingest::i18n::t_with_args;
/// let msg = t_with_args("error.file_not_found.message", &[("path", "/tmp/paie.csv")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}
