// ==========================================
// Paie - relational schema
// ==========================================
// Tables: employee, pay_period, import_batch, staging_row,
//         payroll_transaction (+ transaction_partition catalog),
//         kpi_snapshot, deleted_period_audit, ingestion_profile,
//         sign_policy, pay_code_dim, budget_post_dim, config_kv
// Integrity lives in the database: CHECKs, partial unique index on
// batches, RESTRICT foreign keys and RAISE(ABORT) triggers
// ==========================================

use crate::db::CURRENT_SCHEMA_VERSION;
use rusqlite::{params, Connection};
use tracing::{debug, info};

pub const FIRST_PARTITION_YEAR: i32 = 2000;
pub const LAST_PARTITION_YEAR: i32 = 2050;

const TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS employee (
    employee_id TEXT PRIMARY KEY,
    matricule_raw TEXT NOT NULL,
    matricule_norm TEXT NOT NULL UNIQUE,
    nom TEXT,
    prenom TEXT,
    nom_complet TEXT NOT NULL,
    statut TEXT NOT NULL DEFAULT 'active' CHECK (statut IN ('active', 'inactive')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pay_period (
    period_id TEXT PRIMARY KEY,
    pay_date TEXT NOT NULL UNIQUE,
    pay_day INTEGER NOT NULL CHECK (pay_day BETWEEN 1 AND 31),
    pay_month INTEGER NOT NULL CHECK (pay_month BETWEEN 1 AND 12),
    pay_year INTEGER NOT NULL,
    period_seq_in_year INTEGER NOT NULL CHECK (period_seq_in_year BETWEEN 1 AND 53),
    status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'closed')),
    closed_at TEXT,
    closed_by TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (pay_year, period_seq_in_year)
);

CREATE TABLE IF NOT EXISTS import_batch (
    batch_id TEXT PRIMARY KEY,
    period_id TEXT NOT NULL REFERENCES pay_period(period_id) ON DELETE RESTRICT,
    file_name TEXT NOT NULL,
    checksum TEXT NOT NULL,
    rows_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'processed', 'error')),
    error_message TEXT,
    imported_by TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT
);

-- error rows are kept for post-mortem and must not block a retry
CREATE UNIQUE INDEX IF NOT EXISTS ux_import_batch_period_checksum
    ON import_batch(period_id, checksum) WHERE status <> 'error';

CREATE TABLE IF NOT EXISTS staging_row (
    raw_row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id TEXT NOT NULL REFERENCES import_batch(batch_id) ON DELETE RESTRICT,
    source_row_no INTEGER NOT NULL,
    pay_date TEXT NOT NULL,
    line_number TEXT,
    job_category TEXT,
    job_code TEXT,
    job_title TEXT,
    pay_date_raw TEXT,
    matricule TEXT,
    employee_name TEXT,
    pay_category TEXT,
    pay_code TEXT,
    pay_code_label TEXT,
    budget_post TEXT,
    budget_post_label TEXT,
    amount TEXT,
    employer_share TEXT,
    combined_amount TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_staging_row_pay_date ON staging_row(pay_date);
CREATE INDEX IF NOT EXISTS ix_staging_row_file ON staging_row(file_id);

CREATE TABLE IF NOT EXISTS transaction_partition (
    partition_key TEXT PRIMARY KEY,
    range_start TEXT,
    range_end TEXT
);

CREATE TABLE IF NOT EXISTS payroll_transaction (
    transaction_id TEXT PRIMARY KEY,
    batch_id TEXT NOT NULL REFERENCES import_batch(batch_id) ON DELETE RESTRICT,
    employee_id TEXT NOT NULL REFERENCES employee(employee_id) ON DELETE RESTRICT,
    period_id TEXT NOT NULL REFERENCES pay_period(period_id) ON DELETE RESTRICT,
    pay_date TEXT NOT NULL,
    pay_code TEXT NOT NULL,
    budget_post TEXT,
    pay_category TEXT,
    job_category TEXT,
    amount_employee_cents INTEGER NOT NULL,
    amount_employer_cents INTEGER NOT NULL DEFAULT 0 CHECK (amount_employer_cents >= 0),
    source_file TEXT NOT NULL,
    source_row_no INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    partition_key TEXT GENERATED ALWAYS AS (
        CASE
            WHEN CAST(substr(pay_date, 1, 4) AS INTEGER) < 2000 THEN 'past'
            WHEN CAST(substr(pay_date, 1, 4) AS INTEGER) > 2050 THEN 'future'
            ELSE 'y' || substr(pay_date, 1, 4)
        END
    ) VIRTUAL
);
CREATE INDEX IF NOT EXISTS ix_payroll_transaction_partition
    ON payroll_transaction(partition_key, pay_date);
CREATE INDEX IF NOT EXISTS ix_payroll_transaction_period ON payroll_transaction(period_id);
CREATE INDEX IF NOT EXISTS ix_payroll_transaction_employee ON payroll_transaction(employee_id);
CREATE INDEX IF NOT EXISTS ix_payroll_transaction_batch ON payroll_transaction(batch_id);

CREATE TABLE IF NOT EXISTS kpi_snapshot (
    period TEXT PRIMARY KEY,
    period_id TEXT,
    data TEXT NOT NULL,
    calculated_at TEXT NOT NULL,
    row_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS deleted_period_audit (
    audit_id TEXT PRIMARY KEY,
    period_id TEXT NOT NULL,
    pay_date TEXT NOT NULL,
    period_status TEXT NOT NULL,
    transactions_count INTEGER NOT NULL,
    employees_count INTEGER NOT NULL,
    orphan_employees_count INTEGER NOT NULL,
    batches_count INTEGER NOT NULL,
    staging_rows_count INTEGER NOT NULL,
    deleted_at TEXT NOT NULL,
    deleted_by TEXT NOT NULL,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS ingestion_profile (
    profile_id TEXT PRIMARY KEY,
    client_key TEXT NOT NULL,
    header_signature TEXT NOT NULL,
    mapping_json TEXT NOT NULL,
    options_json TEXT NOT NULL DEFAULT '{}',
    confidence REAL NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (client_key, header_signature)
);

CREATE TABLE IF NOT EXISTS sign_policy (
    pay_code TEXT PRIMARY KEY,
    sign INTEGER NOT NULL CHECK (sign IN (-1, 0, 1)),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS pay_code_dim (
    pay_code TEXT PRIMARY KEY,
    label TEXT,
    category TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS budget_post_dim (
    code TEXT PRIMARY KEY,
    label TEXT,
    updated_at TEXT NOT NULL
);
"#;

const TRIGGERS: &str = r#"
CREATE TRIGGER IF NOT EXISTS trg_pay_period_components_insert
BEFORE INSERT ON pay_period
WHEN NEW.pay_year <> CAST(substr(NEW.pay_date, 1, 4) AS INTEGER)
  OR NEW.pay_month <> CAST(substr(NEW.pay_date, 6, 2) AS INTEGER)
  OR NEW.pay_day <> CAST(substr(NEW.pay_date, 9, 2) AS INTEGER)
BEGIN
    SELECT RAISE(ABORT, 'pay_day/pay_month/pay_year do not match pay_date');
END;

CREATE TRIGGER IF NOT EXISTS trg_pay_period_components_update
BEFORE UPDATE OF pay_date, pay_day, pay_month, pay_year ON pay_period
WHEN NEW.pay_year <> CAST(substr(NEW.pay_date, 1, 4) AS INTEGER)
  OR NEW.pay_month <> CAST(substr(NEW.pay_date, 6, 2) AS INTEGER)
  OR NEW.pay_day <> CAST(substr(NEW.pay_date, 9, 2) AS INTEGER)
BEGIN
    SELECT RAISE(ABORT, 'pay_day/pay_month/pay_year do not match pay_date');
END;

CREATE TRIGGER IF NOT EXISTS trg_payroll_transaction_insert
BEFORE INSERT ON payroll_transaction
BEGIN
    SELECT RAISE(ABORT, 'closed period: insert rejected')
    WHERE EXISTS (
        SELECT 1 FROM pay_period WHERE period_id = NEW.period_id AND status = 'closed'
    );
    SELECT RAISE(ABORT, 'transaction pay_date does not match its period')
    WHERE EXISTS (
        SELECT 1 FROM pay_period WHERE period_id = NEW.period_id AND pay_date <> NEW.pay_date
    );
    SELECT RAISE(ABORT, 'no partition of payroll_transaction for pay_date')
    WHERE NOT EXISTS (
        SELECT 1 FROM transaction_partition WHERE partition_key =
            CASE
                WHEN CAST(substr(NEW.pay_date, 1, 4) AS INTEGER) < 2000 THEN 'past'
                WHEN CAST(substr(NEW.pay_date, 1, 4) AS INTEGER) > 2050 THEN 'future'
                ELSE 'y' || substr(NEW.pay_date, 1, 4)
            END
    );
END;

CREATE TRIGGER IF NOT EXISTS trg_payroll_transaction_update
BEFORE UPDATE ON payroll_transaction
BEGIN
    SELECT RAISE(ABORT, 'closed period: update rejected')
    WHERE EXISTS (
        SELECT 1 FROM pay_period
        WHERE period_id IN (OLD.period_id, NEW.period_id) AND status = 'closed'
    );
    SELECT RAISE(ABORT, 'transaction pay_date does not match its period')
    WHERE EXISTS (
        SELECT 1 FROM pay_period WHERE period_id = NEW.period_id AND pay_date <> NEW.pay_date
    );
END;

CREATE TRIGGER IF NOT EXISTS trg_import_batch_processed_immutable
BEFORE UPDATE ON import_batch
WHEN OLD.status = 'processed'
BEGIN
    SELECT RAISE(ABORT, 'processed batch is immutable');
END;

CREATE TRIGGER IF NOT EXISTS trg_deleted_period_audit_no_update
BEFORE UPDATE ON deleted_period_audit
BEGIN
    SELECT RAISE(ABORT, 'deleted_period_audit is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_deleted_period_audit_no_delete
BEFORE DELETE ON deleted_period_audit
BEGIN
    SELECT RAISE(ABORT, 'deleted_period_audit is append-only');
END;
"#;

/// Creates tables, triggers and the partition catalog (idempotent)
pub fn init_schema(conn: &Connection, allow_past_partition: bool) -> rusqlite::Result<()> {
    debug!("creating tables");
    conn.execute_batch(TABLES)?;
    debug!("creating triggers");
    conn.execute_batch(TRIGGERS)?;

    let created = ensure_partitions(conn, allow_past_partition)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![CURRENT_SCHEMA_VERSION],
    )?;

    info!(
        schema_version = CURRENT_SCHEMA_VERSION,
        partitions_created = created,
        "schema ready"
    );
    Ok(())
}

/// Registers one partition per year in [2000, 2050], the "future"
/// partition, and the "past" partition when enabled
pub fn ensure_partitions(conn: &Connection, allow_past_partition: bool) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO transaction_partition (partition_key, range_start, range_end)
         VALUES (?1, ?2, ?3)",
    )?;

    let mut created = 0;
    for year in FIRST_PARTITION_YEAR..=LAST_PARTITION_YEAR {
        created += stmt.execute(params![
            format!("y{}", year),
            format!("{}-01-01", year),
            format!("{}-01-01", year + 1)
        ])?;
    }
    created += stmt.execute(params![
        "future",
        format!("{}-01-01", LAST_PARTITION_YEAR + 1),
        Option::<String>::None
    ])?;

    if allow_past_partition {
        created += stmt.execute(params![
            "past",
            Option::<String>::None,
            format!("{}-01-01", FIRST_PARTITION_YEAR)
        ])?;
    } else {
        conn.execute(
            "DELETE FROM transaction_partition WHERE partition_key = 'past'
             AND NOT EXISTS (SELECT 1 FROM payroll_transaction WHERE partition_key = 'past')",
            [],
        )?;
    }

    Ok(created)
}
