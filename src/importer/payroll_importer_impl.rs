// ==========================================
// Paie - ingestion engine
// ==========================================
// Flow: checksum -> period -> [batch -> read -> map -> filter -> parse
//       -> sign -> dimensions -> staging -> employees -> transactions
//       -> KPI -> processed + profile] in one IMMEDIATE transaction
// Failures inside the brackets roll everything back, then an `error`
// batch row is written on its own.
// ==========================================

use crate::config::{ImportConfigReader, IngestSettings};
use crate::domain::employee::EmployeeIdentity;
use crate::domain::import::{
    EnvelopeStatus, ImportEnvelope, ImportRequest, RejectedRowsSummary,
};
use crate::domain::kpi::KpiSnapshot;
use crate::domain::period::PayPeriod;
use crate::domain::profile::ColumnMapping;
use crate::domain::transaction::{PayrollTransaction, StagingRow};
use crate::engine::kpi_snapshot::KpiSnapshotService;
use crate::engine::period_coordinator::PeriodCoordinator;
use crate::i18n::{t, t_with_args};
use crate::importer::checksum::file_sha256;
use crate::importer::error::{ErrorCategory, ImportError, ImportResult};
use crate::importer::field_mapper::{ColumnMapper, MappingPreview, MappingResult};
use crate::importer::file_parser::{check_formula_injection, UniversalFileParser};
use crate::importer::grid::Grid;
use crate::importer::header::header_signature;
use crate::importer::payroll_importer_trait::PayrollImporter;
use crate::importer::progress::ProgressReporter;
use crate::importer::row_parser::{parse_rows, ParsedRow};
use crate::importer::sign_policy::SignPolicy;
use crate::repository::{
    BatchRepository, DimensionRepository, DimensionSet, EmployeeRepository, PayrollStore,
    ProfileRepository, RepositoryError, RepositoryResult, SignPolicyRepository,
    TransactionRepository,
};
use async_trait::async_trait;
use rusqlite::{Connection, InterruptHandle, Transaction};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Rows rendered in a mapping preview
pub const PREVIEW_ROWS: usize = 10;

// Progress milestones (percent)
const PCT_CHECKSUM: u8 = 2;
const PCT_PERIOD: u8 = 5;
const PCT_BATCH: u8 = 8;
const PCT_READ: u8 = 10;
const PCT_MAPPING: u8 = 20;
const PCT_PARSE: u8 = 25;
const PCT_DIMENSIONS: u8 = 35;
const PCT_STAGING: (u8, u8) = (40, 15);
const PCT_EMPLOYEES: (u8, u8) = (55, 10);
const PCT_TRANSACTIONS: (u8, u8) = (65, 25);
const PCT_KPI: u8 = 92;
const PCT_DONE: u8 = 100;

fn chunk_percent((start, span): (u8, u8), done: usize, total: usize) -> u8 {
    if total == 0 {
        return start.saturating_add(span);
    }
    let step = (span as usize * done.min(total)) / total;
    start.saturating_add(step as u8)
}

// ==========================================
// Cancellation
// ==========================================

/// Cloneable handle that stops the running import
#[derive(Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    interrupt: Arc<Mutex<Option<InterruptHandle>>>,
}

impl CancelHandle {
    /// Sets the flag and interrupts the statement in flight, if any
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        if let Ok(slot) = self.interrupt.lock() {
            if let Some(handle) = slot.as_ref() {
                handle.interrupt();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    fn arm(&self, conn: &Connection) -> InterruptGuard<'_> {
        if let Ok(mut slot) = self.interrupt.lock() {
            *slot = Some(conn.get_interrupt_handle());
        }
        InterruptGuard { handle: self }
    }
}

/// Clears the interrupt slot once the transaction body is done
struct InterruptGuard<'a> {
    handle: &'a CancelHandle,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.handle.interrupt.lock() {
            *slot = None;
        }
    }
}

// ==========================================
// Per-run bookkeeping
// ==========================================

#[derive(Debug, Default)]
struct RunState {
    file_name: String,
    checksum: Option<String>,
    period_id: Option<String>,
    batch_id: Option<String>,
    /// The failure (if any) happened inside the import transaction
    in_transaction: bool,
    accepted: usize,
    rejected: usize,
    rejected_summary: Option<RejectedRowsSummary>,
    mapping_warnings: Vec<String>,
    last_percent: u8,
}

// ==========================================
// IngestionEngine
// ==========================================

#[derive(Clone)]
pub struct IngestionEngine {
    store: PayrollStore,
    config: Arc<dyn ImportConfigReader>,
    periods: PeriodCoordinator,
    progress: ProgressReporter,
    cancel: CancelHandle,
}

impl IngestionEngine {
    pub fn new(store: PayrollStore, config: Arc<dyn ImportConfigReader>, periods: PeriodCoordinator) -> Self {
        Self {
            store,
            config,
            periods,
            progress: ProgressReporter::none(),
            cancel: CancelHandle::default(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn phase(&self, state: &mut RunState, percent: u8, key: &str) {
        state.last_percent = percent;
        self.progress.report(percent, &t(key), &[]);
    }

    fn check_cancelled(&self) -> ImportResult<()> {
        if self.cancel.is_cancelled() {
            Err(ImportError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Progress + cancellation hook of the bulk loaders, reporting every
    /// `every` rows and at the end
    fn chunk_hook(
        &self,
        range: (u8, u8),
        key: &str,
        total: usize,
        every: usize,
    ) -> impl FnMut(usize) -> RepositoryResult<()> + '_ {
        let message = t(key);
        let every = every.max(1);
        move |done| {
            if done % every == 0 || done == total {
                self.progress.report(
                    chunk_percent(range, done, total),
                    &message,
                    &[("done", done as i64), ("total", total as i64)],
                );
            }
            if self.cancel.is_cancelled() {
                Err(RepositoryError::Interrupted)
            } else {
                Ok(())
            }
        }
    }

    /// Synchronous import; the async trait method runs this on a blocking worker
    #[instrument(skip(self, request), fields(
        file = %request.file_path.display(),
        pay_date = %request.pay_date,
        user = %request.user_id
    ))]
    pub fn run_import(&self, request: &ImportRequest) -> ImportEnvelope {
        let started = Instant::now();
        self.cancel.reset();
        let mut state = RunState {
            file_name: display_name(&request.file_path),
            ..RunState::default()
        };

        let result = self.execute(request, &mut state);
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(kpi) => {
                info!(
                    batch_id = state.batch_id.as_deref().unwrap_or_default(),
                    accepted = state.accepted,
                    rejected = state.rejected,
                    duration_ms,
                    "import completed"
                );
                self.progress.report(PCT_DONE, &t("import.phase.done"), &[
                    ("accepted", state.accepted as i64),
                    ("rejected", state.rejected as i64),
                ]);
                success_envelope(request, state, kpi, duration_ms)
            }
            Err(err) => {
                match err.category() {
                    ErrorCategory::System => error!(error = %err, kind = err.kind(), "import failed"),
                    _ => warn!(error = %err, kind = err.kind(), "import rejected"),
                }
                if matches!(err, ImportError::Cancelled) {
                    self.progress.report(state.last_percent, &t("import.cancelled"), &[]);
                }
                self.record_error_batch(request, &state, &err);
                error_envelope(request.pay_date, state, &err, duration_ms)
            }
        }
    }

    fn execute(&self, request: &ImportRequest, state: &mut RunState) -> ImportResult<KpiSnapshot> {
        let settings = self.config.ingest_settings()?;
        let parser = UniversalFileParser::new(settings.max_file_size_bytes, settings.sheet_name.clone());
        let path = request.file_path.as_path();

        // Step 1: fingerprint
        debug!("step 1: checksum");
        self.phase(state, PCT_CHECKSUM, "import.phase.checksum");
        parser.check_file(path)?;
        let checksum = file_sha256(path)?;
        state.checksum = Some(checksum.clone());
        self.check_cancelled()?;

        // Step 2: period
        debug!("step 2: period");
        self.phase(state, PCT_PERIOD, "import.phase.period");
        let period = self.periods.ensure_period(request.pay_date)?;
        state.period_id = Some(period.period_id.clone());
        if period.is_closed() {
            return Err(ImportError::ClosedPeriod {
                pay_date: request.pay_date.to_string(),
            });
        }
        self.check_cancelled()?;

        // Steps 3-9: one transaction
        let batch_id = Uuid::new_v4().to_string();
        state.batch_id = Some(batch_id.clone());
        self.store.with_write_tx_as(|tx| {
            state.in_transaction = true;
            let _interrupt = self.cancel.arm(tx);
            self.load(tx, request, &settings, &parser, &period, &batch_id, &checksum, state)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn load(
        &self,
        tx: &Transaction<'_>,
        request: &ImportRequest,
        settings: &IngestSettings,
        parser: &UniversalFileParser,
        period: &PayPeriod,
        batch_id: &str,
        checksum: &str,
        state: &mut RunState,
    ) -> ImportResult<KpiSnapshot> {
        // Step 3: batch, the unique index rejects a second import of the file
        debug!("step 3: batch");
        self.phase(state, PCT_BATCH, "import.phase.batch");
        BatchRepository::new(tx)
            .insert_pending(batch_id, &period.period_id, &state.file_name, checksum, &request.user_id)
            .map_err(|e| {
                if e.is_unique_violation() {
                    ImportError::DuplicateImport {
                        period_id: period.period_id.clone(),
                        checksum: checksum.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;

        // Step 4: read, map, filter, parse, sign
        debug!("step 4: read");
        self.phase(state, PCT_READ, "import.phase.read");
        let grid = parser.parse(&request.file_path, None)?;
        self.check_cancelled()?;

        self.phase(state, PCT_MAPPING, "import.phase.mapping");
        let client_key = request.client_key.as_deref().unwrap_or(&settings.client_key);
        let (resolved, profile_matched) =
            resolve_mapping(tx, &grid, request.mapping_override.as_ref(), client_key, settings)?;
        state.mapping_warnings = resolved.warnings.clone();
        let unresolved = resolved.unresolved_required();
        if !unresolved.is_empty() {
            return Err(ImportError::MappingUnresolved {
                fields: unresolved.iter().map(|f| f.as_str().to_string()).collect(),
            });
        }
        let columns = resolved.mapping();
        debug!(
            profile_matched,
            positional = resolved.positional_fallback,
            mapped = columns.columns.len(),
            "mapping resolved"
        );
        check_formula_injection(&grid, &columns)?;

        self.phase(state, PCT_PARSE, "import.phase.parse");
        let mut parsed = parse_rows(&grid, &columns, request.pay_date);
        state.accepted = parsed.accepted.len();
        state.rejected = parsed.rejected.len();
        if !parsed.rejected.is_empty() {
            state.rejected_summary = Some(RejectedRowsSummary::from_rows(&parsed.rejected));
        }
        for (reason, count) in &parsed.warnings {
            debug!(reason = %reason, count, "row warning");
        }
        if parsed.accepted.is_empty() {
            return Err(ImportError::NoValidRows {
                rejected: parsed.rejected.len(),
            });
        }
        if request.apply_sign_policy {
            let policy = SignPolicy::new(SignPolicyRepository::new(tx).load_map()?, settings.default_sign);
            let changed = policy.apply(&mut parsed.accepted);
            debug!(changed, "sign policy applied");
        }
        self.check_cancelled()?;

        // Step 5: dimensions and staging
        debug!("step 5: dimensions + staging");
        self.phase(state, PCT_DIMENSIONS, "import.phase.dimensions");
        let (codes, posts) = DimensionRepository::new(tx).upsert(&dimensions_of(&parsed.accepted))?;
        debug!(codes, posts, "dimensions upserted");

        let staging: Vec<StagingRow> = parsed
            .accepted
            .iter()
            .map(|row| StagingRow {
                file_id: batch_id.to_string(),
                source_row_no: row.source_row_no as i64,
                pay_date: request.pay_date,
                raw: row.raw.clone(),
            })
            .collect();
        let transactions_repo = TransactionRepository::new(tx);
        let staged = transactions_repo.insert_staging(
            &staging,
            settings.chunk_size,
            self.chunk_hook(PCT_STAGING, "import.phase.staging", staging.len(), 1),
        )?;

        // Step 6: employees
        debug!("step 6: employees");
        let identities = distinct_identities(&parsed.accepted);
        let employees = EmployeeRepository::new(tx).upsert_many(
            &identities,
            self.chunk_hook(
                PCT_EMPLOYEES,
                "import.phase.employees",
                identities.len(),
                settings.chunk_size,
            ),
        )?;
        debug!(created = employees.created, updated = employees.updated, "employees upserted");

        // Step 7: transactions
        debug!("step 7: transactions");
        let mut lines = Vec::with_capacity(parsed.accepted.len());
        for row in &parsed.accepted {
            let employee_id = employees
                .ids
                .get(&row.identity.matricule_norm)
                .ok_or_else(|| {
                    ImportError::InternalError(format!("no employee id for {}", row.identity.matricule_norm))
                })?;
            lines.push(PayrollTransaction {
                transaction_id: Uuid::new_v4().to_string(),
                batch_id: batch_id.to_string(),
                employee_id: employee_id.clone(),
                period_id: period.period_id.clone(),
                pay_date: request.pay_date,
                pay_code: row.pay_code.clone(),
                budget_post: row.budget_post.clone(),
                pay_category: row.pay_category.clone(),
                job_category: row.job_category.clone(),
                amount_employee_cents: row.amount_cents,
                amount_employer_cents: row.employer_cents,
                source_file: state.file_name.clone(),
                source_row_no: row.source_row_no as i64,
            });
        }
        let inserted = transactions_repo.insert_transactions(
            &lines,
            settings.chunk_size,
            self.chunk_hook(PCT_TRANSACTIONS, "import.phase.transactions", lines.len(), 1),
        )?;
        self.check_cancelled()?;

        // Step 8: KPI
        debug!("step 8: kpi");
        self.phase(state, PCT_KPI, "import.phase.kpi");
        let kpi = KpiSnapshotService::recompute(tx, request.pay_date, Some(&period.period_id))?;

        // Step 9: close the batch, remember the mapping
        debug!("step 9: batch processed");
        BatchRepository::new(tx).mark_processed(batch_id, inserted)?;
        if request.save_profile {
            let options = serde_json::json!({
                "header_row_index": grid.header_row_index,
                "encoding": grid.encoding,
                "delimiter": grid.delimiter.map(String::from),
            });
            ProfileRepository::new(tx).upsert(
                client_key,
                &resolved.header_signature,
                &columns.to_header_map(&grid.headers),
                &options,
                resolved.overall_confidence(),
            )?;
        }
        self.check_cancelled()?;

        debug!(staged, inserted, "import transaction ready to commit");
        Ok(kpi)
    }

    /// Keeps an `error` batch row after the import transaction rolled back
    fn record_error_batch(&self, request: &ImportRequest, state: &RunState, err: &ImportError) {
        if !state.in_transaction || !err.records_error_batch() {
            return;
        }
        let (Some(batch_id), Some(period_id), Some(checksum)) =
            (&state.batch_id, &state.period_id, &state.checksum)
        else {
            return;
        };
        let written = self.store.with_write_tx(|tx| {
            BatchRepository::new(tx).insert_error(
                batch_id,
                period_id,
                &state.file_name,
                checksum,
                &request.user_id,
                &err.to_string(),
            )
        });
        if let Err(e) = written {
            warn!(error = %e, batch_id = %batch_id, "error batch row not written");
        }
    }

    /// Proposes a mapping for `path` without writing anything
    #[instrument(skip(self))]
    pub fn preview(&self, path: &Path, client_key: Option<&str>) -> ImportResult<MappingPreview> {
        let settings = self.config.ingest_settings()?;
        let parser = UniversalFileParser::new(settings.max_file_size_bytes, settings.sheet_name.clone());
        let grid = parser.parse(path, None)?;
        let client_key = client_key.unwrap_or(&settings.client_key);

        let (mapping, profile_matched) = self
            .store
            .with_conn(|conn| Ok(resolve_mapping(conn, &grid, None, client_key, &settings)))??;

        let sample_rows = grid
            .sample(PREVIEW_ROWS)
            .iter()
            .map(|row| {
                (0..grid.column_count())
                    .map(|c| row.cell(c).to_string())
                    .collect()
            })
            .collect();

        Ok(MappingPreview {
            original_headers: grid.original_headers.clone(),
            normalized_headers: grid.headers.clone(),
            unresolved_required: mapping.unresolved_required(),
            mapping,
            sample_rows,
            profile_matched,
        })
    }
}

#[async_trait]
impl PayrollImporter for IngestionEngine {
    async fn import_payroll_file(&self, request: ImportRequest) -> ImportEnvelope {
        let engine = self.clone();
        let pay_date = request.pay_date;
        let started = Instant::now();
        match tokio::task::spawn_blocking(move || engine.run_import(&request)).await {
            Ok(envelope) => envelope,
            Err(join_err) => {
                error!(error = %join_err, "import worker failed");
                let err = ImportError::InternalError(join_err.to_string());
                error_envelope(pay_date, RunState::default(), &err, started.elapsed().as_millis() as u64)
            }
        }
    }

    async fn preview_file(&self, path: PathBuf, client_key: Option<String>) -> ImportResult<MappingPreview> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.preview(&path, client_key.as_deref()))
            .await
            .map_err(|e| ImportError::InternalError(e.to_string()))?
    }

    fn cancel(&self) {
        info!("import cancellation requested");
        self.cancel.cancel();
    }
}

// ==========================================
// Helpers
// ==========================================

/// Override first, then a stored profile, then detection.
/// Returns whether a stored profile was used.
fn resolve_mapping(
    conn: &Connection,
    grid: &Grid,
    mapping_override: Option<&ColumnMapping>,
    client_key: &str,
    settings: &IngestSettings,
) -> ImportResult<(MappingResult, bool)> {
    let mapper = ColumnMapper::new(settings.accept_threshold, settings.warn_threshold);
    if let Some(mapping) = mapping_override {
        return Ok((mapper.from_mapping(&grid.headers, mapping, 1.0), false));
    }

    let signature = header_signature(&grid.headers);
    if let Some(profile) = ProfileRepository::new(conn).find(client_key, &signature)? {
        match ColumnMapping::from_header_map(&profile.mapping, &grid.headers) {
            Some(mapping) => {
                debug!(profile_id = %profile.profile_id, "stored profile applied");
                let confidence = profile.confidence.max(settings.accept_threshold);
                return Ok((mapper.from_mapping(&grid.headers, &mapping, confidence), true));
            }
            None => warn!(profile_id = %profile.profile_id, "stored profile does not fit these headers"),
        }
    }

    let sample = grid.sample(settings.sample_rows);
    Ok((mapper.detect(&grid.headers, &sample), false))
}

fn dimensions_of(rows: &[ParsedRow]) -> DimensionSet {
    let mut dims = DimensionSet::default();
    for row in rows {
        dims.add_pay_code(&row.pay_code, row.pay_code_label.as_deref(), row.pay_category.as_deref());
        if let Some(post) = row.budget_post.as_deref().filter(|p| !p.is_empty()) {
            dims.add_budget_post(post, row.budget_post_label.as_deref());
        }
    }
    dims
}

/// One identity per matricule_norm; a later row with a name refreshes it
fn distinct_identities(rows: &[ParsedRow]) -> Vec<EmployeeIdentity> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<EmployeeIdentity> = Vec::new();
    for row in rows {
        match index.get(row.identity.matricule_norm.as_str()) {
            Some(&i) if !row.identity.nom_complet.is_empty() => out[i] = row.identity.clone(),
            Some(_) => {}
            None => {
                index.insert(&row.identity.matricule_norm, out.len());
                out.push(row.identity.clone());
            }
        }
    }
    out
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn success_envelope(request: &ImportRequest, state: RunState, kpi: KpiSnapshot, duration_ms: u64) -> ImportEnvelope {
    let accepted = state.accepted.to_string();
    let rejected = state.rejected.to_string();
    ImportEnvelope {
        status: EnvelopeStatus::Success,
        batch_id: state.batch_id,
        period_id: state.period_id,
        rows_count: state.accepted,
        accepted_rows: state.accepted,
        rejected_rows: state.rejected,
        pay_date: request.pay_date,
        message: t_with_args(
            "import.success",
            &[("accepted", accepted.as_str()), ("rejected", rejected.as_str())],
        ),
        solution: None,
        kpi: Some(kpi),
        rejected_rows_summary: state.rejected_summary,
        mapping_warnings: state.mapping_warnings,
        error_kind: None,
        duration_ms,
    }
}

fn error_envelope(
    pay_date: chrono::NaiveDate,
    state: RunState,
    err: &ImportError,
    duration_ms: u64,
) -> ImportEnvelope {
    let user = err.user_message();
    // the rolled-back batch only survives as an error row
    let batch_id = if state.in_transaction && err.records_error_batch() {
        state.batch_id
    } else {
        None
    };
    ImportEnvelope {
        status: EnvelopeStatus::Error,
        batch_id,
        period_id: state.period_id,
        rows_count: 0,
        accepted_rows: state.accepted,
        rejected_rows: state.rejected,
        pay_date,
        message: user.message,
        solution: Some(user.solution),
        kpi: None,
        rejected_rows_summary: state.rejected_summary,
        mapping_warnings: state.mapping_warnings,
        error_kind: Some(err.kind().to_string()),
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionPool, DatabaseConfig};
    use crate::domain::types::{LogicalField, SignCategory};
    use crate::engine::period_coordinator::YearLocks;
    use crate::importer::progress::ProgressSink;
    use crate::repository::init_schema;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct Fixture {
        _db: NamedTempFile,
        store: PayrollStore,
        engine: IngestionEngine,
    }

    fn fixture() -> Fixture {
        let db = NamedTempFile::new().unwrap();
        let pool = ConnectionPool::open(DatabaseConfig::new(db.path().to_str().unwrap())).unwrap();
        let store = PayrollStore::new(Arc::new(pool));
        store.with_conn(|c| Ok(init_schema(c, false)?)).unwrap();
        let periods = PeriodCoordinator::new(store.clone(), Arc::new(YearLocks::new()));
        let settings = IngestSettings {
            chunk_size: 2,
            ..IngestSettings::default()
        };
        let engine = IngestionEngine::new(store.clone(), Arc::new(settings), periods);
        Fixture { _db: db, store, engine }
    }

    fn pay_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 28).unwrap()
    }

    fn header_line() -> String {
        LogicalField::CANONICAL_ORDER
            .iter()
            .map(|f| f.label_fr())
            .collect::<Vec<_>>()
            .join(";")
    }

    fn payroll_csv(lines: &[(&str, &str, &str, &str)]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{}", header_line()).unwrap();
        for (i, (matricule, name, code, amount)) in lines.iter().enumerate() {
            writeln!(
                file,
                "{};Cadres;C01;Analyste;2025-08-28;{};{};Gains;{};Salaire;P-100;Administration;{};12,50;0",
                i + 1,
                matricule,
                name,
                code,
                amount
            )
            .unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn count(store: &PayrollStore, sql: &str) -> i64 {
        store.query(sql, [], |r| r.get::<_, i64>(0)).unwrap()[0]
    }

    #[test]
    fn test_happy_path_loads_every_table() {
        let f = fixture();
        let file = payroll_csv(&[
            ("A100", "Roy, Luc", "100", "1 500,00"),
            ("A100", "Roy, Luc", "510", "(250,00)"),
            ("B200", "Gagnon, Marie", "100", "980,10"),
        ]);
        let envelope = f.engine.run_import(&ImportRequest::new(file.path(), pay_date(), "tester"));

        assert!(envelope.is_success(), "{:?}", envelope);
        assert_eq!(envelope.accepted_rows, 3);
        assert_eq!(envelope.rows_count, 3);
        assert_eq!(envelope.rejected_rows, 0);
        assert!(envelope.kpi.is_some());

        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM payroll_transaction"), 3);
        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM staging_row"), 3);
        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM employee"), 2);
        assert_eq!(
            count(&f.store, "SELECT COUNT(*) FROM import_batch WHERE status = 'processed'"),
            1
        );
        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM ingestion_profile"), 1);
        assert_eq!(
            count(&f.store, "SELECT SUM(amount_employee_cents) FROM payroll_transaction"),
            150_000 - 25_000 + 98_010
        );
    }

    #[test]
    fn test_second_import_of_same_file_is_duplicate() {
        let f = fixture();
        let file = payroll_csv(&[("A100", "Roy, Luc", "100", "10")]);
        let request = ImportRequest::new(file.path(), pay_date(), "tester");
        assert!(f.engine.run_import(&request).is_success());

        let second = f.engine.run_import(&request);
        assert!(!second.is_success());
        assert_eq!(second.error_kind.as_deref(), Some("duplicate_import"));
        assert!(second.batch_id.is_none());
        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM import_batch"), 1);
        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM payroll_transaction"), 1);
    }

    #[test]
    fn test_no_valid_rows_leaves_an_error_batch() {
        let f = fixture();
        let file = payroll_csv(&[("A100", "Roy, Luc", "100", "abc"), ("B200", "Gagnon", "100", "n/a")]);
        let envelope = f.engine.run_import(&ImportRequest::new(file.path(), pay_date(), "tester"));

        assert_eq!(envelope.error_kind.as_deref(), Some("no_valid_rows"));
        let summary = envelope.rejected_rows_summary.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.by_reason["invalid_amount"], 2);

        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM payroll_transaction"), 0);
        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM staging_row"), 0);
        assert_eq!(
            count(&f.store, "SELECT COUNT(*) FROM import_batch WHERE status = 'error'"),
            1
        );
    }

    #[test]
    fn test_closed_period_is_refused_without_batch() {
        let f = fixture();
        let period = f.engine.periods.ensure_period(pay_date()).unwrap();
        f.engine.periods.close_period(&period.period_id, "admin").unwrap();

        let file = payroll_csv(&[("A100", "Roy, Luc", "100", "10")]);
        let envelope = f.engine.run_import(&ImportRequest::new(file.path(), pay_date(), "tester"));
        assert_eq!(envelope.error_kind.as_deref(), Some("closed_period"));
        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM import_batch"), 0);
    }

    #[test]
    fn test_sign_policy_is_opt_in() {
        let f = fixture();
        f.store
            .with_conn(|c| SignPolicyRepository::new(c).set("510", SignCategory::Deduction))
            .unwrap();
        let file = payroll_csv(&[("A100", "Roy, Luc", "510", "250,00")]);
        let envelope = f.engine.run_import(
            &ImportRequest::new(file.path(), pay_date(), "tester").with_sign_policy(true),
        );
        assert!(envelope.is_success(), "{:?}", envelope);
        assert_eq!(
            count(&f.store, "SELECT amount_employee_cents FROM payroll_transaction"),
            -25_000
        );
    }

    struct CancelOnStaging {
        handle: CancelHandle,
        staging: String,
    }

    impl ProgressSink for CancelOnStaging {
        fn report(&self, _percent: u8, message: &str, _metrics: &BTreeMap<String, i64>) {
            if message == self.staging {
                self.handle.cancel();
            }
        }
    }

    #[test]
    fn test_cancel_rolls_back_everything() {
        let _guard = crate::i18n::tests::LOCALE_TEST_LOCK.lock().unwrap();
        crate::i18n::set_locale("fr");
        let f = fixture();
        let sink = CancelOnStaging {
            handle: f.engine.cancel_handle(),
            staging: t("import.phase.staging"),
        };
        let engine = f
            .engine
            .clone()
            .with_progress(ProgressReporter::with_sink(Arc::new(sink)));

        let file = payroll_csv(&[
            ("A100", "Roy, Luc", "100", "10"),
            ("B200", "Gagnon, Marie", "100", "20"),
            ("C300", "Tremblay, Ana", "100", "30"),
        ]);
        let envelope = engine.run_import(&ImportRequest::new(file.path(), pay_date(), "tester"));

        assert_eq!(envelope.error_kind.as_deref(), Some("cancelled"));
        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM staging_row"), 0);
        assert_eq!(count(&f.store, "SELECT COUNT(*) FROM import_batch"), 0);

        // the flag does not leak into the next run
        let file = payroll_csv(&[("D400", "Roy, Eve", "100", "10")]);
        assert!(f.engine.run_import(&ImportRequest::new(file.path(), pay_date(), "tester")).is_success());
    }

    #[test]
    fn test_preview_reports_profile_after_import() {
        let f = fixture();
        let file = payroll_csv(&[("A100", "Roy, Luc", "100", "10")]);

        let before = f.engine.preview(file.path(), None).unwrap();
        assert!(!before.profile_matched);
        assert!(before.unresolved_required.is_empty());
        assert_eq!(before.sample_rows.len(), 1);
        assert_eq!(before.original_headers.len(), 15);

        assert!(f.engine.run_import(&ImportRequest::new(file.path(), pay_date(), "tester")).is_success());
        let after = f.engine.preview(file.path(), None).unwrap();
        assert!(after.profile_matched);
    }

    #[test]
    fn test_distinct_identities_keeps_first_order() {
        let row = |m: &str, name: &str| ParsedRow {
            source_row_no: 2,
            identity: EmployeeIdentity::from_source(m, name),
            pay_code: "100".into(),
            pay_code_label: None,
            pay_category: None,
            budget_post: None,
            budget_post_label: None,
            job_category: None,
            amount_cents: 0,
            employer_cents: 0,
            raw: Default::default(),
        };
        let ids = distinct_identities(&[row("B2", "Roy"), row("A1", "Gagnon"), row("b2", "Roy, Luc"), row("A1", "")]);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].matricule_norm, "b2");
        assert_eq!(ids[0].nom_complet, "Roy, Luc");
        assert_eq!(ids[1].nom_complet, "Gagnon");
    }

    #[test]
    fn test_chunk_percent() {
        assert_eq!(chunk_percent((40, 15), 0, 10), 40);
        assert_eq!(chunk_percent((40, 15), 5, 10), 47);
        assert_eq!(chunk_percent((40, 15), 10, 10), 55);
        assert_eq!(chunk_percent((40, 15), 0, 0), 55);
    }
}
