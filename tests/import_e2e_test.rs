// ==========================================
// Import end-to-end tests
// ==========================================
// Full path: AppState -> ImportApi -> IngestionEngine -> SQLite
// ==========================================

mod test_helpers;

use payroll_ingest::db::DatabaseConfig;
use payroll_ingest::domain::{EnvelopeStatus, ImportRequest};
use payroll_ingest::importer::{ChannelProgress, ProgressReporter};
use payroll_ingest::{i18n, logging};
use payroll_ingest::AppState;
use std::sync::Arc;
use tempfile::NamedTempFile;
use test_helpers::{create_test_state, date, fixture_path, scalar, PayLine, PayrollCsv};

const XLSX_FIXTURE: &str = "paie_2025-08-28.xlsx";

#[tokio::test]
async fn test_xlsx_happy_path() {
    logging::init_test();
    let (_db, state) = create_test_state();
    let pay_date = date(2025, 8, 28);

    let envelope = state
        .import_api
        .import_file(ImportRequest::new(fixture_path(XLSX_FIXTURE), pay_date, "analyste"))
        .await
        .expect("import call");

    assert_eq!(envelope.status, EnvelopeStatus::Success, "{:?}", envelope);
    assert_eq!(envelope.accepted_rows, 5);
    assert_eq!(envelope.rejected_rows, 0);
    assert!(envelope.batch_id.is_some());

    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM import_batch"), 1);
    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM payroll_transaction"), 5);
    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM employee"), 5);
    assert_eq!(
        scalar(&state, "SELECT SUM(amount_employee_cents) FROM payroll_transaction"),
        2_010_000
    );
    assert_eq!(
        scalar(&state, "SELECT SUM(amount_employer_cents) FROM payroll_transaction"),
        162_400
    );

    let kpi = envelope.kpi.expect("kpi snapshot in envelope");
    assert_eq!(kpi.period, "2025-08-28");
    assert_eq!(kpi.cards.nb_employes, 5);
    assert_eq!(kpi.cards.salaire_net_cents, 2_010_000);

    let summary = state.query_api.get_kpis(Some(pay_date)).expect("kpis");
    assert!(summary.from_snapshot);
    assert_eq!(summary.cards.nb_employes, 5);
}

#[tokio::test]
async fn test_duplicate_file_is_rejected_without_new_batch() {
    let (_db, state) = create_test_state();
    let request = ImportRequest::new(fixture_path(XLSX_FIXTURE), date(2025, 8, 28), "analyste");

    let first = state.import_api.import_file(request.clone()).await.unwrap();
    assert!(first.is_success());

    let second = state.import_api.import_file(request).await.unwrap();
    assert_eq!(second.status, EnvelopeStatus::Error);
    assert_eq!(second.error_kind.as_deref(), Some("duplicate_import"));

    assert_eq!(second.message, "Ce fichier a déjà été importé pour cette période");
    assert!(second.solution.is_some());

    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM import_batch"), 1);
    assert_eq!(
        scalar(&state, "SELECT COUNT(*) FROM import_batch WHERE status = 'processed'"),
        1
    );
    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM payroll_transaction"), 5);
}

#[tokio::test]
async fn test_accounting_negative_amount() {
    let (_db, state) = create_test_state();
    let csv = PayrollCsv::new("2025-08-28")
        .line(PayLine::new("A100", "Roy, Luc", "100", "2 000,00"))
        .line(PayLine::new("A100", "Roy, Luc", "DEDUC", "(1 234,56)"))
        .write();

    let envelope = state
        .import_api
        .import_file(ImportRequest::new(csv.path(), date(2025, 8, 28), "analyste"))
        .await
        .unwrap();
    assert!(envelope.is_success(), "{:?}", envelope);

    assert_eq!(
        scalar(
            &state,
            "SELECT amount_employee_cents FROM payroll_transaction WHERE pay_code = 'DEDUC'"
        ),
        -123_456
    );
}

#[tokio::test]
async fn test_closed_period_refuses_import() {
    let (_db, state) = create_test_state();
    let pay_date = date(2025, 8, 28);
    let period = state.period_api.ensure_period(pay_date).unwrap();
    state.period_api.close_period(&period.period_id, "controleur").unwrap();

    let envelope = state
        .import_api
        .import_file(ImportRequest::new(fixture_path(XLSX_FIXTURE), pay_date, "analyste"))
        .await
        .unwrap();

    assert_eq!(envelope.status, EnvelopeStatus::Error);
    assert_eq!(envelope.error_kind.as_deref(), Some("closed_period"));
    assert_eq!(envelope.message, "Période fermée");
    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM payroll_transaction"), 0);
    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM staging_row"), 0);
    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM import_batch"), 0);

    // reopening allows the load again
    state.period_api.reopen_period(&period.period_id).unwrap();
    let retry = state
        .import_api
        .import_file(ImportRequest::new(fixture_path(XLSX_FIXTURE), pay_date, "analyste"))
        .await
        .unwrap();
    assert!(retry.is_success(), "{:?}", retry);
}

#[tokio::test]
async fn test_rejected_rows_are_reported_not_loaded() {
    let (_db, state) = create_test_state();
    let csv = PayrollCsv::new("2025-08-28")
        .line(PayLine::new("A100", "Roy, Luc", "100", "1 500,00"))
        .line(PayLine::new("", "Sans matricule", "100", "75,00"))
        .line(PayLine::new("B200", "Gagnon, Marie", "100", "mille"))
        .write();

    let envelope = state
        .import_api
        .import_file(ImportRequest::new(csv.path(), date(2025, 8, 28), "analyste"))
        .await
        .unwrap();

    assert!(envelope.is_success(), "{:?}", envelope);
    assert_eq!(envelope.accepted_rows, 1);
    assert_eq!(envelope.rejected_rows, 2);
    let summary = envelope.rejected_rows_summary.expect("rejected summary");
    assert_eq!(summary.total, 2);
    assert_eq!(summary.by_reason.get("missing_required"), Some(&1));
    assert_eq!(summary.by_reason.get("invalid_amount"), Some(&1));
    // field-level detail stays on the row
    let missing = summary.sample.iter().find(|r| r.row_no == 3).expect("row 3 rejected");
    assert_eq!(missing.reasons, vec!["missing_required:matricule".to_string()]);

    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM payroll_transaction"), 1);
    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM employee"), 1);
}

#[tokio::test]
async fn test_progress_events_are_monotonic() {
    let db = NamedTempFile::new().unwrap();
    let (sink, mut rx) = ChannelProgress::new();
    let state = AppState::with_progress(
        DatabaseConfig::new(db.path().to_str().unwrap()),
        ProgressReporter::with_sink(Arc::new(sink)),
    )
    .unwrap();

    let envelope = state
        .import_api
        .import_file(ImportRequest::new(fixture_path(XLSX_FIXTURE), date(2025, 8, 28), "analyste"))
        .await
        .unwrap();
    assert!(envelope.is_success());

    let mut percents = Vec::new();
    while let Ok(event) = rx.try_recv() {
        percents.push(event.percent);
    }
    assert!(percents.len() >= 5, "{:?}", percents);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
    assert_eq!(percents.last(), Some(&100));
}

#[tokio::test]
async fn test_state_defaults_user_messages_to_french() {
    let (_db, state) = create_test_state();
    assert_eq!(i18n::current_locale(), "fr");

    let envelope = state
        .import_api
        .import_file(ImportRequest::new("/nonexistent/paie.csv", date(2025, 8, 28), "analyste"))
        .await
        .unwrap();
    assert_eq!(envelope.error_kind.as_deref(), Some("file_not_found"));
    assert!(envelope.message.contains("introuvable"), "{}", envelope.message);
}

#[tokio::test]
async fn test_preview_does_not_write() {
    let (_db, state) = create_test_state();
    let preview = state
        .import_api
        .preview(fixture_path(XLSX_FIXTURE), None)
        .await
        .expect("preview");

    assert!(preview.unresolved_required.is_empty(), "{:?}", preview.unresolved_required);
    assert_eq!(preview.original_headers.len(), 15);
    assert!(!preview.sample_rows.is_empty());
    assert!(!preview.profile_matched);

    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM import_batch"), 0);
    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM pay_period"), 0);
}

#[tokio::test]
async fn test_import_validates_request() {
    let (_db, state) = create_test_state();
    let err = state
        .import_api
        .import_file(ImportRequest::new(fixture_path(XLSX_FIXTURE), date(2025, 8, 28), "  "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");

    let missing = state
        .import_api
        .import_file(ImportRequest::new("/nonexistent/paie.xlsx", date(2025, 8, 28), "analyste"))
        .await
        .unwrap();
    assert_eq!(missing.error_kind.as_deref(), Some("file_not_found"));
}
