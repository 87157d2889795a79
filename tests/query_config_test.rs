// ==========================================
// Query and configuration API tests
// ==========================================

mod test_helpers;

use payroll_ingest::config::config_keys;
use payroll_ingest::domain::query::{EmployeeFilter, TransactionFilter};
use payroll_ingest::domain::{EmployeeStatus, ImportRequest};
use payroll_ingest::importer::ImportError;
use payroll_ingest::{AppState, SignCategory};
use test_helpers::{create_test_state, date, scalar, PayLine, PayrollCsv};

async fn seed(state: &AppState) {
    let august = PayrollCsv::new("2025-08-28")
        .line(PayLine::new("A100", "Roy, Luc", "100", "3 000,00").post("P-100"))
        .line(PayLine::new("A100", "Roy, Luc", "510", "-150,00").post("P-100"))
        .line(PayLine::new("B200", "Gagnon, Marie", "100", "2 500,00").post("P-200"))
        .line(PayLine::new("C300", "Tremblay, Éric", "100", "1 800,00").post("P-200"))
        .write();
    let september = PayrollCsv::new("2025-09-11")
        .line(PayLine::new("A100", "Roy, Luc", "100", "3 100,00"))
        .write();

    for (file, d) in [(&august, date(2025, 8, 28)), (&september, date(2025, 9, 11))] {
        let envelope = state
            .import_api
            .import_file(ImportRequest::new(file.path(), d, "paie"))
            .await
            .unwrap();
        assert!(envelope.is_success(), "{:?}", envelope);
    }
}

#[tokio::test]
async fn test_kpis_default_to_latest_period() {
    let (_db, state) = create_test_state();
    seed(&state).await;

    let latest = state.query_api.get_kpis(None).unwrap();
    assert_eq!(latest.pay_date, date(2025, 9, 11));
    assert_eq!(latest.cards.nb_employes, 1);

    let august = state.query_api.get_kpis(Some(date(2025, 8, 28))).unwrap();
    assert_eq!(august.cards.nb_transactions, 4);
    assert_eq!(august.cards.nb_employes, 3);
    assert_eq!(august.cards.masse_salariale_cents, 730_000);
    assert_eq!(august.cards.deductions_cents, -15_000);
    assert_eq!(august.cards.salaire_net_cents, 715_000);

    let details = state.query_api.get_kpi_details(Some(date(2025, 8, 28))).unwrap();
    let posts: Vec<_> = details.by_budget_post.iter().map(|r| r.key.as_str()).collect();
    assert!(posts.contains(&"P-100") && posts.contains(&"P-200"), "{:?}", posts);
    let code_100 = details.by_pay_code.iter().find(|r| r.key == "100").unwrap();
    assert_eq!(code_100.lines, 3);
    assert_eq!(code_100.total_cents, 730_000);
}

#[test]
fn test_kpis_without_any_period_is_not_found() {
    let (_db, state) = create_test_state();
    let err = state.query_api.get_kpis(None).unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn test_employee_listing_and_table() {
    let (_db, state) = create_test_state();
    seed(&state).await;

    let all = state
        .query_api
        .list_employees(None, &EmployeeFilter::default(), 1, 2)
        .unwrap();
    assert_eq!(all.total, 3);
    assert_eq!(all.items.len(), 2);

    let search = EmployeeFilter {
        search: Some("gagnon".to_string()),
        ..EmployeeFilter::default()
    };
    let found = state.query_api.list_employees(None, &search, 1, 50).unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].matricule, "B200");
    assert_eq!(found.items[0].statut, EmployeeStatus::Active);

    let filter = TransactionFilter {
        pay_date: Some(date(2025, 8, 28)),
        matricule: Some("A100".to_string()),
        ..TransactionFilter::default()
    };
    let table = state.query_api.get_table(0, 10, &filter).unwrap();
    assert_eq!(table.total, 2);
    assert!(table.rows.iter().all(|r| r.matricule == "A100"));

    // limit is clamped
    let page = state.query_api.get_table(0, 0, &TransactionFilter::default()).unwrap();
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.total, 5);
}

#[tokio::test]
async fn test_deactivation_refused_while_referenced() {
    let (_db, state) = create_test_state();
    seed(&state).await;

    let employee_id: String = state
        .store
        .query("SELECT employee_id FROM employee WHERE matricule_norm = 'b200'", [], |r| r.get(0))
        .unwrap()
        .remove(0);
    let err = state.query_api.deactivate_employee(&employee_id).unwrap_err();
    assert_eq!(err.kind(), "constraint_violation");

    let missing = state.query_api.deactivate_employee("nope").unwrap_err();
    assert_eq!(missing.kind(), "not_found");
}

#[tokio::test]
async fn test_sign_policy_only_applies_on_request() {
    let (_db, state) = create_test_state();
    state.config_api.set_sign_policy("510", SignCategory::Deduction).unwrap();
    state.config_api.set_sign_policy("100", SignCategory::Gain).unwrap();
    assert_eq!(state.config_api.list_sign_policy().unwrap().len(), 2);
    assert!(state.config_api.set_sign_policy(" ", SignCategory::Gain).is_err());

    let file = PayrollCsv::new("2025-08-28")
        .line(PayLine::new("A100", "Roy, Luc", "100", "-1 000,00"))
        .line(PayLine::new("A100", "Roy, Luc", "510", "250,00"))
        .write();

    let plain = state
        .import_api
        .import_file(ImportRequest::new(file.path(), date(2025, 8, 28), "paie"))
        .await
        .unwrap();
    assert!(plain.is_success());
    assert_eq!(
        scalar(&state, "SELECT amount_employee_cents FROM payroll_transaction WHERE pay_code = '510'"),
        25_000
    );

    // same file for another date, with the policy
    let signed = state
        .import_api
        .import_file(
            ImportRequest::new(file.path(), date(2025, 9, 11), "paie").with_sign_policy(true),
        )
        .await
        .unwrap();
    assert!(signed.is_success(), "{:?}", signed);
    assert_eq!(
        scalar(
            &state,
            "SELECT amount_employee_cents FROM payroll_transaction
             WHERE pay_code = '510' AND pay_date = '2025-09-11'"
        ),
        -25_000
    );
    assert_eq!(
        scalar(
            &state,
            "SELECT amount_employee_cents FROM payroll_transaction
             WHERE pay_code = '100' AND pay_date = '2025-09-11'"
        ),
        100_000
    );
}

#[tokio::test]
async fn test_profile_is_reused_for_same_headers() {
    let (_db, state) = create_test_state();
    let first = PayrollCsv::new("2025-08-28").employees(3, "100,00").write();
    let envelope = state
        .import_api
        .import_file(ImportRequest::new(first.path(), date(2025, 8, 28), "paie"))
        .await
        .unwrap();
    assert!(envelope.is_success());
    assert_eq!(scalar(&state, "SELECT COUNT(*) FROM ingestion_profile"), 1);

    let second = PayrollCsv::new("2025-09-11").employees(2, "200,00").write();
    let preview = state.import_api.preview(second.path().to_path_buf(), None).await.unwrap();
    assert!(preview.profile_matched);

    let other_client = state
        .import_api
        .preview(second.path().to_path_buf(), Some("autre-client".to_string()))
        .await
        .unwrap();
    assert!(!other_client.profile_matched);
}

#[test]
fn test_config_values_round_trip_and_fall_back() {
    let (_db, state) = create_test_state();
    let defaults = state.config_api.get_settings().unwrap();

    state
        .config_api
        .set_config_value(config_keys::CHUNK_SIZE, "250")
        .unwrap();
    state
        .config_api
        .set_config_value(config_keys::ACCEPT_THRESHOLD, "pas un nombre")
        .unwrap();

    let settings = state.config_api.get_settings().unwrap();
    assert_eq!(settings.chunk_size, 250);
    assert_eq!(settings.accept_threshold, defaults.accept_threshold);
    assert_eq!(
        state.config_api.get_config_value(config_keys::CHUNK_SIZE).unwrap().as_deref(),
        Some("250")
    );

    let snapshot: serde_json::Value =
        serde_json::from_str(&state.config_api.get_config_snapshot().unwrap()).unwrap();
    assert_eq!(snapshot[config_keys::CHUNK_SIZE], "250");
}

#[test]
fn test_unknown_period_operations_are_translated() {
    let (_db, state) = create_test_state();
    let err = state.period_api.close_period("missing", "controleur").unwrap_err();
    assert_eq!(err.kind(), "period_not_found");
    let msg = err.user_message();
    assert!(!msg.message.is_empty());
    assert!(!msg.solution.is_empty());

    let err: payroll_ingest::api::ApiError = ImportError::Cancelled.into();
    assert_eq!(err.kind(), "cancelled");
}
