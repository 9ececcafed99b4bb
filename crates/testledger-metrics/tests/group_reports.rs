use chrono::NaiveDate;
use testledger_core::auth::{AllowAll, DenyAll};
use testledger_core::engine::RecordingEngine;
use testledger_core::errors::{try_map_error, LedgerErrorKind};
use testledger_core::model::{
    Campaign, CaseSubmission, Judgment, ResultPayload, SubmitAction, TestContent,
};
use testledger_core::storage::Store;
use testledger_metrics::{forecast_for_group, progress_for_group};

const GROUP: i64 = 9;
const TID: &str = "TID-RPT";

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn seeded_store() -> Store {
    let store = Store::open_in_memory().unwrap();
    store.init_schema().unwrap();
    let layers = [("ui", "login"), ("ui", "login"), ("api", "auth"), ("api", "auth")];
    for (i, (first, second)) in layers.iter().enumerate() {
        store
            .put_content(&TestContent {
                group_id: GROUP,
                tid: TID.into(),
                case_no: i as i64 + 1,
                test_case: format!("case {}", i + 1),
                expected_value: "".into(),
                first_layer: (*first).into(),
                second_layer: (*second).into(),
                is_target: true,
            })
            .unwrap();
    }
    store
        .put_campaign(
            GROUP,
            &Campaign {
                start_date: date("2026-03-01"),
                end_date: date("2026-03-31"),
                ng_plan_count: 20,
            },
        )
        .unwrap();
    store
}

fn record(store: &Store, case_no: i64, judgment: Judgment, day: &str) {
    let engine = RecordingEngine::new(store.clone());
    engine
        .submit_batch(
            &AllowAll,
            "saburo",
            GROUP,
            TID,
            &[CaseSubmission {
                case_no,
                action: SubmitAction::Create,
                payload: ResultPayload {
                    result: "ran".into(),
                    judgment: Some(judgment),
                    execution_date: Some(date(day)),
                    executor: "Saburo".into(),
                    ..Default::default()
                },
                evidence: vec![],
            }],
        )
        .unwrap();
}

#[test]
fn progress_reflects_recorded_judgments() {
    let store = seeded_store();
    record(&store, 1, Judgment::Ok, "2026-03-02");
    record(&store, 2, Judgment::Ng, "2026-03-02");

    let rows = progress_for_group(&store, &AllowAll, "saburo", GROUP).unwrap();
    assert_eq!(rows.len(), 2);

    // ordered ascending by labels, so api/auth first
    let api = &rows[0];
    assert_eq!(api.first_layer, "api");
    assert_eq!(api.total, 2);
    assert_eq!(api.completed, 0);
    assert_eq!(api.not_started, 2);

    let ui = &rows[1];
    assert_eq!(ui.first_layer, "ui");
    assert_eq!(ui.completed, 2);
    assert_eq!(ui.ok, 1);
    assert_eq!(ui.ng, 1);
    assert!((ui.progress_rate - 1.0).abs() < 1e-9);
}

#[test]
fn fresh_group_has_rows_but_no_completions_and_no_forecast_points() {
    let store = seeded_store();

    let rows = progress_for_group(&store, &AllowAll, "saburo", GROUP).unwrap();
    assert!(rows.iter().all(|r| r.total > 0 && r.completed == 0));

    let report =
        forecast_for_group(&store, &AllowAll, "saburo", GROUP, date("2026-03-15")).unwrap();
    assert!(report.points.is_empty());
}

#[test]
fn forecast_rolls_the_ledger_up_by_execution_date() {
    let store = seeded_store();
    record(&store, 1, Judgment::Ok, "2026-03-02");
    record(&store, 2, Judgment::Ng, "2026-03-02");
    record(&store, 3, Judgment::Ok, "2026-03-05");

    let report =
        forecast_for_group(&store, &AllowAll, "saburo", GROUP, date("2026-03-31")).unwrap();
    assert_eq!(report.ng_plan_count, 20);
    assert_eq!(report.points.len(), 2);

    let first = &report.points[0];
    assert_eq!(first.date, date("2026-03-02"));
    assert_eq!(first.daily_defect_count, 1);
    assert_eq!(first.cumulative_defect_count, 1);
    assert_eq!(first.actual_remaining_tests, 4 - 1);

    let second = &report.points[1];
    assert_eq!(second.date, date("2026-03-05"));
    assert_eq!(second.daily_defect_count, 0);
    assert_eq!(second.cumulative_defect_count, 1);
    assert_eq!(second.actual_remaining_tests, 4 - 2);
    assert!(second.predicted_defects >= first.predicted_defects);
}

#[test]
fn forecast_without_a_campaign_is_a_validation_error() {
    let store = Store::open_in_memory().unwrap();
    store.init_schema().unwrap();
    let err =
        forecast_for_group(&store, &AllowAll, "saburo", 42, date("2026-03-15")).unwrap_err();
    assert_eq!(
        try_map_error(&err).unwrap().kind,
        LedgerErrorKind::Validation
    );
}

#[test]
fn reports_are_gated() {
    let store = seeded_store();
    let err = progress_for_group(&store, &DenyAll, "saburo", GROUP).unwrap_err();
    assert_eq!(
        try_map_error(&err).unwrap().kind,
        LedgerErrorKind::Permission
    );
    let err =
        forecast_for_group(&store, &DenyAll, "saburo", GROUP, date("2026-03-15")).unwrap_err();
    assert_eq!(
        try_map_error(&err).unwrap().kind,
        LedgerErrorKind::Permission
    );
}
