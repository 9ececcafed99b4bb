use testledger_core::auth::{AllowAll, DenyAll};
use testledger_core::engine::RecordingEngine;
use testledger_core::errors::{try_map_error, LedgerErrorKind};
use testledger_core::model::{
    CaseSubmission, EvidenceRef, Judgment, ResultPayload, SubmitAction, TestContent,
};
use testledger_core::storage::Store;
use testledger_core::view::conduct_view;

const GROUP: i64 = 2;
const TID: &str = "TID-VIEW";

fn seeded_store() -> Store {
    let store = Store::open_in_memory().unwrap();
    store.init_schema().unwrap();
    for case_no in 1..=2 {
        store
            .put_content(&TestContent {
                group_id: GROUP,
                tid: TID.into(),
                case_no,
                test_case: format!("case {}", case_no),
                expected_value: "".into(),
                first_layer: "ui".into(),
                second_layer: "settings".into(),
                is_target: true,
            })
            .unwrap();
    }
    store
}

fn submit(store: &Store, case_no: i64, action: SubmitAction, judgment: Judgment) {
    submit_with_evidence(store, case_no, action, judgment, vec![]);
}

fn submit_with_evidence(
    store: &Store,
    case_no: i64,
    action: SubmitAction,
    judgment: Judgment,
    evidence: Vec<EvidenceRef>,
) {
    let engine = RecordingEngine::new(store.clone());
    engine
        .submit_batch(
            &AllowAll,
            "jiro",
            GROUP,
            TID,
            &[CaseSubmission {
                case_no,
                action,
                payload: ResultPayload {
                    result: "ran".into(),
                    judgment: Some(judgment),
                    executor: "Jiro".into(),
                    ..Default::default()
                },
                evidence,
            }],
        )
        .unwrap();
}

#[test]
fn histories_come_back_newest_first_with_one_latest_flag() {
    let store = seeded_store();
    submit(&store, 1, SubmitAction::Create, Judgment::Ng);
    submit(&store, 1, SubmitAction::ReExecute, Judgment::Ng);
    submit(&store, 1, SubmitAction::ReExecute, Judgment::Ok);
    submit(&store, 2, SubmitAction::Create, Judgment::Ok);

    let view = conduct_view(&store, &AllowAll, "jiro", GROUP, TID).unwrap();
    assert_eq!(view.cases.len(), 2);

    let case1 = &view.cases[0];
    let counts: Vec<i64> = case1.history.iter().map(|e| e.history_count).collect();
    assert_eq!(counts, vec![3, 2, 1]);
    let latest: Vec<bool> = case1.history.iter().map(|e| e.is_latest).collect();
    assert_eq!(latest, vec![true, false, false]);
    assert_eq!(case1.history[0].payload.judgment, Some(Judgment::Ok));
    assert_eq!(
        case1.current.as_ref().unwrap().payload.judgment,
        Some(Judgment::Ok)
    );

    assert_eq!(view.latest_display_history_count, 3);
}

#[test]
fn display_count_steps_back_past_a_trailing_exclusion() {
    let store = seeded_store();
    submit(&store, 1, SubmitAction::Create, Judgment::Ng);
    submit(&store, 1, SubmitAction::ReExecute, Judgment::Excluded);

    let view = conduct_view(&store, &AllowAll, "jiro", GROUP, TID).unwrap();
    // the newest run only acknowledges an exclusion, so show run 1
    assert_eq!(view.latest_display_history_count, 1);
}

#[test]
fn a_sole_exclusion_run_is_still_shown() {
    let store = seeded_store();
    submit(&store, 1, SubmitAction::Create, Judgment::Excluded);

    let view = conduct_view(&store, &AllowAll, "jiro", GROUP, TID).unwrap();
    // nothing earlier to fall back to
    assert_eq!(view.latest_display_history_count, 1);
}

#[test]
fn untouched_cases_appear_with_empty_history() {
    let store = seeded_store();
    submit(&store, 1, SubmitAction::Create, Judgment::Ok);

    let view = conduct_view(&store, &AllowAll, "jiro", GROUP, TID).unwrap();
    let case2 = &view.cases[1];
    assert_eq!(case2.content.case_no, 2);
    assert!(case2.current.is_none());
    assert!(case2.history.is_empty());
}

#[test]
fn evidence_rides_along_with_its_entry() {
    let store = seeded_store();
    submit_with_evidence(
        &store,
        1,
        SubmitAction::Create,
        Judgment::Ng,
        vec![EvidenceRef {
            evidence_no: 1,
            name: "crash.png".into(),
            path: "evidences/2/TID-VIEW/1_1_1_0.png".into(),
            digest: "".into(),
        }],
    );
    submit(&store, 1, SubmitAction::ReExecute, Judgment::Ok);

    let view = conduct_view(&store, &AllowAll, "jiro", GROUP, TID).unwrap();
    let case1 = &view.cases[0];
    assert!(case1.history[0].evidence.is_empty());
    assert_eq!(case1.history[1].evidence.len(), 1);
    assert_eq!(case1.history[1].evidence[0].name, "crash.png");
}

#[test]
fn view_is_gated() {
    let store = seeded_store();
    let err = conduct_view(&store, &DenyAll, "jiro", GROUP, TID).unwrap_err();
    assert_eq!(
        try_map_error(&err).unwrap().kind,
        LedgerErrorKind::Permission
    );
}
