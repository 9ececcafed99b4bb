use sha2::{Digest, Sha256};
use std::sync::Arc;
use testledger_core::auth::{AllowAll, DenyAll};
use testledger_core::engine::RecordingEngine;
use testledger_core::errors::{try_map_error, LedgerErrorKind};
use testledger_core::evidence::{EvidenceRegistry, LocalBlobStore};
use testledger_core::model::{
    CaseKey, CaseSubmission, Judgment, ResultPayload, SubmitAction, TestContent,
};
use testledger_core::storage::Store;

const GROUP: i64 = 4;
const TID: &str = "TID-EV";

struct Fixture {
    store: Store,
    registry: EvidenceRegistry,
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let store = Store::open_in_memory().unwrap();
    store.init_schema().unwrap();
    store
        .put_content(&TestContent {
            group_id: GROUP,
            tid: TID.into(),
            case_no: 1,
            test_case: "upload check".into(),
            expected_value: "file accepted".into(),
            first_layer: "api".into(),
            second_layer: "files".into(),
            is_target: true,
        })
        .unwrap();
    let registry = EvidenceRegistry::new(
        store.clone(),
        Arc::new(LocalBlobStore::new(root.clone())),
    );
    Fixture {
        store,
        registry,
        _dir: dir,
        root,
    }
}

fn record_execution(store: &Store, action: SubmitAction, judgment: Judgment) {
    let engine = RecordingEngine::new(store.clone());
    engine
        .submit_batch(
            &AllowAll,
            "hanako",
            GROUP,
            TID,
            &[CaseSubmission {
                case_no: 1,
                action,
                payload: ResultPayload {
                    result: "ran".into(),
                    judgment: Some(judgment),
                    executor: "Hanako".into(),
                    ..Default::default()
                },
                evidence: vec![],
            }],
        )
        .unwrap();
}

#[test]
fn attach_requires_a_recorded_execution() {
    let fx = fixture();
    let key = CaseKey::new(GROUP, TID, 1);

    let err = fx
        .registry
        .attach(&AllowAll, "hanako", &key, 1, "shot.png", b"pixels")
        .unwrap_err();
    assert_eq!(
        try_map_error(&err).unwrap().kind,
        LedgerErrorKind::Validation
    );

    let err = fx
        .registry
        .attach(&AllowAll, "hanako", &key, 0, "shot.png", b"pixels")
        .unwrap_err();
    assert_eq!(
        try_map_error(&err).unwrap().kind,
        LedgerErrorKind::Validation
    );
}

#[test]
fn attach_numbers_globally_across_history_counts() {
    let fx = fixture();
    let key = CaseKey::new(GROUP, TID, 1);

    record_execution(&fx.store, SubmitAction::Create, Judgment::Ng);
    let a = fx
        .registry
        .attach(&AllowAll, "hanako", &key, 1, "crash.png", b"one")
        .unwrap();
    let b = fx
        .registry
        .attach(&AllowAll, "hanako", &key, 1, "log.txt", b"two")
        .unwrap();
    assert_eq!(a.evidence_no, 1);
    assert_eq!(b.evidence_no, 2);

    // the counter does not restart at the next execution
    record_execution(&fx.store, SubmitAction::ReExecute, Judgment::Ok);
    let c = fx
        .registry
        .attach(&AllowAll, "hanako", &key, 2, "fixed.png", b"three")
        .unwrap();
    assert_eq!(c.evidence_no, 3);

    // blob landed on disk, digest pins the bytes
    assert!(fx.root.join(&c.path).exists());
    assert_eq!(c.digest, hex::encode(Sha256::digest(b"three")));
    assert!(c.path.starts_with(&format!("evidences/{}/{}/", GROUP, TID)));
}

#[test]
fn attach_rejects_a_history_count_that_was_never_reached() {
    let fx = fixture();
    let key = CaseKey::new(GROUP, TID, 1);

    record_execution(&fx.store, SubmitAction::Create, Judgment::Ok);
    let err = fx
        .registry
        .attach(&AllowAll, "hanako", &key, 2, "late.png", b"bytes")
        .unwrap_err();
    assert_eq!(
        try_map_error(&err).unwrap().kind,
        LedgerErrorKind::Validation
    );
}

#[test]
fn detach_removes_the_row_and_the_blob() {
    let fx = fixture();
    let key = CaseKey::new(GROUP, TID, 1);

    record_execution(&fx.store, SubmitAction::Create, Judgment::Ng);
    let rec = fx
        .registry
        .attach(&AllowAll, "hanako", &key, 1, "crash.png", b"pixels")
        .unwrap();
    assert!(fx.root.join(&rec.path).exists());

    fx.registry
        .detach(&AllowAll, "hanako", &key, 1, rec.evidence_no)
        .unwrap();
    assert!(!fx.root.join(&rec.path).exists());
    assert!(fx.store.evidence_for_history(&key, 1).unwrap().is_empty());

    // detaching again fails the lookup, not the blob delete
    let err = fx
        .registry
        .detach(&AllowAll, "hanako", &key, 1, rec.evidence_no)
        .unwrap_err();
    assert_eq!(
        try_map_error(&err).unwrap().kind,
        LedgerErrorKind::Validation
    );
}

#[test]
fn gate_blocks_attach_and_detach() {
    let fx = fixture();
    let key = CaseKey::new(GROUP, TID, 1);
    record_execution(&fx.store, SubmitAction::Create, Judgment::Ok);

    let err = fx
        .registry
        .attach(&DenyAll, "hanako", &key, 1, "shot.png", b"pixels")
        .unwrap_err();
    assert_eq!(
        try_map_error(&err).unwrap().kind,
        LedgerErrorKind::Permission
    );
    let err = fx
        .registry
        .detach(&DenyAll, "hanako", &key, 1, 1)
        .unwrap_err();
    assert_eq!(
        try_map_error(&err).unwrap().kind,
        LedgerErrorKind::Permission
    );
}
