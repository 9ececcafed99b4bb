use crate::auth::AccessGate;
use crate::errors::LedgerError;
use crate::model::{CaseKey, CaseSubmission, EvidenceRecord, SubmitAction};
use crate::storage::{store, Store};
use rusqlite::Transaction;
use std::collections::HashSet;
use tracing::{debug, info};

/// The write path of the ledger. Accepts a batch of per-case submissions and
/// applies the create / update / re-execute state machine across the result
/// store, the history ledger and the evidence registry in one transaction.
pub struct RecordingEngine {
    store: Store,
}

/// A validated transition, planned before any write happens.
struct Transition<'a> {
    key: CaseKey,
    submission: &'a CaseSubmission,
    /// History count the transition writes at (1 for create, H for update,
    /// H+1 for re-execute).
    target_history_count: i64,
    version: i64,
    insert_result_row: bool,
    insert_history_row: bool,
}

impl RecordingEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Whole-batch semantics: any submission failing validation or
    /// persistence aborts the entire batch; readers never see partial state.
    pub fn submit_batch(
        &self,
        gate: &dyn AccessGate,
        user: &str,
        group_id: i64,
        tid: &str,
        submissions: &[CaseSubmission],
    ) -> anyhow::Result<()> {
        if !gate.can_record(user, group_id) {
            return Err(LedgerError::permission().into());
        }

        validate_shape(submissions)?;

        info!(group_id, tid, cases = submissions.len(), "submit batch");

        self.store.with_transaction(|tx| {
            // Pass 1: read state and validate every submission before any
            // write, so a bad entry rejects the batch with the ledger
            // untouched even without relying on rollback.
            let mut transitions = Vec::with_capacity(submissions.len());
            for submission in submissions {
                transitions.push(plan_transition(tx, group_id, tid, submission)?);
            }

            // Pass 2: apply.
            for t in &transitions {
                apply_transition(tx, t)?;
            }
            Ok(())
        })
    }
}

fn validate_shape(submissions: &[CaseSubmission]) -> anyhow::Result<()> {
    if submissions.is_empty() {
        return Err(LedgerError::validation("batch contains no submissions").into());
    }
    let mut seen = HashSet::new();
    for s in submissions {
        if !seen.insert(s.case_no) {
            return Err(LedgerError::validation("duplicate case in batch")
                .with_case(s.case_no)
                .into());
        }
        if s.payload.executor.trim().is_empty() {
            return Err(LedgerError::validation("executor is required")
                .with_case(s.case_no)
                .with_field("executor")
                .into());
        }
        for e in &s.evidence {
            if e.evidence_no < 1 || e.path.trim().is_empty() {
                return Err(LedgerError::validation("malformed evidence reference")
                    .with_case(s.case_no)
                    .with_field("evidence")
                    .into());
            }
        }
    }
    Ok(())
}

fn plan_transition<'a>(
    tx: &Transaction<'_>,
    group_id: i64,
    tid: &str,
    submission: &'a CaseSubmission,
) -> anyhow::Result<Transition<'a>> {
    let key = CaseKey::new(group_id, tid, submission.case_no);

    let content = store::tx_content(tx, &key)?
        .ok_or_else(|| LedgerError::case_not_found(submission.case_no))?;

    let current = store::tx_max_history_count(tx, &key)?;

    // Excluded cases are read-only: once the current judgment is "excluded",
    // or the item is out of scoring scope, the only accepted submissions are
    // those acknowledging the exclusion.
    let current_judgment = store::tx_current_judgment(tx, &key)?;
    let excluded = !content.is_target
        || current_judgment.map(|j| j == crate::model::Judgment::Excluded) == Some(true);
    if excluded {
        let acknowledges = submission
            .payload
            .judgment
            .map(|j| j.is_exclusion_marker())
            .unwrap_or(false);
        if !acknowledges {
            return Err(LedgerError::validation("case is excluded from recording")
                .with_case(submission.case_no)
                .into());
        }
    }

    let (target_history_count, version, insert_result_row, insert_history_row) =
        match submission.action {
            SubmitAction::Create => {
                if current != 0 {
                    return Err(LedgerError::validation(
                        "create requires a case with no recorded execution",
                    )
                    .with_case(submission.case_no)
                    .into());
                }
                (1, 1, true, true)
            }
            SubmitAction::Update => {
                if current < 1 {
                    return Err(LedgerError::validation(
                        "update requires a previously recorded execution",
                    )
                    .with_case(submission.case_no)
                    .into());
                }
                // Correction in place: the latest history row is overwritten,
                // no new sequence number is produced.
                (current, store::tx_current_version(tx, &key)?, false, false)
            }
            SubmitAction::ReExecute => {
                if current < 1 {
                    return Err(LedgerError::validation(
                        "re-execute requires a previously recorded execution",
                    )
                    .with_case(submission.case_no)
                    .into());
                }
                (
                    current + 1,
                    store::tx_current_version(tx, &key)?,
                    false,
                    true,
                )
            }
        };

    Ok(Transition {
        key,
        submission,
        target_history_count,
        version,
        insert_result_row,
        insert_history_row,
    })
}

fn apply_transition(tx: &Transaction<'_>, t: &Transition<'_>) -> anyhow::Result<()> {
    let payload = &t.submission.payload;

    if t.insert_result_row {
        store::tx_insert_result(tx, &t.key, payload, t.version)?;
    } else {
        store::tx_update_result(tx, &t.key, payload)?;
    }

    if t.insert_history_row {
        store::tx_insert_history(tx, &t.key, t.target_history_count, payload, t.version)?;
    } else {
        store::tx_overwrite_history(tx, &t.key, t.target_history_count, payload)?;
    }

    // Evidence refs land at whatever history count the transition produced;
    // the upsert key makes re-submitting the same index overwrite, not
    // duplicate.
    for e in &t.submission.evidence {
        store::tx_upsert_evidence(
            tx,
            &EvidenceRecord {
                group_id: t.key.group_id,
                tid: t.key.tid.clone(),
                case_no: t.key.case_no,
                history_count: t.target_history_count,
                evidence_no: e.evidence_no,
                name: e.name.clone(),
                path: e.path.clone(),
                digest: e.digest.clone(),
            },
        )?;
    }

    debug!(
        case_no = t.key.case_no,
        history_count = t.target_history_count,
        "applied transition"
    );
    Ok(())
}
