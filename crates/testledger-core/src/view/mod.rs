use crate::auth::AccessGate;
use crate::errors::LedgerError;
use crate::model::{EvidenceRecord, Judgment, ResultPayload, TestContent, TestResult};
use crate::storage::Store;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// One execution as shown in the conduct screen, newest first per case.
#[derive(Debug, Clone, Serialize)]
pub struct ConductEntry {
    pub history_count: i64,
    pub is_latest: bool,
    #[serde(flatten)]
    pub payload: ResultPayload,
    pub version: i64,
    pub evidence: Vec<EvidenceRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConductCase {
    pub content: TestContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<TestResult>,
    pub history: Vec<ConductEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConductView {
    pub group_id: i64,
    pub tid: String,
    /// History count to show by default. Normally the maximum across the
    /// tid; when the latest run only acknowledges an exclusion, the previous
    /// run is the one worth looking at.
    pub latest_display_history_count: i64,
    pub cases: Vec<ConductCase>,
}

/// Assembles the read-side view of the ledger: content definitions joined
/// with the full history, grouped per case by history count descending.
/// Pure read over a committed snapshot.
pub fn conduct_view(
    store: &Store,
    gate: &dyn AccessGate,
    user: &str,
    group_id: i64,
    tid: &str,
) -> anyhow::Result<ConductView> {
    if !gate.can_view(user, group_id) {
        return Err(LedgerError::permission().into());
    }

    let contents = store.contents_for_tid(group_id, tid)?;
    let results = store.results_for_tid(group_id, tid)?;
    let history = store.history_for_tid(group_id, tid)?;
    let evidence = store.evidence_for_tid(group_id, tid)?;

    let mut results_by_case: HashMap<i64, TestResult> =
        results.into_iter().map(|r| (r.case_no, r)).collect();

    let mut evidence_by_entry: HashMap<(i64, i64), Vec<EvidenceRecord>> = HashMap::new();
    for e in evidence {
        evidence_by_entry
            .entry((e.case_no, e.history_count))
            .or_default()
            .push(e);
    }

    let mut history_by_case: HashMap<i64, Vec<ConductEntry>> = HashMap::new();
    let mut global_max = 0i64;
    let mut excluded_at: Vec<i64> = Vec::new();
    for h in history {
        global_max = global_max.max(h.history_count);
        if h.payload.judgment == Some(Judgment::Excluded) {
            excluded_at.push(h.history_count);
        }
        let entries = history_by_case.entry(h.case_no).or_default();
        entries.push(ConductEntry {
            history_count: h.history_count,
            is_latest: false,
            payload: h.payload,
            version: h.version,
            evidence: evidence_by_entry
                .remove(&(h.case_no, h.history_count))
                .unwrap_or_default(),
        });
    }

    let mut cases = Vec::with_capacity(contents.len());
    for content in contents {
        let mut entries = history_by_case.remove(&content.case_no).unwrap_or_default();
        // newest first; the maximum count per case is the latest
        entries.sort_by(|a, b| b.history_count.cmp(&a.history_count));
        if let Some(first) = entries.first_mut() {
            first.is_latest = true;
        }
        cases.push(ConductCase {
            current: results_by_case.remove(&content.case_no),
            content,
            history: entries,
        });
    }

    let latest_display_history_count =
        if global_max > 1 && excluded_at.contains(&global_max) {
            global_max - 1
        } else {
            global_max
        };

    debug!(group_id, tid, cases = cases.len(), "assembled conduct view");

    Ok(ConductView {
        group_id,
        tid: tid.to_string(),
        latest_display_history_count,
        cases,
    })
}
