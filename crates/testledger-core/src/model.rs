use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Outcome classification of one execution. Closed set: aggregation code
/// matches exhaustively, so adding a value is a compile-time-checked change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    Untouched,
    Reserved,
    QaInProgress,
    Ok,
    ReferenceOk,
    Ng,
    ReExecutionExcluded,
    Excluded,
}

impl Judgment {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "untouched" => Some(Judgment::Untouched),
            "reserved" => Some(Judgment::Reserved),
            "qa_in_progress" => Some(Judgment::QaInProgress),
            "ok" => Some(Judgment::Ok),
            "reference_ok" => Some(Judgment::ReferenceOk),
            "ng" => Some(Judgment::Ng),
            "re_execution_excluded" => Some(Judgment::ReExecutionExcluded),
            "excluded" => Some(Judgment::Excluded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Judgment::Untouched => "untouched",
            Judgment::Reserved => "reserved",
            Judgment::QaInProgress => "qa_in_progress",
            Judgment::Ok => "ok",
            Judgment::ReferenceOk => "reference_ok",
            Judgment::Ng => "ng",
            Judgment::ReExecutionExcluded => "re_execution_excluded",
            Judgment::Excluded => "excluded",
        }
    }

    /// Acknowledges an exclusion rather than recording a real outcome.
    pub fn is_exclusion_marker(&self) -> bool {
        matches!(self, Judgment::Excluded | Judgment::ReExecutionExcluded)
    }
}

/// Address of one test case in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CaseKey {
    pub group_id: i64,
    pub tid: String,
    pub case_no: i64,
}

impl CaseKey {
    pub fn new(group_id: i64, tid: impl Into<String>, case_no: i64) -> Self {
        Self {
            group_id,
            tid: tid.into(),
            case_no,
        }
    }
}

/// One planned test item, created at authoring time. Immutable for ledger
/// purposes; `is_target = false` excludes the item from scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestContent {
    pub group_id: i64,
    pub tid: String,
    pub case_no: i64,
    pub test_case: String,
    #[serde(default)]
    pub expected_value: String,
    #[serde(default)]
    pub first_layer: String,
    #[serde(default)]
    pub second_layer: String,
    #[serde(default = "default_true")]
    pub is_target: bool,
}

fn default_true() -> bool {
    true
}

/// Result fields shared by the current-state row and every history entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(default)]
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<Judgment>,
    #[serde(default)]
    pub software_version: String,
    #[serde(default)]
    pub hardware_version: String,
    #[serde(default)]
    pub comparator_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_date: Option<NaiveDate>,
    #[serde(default)]
    pub executor: String,
    #[serde(default)]
    pub note: String,
}

/// What is true right now for one case. Upserted by the recording engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub case_no: i64,
    #[serde(flatten)]
    pub payload: ResultPayload,
    pub version: i64,
}

/// One recorded execution. `history_count` is 1-based and gap-free per case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub case_no: i64,
    pub history_count: i64,
    #[serde(flatten)]
    pub payload: ResultPayload,
    pub version: i64,
}

/// Metadata linking one uploaded artifact to one execution.
/// `evidence_no` is a per-case sequence shared across all history counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub group_id: i64,
    pub tid: String,
    pub case_no: i64,
    pub history_count: i64,
    pub evidence_no: i64,
    pub name: String,
    pub path: String,
    pub digest: String,
}

/// Planned campaign window for one test group, consumed by the forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub ng_plan_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmitAction {
    Create,
    Update,
    #[serde(alias = "re-execute")]
    ReExecute,
}

/// Reference to an artifact already placed in the blob store, to be linked
/// at whatever history count the submission's transition produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub evidence_no: i64,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub digest: String,
}

/// One per-case entry of a recording batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSubmission {
    pub case_no: i64,
    pub action: SubmitAction,
    #[serde(flatten)]
    pub payload: ResultPayload,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<EvidenceRef>,
}

/// Join row feeding the progress aggregator: classification labels plus the
/// current judgment (absent when no result has been recorded yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInput {
    pub first_layer: String,
    pub second_layer: String,
    pub is_target: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<Judgment>,
}

/// One dated execution from the history ledger, feeding the daily rollups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogRow {
    pub execution_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<Judgment>,
}
