use crate::auth::AccessGate;
use crate::errors::LedgerError;
use crate::evidence::blob::BlobStore;
use crate::model::{CaseKey, EvidenceRecord};
use crate::storage::{store, Store};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

/// Links uploaded artifacts to concrete executions. Attaching requires the
/// history row to exist already, so a blob is never left waiting for a
/// recording batch that may not arrive.
pub struct EvidenceRegistry {
    store: Store,
    blobs: Arc<dyn BlobStore>,
}

impl EvidenceRegistry {
    pub fn new(store: Store, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    pub fn attach(
        &self,
        gate: &dyn AccessGate,
        user: &str,
        key: &CaseKey,
        history_count: i64,
        file_name: &str,
        bytes: &[u8],
    ) -> anyhow::Result<EvidenceRecord> {
        if !gate.can_record(user, key.group_id) {
            return Err(LedgerError::permission().into());
        }
        if history_count < 1 {
            return Err(LedgerError::validation(
                "record an execution before attaching evidence",
            )
            .with_case(key.case_no)
            .into());
        }

        let digest = hex::encode(Sha256::digest(bytes));
        let blobs = self.blobs.clone();

        let record = self.store.with_transaction(|tx| {
            if !store::tx_history_exists(tx, key, history_count)? {
                return Err(LedgerError::validation(
                    "record an execution before attaching evidence",
                )
                .with_case(key.case_no)
                .into());
            }

            // Allocated inside the transaction, so concurrent attachers for
            // the same case cannot collide.
            let evidence_no = store::tx_max_evidence_no(tx, key)? + 1;
            let path = blob_path(key, history_count, evidence_no, file_name);

            // Blob first, metadata second. A crash in between orphans the
            // blob; a background sweep reclaims those.
            let path = blobs.put(bytes, &path)?;

            let record = EvidenceRecord {
                group_id: key.group_id,
                tid: key.tid.clone(),
                case_no: key.case_no,
                history_count,
                evidence_no,
                name: file_name.to_string(),
                path,
                digest: digest.clone(),
            };
            store::tx_upsert_evidence(tx, &record)?;
            Ok(record)
        })?;

        info!(
            case_no = key.case_no,
            history_count,
            evidence_no = record.evidence_no,
            "attached evidence"
        );
        Ok(record)
    }

    pub fn detach(
        &self,
        gate: &dyn AccessGate,
        user: &str,
        key: &CaseKey,
        history_count: i64,
        evidence_no: i64,
    ) -> anyhow::Result<()> {
        if !gate.can_record(user, key.group_id) {
            return Err(LedgerError::permission().into());
        }

        let blobs = self.blobs.clone();
        self.store.with_transaction(|tx| {
            let record = store::tx_evidence_record(tx, key, history_count, evidence_no)?
                .ok_or_else(|| {
                    LedgerError::validation("evidence not found").with_case(key.case_no)
                })?;

            if let Err(e) = blobs.delete(&record.path) {
                warn!(path = %record.path, error = %e, "failed to delete evidence blob");
            }
            store::tx_delete_evidence(tx, key, history_count, evidence_no)?;
            Ok(())
        })?;

        info!(
            case_no = key.case_no,
            history_count, evidence_no, "detached evidence"
        );
        Ok(())
    }
}

/// `evidences/{group}/{tid}/{case}_{history}_{evidence_no}_{timestamp}.{ext}`
fn blob_path(key: &CaseKey, history_count: i64, evidence_no: i64, file_name: &str) -> String {
    let ext = file_name.rsplit_once('.').map(|(_, e)| e).unwrap_or("bin");
    let ts = chrono::Utc::now().timestamp_millis();
    format!(
        "evidences/{}/{}/{}_{}_{}_{}.{}",
        key.group_id, key.tid, key.case_no, history_count, evidence_no, ts, ext
    )
}
