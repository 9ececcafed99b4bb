use crate::errors::LedgerError;
use crate::model::{
    Campaign, CaseKey, EvidenceRecord, ExecutionLogRow, HistoryEntry, Judgment, ProgressInput,
    ResultPayload, TestContent, TestResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    /// Runs `f` inside one SQLite transaction under the connection mutex.
    /// All ledger writes go through here: a batch either commits whole or
    /// leaves the ledger untouched, and the max+1 sequence allocations are
    /// serialized against concurrent writers.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| anyhow::Error::new(LedgerError::storage(e.to_string())))?;
        let out = f(&tx)?;
        tx.commit()
            .map_err(|e| anyhow::Error::new(LedgerError::storage(e.to_string())))?;
        Ok(out)
    }

    // authoring-time seeds

    pub fn put_content(&self, content: &TestContent) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO test_contents
               (group_id, tid, case_no, test_case, expected_value, first_layer, second_layer, is_target)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (group_id, tid, case_no) DO UPDATE SET
               test_case = excluded.test_case,
               expected_value = excluded.expected_value,
               first_layer = excluded.first_layer,
               second_layer = excluded.second_layer,
               is_target = excluded.is_target",
            params![
                content.group_id,
                content.tid,
                content.case_no,
                content.test_case,
                content.expected_value,
                content.first_layer,
                content.second_layer,
                content.is_target,
            ],
        )?;
        Ok(())
    }

    pub fn put_campaign(&self, group_id: i64, campaign: &Campaign) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO campaigns (group_id, start_date, end_date, ng_plan_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (group_id) DO UPDATE SET
               start_date = excluded.start_date,
               end_date = excluded.end_date,
               ng_plan_count = excluded.ng_plan_count",
            params![
                group_id,
                campaign.start_date.format("%Y-%m-%d").to_string(),
                campaign.end_date.format("%Y-%m-%d").to_string(),
                campaign.ng_plan_count,
            ],
        )?;
        Ok(())
    }

    pub fn campaign(&self, group_id: i64) -> anyhow::Result<Option<Campaign>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT start_date, end_date, ng_plan_count FROM campaigns WHERE group_id = ?1",
        )?;
        let mut rows = stmt.query(params![group_id])?;
        if let Some(row) = rows.next()? {
            let start: String = row.get(0)?;
            let end: String = row.get(1)?;
            Ok(Some(Campaign {
                start_date: parse_date(&start)
                    .ok_or_else(|| anyhow::anyhow!("bad start_date in campaigns: {}", start))?,
                end_date: parse_date(&end)
                    .ok_or_else(|| anyhow::anyhow!("bad end_date in campaigns: {}", end))?,
                ng_plan_count: row.get(2)?,
            }))
        } else {
            Ok(None)
        }
    }

    // committed-snapshot reads

    pub fn contents_for_tid(&self, group_id: i64, tid: &str) -> anyhow::Result<Vec<TestContent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT group_id, tid, case_no, test_case, expected_value, first_layer, second_layer, is_target
             FROM test_contents WHERE group_id = ?1 AND tid = ?2 ORDER BY case_no ASC",
        )?;
        let rows = stmt.query_map(params![group_id, tid], content_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn total_target_items(&self, group_id: i64) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM test_contents WHERE group_id = ?1 AND is_target = 1",
            params![group_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn result_for_case(&self, key: &CaseKey) -> anyhow::Result<Option<TestResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT case_no, result, judgment, software_version, hardware_version,
                    comparator_version, execution_date, executor, note, version
             FROM test_results WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3",
        )?;
        let mut rows = stmt.query(params![key.group_id, key.tid, key.case_no])?;
        if let Some(row) = rows.next()? {
            Ok(Some(result_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn results_for_tid(&self, group_id: i64, tid: &str) -> anyhow::Result<Vec<TestResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT case_no, result, judgment, software_version, hardware_version,
                    comparator_version, execution_date, executor, note, version
             FROM test_results WHERE group_id = ?1 AND tid = ?2 ORDER BY case_no ASC",
        )?;
        let rows = stmt.query_map(params![group_id, tid], |row| result_from_row(row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn history_for_case(&self, key: &CaseKey) -> anyhow::Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT case_no, history_count, result, judgment, software_version, hardware_version,
                    comparator_version, execution_date, executor, note, version
             FROM test_results_history
             WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3
             ORDER BY history_count ASC",
        )?;
        let rows = stmt.query_map(params![key.group_id, key.tid, key.case_no], |row| {
            history_from_row(row)
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn history_for_tid(&self, group_id: i64, tid: &str) -> anyhow::Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT case_no, history_count, result, judgment, software_version, hardware_version,
                    comparator_version, execution_date, executor, note, version
             FROM test_results_history
             WHERE group_id = ?1 AND tid = ?2
             ORDER BY case_no ASC, history_count ASC",
        )?;
        let rows = stmt.query_map(params![group_id, tid], |row| history_from_row(row))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn evidence_for_tid(&self, group_id: i64, tid: &str) -> anyhow::Result<Vec<EvidenceRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT group_id, tid, case_no, history_count, evidence_no, evidence_name, evidence_path, digest
             FROM test_evidences
             WHERE group_id = ?1 AND tid = ?2
             ORDER BY case_no ASC, history_count ASC, evidence_no ASC",
        )?;
        let rows = stmt.query_map(params![group_id, tid], evidence_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn evidence_for_history(
        &self,
        key: &CaseKey,
        history_count: i64,
    ) -> anyhow::Result<Vec<EvidenceRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT group_id, tid, case_no, history_count, evidence_no, evidence_name, evidence_path, digest
             FROM test_evidences
             WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3 AND history_count = ?4
             ORDER BY evidence_no ASC",
        )?;
        let rows = stmt.query_map(
            params![key.group_id, key.tid, key.case_no, history_count],
            evidence_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Contents left-joined with current results, feeding the progress
    /// aggregator. Items without a recorded result carry no judgment.
    pub fn progress_inputs(&self, group_id: i64) -> anyhow::Result<Vec<ProgressInput>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.first_layer, c.second_layer, c.is_target, r.judgment
             FROM test_contents c
             LEFT JOIN test_results r
               ON r.group_id = c.group_id AND r.tid = c.tid AND r.case_no = c.case_no
             WHERE c.group_id = ?1
             ORDER BY c.first_layer ASC, c.second_layer ASC, c.tid ASC, c.case_no ASC",
        )?;
        let rows = stmt.query_map(params![group_id], |row| {
            let judgment: Option<String> = row.get(3)?;
            Ok(ProgressInput {
                first_layer: row.get(0)?,
                second_layer: row.get(1)?,
                is_target: row.get(2)?,
                judgment: judgment.as_deref().and_then(Judgment::parse),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every dated execution in the history ledger, oldest first. This is
    /// the raw feed for the forecast engine's daily rollups.
    pub fn execution_log(&self, group_id: i64) -> anyhow::Result<Vec<ExecutionLogRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT execution_date, judgment FROM test_results_history
             WHERE group_id = ?1 AND execution_date IS NOT NULL
             ORDER BY execution_date ASC",
        )?;
        let rows = stmt.query_map(params![group_id], |row| {
            let date: String = row.get(0)?;
            let judgment: Option<String> = row.get(1)?;
            Ok((date, judgment))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (date, judgment) = row?;
            let execution_date = parse_date(&date)
                .ok_or_else(|| anyhow::anyhow!("bad execution_date in history: {}", date))?;
            out.push(ExecutionLogRow {
                execution_date,
                judgment: judgment.as_deref().and_then(Judgment::parse),
            });
        }
        Ok(out)
    }
}

// row mapping

fn content_from_row(row: &Row<'_>) -> rusqlite::Result<TestContent> {
    Ok(TestContent {
        group_id: row.get(0)?,
        tid: row.get(1)?,
        case_no: row.get(2)?,
        test_case: row.get(3)?,
        expected_value: row.get(4)?,
        first_layer: row.get(5)?,
        second_layer: row.get(6)?,
        is_target: row.get(7)?,
    })
}

fn payload_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ResultPayload> {
    let judgment: Option<String> = row.get(offset + 1)?;
    let execution_date: Option<String> = row.get(offset + 5)?;
    Ok(ResultPayload {
        result: row.get(offset)?,
        judgment: judgment.as_deref().and_then(Judgment::parse),
        software_version: row.get(offset + 2)?,
        hardware_version: row.get(offset + 3)?,
        comparator_version: row.get(offset + 4)?,
        execution_date: execution_date.as_deref().and_then(parse_date),
        executor: row.get(offset + 6)?,
        note: row.get(offset + 7)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<TestResult> {
    Ok(TestResult {
        case_no: row.get(0)?,
        payload: payload_from_row(row, 1)?,
        version: row.get(9)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        case_no: row.get(0)?,
        history_count: row.get(1)?,
        payload: payload_from_row(row, 2)?,
        version: row.get(10)?,
    })
}

fn evidence_from_row(row: &Row<'_>) -> rusqlite::Result<EvidenceRecord> {
    Ok(EvidenceRecord {
        group_id: row.get(0)?,
        tid: row.get(1)?,
        case_no: row.get(2)?,
        history_count: row.get(3)?,
        evidence_no: row.get(4)?,
        name: row.get(5)?,
        path: row.get(6)?,
        digest: row.get(7)?,
    })
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub(crate) fn date_str(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format("%Y-%m-%d").to_string())
}

// in-transaction helpers used by the recording engine and evidence registry

pub(crate) fn tx_content(tx: &Transaction<'_>, key: &CaseKey) -> anyhow::Result<Option<TestContent>> {
    let mut stmt = tx.prepare(
        "SELECT group_id, tid, case_no, test_case, expected_value, first_layer, second_layer, is_target
         FROM test_contents WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3",
    )?;
    let mut rows = stmt.query(params![key.group_id, key.tid, key.case_no])?;
    if let Some(row) = rows.next()? {
        Ok(Some(content_from_row(row)?))
    } else {
        Ok(None)
    }
}

pub(crate) fn tx_current_judgment(
    tx: &Transaction<'_>,
    key: &CaseKey,
) -> anyhow::Result<Option<Judgment>> {
    let mut stmt = tx.prepare(
        "SELECT judgment FROM test_results WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3",
    )?;
    let mut rows = stmt.query(params![key.group_id, key.tid, key.case_no])?;
    if let Some(row) = rows.next()? {
        let judgment: Option<String> = row.get(0)?;
        Ok(judgment.as_deref().and_then(Judgment::parse))
    } else {
        Ok(None)
    }
}

pub(crate) fn tx_max_history_count(tx: &Transaction<'_>, key: &CaseKey) -> anyhow::Result<i64> {
    let max: Option<i64> = tx.query_row(
        "SELECT MAX(history_count) FROM test_results_history
         WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3",
        params![key.group_id, key.tid, key.case_no],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}

pub(crate) fn tx_current_version(tx: &Transaction<'_>, key: &CaseKey) -> anyhow::Result<i64> {
    let version: Option<i64> = tx
        .query_row(
            "SELECT version FROM test_results WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3",
            params![key.group_id, key.tid, key.case_no],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(version.unwrap_or(1))
}

pub(crate) fn tx_insert_result(
    tx: &Transaction<'_>,
    key: &CaseKey,
    payload: &ResultPayload,
    version: i64,
) -> anyhow::Result<()> {
    tx.execute(
        "INSERT INTO test_results
           (group_id, tid, case_no, result, judgment, software_version, hardware_version,
            comparator_version, execution_date, executor, note, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            key.group_id,
            key.tid,
            key.case_no,
            payload.result,
            payload.judgment.map(|j| j.as_str()),
            payload.software_version,
            payload.hardware_version,
            payload.comparator_version,
            date_str(payload.execution_date),
            payload.executor,
            payload.note,
            version,
        ],
    )?;
    Ok(())
}

pub(crate) fn tx_update_result(
    tx: &Transaction<'_>,
    key: &CaseKey,
    payload: &ResultPayload,
) -> anyhow::Result<()> {
    tx.execute(
        "UPDATE test_results SET
           result = ?1, judgment = ?2, software_version = ?3, hardware_version = ?4,
           comparator_version = ?5, execution_date = ?6, executor = ?7, note = ?8
         WHERE group_id = ?9 AND tid = ?10 AND case_no = ?11",
        params![
            payload.result,
            payload.judgment.map(|j| j.as_str()),
            payload.software_version,
            payload.hardware_version,
            payload.comparator_version,
            date_str(payload.execution_date),
            payload.executor,
            payload.note,
            key.group_id,
            key.tid,
            key.case_no,
        ],
    )?;
    Ok(())
}

pub(crate) fn tx_insert_history(
    tx: &Transaction<'_>,
    key: &CaseKey,
    history_count: i64,
    payload: &ResultPayload,
    version: i64,
) -> anyhow::Result<()> {
    tx.execute(
        "INSERT INTO test_results_history
           (group_id, tid, case_no, history_count, result, judgment, software_version,
            hardware_version, comparator_version, execution_date, executor, note, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            key.group_id,
            key.tid,
            key.case_no,
            history_count,
            payload.result,
            payload.judgment.map(|j| j.as_str()),
            payload.software_version,
            payload.hardware_version,
            payload.comparator_version,
            date_str(payload.execution_date),
            payload.executor,
            payload.note,
            version,
        ],
    )?;
    Ok(())
}

pub(crate) fn tx_overwrite_history(
    tx: &Transaction<'_>,
    key: &CaseKey,
    history_count: i64,
    payload: &ResultPayload,
) -> anyhow::Result<()> {
    tx.execute(
        "UPDATE test_results_history SET
           result = ?1, judgment = ?2, software_version = ?3, hardware_version = ?4,
           comparator_version = ?5, execution_date = ?6, executor = ?7, note = ?8
         WHERE group_id = ?9 AND tid = ?10 AND case_no = ?11 AND history_count = ?12",
        params![
            payload.result,
            payload.judgment.map(|j| j.as_str()),
            payload.software_version,
            payload.hardware_version,
            payload.comparator_version,
            date_str(payload.execution_date),
            payload.executor,
            payload.note,
            key.group_id,
            key.tid,
            key.case_no,
            history_count,
        ],
    )?;
    Ok(())
}

pub(crate) fn tx_history_exists(
    tx: &Transaction<'_>,
    key: &CaseKey,
    history_count: i64,
) -> anyhow::Result<bool> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM test_results_history
         WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3 AND history_count = ?4",
        params![key.group_id, key.tid, key.case_no, history_count],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Max evidence_no over all history counts for this case. The sequence is
/// global per case so artifacts never collide across re-executions.
pub(crate) fn tx_max_evidence_no(tx: &Transaction<'_>, key: &CaseKey) -> anyhow::Result<i64> {
    let max: Option<i64> = tx.query_row(
        "SELECT MAX(evidence_no) FROM test_evidences
         WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3",
        params![key.group_id, key.tid, key.case_no],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0))
}

pub(crate) fn tx_upsert_evidence(
    tx: &Transaction<'_>,
    record: &EvidenceRecord,
) -> anyhow::Result<()> {
    tx.execute(
        "INSERT INTO test_evidences
           (group_id, tid, case_no, history_count, evidence_no, evidence_name, evidence_path, digest)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (group_id, tid, case_no, history_count, evidence_no) DO UPDATE SET
           evidence_name = excluded.evidence_name,
           evidence_path = excluded.evidence_path,
           digest = excluded.digest",
        params![
            record.group_id,
            record.tid,
            record.case_no,
            record.history_count,
            record.evidence_no,
            record.name,
            record.path,
            record.digest,
        ],
    )?;
    Ok(())
}

pub(crate) fn tx_evidence_record(
    tx: &Transaction<'_>,
    key: &CaseKey,
    history_count: i64,
    evidence_no: i64,
) -> anyhow::Result<Option<EvidenceRecord>> {
    let mut stmt = tx.prepare(
        "SELECT group_id, tid, case_no, history_count, evidence_no, evidence_name, evidence_path, digest
         FROM test_evidences
         WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3 AND history_count = ?4 AND evidence_no = ?5",
    )?;
    let mut rows = stmt.query(params![
        key.group_id,
        key.tid,
        key.case_no,
        history_count,
        evidence_no
    ])?;
    if let Some(row) = rows.next()? {
        Ok(Some(evidence_from_row(row)?))
    } else {
        Ok(None)
    }
}

pub(crate) fn tx_delete_evidence(
    tx: &Transaction<'_>,
    key: &CaseKey,
    history_count: i64,
    evidence_no: i64,
) -> anyhow::Result<()> {
    tx.execute(
        "DELETE FROM test_evidences
         WHERE group_id = ?1 AND tid = ?2 AND case_no = ?3 AND history_count = ?4 AND evidence_no = ?5",
        params![key.group_id, key.tid, key.case_no, history_count, evidence_no],
    )?;
    Ok(())
}
