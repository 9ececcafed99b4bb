pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS test_contents (
  group_id INTEGER NOT NULL,
  tid TEXT NOT NULL,
  case_no INTEGER NOT NULL,
  test_case TEXT NOT NULL,
  expected_value TEXT NOT NULL DEFAULT '',
  first_layer TEXT NOT NULL DEFAULT '',
  second_layer TEXT NOT NULL DEFAULT '',
  is_target INTEGER NOT NULL DEFAULT 1,
  PRIMARY KEY (group_id, tid, case_no)
);

CREATE TABLE IF NOT EXISTS test_results (
  group_id INTEGER NOT NULL,
  tid TEXT NOT NULL,
  case_no INTEGER NOT NULL,
  result TEXT NOT NULL DEFAULT '',
  judgment TEXT,
  software_version TEXT NOT NULL DEFAULT '',
  hardware_version TEXT NOT NULL DEFAULT '',
  comparator_version TEXT NOT NULL DEFAULT '',
  execution_date TEXT,
  executor TEXT NOT NULL DEFAULT '',
  note TEXT NOT NULL DEFAULT '',
  version INTEGER NOT NULL DEFAULT 1,
  PRIMARY KEY (group_id, tid, case_no)
);

CREATE TABLE IF NOT EXISTS test_results_history (
  group_id INTEGER NOT NULL,
  tid TEXT NOT NULL,
  case_no INTEGER NOT NULL,
  history_count INTEGER NOT NULL,
  result TEXT NOT NULL DEFAULT '',
  judgment TEXT,
  software_version TEXT NOT NULL DEFAULT '',
  hardware_version TEXT NOT NULL DEFAULT '',
  comparator_version TEXT NOT NULL DEFAULT '',
  execution_date TEXT,
  executor TEXT NOT NULL DEFAULT '',
  note TEXT NOT NULL DEFAULT '',
  version INTEGER NOT NULL DEFAULT 1,
  PRIMARY KEY (group_id, tid, case_no, history_count)
);

CREATE TABLE IF NOT EXISTS test_evidences (
  group_id INTEGER NOT NULL,
  tid TEXT NOT NULL,
  case_no INTEGER NOT NULL,
  history_count INTEGER NOT NULL,
  evidence_no INTEGER NOT NULL,
  evidence_name TEXT NOT NULL,
  evidence_path TEXT NOT NULL,
  digest TEXT NOT NULL DEFAULT '',
  PRIMARY KEY (group_id, tid, case_no, history_count, evidence_no)
);

CREATE TABLE IF NOT EXISTS campaigns (
  group_id INTEGER PRIMARY KEY,
  start_date TEXT NOT NULL,
  end_date TEXT NOT NULL,
  ng_plan_count INTEGER NOT NULL DEFAULT 0
);
"#;
