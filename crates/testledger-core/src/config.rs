use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default, rename = "configVersion", alias = "version")]
    pub version: u32,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_evidence_root")]
    pub evidence_root: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".ledger/ledger.db")
}

fn default_evidence_root() -> PathBuf {
    PathBuf::from(".ledger/evidences")
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            db_path: default_db_path(),
            evidence_root: default_evidence_root(),
        }
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<LedgerConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {}", path.display(), e))?;
    let cfg: LedgerConfig =
        serde_yaml::from_str(&raw).map_err(|e| anyhow::anyhow!("failed to parse YAML: {}", e))?;
    if cfg.version != SUPPORTED_CONFIG_VERSION {
        anyhow::bail!(
            "unsupported config version {} (supported: {})",
            cfg.version,
            SUPPORTED_CONFIG_VERSION
        );
    }
    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> anyhow::Result<()> {
    let sample = format!(
        "configVersion: {}\ndb_path: .ledger/ledger.db\nevidence_root: .ledger/evidences\n",
        SUPPORTED_CONFIG_VERSION
    );
    std::fs::write(path, sample)?;
    Ok(())
}
