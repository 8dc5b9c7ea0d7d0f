use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use crate::codec::record_codec::CodecConfig;
use crate::core::error::Result;

/// When hashed (non-exact) candidates go through the validation oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationPolicy {
    /// Only when the caller asks for post-validation.
    OnRequest,
    /// Every metadata-hash and citation-hash candidate.
    Always,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_path: PathBuf,
    /// Per dataset family directory overrides, keyed by family name.
    pub env_paths: BTreeMap<String, PathBuf>,
    pub codec: CodecConfig,

    pub batch_size: usize,                  // Flush ingestion/enrichment every N records
    pub wal_compaction_bytes: u64,          // Checkpoint once the WAL grows past this

    pub max_accepted_requests: usize,       // Concurrent oracle calls, 0 = CPU count
    pub oracle_timeout_ms: u64,
    pub oracle_retry_backoff_ms: u64,
    pub oracle_cache_size: usize,           // 0 disables the extraction cache
    pub validation_policy: ValidationPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data"),
            env_paths: BTreeMap::new(),
            codec: CodecConfig::default(),

            batch_size: 10_000,
            wal_compaction_bytes: 256 * 1024 * 1024,

            max_accepted_requests: 0,
            oracle_timeout_ms: 5_000,
            oracle_retry_backoff_ms: 100,
            oracle_cache_size: 10_000,
            validation_policy: ValidationPolicy::Always,
        }
    }
}

impl Config {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Directory of one dataset family.
    pub fn env_dir(&self, family: &str) -> PathBuf {
        self.env_paths
            .get(family)
            .cloned()
            .unwrap_or_else(|| self.storage_path.join(family))
    }

    pub fn gate_capacity(&self) -> usize {
        if self.max_accepted_requests < 1 {
            num_cpus::get()
        } else {
            self.max_accepted_requests
        }
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    pub fn oracle_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.oracle_retry_backoff_ms)
    }
}
