//! Engine configuration: on-disk layout knobs, WAL tuning, and façade-level
//! size limits, loaded from an optional TOML file and overridable by
//! `KV_*` environment variables.

use std::path::Path;
use std::time::Duration;

use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log_dir: String,
    pub log_manifest_path: String,
    pub tx_manifest_path: String,

    pub log_segment_size: u64,
    pub wal_buffer_size: usize,
    pub wal_commit_wait_ms: u64,

    pub reserved_tx_ids_per_batch: u64,
    pub max_active_tx: u16,

    pub max_key_size: usize,
    pub max_value_size: usize,

    pub vacuum_interval_secs: u64,
    pub vacuum_workers: usize,

    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_dir: "./data/log".to_string(),
            log_manifest_path: "./data/log/manifest.bin".to_string(),
            tx_manifest_path: "./data/tx-manifest.bin".to_string(),

            log_segment_size: 512 * 1024,
            wal_buffer_size: 512 * 1024,
            wal_commit_wait_ms: 5,

            reserved_tx_ids_per_batch: 1000,
            max_active_tx: 100,

            max_key_size: 1024,
            max_value_size: 128 * 1024,

            vacuum_interval_secs: 120,
            vacuum_workers: 8,

            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file at `path`, falling back to
    /// [`Config::default`] field-by-field for anything the file omits.
    /// With `path = None`, returns the defaults outright. Afterwards,
    /// any `KV_<FIELD>` environment variable overrides the loaded value.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut cfg = match path {
            Some(path) => confy::load_path(path)
                .map_err(|e| Error::Config(format!("{e}: {}", path.display())))?,
            None => Config::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        confy::store_path(path, self.clone())
            .map_err(|e| Error::Config(format!("{e}: {}", path.display())))
    }

    pub fn wal_commit_wait(&self) -> Duration {
        Duration::from_millis(self.wal_commit_wait_ms)
    }

    pub fn vacuum_interval(&self) -> Duration {
        Duration::from_secs(self.vacuum_interval_secs)
    }

    fn apply_env_overrides(&mut self) {
        macro_rules! override_str {
            ($field:ident, $env:literal) => {
                if let Ok(v) = std::env::var($env) {
                    self.$field = v;
                }
            };
        }
        macro_rules! override_parsed {
            ($field:ident, $env:literal) => {
                if let Ok(v) = std::env::var($env) {
                    if let Ok(parsed) = v.parse() {
                        self.$field = parsed;
                    }
                }
            };
        }

        override_str!(log_dir, "KV_LOG_DIR");
        override_str!(log_manifest_path, "KV_LOG_MANIFEST_PATH");
        override_str!(tx_manifest_path, "KV_TX_MANIFEST_PATH");
        override_parsed!(log_segment_size, "KV_LOG_SEGMENT_SIZE");
        override_parsed!(wal_buffer_size, "KV_WAL_BUFFER_SIZE");
        override_parsed!(wal_commit_wait_ms, "KV_WAL_COMMIT_WAIT_MS");
        override_parsed!(reserved_tx_ids_per_batch, "KV_RESERVED_TX_IDS_PER_BATCH");
        override_parsed!(max_active_tx, "KV_MAX_ACTIVE_TX");
        override_parsed!(max_key_size, "KV_MAX_KEY_SIZE");
        override_parsed!(max_value_size, "KV_MAX_VALUE_SIZE");
        override_parsed!(vacuum_interval_secs, "KV_VACUUM_INTERVAL_SECS");
        override_parsed!(vacuum_workers, "KV_VACUUM_WORKERS");
        override_str!(log_level, "KV_LOG_LEVEL");
    }
}
