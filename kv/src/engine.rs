//! The engine façade: opens (and recovers) a durable key-value store,
//! hands out transactions, and runs their reads and writes against the
//! in-memory version store while mirroring every write to the WAL.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::codec::Record;
use crate::config::Config;
use crate::disposer::Disposer;
use crate::error::{Error, Result};
use crate::mvcc::txid::FIRST_REAL_ID;
use crate::mvcc::{MvccStore, Transaction, TransactionManager};
use crate::recovery;
use crate::storage::{Manifest, Wal};
use crate::vacuum::Vacuumer;

pub struct Engine {
    store: Arc<MvccStore>,
    manager: Arc<TransactionManager>,
    wal: Arc<Wal>,
    max_key_size: usize,
    max_value_size: usize,
    vacuum_workers: usize,
    vacuumer: Mutex<Vacuumer>,
    disposer: Disposer,
}

impl Engine {
    /// Opens the engine at the paths named in `cfg`, replaying the WAL to
    /// rebuild every key's version chain before returning, and starts the
    /// background vacuumer.
    pub fn open(cfg: &Config) -> Result<Arc<Engine>> {
        std::fs::create_dir_all(&cfg.log_dir)?;

        let log_manifest = Manifest::open(Path::new(&cfg.log_manifest_path), 0)?;
        let log_start = log_manifest.read()?;

        let wal = Arc::new(Wal::open(
            Path::new(&cfg.log_dir),
            log_start,
            cfg.log_segment_size,
            cfg.wal_buffer_size,
            cfg.wal_commit_wait(),
        )?);

        let tx_manifest = Manifest::open(Path::new(&cfg.tx_manifest_path), FIRST_REAL_ID)?;
        let manager = TransactionManager::new(tx_manifest, wal.clone(), cfg.max_active_tx as usize, cfg.reserved_tx_ids_per_batch)?;

        let store = Arc::new(MvccStore::new());
        recovery::recover(&wal, &store, &manager)?;
        info!(log_start, "engine recovered");

        let vacuumer = Vacuumer::spawn(store.clone(), manager.clone(), wal.clone(), cfg.vacuum_interval(), cfg.vacuum_workers);

        let disposer = Disposer::new();
        let wal_for_close = wal.clone();
        disposer.push(move || wal_for_close.close());

        Ok(Arc::new(Engine {
            store,
            manager,
            wal,
            max_key_size: cfg.max_key_size,
            max_value_size: cfg.max_value_size,
            vacuum_workers: cfg.vacuum_workers,
            vacuumer: Mutex::new(vacuumer),
            disposer,
        }))
    }

    pub fn begin(&self) -> Result<Transaction> {
        self.manager.clone().begin()
    }

    pub fn get(&self, tx: &Transaction, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key, self.max_key_size)?;
        self.store.get(tx, key)
    }

    pub fn set(&self, tx: &Transaction, key: &str, value: Vec<u8>) -> Result<()> {
        validate_key(key, self.max_key_size)?;
        validate_value(&value, self.max_value_size)?;
        self.store.set(tx, key, value.clone())?;
        self.wal.append(&Record::Value { tx_id: tx.id, key: key.as_bytes().to_vec(), value })
    }

    pub fn delete(&self, tx: &Transaction, key: &str) -> Result<()> {
        validate_key(key, self.max_key_size)?;
        self.store.delete(tx, key)?;
        self.wal.append(&Record::Tombstone { tx_id: tx.id, key: key.as_bytes().to_vec() })
    }

    pub fn commit(&self, tx: &Transaction) -> Result<()> {
        tx.commit()
    }

    pub fn abort(&self, tx: &Transaction) -> Result<()> {
        tx.abort()
    }

    /// Forces one synchronous vacuum pass against the current horizon,
    /// instead of waiting for the background vacuumer's next tick.
    pub fn vacuum_now(&self) -> Result<()> {
        let horizon = self.manager.find_tx_horizon();
        crate::vacuum::run_once(&self.store, &self.wal, horizon, self.vacuum_workers)
    }

    /// Stops the vacuumer and closes the WAL, in that order, surfacing the
    /// first error either teardown step hit.
    pub fn close(&self) -> Result<()> {
        self.vacuumer.lock().stop()?;
        self.disposer.dispose()
    }
}

fn validate_key(key: &str, max_len: usize) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey);
    }
    if key.len() > max_len {
        return Err(Error::KeyTooLong);
    }
    if !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-') {
        return Err(Error::InvalidKey);
    }
    Ok(())
}

fn validate_value(value: &[u8], max_len: usize) -> Result<()> {
    if value.len() > max_len {
        return Err(Error::ValueTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            log_dir: dir.join("log").to_string_lossy().into_owned(),
            log_manifest_path: dir.join("log-manifest.bin").to_string_lossy().into_owned(),
            tx_manifest_path: dir.join("tx-manifest.bin").to_string_lossy().into_owned(),
            wal_commit_wait_ms: 1,
            vacuum_interval_secs: 3600,
            ..Config::default()
        }
    }

    #[test]
    fn set_commit_get_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());

        {
            let engine = Engine::open(&cfg).unwrap();
            let tx = engine.begin().unwrap();
            engine.set(&tx, "greeting", b"hello".to_vec()).unwrap();
            engine.commit(&tx).unwrap();
            engine.close().unwrap();
        }

        let engine = Engine::open(&cfg).unwrap();
        let tx = engine.begin().unwrap();
        assert_eq!(engine.get(&tx, "greeting").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn rejects_keys_outside_the_allowed_charset() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(&test_config(dir.path())).unwrap();
        let tx = engine.begin().unwrap();
        let err = engine.set(&tx, "bad key!", b"x".to_vec()).unwrap_err();
        assert!(matches!(err, Error::InvalidKey));
    }

    #[test]
    fn abort_leaves_no_trace_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        {
            let engine = Engine::open(&cfg).unwrap();
            let tx = engine.begin().unwrap();
            engine.set(&tx, "temp", b"x".to_vec()).unwrap();
            engine.abort(&tx).unwrap();
            engine.close().unwrap();
        }
        let engine = Engine::open(&cfg).unwrap();
        let tx = engine.begin().unwrap();
        assert_eq!(engine.get(&tx, "temp").unwrap(), None);
    }
}
