//! Durable transaction-ID allocation and the active-transaction set.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::Record;
use crate::error::{Error, Result};
use crate::mvcc::snapshot::Snapshot;
use crate::mvcc::transaction::Transaction;
use crate::mvcc::txid::{oldest, FIRST_REAL_ID};
use crate::storage::{Manifest, Wal};

struct ManagerState {
    next_tx_id: u64,
    max_reserved_id: u64,
    active: HashSet<u64>,
}

pub struct TransactionManager {
    state: Mutex<ManagerState>,
    manifest: Manifest,
    wal: Arc<Wal>,
    max_active: usize,
    reserved_batch: u64,
}

impl TransactionManager {
    pub fn new(manifest: Manifest, wal: Arc<Wal>, max_active: usize, reserved_batch: u64) -> Result<Arc<Self>> {
        let max_reserved_id = manifest.read()?;
        let next_tx_id = if max_reserved_id < FIRST_REAL_ID { FIRST_REAL_ID } else { max_reserved_id };
        Ok(Arc::new(TransactionManager {
            state: Mutex::new(ManagerState { next_tx_id, max_reserved_id, active: HashSet::new() }),
            manifest,
            wal,
            max_active,
            reserved_batch,
        }))
    }

    /// Restores the active set after recovery replay — every ID the log
    /// mentions but never committed or aborted explicitly is already gone
    /// by construction, so this only exists to seed `next_tx_id` past the
    /// highest ID recovery observed.
    pub fn observe_recovered_id(&self, tx_id: u64) {
        let mut state = self.state.lock();
        if tx_id >= state.next_tx_id {
            state.next_tx_id = tx_id + 1;
        }
    }

    pub fn begin(self: Arc<Self>) -> Result<Transaction> {
        let mut state = self.state.lock();
        if state.active.len() >= self.max_active {
            return Err(Error::MaxActiveTransactionsExceeded);
        }
        if state.next_tx_id >= state.max_reserved_id {
            let (_, new_max) = self.manifest.advance(self.reserved_batch)?;
            state.max_reserved_id = new_max;
        }
        let id = state.next_tx_id;
        state.next_tx_id += 1;

        let x_min = state.active.iter().copied().fold(id, oldest);
        let snapshot = Snapshot { x_min, x_max: id, active: Arc::new(state.active.clone()) };
        state.active.insert(id);
        drop(state);

        Ok(Transaction::new(id, self, snapshot))
    }

    pub(crate) fn commit(&self, id: u64) -> Result<()> {
        if !self.state.lock().active.contains(&id) {
            return Err(Error::TransactionNotActive);
        }
        self.wal.append(&Record::Commit { tx_id: id })?;
        self.state.lock().active.remove(&id);
        Ok(())
    }

    pub(crate) fn abort(&self, id: u64) {
        self.state.lock().active.remove(&id);
    }

    /// The oldest transaction ID any live snapshot could still need to see:
    /// the smallest active ID, or `nextTxID + 1` if nothing is active (no
    /// live snapshot can care about anything at or above an ID not yet
    /// handed out).
    pub fn find_tx_horizon(&self) -> u64 {
        let state = self.state.lock();
        match state.active.iter().copied().reduce(oldest) {
            Some(min_active) => min_active,
            None => state.next_tx_id + 1,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Arc<Self> {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = Manifest::open(&dir.path().join("tx.manifest"), FIRST_REAL_ID).expect("manifest");
        let wal = Arc::new(
            Wal::open(&dir.path().join("wal"), 0, 1024 * 1024, 4096, std::time::Duration::from_millis(1))
                .expect("wal"),
        );
        // Keep the tempdir alive for the lifetime of the manager by leaking
        // it; these managers only exist for the duration of a unit test.
        std::mem::forget(dir);
        TransactionManager::new(manifest, wal, 100, 16).expect("manager")
    }
}
