//! A single begun-but-not-yet-finalized unit of work: a snapshot, an undo
//! log of touched versions, and a one-shot commit/abort guard.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::mvcc::manager::TransactionManager;
use crate::mvcc::snapshot::Snapshot;
use crate::mvcc::txid::ID_ALIVE;
use crate::mvcc::version::Version;

struct TxState {
    write_log: Vec<Arc<Version>>,
    finalized: bool,
}

pub struct Transaction {
    pub id: u64,
    manager: Arc<TransactionManager>,
    pub snapshot: Snapshot,
    state: Mutex<TxState>,
}

impl Transaction {
    pub(crate) fn new(id: u64, manager: Arc<TransactionManager>, snapshot: Snapshot) -> Self {
        Transaction { id, manager, snapshot, state: Mutex::new(TxState { write_log: Vec::new(), finalized: false }) }
    }

    /// Tracks a version this transaction touched, so abort can undo it.
    pub fn register(&self, version: Arc<Version>) {
        self.state.lock().write_log.push(version);
    }

    /// The exhaustive visibility predicate from the spec: is a version
    /// with this `(xMin, xMax)` visible to this transaction's snapshot?
    pub fn can_see(&self, x_min: u64, x_max: u64) -> bool {
        use crate::mvcc::txid::{precedes, ID_FROZEN};

        // 1. Own live insert.
        if x_min == self.id && x_max == ID_ALIVE {
            return true;
        }
        // 2. Own delete.
        if x_max == self.id {
            return false;
        }
        // 3. Creator not yet committed (or committed after our snapshot).
        if x_min != ID_FROZEN {
            if self.snapshot.is_active(x_min) {
                return false;
            }
            if !precedes(x_min, self.snapshot.x_max) {
                return false;
            }
        }
        // 4. Ancient and never deleted.
        if x_min == ID_FROZEN && x_max == ID_ALIVE {
            return true;
        }
        // 5. Not deleted at all.
        if x_max == ID_ALIVE {
            return true;
        }
        // 6. Deleter still running when we started.
        if self.snapshot.is_active(x_max) {
            return true;
        }
        // 7. Delete happened after our snapshot.
        if !precedes(x_max, self.snapshot.x_max) {
            return true;
        }
        // 8. Deleted in our past.
        false
    }

    /// Appends a `Commit` record and retires this transaction. A no-op if
    /// this transaction already committed or aborted.
    pub fn commit(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.finalized {
                return Ok(());
            }
            state.finalized = true;
        }
        self.manager.commit(self.id)
    }

    /// Undoes every tracked version and retires this transaction. A no-op
    /// if this transaction already committed or aborted.
    pub fn abort(&self) -> Result<()> {
        let write_log = {
            let mut state = self.state.lock();
            if state.finalized {
                return Ok(());
            }
            state.finalized = true;
            std::mem::take(&mut state.write_log)
        };
        for version in write_log.iter().rev() {
            if version.x_min() == self.id {
                version.try_kill(self.id);
            } else if version.x_max() == self.id {
                version.resurrect();
            }
        }
        self.manager.abort(self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn tx_with_snapshot(id: u64, x_min: u64, active: &[u64]) -> (Arc<TransactionManager>, Transaction) {
        let manager = TransactionManager::for_tests();
        let snapshot = Snapshot { x_min, x_max: id, active: Arc::new(active.iter().copied().collect::<HashSet<_>>()) };
        let tx = Transaction::new(id, manager.clone(), snapshot);
        (manager, tx)
    }

    #[test]
    fn sees_own_live_insert_but_not_own_delete() {
        let (_m, tx) = tx_with_snapshot(5, 2, &[]);
        assert!(tx.can_see(5, ID_ALIVE));
        assert!(!tx.can_see(2, 5));
    }

    #[test]
    fn hides_uncommitted_concurrent_writer() {
        let (_m, tx) = tx_with_snapshot(5, 2, &[3]);
        assert!(!tx.can_see(3, ID_ALIVE));
    }

    #[test]
    fn hides_writes_committed_after_snapshot() {
        let (_m, tx) = tx_with_snapshot(5, 2, &[]);
        assert!(!tx.can_see(9, ID_ALIVE));
    }

    #[test]
    fn sees_frozen_undeleted_version() {
        let (_m, tx) = tx_with_snapshot(5, 2, &[]);
        assert!(tx.can_see(0, ID_ALIVE));
    }
}
