//! Background vacuum: periodically freezes versions old enough that every
//! live snapshot would treat them as ancient history anyway, and prunes the
//! version chain behind anything deleted long enough ago that no live
//! snapshot could still need it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::codec::Record;
use crate::error::Result;
use crate::mvcc::txid::{precedes, ID_ALIVE, ID_FROZEN};
use crate::mvcc::{MvccStore, TransactionManager};
use crate::storage::Wal;

struct Signal {
    stop: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

/// Owns the background vacuum thread; dropping or calling [`Vacuumer::stop`]
/// wakes it and joins it.
pub struct Vacuumer {
    signal: Arc<Signal>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl Vacuumer {
    pub fn spawn(
        store: Arc<MvccStore>,
        manager: Arc<TransactionManager>,
        wal: Arc<Wal>,
        interval: Duration,
        workers: usize,
    ) -> Self {
        let signal = Arc::new(Signal { stop: AtomicBool::new(false), lock: Mutex::new(()), condvar: Condvar::new() });
        let worker_signal = signal.clone();
        let handle = std::thread::spawn(move || {
            loop {
                let mut guard = worker_signal.lock.lock();
                worker_signal.condvar.wait_for(&mut guard, interval);
                drop(guard);
                if worker_signal.stop.load(Ordering::Acquire) {
                    return;
                }
                let horizon = manager.find_tx_horizon();
                if let Err(e) = run_once(&store, &wal, horizon, workers) {
                    warn!(error = %e, "vacuum pass failed");
                }
            }
        });
        Vacuumer { signal, handle: Some(handle) }
    }

    /// Wakes the background thread and waits for it to exit. Idempotent.
    pub fn stop(&mut self) -> Result<()> {
        self.signal.stop.store(true, Ordering::Release);
        self.signal.condvar.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for Vacuumer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Runs one vacuum pass synchronously against the given horizon. Exposed so
/// callers (tests, and the CLI's `VACUUM` debug command) can force a sweep
/// instead of waiting for the background thread's next tick.
pub fn run_once(store: &MvccStore, wal: &Wal, horizon: u64, workers: usize) -> Result<()> {
    let keys = store.keys();
    if keys.is_empty() {
        return Ok(());
    }
    let (tx, rx) = crossbeam::channel::unbounded();
    for key in keys {
        tx.send(key).expect("receiver outlives every sender in this scope");
    }
    drop(tx);

    let worker_count = workers.max(1);
    crossbeam::thread::scope(|scope| {
        for _ in 0..worker_count {
            let rx = rx.clone();
            scope.spawn(|_| {
                while let Ok(key) = rx.recv() {
                    if let Err(e) = sweep_key(store, wal, &key, horizon) {
                        warn!(error = %e, key, "vacuum failed to sweep key");
                    }
                }
            });
        }
    })
    .expect("vacuum worker scope never panics");
    Ok(())
}

fn can_prune(x_max: u64, horizon: u64) -> bool {
    x_max != ID_ALIVE && x_max != horizon && precedes(x_max, horizon)
}

/// Walks one key's chain from the head, freezing every version whose
/// creator committed long enough ago that `xMin` no longer matters, and
/// severing the chain behind the first version whose own deletion
/// committed before the horizon. If the head itself is already prunable —
/// the key was deleted long enough ago that no live snapshot can see any
/// version of it — the whole chain is dropped from the map instead of
/// being walked at all.
fn sweep_key(store: &MvccStore, wal: &Wal, key: &str, horizon: u64) -> Result<()> {
    let chain = match store.chain(key) {
        Some(chain) => chain,
        None => return Ok(()),
    };

    let head = match chain.head() {
        Some(head) => head,
        None => return Ok(()),
    };

    if can_prune(head.x_max(), horizon) {
        store.remove_key(key);
        debug!(key, tx_id = head.x_max(), "vacuum pruned whole chain behind deleted head");
        return Ok(());
    }

    let mut parent: Option<Arc<crate::mvcc::Version>> = None;
    let mut cur = Some(head);
    while let Some(version) = cur {
        let x_min = version.x_min();
        if x_min != ID_FROZEN && x_min != horizon && precedes(x_min, horizon) {
            wal.append(&Record::Freeze { tx_id: x_min, key: key.as_bytes().to_vec() })?;
            version.freeze();
            debug!(key, tx_id = x_min, "vacuum froze version");
        }

        let x_max = version.x_max();
        if can_prune(x_max, horizon) {
            // `version` itself is invisible to every live snapshot now — the
            // version that superseded it is visible instead. Cut it, and
            // everything behind it, off the chain entirely.
            if let Some(parent) = &parent {
                parent.set_prev(None);
            }
            debug!(key, tx_id = x_max, "vacuum pruned chain behind deleted version");
            break;
        }

        parent = Some(version.clone());
        cur = version.prev();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn freezes_old_version_and_prunes_chain_behind_old_overwrite() {
        let manager = TransactionManager::for_tests();
        let store = MvccStore::new();

        let tx1 = manager.clone().begin().unwrap();
        store.set(&tx1, "a", b"1".to_vec()).unwrap();
        tx1.commit().unwrap();

        let tx2 = manager.clone().begin().unwrap();
        store.set(&tx2, "a", b"2".to_vec()).unwrap();
        tx2.commit().unwrap();

        // Every real transaction has long since finished; a manufactured
        // far-future horizon makes both versions ancient.
        let horizon = 1_000_000;
        let dir = tempfile::tempdir().unwrap();
        let wal = Wal::open(dir.path(), 0, 1 << 20, 4096, Duration::from_millis(1)).unwrap();

        sweep_key(&store, &wal, "a", horizon).unwrap();

        let chain = store.chain("a").unwrap();
        let head = chain.head().unwrap();
        assert_eq!(head.value, Some(b"2".to_vec()), "live head remains");
        assert!(head.prev().is_none(), "chain behind the old overwrite was pruned");
    }

    #[test]
    fn vacuum_removes_whole_chain_behind_an_old_delete() {
        let manager = TransactionManager::for_tests();
        let store = MvccStore::new();

        let tx1 = manager.clone().begin().unwrap();
        store.set(&tx1, "a", b"1".to_vec()).unwrap();
        tx1.commit().unwrap();

        let tx2 = manager.clone().begin().unwrap();
        store.delete(&tx2, "a").unwrap();
        tx2.commit().unwrap();

        // The delete killed the head's own xMax in place: once that kill is
        // ancient, the whole chain — not just the links behind it — must go.
        let horizon = 1_000_000;
        let dir = tempfile::tempdir().unwrap();
        let wal = Wal::open(dir.path(), 0, 1 << 20, 4096, Duration::from_millis(1)).unwrap();

        sweep_key(&store, &wal, "a", horizon).unwrap();

        assert!(store.chain("a").is_none(), "whole chain removed from the map");
    }

    #[test]
    fn leaves_live_version_chain_alone() {
        let manager = TransactionManager::for_tests();
        let store = MvccStore::new();
        let tx = manager.clone().begin().unwrap();
        store.set(&tx, "a", b"1".to_vec()).unwrap();
        tx.commit().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let wal = Wal::open(dir.path(), 0, 1 << 20, 4096, Duration::from_millis(1)).unwrap();
        // Horizon predates every transaction: nothing should freeze or prune.
        sweep_key(&store, &wal, "a", 0).unwrap();

        let chain = store.chain("a").unwrap();
        let head = chain.head().unwrap();
        assert_eq!(head.value, Some(b"1".to_vec()));
    }
}
