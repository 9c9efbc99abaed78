//! A single row version, the per-key chain of versions, and the concurrent
//! map from key to chain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::mvcc::txid::ID_ALIVE;

/// One MVCC version of one key. `xMin`/`xMax` are real atomics so readers
/// can check visibility without ever taking a lock; `prev` links backward
/// to the version it superseded and is severed only by vacuum once no
/// reader can still reach it.
pub struct Version {
    pub key: String,
    pub value: Option<Vec<u8>>,
    x_min: AtomicU64,
    x_max: AtomicU64,
    prev: ArcSwapOption<Version>,
}

impl Version {
    pub fn new(key: String, value: Option<Vec<u8>>, tx_id: u64, prev: Option<Arc<Version>>) -> Arc<Version> {
        Arc::new(Version {
            key,
            value,
            x_min: AtomicU64::new(tx_id),
            x_max: AtomicU64::new(ID_ALIVE),
            prev: ArcSwapOption::from(prev),
        })
    }

    /// Reconstructs a version for recovery, where `xMin` is the committed
    /// creating transaction and `xMax` starts alive.
    pub fn recovered(key: String, value: Option<Vec<u8>>, tx_id: u64) -> Arc<Version> {
        Version::new(key, value, tx_id, None)
    }

    pub fn x_min(&self) -> u64 {
        self.x_min.load(Ordering::Acquire)
    }

    pub fn x_max(&self) -> u64 {
        self.x_max.load(Ordering::Acquire)
    }

    pub fn prev(&self) -> Option<Arc<Version>> {
        self.prev.load_full()
    }

    pub fn set_prev(&self, prev: Option<Arc<Version>>) {
        self.prev.store(prev);
    }

    /// Marks this version deleted by `tx_id`, provided nobody beat us to
    /// it. Returns whether the CAS won.
    pub fn try_kill(&self, tx_id: u64) -> bool {
        self.x_max.compare_exchange(ID_ALIVE, tx_id, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// Undoes a kill (abort) or a not-yet-committed delete-in-progress.
    pub fn resurrect(&self) {
        self.x_max.store(ID_ALIVE, Ordering::Release);
    }

    /// Rewrites `xMin` to the frozen sentinel once every live snapshot
    /// would see this version as ancient history anyway.
    pub fn freeze(&self) {
        self.x_min.store(crate::mvcc::txid::ID_FROZEN, Ordering::Release);
    }
}

/// The lock-protected head of one key's version chain. `xMin`/`xMax` CAS
/// independently of this lock; only the head pointer itself needs mutual
/// exclusion, and critical sections here are a single pointer compare.
pub struct VersionChain {
    head: Mutex<Option<Arc<Version>>>,
}

impl VersionChain {
    pub fn new(initial: Option<Arc<Version>>) -> Self {
        VersionChain { head: Mutex::new(initial) }
    }

    pub fn head(&self) -> Option<Arc<Version>> {
        self.head.lock().clone()
    }

    /// Swaps the head from `expected` to `new`, succeeding only if nobody
    /// else changed it first (compared by pointer identity, matching a CAS
    /// on a raw atomic pointer).
    pub fn compare_and_swap_head(&self, expected: &Option<Arc<Version>>, new: Arc<Version>) -> bool {
        let mut guard = self.head.lock();
        let matches = match (guard.as_ref(), expected.as_ref()) {
            (Some(current), Some(exp)) => Arc::ptr_eq(current, exp),
            (None, None) => true,
            _ => false,
        };
        if matches {
            *guard = Some(new);
        }
        matches
    }

    /// Unconditionally installs `new` as head — used only during
    /// single-threaded recovery replay, where no concurrent writer exists.
    pub fn force_set_head(&self, new: Arc<Version>) {
        *self.head.lock() = Some(new);
    }

    /// Walks from head backward, returning the first version for which
    /// `can_see(xMin, xMax)` holds.
    pub fn find_visible(&self, can_see: impl Fn(u64, u64) -> bool) -> Option<Arc<Version>> {
        let mut cur = self.head();
        while let Some(v) = cur {
            if can_see(v.x_min(), v.x_max()) {
                return Some(v);
            }
            cur = v.prev();
        }
        None
    }
}

/// Concurrent map from key to version chain.
pub struct VersionMap {
    chains: DashMap<String, Arc<VersionChain>>,
}

impl VersionMap {
    pub fn new() -> Self {
        VersionMap { chains: DashMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<Arc<VersionChain>> {
        self.chains.get(key).map(|entry| entry.clone())
    }

    pub fn get_or_create(&self, key: &str) -> Arc<VersionChain> {
        self.chains.entry(key.to_string()).or_insert_with(|| Arc::new(VersionChain::new(None))).clone()
    }

    pub fn remove(&self, key: &str) {
        self.chains.remove(key);
    }

    /// Snapshot of every key currently tracked, for the vacuumer to sweep.
    pub fn keys(&self) -> Vec<String> {
        self.chains.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl Default for VersionMap {
    fn default() -> Self {
        VersionMap::new()
    }
}
