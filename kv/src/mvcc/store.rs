//! In-memory MVCC version management: visible reads, and the
//! compare-and-swap retry loop that installs new versions at the head of a
//! key's chain.

use crate::error::{Error, Result};
use crate::mvcc::transaction::Transaction;
use crate::mvcc::txid::ID_ALIVE;
use crate::mvcc::version::{Version, VersionMap};

pub struct MvccStore {
    versions: VersionMap,
}

impl MvccStore {
    pub fn new() -> Self {
        MvccStore { versions: VersionMap::new() }
    }

    pub fn get(&self, tx: &Transaction, key: &str) -> Result<Option<Vec<u8>>> {
        match self.versions.get(key) {
            Some(chain) => Ok(chain.find_visible(|x_min, x_max| tx.can_see(x_min, x_max)).and_then(|v| v.value.clone())),
            None => Ok(None),
        }
    }

    pub fn set(&self, tx: &Transaction, key: &str, value: Vec<u8>) -> Result<()> {
        let chain = self.versions.get_or_create(key);
        loop {
            let head = chain.head();
            if let Err(e) = self.try_update(tx, head.as_deref()) {
                return Err(e);
            }

            let new_version = Version::new(key.to_string(), Some(value.clone()), tx.id, head.clone());
            if chain.compare_and_swap_head(&head, new_version.clone()) {
                tx.register(new_version);
                if let Some(h) = head {
                    tx.register(h);
                }
                return Ok(());
            }
            if let Some(h) = &head {
                h.resurrect();
            }
        }
    }

    /// Same `xMax is IdAlive` / `CanSee` / CAS discipline as `try_delete`,
    /// except a version this transaction already wrote is replaced without
    /// killing it again — there is no conflict to check against our own
    /// earlier write.
    fn try_update(&self, tx: &Transaction, latest: Option<&Version>) -> Result<()> {
        let latest = match latest {
            Some(latest) => latest,
            None => return Ok(()),
        };
        let x_max = latest.x_max();
        if x_max == tx.id {
            return Ok(());
        }
        if x_max != ID_ALIVE {
            return Err(Error::SerializationError);
        }
        if !tx.can_see(latest.x_min(), x_max) {
            return Err(Error::SerializationError);
        }
        if !latest.try_kill(tx.id) {
            return Err(Error::SerializationError);
        }
        Ok(())
    }

    /// Kills the current head's own `xMax` in place — no new version, no
    /// head-swap. Errs with `KeyNotFound` if the chain has no head at all;
    /// otherwise uses the same `xMax is IdAlive` / `CanSee` / CAS discipline
    /// as `try_update`, but with no self-delete exception and no retry: a
    /// lost race is reported as a serialization conflict immediately,
    /// matching `tryDelete`.
    pub fn delete(&self, tx: &Transaction, key: &str) -> Result<()> {
        let chain = match self.versions.get(key) {
            Some(chain) => chain,
            None => return Err(Error::KeyNotFound),
        };
        let head = match chain.head() {
            Some(head) => head,
            None => return Err(Error::KeyNotFound),
        };
        self.try_delete(tx, &head)?;
        tx.register(head);
        Ok(())
    }

    fn try_delete(&self, tx: &Transaction, head: &Version) -> Result<()> {
        let x_max = head.x_max();
        if x_max != ID_ALIVE {
            return Err(Error::SerializationError);
        }
        if !tx.can_see(head.x_min(), x_max) {
            return Err(Error::SerializationError);
        }
        if !head.try_kill(tx.id) {
            return Err(Error::SerializationError);
        }
        Ok(())
    }

    pub(crate) fn recovered_chain(&self, key: &str) -> std::sync::Arc<crate::mvcc::version::VersionChain> {
        self.versions.get_or_create(key)
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.versions.keys()
    }

    pub(crate) fn chain(&self, key: &str) -> Option<std::sync::Arc<crate::mvcc::version::VersionChain>> {
        self.versions.get(key)
    }

    /// Removes a key's entire chain from the map outright — used by vacuum
    /// once the chain's head is itself prunable, and by recovery when a
    /// committed `Tombstone` record means the key no longer exists.
    pub(crate) fn remove_key(&self, key: &str) {
        self.versions.remove(key);
    }
}

impl Default for MvccStore {
    fn default() -> Self {
        MvccStore::new()
    }
}
