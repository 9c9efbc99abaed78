//! Crash recovery: a two-pass replay of the write-ahead log that rebuilds
//! every key's version chain in memory before the engine accepts its first
//! command.
//!
//! Pass one collects every transaction ID that reached a `Commit` record.
//! Pass two applies `Value`/`Tombstone` records only for those committed
//! IDs — records left behind by a transaction that never committed are
//! simply skipped, exactly as if they had never been appended. `Freeze`
//! records apply unconditionally: they describe a vacuum decision that was
//! already durable as soon as it hit the log, not a user transaction.

use std::collections::HashSet;

use crate::codec::Record;
use crate::error::Result;
use crate::mvcc::{MvccStore, TransactionManager, Version};
use crate::storage::Wal;

fn bytes_to_key(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn recover(wal: &Wal, store: &MvccStore, manager: &TransactionManager) -> Result<()> {
    let mut committed = HashSet::new();
    let mut highest_tx_id = 0u64;

    wal.replay(|record| {
        highest_tx_id = highest_tx_id.max(record.tx_id());
        if let Record::Commit { tx_id } = record {
            committed.insert(tx_id);
        }
        Ok(())
    })?;

    wal.replay(|record| {
        apply(store, &committed, record);
        Ok(())
    })?;

    manager.observe_recovered_id(highest_tx_id);
    Ok(())
}

fn apply(store: &MvccStore, committed: &HashSet<u64>, record: Record) {
    match record {
        Record::Value { tx_id, key, value } if committed.contains(&tx_id) => {
            let key = bytes_to_key(&key);
            let chain = store.recovered_chain(&key);
            let prev = chain.head();
            let version = Version::recovered(key, Some(value), tx_id);
            version.set_prev(prev);
            chain.force_set_head(version);
        }
        Record::Tombstone { tx_id, key } if committed.contains(&tx_id) => {
            let key = bytes_to_key(&key);
            store.remove_key(&key);
        }
        Record::Freeze { tx_id, key } => {
            let key = bytes_to_key(&key);
            if let Some(chain) = store.chain(&key) {
                let mut cur = chain.head();
                while let Some(v) = cur {
                    if v.x_min() == tx_id {
                        v.freeze();
                        break;
                    }
                    cur = v.prev();
                }
            }
        }
        // Left behind by a transaction that never committed, or a record
        // kind with no recovery-time effect of its own (`Commit`).
        Record::Value { .. } | Record::Tombstone { .. } | Record::Commit { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::txid::FIRST_REAL_ID;
    use crate::storage::Manifest;
    use std::sync::Arc;
    use std::time::Duration;

    fn open_wal(dir: &std::path::Path) -> Wal {
        Wal::open(dir, 0, 1 << 20, 4096, Duration::from_millis(1)).unwrap()
    }

    #[test]
    fn replays_only_committed_writes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let wal = open_wal(dir.path());
            wal.append(&Record::Value { tx_id: 2, key: b"a".to_vec(), value: b"1".to_vec() }).unwrap();
            wal.append(&Record::Commit { tx_id: 2 }).unwrap();
            wal.append(&Record::Value { tx_id: 3, key: b"b".to_vec(), value: b"uncommitted".to_vec() }).unwrap();
            wal.close().unwrap();
        }

        // One handle this time, shared by the replayer and the manager it
        // feeds, matching how the engine wires them in production — two
        // separate opens of the same segment would fight over its flock.
        let wal = Arc::new(open_wal(dir.path()));
        let store = MvccStore::new();
        let manifest = Manifest::open(&dir.path().join("tx.manifest"), FIRST_REAL_ID).unwrap();
        let manager = TransactionManager::new(manifest, wal.clone(), 100, 16).unwrap();

        recover(&wal, &store, &manager).unwrap();

        let tx = manager.begin().unwrap();
        assert_eq!(store.get(&tx, "a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(&tx, "b").unwrap(), None);
    }

    #[test]
    fn replays_committed_tombstone_over_prior_value() {
        let dir = tempfile::tempdir().unwrap();
        {
            let wal = open_wal(dir.path());
            wal.append(&Record::Value { tx_id: 2, key: b"a".to_vec(), value: b"1".to_vec() }).unwrap();
            wal.append(&Record::Commit { tx_id: 2 }).unwrap();
            wal.append(&Record::Tombstone { tx_id: 3, key: b"a".to_vec() }).unwrap();
            wal.append(&Record::Commit { tx_id: 3 }).unwrap();
            wal.close().unwrap();
        }

        let wal = Arc::new(open_wal(dir.path()));
        let store = MvccStore::new();
        let manifest = Manifest::open(&dir.path().join("tx.manifest"), FIRST_REAL_ID).unwrap();
        let manager = TransactionManager::new(manifest, wal.clone(), 100, 16).unwrap();

        recover(&wal, &store, &manager).unwrap();

        let tx = manager.begin().unwrap();
        assert_eq!(store.get(&tx, "a").unwrap(), None);
    }
}
