//! Multi-version concurrency control: transaction IDs, snapshots, version
//! chains, and the store and manager built on top of them.

mod manager;
mod snapshot;
mod store;
mod transaction;
pub mod txid;
mod version;

pub use manager::TransactionManager;
pub use snapshot::Snapshot;
pub use store::MvccStore;
pub use transaction::Transaction;
pub use version::{Version, VersionChain, VersionMap};
