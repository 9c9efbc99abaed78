//! `kv` is a transactional, snapshot-isolated key-value storage engine.
//!
//! Reads and writes go through short-lived [`mvcc::Transaction`] handles
//! begun from an [`Engine`](engine::Engine): each transaction sees a
//! consistent snapshot of the keyspace as of its own `begin`, writers never
//! block readers, and concurrent writers to the same key resolve by
//! first-committer-wins, surfacing a serialization error to the loser.
//! Every mutation is durable: it is appended to a segmented write-ahead log
//! under group commit before the owning transaction's `commit` returns, and
//! a crash is recovered by replaying that log back into memory.
//!
//! ## Getting started
//!
//! ```no_run
//! use kv::config::Config;
//! use kv::engine::Engine;
//!
//! fn run() -> kv::error::Result<()> {
//!     let cfg = Config::default();
//!     let engine = Engine::open(&cfg)?;
//!
//!     let tx = engine.begin()?;
//!     engine.set(&tx, "a", b"1".to_vec())?;
//!     engine.commit(&tx)?;
//!
//!     let tx = engine.begin()?;
//!     assert_eq!(engine.get(&tx, "a")?, Some(b"1".to_vec()));
//!     engine.commit(&tx)?;
//!
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod disposer;
pub mod engine;
pub mod error;
pub mod mvcc;
pub mod recovery;
pub mod storage;
pub mod vacuum;
