//! `kvcli` is the interactive command-line client for the `kv` storage
//! engine: a line-oriented command façade over [`kv::engine::Engine`] plus
//! a `rustyline`-backed REPL for driving it at a terminal.
//!
//! ```doc
//! ❯ kvcli
//!
//! ██  ██  █        █
//! ██ ██   ██      ██
//! ███      ██    ██
//! ██ ██     ██  ██
//! ██  ██     ████  KV Storage CLI
//!
//! kvcli > BEGIN
//! OK
//! kvcli > SET order_key xxx
//! OK
//! kvcli > GET order_key
//! xxx
//! kvcli > COMMIT
//! OK
//! ```

pub mod facade;
pub mod repl;
pub mod rusty;
pub mod trace;
