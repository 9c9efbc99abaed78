//! Parses and executes the small line-oriented command language the REPL
//! and non-interactive readers both speak: `BEGIN`, `COMMIT`, `ABORT`,
//! `GET key`, `SET key value...`, `DELETE key`. One façade owns at most one
//! open transaction at a time.

use std::sync::Arc;

use kv::engine::Engine;
use kv::error::{Error, Result};
use kv::mvcc::Transaction;

pub struct Facade {
    engine: Arc<Engine>,
    current_tx: Option<Transaction>,
}

impl Facade {
    pub fn new(engine: Arc<Engine>) -> Self {
        Facade { engine, current_tx: None }
    }

    pub fn has_open_transaction(&self) -> bool {
        self.current_tx.is_some()
    }

    /// Executes one line of input, returning the text to print on success.
    pub fn execute(&mut self, line: &str) -> Result<String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((verb, rest)) = tokens.split_first() else {
            return Ok(String::new());
        };

        match verb.to_ascii_uppercase().as_str() {
            "BEGIN" => self.begin(rest),
            "COMMIT" => self.commit(rest),
            "ABORT" => self.abort(rest),
            "GET" => self.get(rest),
            "SET" => self.set(rest),
            "DELETE" | "DEL" => self.delete(rest),
            "VACUUM" => self.vacuum(rest),
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }

    fn begin(&mut self, rest: &[&str]) -> Result<String> {
        if !rest.is_empty() {
            return Err(Error::InvalidCommand("BEGIN takes no arguments".into()));
        }
        if self.current_tx.is_some() {
            return Err(Error::TransactionAlreadyOpen);
        }
        self.current_tx = Some(self.engine.begin()?);
        Ok("OK".to_string())
    }

    fn commit(&mut self, rest: &[&str]) -> Result<String> {
        if !rest.is_empty() {
            return Err(Error::InvalidCommand("COMMIT takes no arguments".into()));
        }
        let tx = self.current_tx.take().ok_or(Error::NoOpenTransaction)?;
        self.engine.commit(&tx)?;
        Ok("OK".to_string())
    }

    fn abort(&mut self, rest: &[&str]) -> Result<String> {
        if !rest.is_empty() {
            return Err(Error::InvalidCommand("ABORT takes no arguments".into()));
        }
        let tx = self.current_tx.take().ok_or(Error::NoOpenTransaction)?;
        self.engine.abort(&tx)?;
        Ok("OK".to_string())
    }

    fn get(&mut self, rest: &[&str]) -> Result<String> {
        let [key] = rest else {
            return Err(Error::InvalidCommand("usage: GET key".into()));
        };
        let tx = self.current_tx.as_ref().ok_or(Error::NoOpenTransaction)?;
        match self.engine.get(tx, key)? {
            Some(value) => Ok(String::from_utf8_lossy(&value).into_owned()),
            None => Ok("(nil)".to_string()),
        }
    }

    fn set(&mut self, rest: &[&str]) -> Result<String> {
        if rest.len() < 2 {
            return Err(Error::InvalidCommand("usage: SET key value".into()));
        }
        let key = rest[0];
        let value = rest[1..].join(" ");
        let tx = self.current_tx.as_ref().ok_or(Error::NoOpenTransaction)?;
        self.engine.set(tx, key, value.into_bytes())?;
        Ok("OK".to_string())
    }

    fn delete(&mut self, rest: &[&str]) -> Result<String> {
        let [key] = rest else {
            return Err(Error::InvalidCommand("usage: DELETE key".into()));
        };
        let tx = self.current_tx.as_ref().ok_or(Error::NoOpenTransaction)?;
        self.engine.delete(tx, key)?;
        Ok("OK".to_string())
    }

    /// Debug command: forces one synchronous vacuum pass rather than waiting
    /// for the engine's background sweep.
    fn vacuum(&mut self, rest: &[&str]) -> Result<String> {
        if !rest.is_empty() {
            return Err(Error::InvalidCommand("VACUUM takes no arguments".into()));
        }
        self.engine.vacuum_now()?;
        Ok("OK".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv::config::Config;

    fn facade(dir: &std::path::Path) -> Facade {
        let cfg = Config {
            log_dir: dir.join("log").to_string_lossy().into_owned(),
            log_manifest_path: dir.join("log-manifest.bin").to_string_lossy().into_owned(),
            tx_manifest_path: dir.join("tx-manifest.bin").to_string_lossy().into_owned(),
            wal_commit_wait_ms: 1,
            vacuum_interval_secs: 3600,
            ..Config::default()
        };
        Facade::new(Engine::open(&cfg).unwrap())
    }

    #[test]
    fn full_transaction_cycle_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = facade(dir.path());
        assert_eq!(f.execute("BEGIN").unwrap(), "OK");
        assert_eq!(f.execute("SET greeting hello there").unwrap(), "OK");
        assert_eq!(f.execute("GET greeting").unwrap(), "hello there");
        assert_eq!(f.execute("COMMIT").unwrap(), "OK");

        assert_eq!(f.execute("BEGIN").unwrap(), "OK");
        assert_eq!(f.execute("GET greeting").unwrap(), "hello there");
        assert_eq!(f.execute("DELETE greeting").unwrap(), "OK");
        assert_eq!(f.execute("GET greeting").unwrap(), "(nil)");
        assert_eq!(f.execute("ABORT").unwrap(), "OK");
    }

    #[test]
    fn rejects_commands_without_an_open_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = facade(dir.path());
        let err = f.execute("GET anything").unwrap_err();
        assert!(matches!(err, Error::NoOpenTransaction));
    }

    #[test]
    fn rejects_nested_begin() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = facade(dir.path());
        f.execute("BEGIN").unwrap();
        let err = f.execute("BEGIN").unwrap_err();
        assert!(matches!(err, Error::TransactionAlreadyOpen));
    }

    #[test]
    fn vacuum_command_runs_outside_a_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = facade(dir.path());
        assert_eq!(f.execute("VACUUM").unwrap(), "OK");
    }

    #[test]
    fn rejects_unknown_verbs_and_malformed_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = facade(dir.path());
        assert!(matches!(f.execute("FROB key").unwrap_err(), Error::UnknownCommand(_)));
        f.execute("BEGIN").unwrap();
        assert!(matches!(f.execute("SET onlykey").unwrap_err(), Error::InvalidCommand(_)));
    }
}
