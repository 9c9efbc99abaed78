//! Error taxonomy shared by every layer of the engine, from the record codec
//! up through the command façade.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key not found")]
    KeyNotFound,

    #[error("serialization conflict: concurrent writer won the row")]
    SerializationError,

    #[error("transaction is not active")]
    TransactionNotActive,

    #[error("maximum number of active transactions exceeded")]
    MaxActiveTransactionsExceeded,

    #[error("manifest checksum mismatch")]
    ManifestChecksumMismatch,

    #[error("record checksum mismatch")]
    ChecksumMismatch,

    #[error("write-ahead log is closed")]
    WriteAheadLogClosed,

    #[error("key exceeds maximum size")]
    KeyTooLong,

    #[error("value exceeds maximum size")]
    ValueTooLong,

    #[error("key must be non-empty and match [A-Za-z0-9_.-]+")]
    InvalidKey,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed command: {0}")]
    InvalidCommand(String),

    #[error("no transaction is open for this connection")]
    NoOpenTransaction,

    #[error("a transaction is already open for this connection")]
    TransactionAlreadyOpen,

    #[error("failed to load configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors a client should react to by aborting and retrying,
    /// as opposed to errors that indicate a malformed request or corruption.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::SerializationError)
    }
}
