//! Wire codec for write-ahead log records.

mod record;

pub use record::{Record, RecordKind, HEADER_LEN};
