//! Bit-exact encode/decode for write-ahead log records.
//!
//! Fixed 19-byte little-endian header:
//! `kind u8 | txID u64 | keyLen u16 | valueLen u32 | checksum u32`,
//! followed by `keyLen` key bytes and `valueLen` value bytes. The checksum
//! is CRC32-IEEE over `kind ∥ txID(8 LE) ∥ key ∥ value`.

use std::convert::TryInto;
use std::io::{self, Read};

use crate::error::{Error, Result};

pub const HEADER_LEN: usize = 1 + 8 + 2 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Tombstone = 0,
    Value = 1,
    Commit = 2,
    Freeze = 3,
}

impl RecordKind {
    fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(RecordKind::Tombstone),
            1 => Some(RecordKind::Value),
            2 => Some(RecordKind::Commit),
            3 => Some(RecordKind::Freeze),
            _ => None,
        }
    }
}

/// A single durable WAL event. `Tombstone` and `Freeze` carry a key but no
/// value; `Value` carries both; `Commit` carries neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Tombstone { tx_id: u64, key: Vec<u8> },
    Value { tx_id: u64, key: Vec<u8>, value: Vec<u8> },
    Commit { tx_id: u64 },
    Freeze { tx_id: u64, key: Vec<u8> },
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Tombstone { .. } => RecordKind::Tombstone,
            Record::Value { .. } => RecordKind::Value,
            Record::Commit { .. } => RecordKind::Commit,
            Record::Freeze { .. } => RecordKind::Freeze,
        }
    }

    pub fn tx_id(&self) -> u64 {
        match self {
            Record::Tombstone { tx_id, .. }
            | Record::Value { tx_id, .. }
            | Record::Commit { tx_id }
            | Record::Freeze { tx_id, .. } => *tx_id,
        }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Record::Tombstone { key, .. } => key,
            Record::Value { key, .. } => key,
            Record::Commit { .. } => &[],
            Record::Freeze { key, .. } => key,
        }
    }

    pub fn value(&self) -> &[u8] {
        match self {
            Record::Value { value, .. } => value,
            _ => &[],
        }
    }

    /// Encodes header, key, and value in a single contiguous buffer.
    pub fn encode(&self) -> Vec<u8> {
        let tx_id = self.tx_id();
        let key = self.key();
        let value = self.value();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[self.kind() as u8]);
        hasher.update(&tx_id.to_le_bytes());
        hasher.update(key);
        hasher.update(value);
        let checksum = hasher.finalize();

        let mut buf = Vec::with_capacity(HEADER_LEN + key.len() + value.len());
        buf.push(self.kind() as u8);
        buf.extend_from_slice(&tx_id.to_le_bytes());
        buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf.extend_from_slice(key);
        buf.extend_from_slice(value);
        buf
    }

    /// Decodes one record from `r`. Returns `Ok(None)` on a clean end of
    /// stream (no bytes available before the header); a truncated header or
    /// body surfaces as an `UnexpectedEof` io error.
    pub fn decode_from<R: Read>(r: &mut R) -> Result<Option<Record>> {
        let mut first = [0u8; 1];
        loop {
            match r.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }

        let mut rest = [0u8; HEADER_LEN - 1];
        r.read_exact(&mut rest)?;

        let kind_byte = first[0];
        let kind = RecordKind::from_u8(kind_byte).ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown WAL record kind {kind_byte}"),
            ))
        })?;
        let tx_id = u64::from_le_bytes(rest[0..8].try_into().unwrap());
        let key_len = u16::from_le_bytes(rest[8..10].try_into().unwrap()) as usize;
        let value_len = u32::from_le_bytes(rest[10..14].try_into().unwrap()) as usize;
        let checksum = u32::from_le_bytes(rest[14..18].try_into().unwrap());

        let mut key = vec![0u8; key_len];
        r.read_exact(&mut key)?;
        let mut value = vec![0u8; value_len];
        r.read_exact(&mut value)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[kind_byte]);
        hasher.update(&tx_id.to_le_bytes());
        hasher.update(&key);
        hasher.update(&value);
        if hasher.finalize() != checksum {
            return Err(Error::ChecksumMismatch);
        }

        let record = match kind {
            RecordKind::Tombstone => Record::Tombstone { tx_id, key },
            RecordKind::Value => Record::Value { tx_id, key, value },
            RecordKind::Commit => Record::Commit { tx_id },
            RecordKind::Freeze => Record::Freeze { tx_id, key },
        };
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(record: Record) {
        let bytes = record.encode();
        let decoded = Record::decode_from(&mut Cursor::new(bytes)).unwrap().unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn roundtrips_every_kind() {
        roundtrip(Record::Tombstone { tx_id: 7, key: b"k".to_vec() });
        roundtrip(Record::Value { tx_id: 8, key: b"k".to_vec(), value: b"v".to_vec() });
        roundtrip(Record::Commit { tx_id: 9 });
        roundtrip(Record::Freeze { tx_id: 10, key: b"k".to_vec() });
    }

    #[test]
    fn roundtrips_empty_key_and_value() {
        roundtrip(Record::Value { tx_id: 1, key: vec![], value: vec![] });
    }

    #[test]
    fn clean_eof_before_header_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(Record::decode_from(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn truncated_header_is_unexpected_eof() {
        let bytes = Record::Commit { tx_id: 1 }.encode();
        let mut cursor = Cursor::new(bytes[..5].to_vec());
        let err = Record::decode_from(&mut cursor).unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn checksum_mismatch_is_rejected() {
        let mut bytes = Record::Value { tx_id: 1, key: b"k".to_vec(), value: b"v".to_vec() }.encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = Record::decode_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch));
    }
}
