//! Durable, checksummed 12-byte manifests: 8-byte little-endian value plus a
//! 4-byte CRC32-IEEE trailer. Used both by the transaction manifest
//! (`reservedUntil`) and the log manifest (`logStart`) — same layout, same
//! checksum recipe, different meaning of the stored `u64`.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Error, Result};

const FILE_LEN: usize = 12;

fn checksum(value: u64) -> u32 {
    // The checksummed scratch buffer is the value's 8 LE bytes followed by
    // 4 zero bytes — the same 12-byte layout as the on-disk record, with the
    // checksum field itself zeroed.
    let mut scratch = [0u8; FILE_LEN];
    scratch[0..8].copy_from_slice(&value.to_le_bytes());
    crc32fast::hash(&scratch)
}

/// A single `u64` durably persisted behind a checksum, serialized writes.
pub struct Manifest {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Manifest {
    /// Opens the manifest at `path`, creating it with `default` if absent.
    pub fn open(path: &Path, default: u64) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let manifest = Manifest { path: path.to_path_buf(), lock: Mutex::new(()) };
        if !path.exists() {
            manifest.write(default)?;
        } else {
            // Validate on open so corruption surfaces immediately.
            manifest.read()?;
        }
        Ok(manifest)
    }

    pub fn read(&self) -> Result<u64> {
        let _guard = self.lock.lock();
        self.read_locked()
    }

    fn read_locked(&self) -> Result<u64> {
        let mut file = OpenOptions::new().read(true).open(&self.path)?;
        let mut buf = [0u8; FILE_LEN];
        file.read_exact(&mut buf)?;
        let value = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let stored_checksum = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        if checksum(value) != stored_checksum {
            return Err(Error::ManifestChecksumMismatch);
        }
        Ok(value)
    }

    fn write(&self, value: u64) -> Result<()> {
        let _guard = self.lock.lock();
        self.write_locked(value)
    }

    fn write_locked(&self, value: u64) -> Result<()> {
        let mut file = OpenOptions::new().write(true).create(true).open(&self.path)?;
        let mut buf = [0u8; FILE_LEN];
        buf[0..8].copy_from_slice(&value.to_le_bytes());
        buf[8..12].copy_from_slice(&checksum(value).to_le_bytes());
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buf)?;
        file.sync_all()?;
        Ok(())
    }

    /// Reads the current value, advances it by `delta`, writes and fsyncs
    /// the new value, and returns `(old, new)`. Fully serialized by the
    /// manifest's own lock.
    pub fn advance(&self, delta: u64) -> Result<(u64, u64)> {
        let _guard = self.lock.lock();
        let old = self.read_locked()?;
        let new = old + delta;
        self.write_locked(new)?;
        Ok((old, new))
    }
}
