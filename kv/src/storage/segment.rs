//! A single fixed-capacity file backing one slot of a [`super::log::SegmentedLog`].

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::FileExt;

use crate::error::Result;

pub struct Segment {
    pub seq: u64,
    pub path: PathBuf,
    pub file: File,
    pub capacity: u64,
}

impl Segment {
    /// Opens `path`, creating it if absent, and takes an exclusive lock for
    /// the lifetime of the handle so two processes cannot share one log dir.
    pub fn open(path: &Path, seq: u64, capacity: u64) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).create(true).open(path)?;
        file.try_lock_exclusive()?;
        Ok(Segment { seq, path: path.to_path_buf(), file, capacity })
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn remaining(&self) -> Result<u64> {
        Ok(self.capacity.saturating_sub(self.len()?))
    }
}
