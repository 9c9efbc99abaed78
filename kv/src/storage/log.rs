//! Appendable multi-file byte stream: a sequence of fixed-capacity segment
//! files named `wal-%09d.log`, presented through one seek/read/write/sync
//! interface.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::segment::Segment;

fn segment_path(dir: &Path, seq: u64) -> PathBuf {
    dir.join(format!("wal-{seq:09}.log"))
}

fn to_io_error(e: crate::error::Error) -> io::Error {
    match e {
        crate::error::Error::Io(io_err) => io_err,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

/// A segmented append-only log. Segments are numbered `logStart + offset`;
/// offset 0 is the oldest loaded segment, the last entry in `segments` is
/// the active (writable) one.
pub struct SegmentedLog {
    dir: PathBuf,
    log_start: u64,
    capacity: u64,
    segments: Vec<Segment>,
    read_idx: usize,
}

impl SegmentedLog {
    /// Opens (creating the directory and segments as needed) every segment
    /// from offset 0 until one with spare capacity is found; that one
    /// becomes active.
    pub fn open(dir: &Path, log_start: u64, capacity: u64) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mut segments = Vec::new();
        let mut offset = 0u64;
        loop {
            let seq = log_start + offset;
            let segment = Segment::open(&segment_path(dir, seq), seq, capacity)?;
            let has_room = segment.remaining()? > 0;
            segments.push(segment);
            if has_room {
                break;
            }
            offset += 1;
        }

        Ok(SegmentedLog { dir: dir.to_path_buf(), log_start, capacity, segments, read_idx: 0 })
    }

    pub fn log_start(&self) -> u64 {
        self.log_start
    }

    pub fn active_seq(&self) -> u64 {
        self.segments.last().expect("at least one segment is always loaded").seq
    }

    fn roll(&mut self) -> Result<()> {
        let next_seq = self.active_seq() + 1;
        let segment = Segment::open(&segment_path(&self.dir, next_seq), next_seq, self.capacity)?;
        self.segments.push(segment);
        Ok(())
    }

    /// Flushes and fsyncs every segment written since the last sync. Cheap
    /// to over-call: segments beyond the active one are already full and
    /// `sync_all` on an up-to-date file descriptor is close to free.
    pub fn sync(&mut self) -> Result<()> {
        for segment in &mut self.segments {
            segment.file.sync_all()?;
        }
        Ok(())
    }

    /// Flushes and syncs the active segment, matching close semantics for a
    /// log that will not be written to again.
    pub fn close(&mut self) -> Result<()> {
        self.segments.last_mut().expect("at least one segment").file.sync_all()?;
        Ok(())
    }
}

impl Read for SegmentedLog {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.read_idx >= self.segments.len() {
                return Ok(0);
            }
            let n = self.segments[self.read_idx].file.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            if self.read_idx + 1 < self.segments.len() {
                self.read_idx += 1;
            } else {
                return Ok(0);
            }
        }
    }
}

impl Write for SegmentedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let remaining = self.segments.last().unwrap().remaining().map_err(to_io_error)?;
            if remaining == 0 {
                self.roll().map_err(to_io_error)?;
                continue;
            }
            let n = remaining.min(buf.len() as u64) as usize;
            let active = self.segments.last_mut().unwrap();
            active.file.seek(SeekFrom::End(0))?;
            active.file.write_all(&buf[..n])?;
            return Ok(n);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.segments.last_mut().unwrap().file.flush()
    }
}

impl Seek for SegmentedLog {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(0) => {
                self.read_idx = 0;
                self.segments[0].file.seek(SeekFrom::Start(0))
            }
            other => {
                self.read_idx = self.segments.len() - 1;
                self.segments.last_mut().unwrap().file.seek(other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read as _, Seek as _, Write as _};

    #[test]
    fn writes_roll_across_segments() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SegmentedLog::open(dir.path(), 0, 8).unwrap();

        log.write_all(b"0123456789").unwrap();
        assert_eq!(log.active_seq(), 1);
        assert!(dir.path().join("wal-000000000.log").exists());
        assert!(dir.path().join("wal-000000001.log").exists());
    }

    #[test]
    fn reads_span_segments() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = SegmentedLog::open(dir.path(), 0, 8).unwrap();
            log.write_all(b"0123456789").unwrap();
            log.sync().unwrap();
        }

        let mut log = SegmentedLog::open(dir.path(), 0, 8).unwrap();
        log.seek(SeekFrom::Start(0)).unwrap();
        let mut out = Vec::new();
        log.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"0123456789");
    }

    #[test]
    fn reopen_resumes_active_segment() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = SegmentedLog::open(dir.path(), 0, 8).unwrap();
            log.write_all(b"01234567").unwrap();
            log.sync().unwrap();
        }
        let log = SegmentedLog::open(dir.path(), 0, 8).unwrap();
        assert_eq!(log.active_seq(), 1);
    }
}
