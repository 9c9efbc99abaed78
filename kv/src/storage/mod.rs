//! Durable, on-disk collaborators for the engine: segment files, the
//! segmented log they compose into, checksummed manifests, and the
//! write-ahead log built on top of both.

mod log;
mod manifest;
mod segment;
mod wal;

pub use log::SegmentedLog;
pub use manifest::Manifest;
pub use wal::Wal;
