//! The immutable view of "who else was running" captured at `begin`.

use std::collections::HashSet;
use std::sync::Arc;

/// `xMin` is the oldest transaction active when the snapshot was taken;
/// `xMax` is the capturing transaction's own ID; `active` is the frozen
/// copy of every ID that was active at capture time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub x_min: u64,
    pub x_max: u64,
    pub active: Arc<HashSet<u64>>,
}

impl Snapshot {
    pub fn is_active(&self, id: u64) -> bool {
        self.active.contains(&id)
    }
}
