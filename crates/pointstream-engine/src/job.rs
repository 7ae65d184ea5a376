//! Load jobs and results exchanged with the loader pool.
//!
//! Both are owned values moved through the queues; point buffers are never
//! aliased across the thread boundary.

use std::path::PathBuf;

use pointstream_core::{BlockId, Point};

/// Which residency tier a load is destined for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    /// A slot in the fixed GPU-backed table.
    Slot,
    /// The host-side LRU second tier.
    Subslot,
}

/// A request to read one block's points off disk.
#[derive(Clone, Debug)]
pub struct LoadJob {
    pub block_id: BlockId,
    /// Slot the result lands in (meaningful for `Destination::Slot`).
    pub slot_idx: usize,
    /// Points to read, already capped to the slot capacity.
    pub count: u32,
    pub destination: Destination,
    pub path: PathBuf,
}

/// A finished load: the job's routing fields plus the points read.
pub struct LoadResult {
    pub block_id: BlockId,
    pub slot_idx: usize,
    pub count: u32,
    pub destination: Destination,
    /// Empty on a failed or short read; the block draws as a no-op.
    pub points: Vec<Point>,
}

impl std::fmt::Debug for LoadResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadResult")
            .field("block_id", &self.block_id)
            .field("slot_idx", &self.slot_idx)
            .field("count", &self.count)
            .field("destination", &self.destination)
            .field("points", &self.points.len())
            .finish()
    }
}
