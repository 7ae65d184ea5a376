//! Engine configuration and derived slot sizing.

use pointstream_core::constants::NUM_WORKERS;

/// Tunables for the streaming runtime.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fraction of the retained block count given GPU-backed slots.
    pub slot_factor: f32,
    /// Loader thread count.
    pub num_workers: usize,
    /// Whether the host-side LRU second tier is used at all.
    pub subslots_enabled: bool,
    /// Prime the second tier with speculative loads on the first frame.
    pub warmup: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slot_factor: 0.125,
            num_workers: NUM_WORKERS,
            subslots_enabled: false,
            warmup: true,
        }
    }
}

impl EngineConfig {
    pub fn with_slot_factor(mut self, slot_factor: f32) -> Self {
        self.slot_factor = slot_factor;
        self
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn with_subslots(mut self, enabled: bool) -> Self {
        self.subslots_enabled = enabled;
        self
    }

    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }
}

/// Slot counts derived from the retained working set.
///
/// All three values come from the data, never from compile-time constants:
/// a denser cloud gets more points per slot, a sparser grid fewer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSizing {
    pub num_slots: usize,
    pub subslot_capacity: usize,
    /// Upper bound on points uploaded to one slot's buffer.
    pub points_per_slot: u32,
}

impl SlotSizing {
    pub fn derive(config: &EngineConfig, retained_blocks: usize, vertex_count: u64) -> Self {
        assert!(retained_blocks > 0, "cannot size slots for an empty scene");
        let num_slots = ((config.slot_factor * retained_blocks as f32) as usize).max(1);
        let subslot_capacity = if config.subslots_enabled {
            (0.5 * config.slot_factor * retained_blocks as f32) as usize
        } else {
            0
        };
        let points_per_slot = vertex_count.div_ceil(retained_blocks as u64) as u32;
        Self {
            num_slots,
            subslot_capacity,
            points_per_slot,
        }
    }

    /// Bytes of one slot's vertex buffer.
    pub fn slot_capacity_bytes(&self) -> usize {
        self.points_per_slot as usize * std::mem::size_of::<pointstream_core::Point>()
    }
}
