//! The fixed slot table and its per-frame rebinding.

use hashbrown::HashMap;
use tracing::debug;

use pointstream_core::{Block, BlockId, Point};
use pointstream_gpu::{GraphicsDevice, VertexBufferId};

use crate::config::SlotSizing;
use crate::job::{Destination, LoadJob, LoadResult};
use crate::store::BlockStore;
use crate::subslots::{CachedSlot, SubslotsCache};
use crate::worker::WorkerPool;

/// Residency state of one slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotStatus {
    #[default]
    Empty,
    Loading,
    Loaded,
}

/// One GPU-backed resident binding.
///
/// The vertex buffer is allocated at table init and lives for the whole
/// program; swaps move it together with its points, demotion to the second
/// tier strips it off.
#[derive(Debug)]
pub struct Slot {
    pub block_id: Option<BlockId>,
    pub count: u32,
    pub status: SlotStatus,
    pub buffer: VertexBufferId,
    pub points: Vec<Point>,
}

/// What one frame's plan did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlanOutcome {
    /// `K = min(num_slots, visible_count)` slots considered.
    pub considered: usize,
    pub in_slot_hits: usize,
    pub subslot_hits: usize,
    /// Jobs issued this frame; the drain pops exactly this many results.
    pub misses: usize,
}

/// Fixed array of GPU-backed slots, rebound to the top of the block order
/// every frame.
pub struct SlotTable {
    slots: Vec<Slot>,
    sizing: SlotSizing,
    warmup_enabled: bool,
    warmup_done: bool,
    /// K of the most recent plan; bounds the resident draw.
    planned: usize,
}

impl SlotTable {
    /// Allocate `num_slots` slots, one reusable vertex buffer each.
    pub fn new(sizing: SlotSizing, warmup: bool, device: &mut dyn GraphicsDevice) -> Self {
        let slots = (0..sizing.num_slots)
            .map(|_| Slot {
                block_id: None,
                count: 0,
                status: SlotStatus::Empty,
                buffer: device.create_vertex_buffer(sizing.slot_capacity_bytes()),
                points: Vec::new(),
            })
            .collect();
        debug!(
            num_slots = sizing.num_slots,
            subslot_capacity = sizing.subslot_capacity,
            points_per_slot = sizing.points_per_slot,
            "slot table allocated"
        );
        Self {
            slots,
            sizing,
            warmup_enabled: warmup,
            warmup_done: false,
            planned: 0,
        }
    }

    pub fn sizing(&self) -> &SlotSizing {
        &self.sizing
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Rebind the slot table to the top of `order` and issue loads for the
    /// misses.
    ///
    /// For each of the `K = min(num_slots, visible)` most important blocks,
    /// in priority order: an in-slot hit swaps the holding slot into place
    /// (the buffer travels with it, no upload); a subslot hit promotes the
    /// cached payload into the slot, demoting the previous occupant into
    /// the cache; anything else becomes a load job. The first planning
    /// frame with a cache tier also primes it with speculative loads for
    /// the blocks just below the cut.
    pub fn plan(
        &mut self,
        order: &[usize],
        blocks: &[Block],
        visible: usize,
        cache: &mut SubslotsCache,
        store: &BlockStore,
        pool: &WorkerPool,
        device: &mut dyn GraphicsDevice,
    ) -> PlanOutcome {
        let k = self.sizing.num_slots.min(visible);
        let mut outcome = PlanOutcome {
            considered: k,
            ..Default::default()
        };

        // where each bound block currently sits
        let mut index: HashMap<BlockId, usize> = HashMap::with_capacity(self.slots.len());
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(id) = slot.block_id {
                index.insert(id, i);
            }
        }

        for i in 0..k {
            let block = &blocks[order[i]];

            // in-slot hit: the block is already resident somewhere
            if let Some(&j) = index.get(&block.id) {
                if j != i {
                    self.slots.swap(i, j);
                    index.insert(block.id, i);
                    if let Some(other) = self.slots[j].block_id {
                        index.insert(other, j);
                    }
                }
                outcome.in_slot_hits += 1;
                continue;
            }

            // subslot hit: promote from the second tier
            if let Some(entry) = cache.extract(block.id) {
                let slot = &mut self.slots[i];
                let old_points = std::mem::take(&mut slot.points);
                if let Some(old_id) = slot.block_id {
                    index.remove(&old_id);
                    // only a loaded payload is worth keeping warm
                    if slot.status == SlotStatus::Loaded {
                        cache.put(CachedSlot {
                            block_id: old_id,
                            count: slot.count,
                            points: old_points,
                        });
                    }
                }
                slot.block_id = Some(entry.block_id);
                slot.count = entry.count;
                slot.points = entry.points;
                slot.status = SlotStatus::Loaded;
                index.insert(block.id, i);
                if slot.count > 0 {
                    device.update_vertex_buffer_sub(
                        slot.buffer,
                        0,
                        &slot.points[..slot.count as usize],
                    );
                }
                outcome.subslot_hits += 1;
                continue;
            }

            // miss: the disk is the only tier left
            let count = block.count.min(self.sizing.points_per_slot);
            pool.enqueue(LoadJob {
                block_id: block.id,
                slot_idx: i,
                count,
                destination: Destination::Slot,
                path: store.path_for(block.id),
            });
            let slot = &mut self.slots[i];
            if let Some(old_id) = slot.block_id {
                index.remove(&old_id);
            }
            slot.block_id = Some(block.id);
            slot.count = 0;
            slot.points = Vec::new();
            slot.status = SlotStatus::Loading;
            index.insert(block.id, i);
            outcome.misses += 1;
        }

        if self.warmup_enabled && !self.warmup_done && cache.capacity() > 0 && !order.is_empty() {
            outcome.misses += self.warmup(order, blocks, k, store, pool);
            self.warmup_done = true;
        }

        self.planned = k;
        outcome
    }

    /// Prime the second tier with the blocks just below the slot cut so
    /// camera motion has a hit surface. Runs once.
    fn warmup(
        &self,
        order: &[usize],
        blocks: &[Block],
        k: usize,
        store: &BlockStore,
        pool: &WorkerPool,
    ) -> usize {
        let mut issued = 0;
        for &block_idx in order.iter().skip(k).take(self.sizing.subslot_capacity) {
            let block = &blocks[block_idx];
            pool.enqueue(LoadJob {
                block_id: block.id,
                slot_idx: k + issued,
                count: block.count.min(self.sizing.points_per_slot),
                destination: Destination::Subslot,
                path: store.path_for(block.id),
            });
            issued += 1;
        }
        debug!(issued, "primed subslot cache");
        issued
    }

    /// Draw every slot still bound to its planned block and already loaded.
    ///
    /// Returns the number of draw calls issued.
    pub fn draw_resident(
        &self,
        order: &[usize],
        blocks: &[Block],
        device: &mut dyn GraphicsDevice,
    ) -> usize {
        let mut draws = 0;
        for i in 0..self.planned {
            let slot = &self.slots[i];
            if slot.status == SlotStatus::Loaded && slot.block_id == Some(blocks[order[i]].id) {
                device.draw_points(slot.buffer, slot.count);
                draws += 1;
            }
        }
        draws
    }

    /// Pop exactly `miss_count` results, landing each at its destination.
    ///
    /// Slot results overwrite their slot unconditionally (a result that
    /// outlived its plan still wins the write; the next plan corrects it)
    /// and are drawn immediately. Subslot results go into the cache, whose
    /// evictee is discarded. Returns the number of results drained, which
    /// is only short of `miss_count` when the pool shut down mid-frame.
    pub fn drain(
        &mut self,
        miss_count: usize,
        pool: &WorkerPool,
        cache: &mut SubslotsCache,
        device: &mut dyn GraphicsDevice,
    ) -> usize {
        let mut drained = 0;
        for _ in 0..miss_count {
            let Some(result) = pool.pop_result() else {
                break;
            };
            drained += 1;
            match result.destination {
                Destination::Slot => self.land(result, device),
                Destination::Subslot => {
                    // an empty read has nothing worth caching; the next
                    // miss on this block retries the disk
                    if !result.points.is_empty() {
                        cache.put(CachedSlot {
                            block_id: result.block_id,
                            count: result.points.len() as u32,
                            points: result.points,
                        });
                    }
                }
            }
        }
        drained
    }

    fn land(&mut self, result: LoadResult, device: &mut dyn GraphicsDevice) {
        let slot = &mut self.slots[result.slot_idx];
        let count = result.points.len() as u32;
        slot.block_id = Some(result.block_id);
        slot.count = count;
        slot.points = result.points;
        slot.status = SlotStatus::Loaded;
        if count > 0 {
            device.update_vertex_buffer_sub(slot.buffer, 0, &slot.points[..count as usize]);
        }
        // zero-count slots draw as a no-op
        device.draw_points(slot.buffer, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use pointstream_core::{Aabb, Point};
    use pointstream_gpu::SoftwareDevice;
    use std::io::Write;
    use std::path::Path;

    fn write_block(dir: &Path, id: BlockId, n: u32) {
        let points: Vec<Point> = (0..n)
            .map(|k| Point::new(Vec3::splat(k as f32), Vec3::ONE))
            .collect();
        let mut f = std::fs::File::create(dir.join(id.file_name())).unwrap();
        f.write_all(bytemuck::cast_slice(&points)).unwrap();
    }

    /// `n` visible single-point blocks, nearest first, with files on disk.
    fn fixture(dir: &Path, n: u32) -> (BlockStore, Vec<usize>) {
        let mut blocks = Vec::new();
        for i in 0..n {
            let mut b = Block::new(
                BlockId(i),
                Aabb::new(Vec3::splat(i as f32), Vec3::splat(i as f32 + 1.0)),
            );
            b.count = 1;
            b.is_visible = true;
            b.dist_to_camera = i as f32;
            blocks.push(b);
            write_block(dir, BlockId(i), 1);
        }
        let order = (0..n as usize).collect();
        (BlockStore::new(dir, blocks), order)
    }

    fn sizing(num_slots: usize, subslot_capacity: usize) -> SlotSizing {
        SlotSizing {
            num_slots,
            subslot_capacity,
            points_per_slot: 8,
        }
    }

    #[test]
    fn first_frame_is_all_misses_then_all_hits() {
        let dir = tempfile::tempdir().unwrap();
        let (store, order) = fixture(dir.path(), 4);
        let mut device = SoftwareDevice::new(8, 8);
        let mut cache = SubslotsCache::new(0);
        let mut pool = WorkerPool::spawn(2);
        let mut table = SlotTable::new(sizing(4, 0), false, &mut device);

        let outcome = table.plan(&order, store.blocks(), 4, &mut cache, &store, &pool, &mut device);
        assert_eq!(outcome.misses, 4);
        assert_eq!(outcome.in_slot_hits, 0);
        assert_eq!(table.drain(outcome.misses, &pool, &mut cache, &mut device), 4);

        // same camera, same order: everything is an in-slot hit now
        let outcome = table.plan(&order, store.blocks(), 4, &mut cache, &store, &pool, &mut device);
        assert_eq!(outcome.misses, 0);
        assert_eq!(outcome.in_slot_hits, 4);
        assert_eq!(table.draw_resident(&order, store.blocks(), &mut device), 4);
        pool.shutdown();
    }

    #[test]
    fn permuted_order_swaps_without_reloading() {
        let dir = tempfile::tempdir().unwrap();
        let (store, order) = fixture(dir.path(), 3);
        let mut device = SoftwareDevice::new(8, 8);
        let mut cache = SubslotsCache::new(0);
        let mut pool = WorkerPool::spawn(1);
        let mut table = SlotTable::new(sizing(3, 0), false, &mut device);

        let outcome = table.plan(&order, store.blocks(), 3, &mut cache, &store, &pool, &mut device);
        table.drain(outcome.misses, &pool, &mut cache, &mut device);
        let buffers_by_block: Vec<_> = table
            .slots()
            .iter()
            .map(|s| (s.block_id.unwrap(), s.buffer))
            .collect();
        device.take_draw_calls();

        // reversed priority: pure swaps, no jobs, no uploads
        let reversed: Vec<usize> = order.iter().rev().copied().collect();
        let outcome =
            table.plan(&reversed, store.blocks(), 3, &mut cache, &store, &pool, &mut device);
        assert_eq!(outcome, PlanOutcome { considered: 3, in_slot_hits: 3, subslot_hits: 0, misses: 0 });

        // every block kept its buffer through the swap
        for slot in table.slots() {
            let pair = (slot.block_id.unwrap(), slot.buffer);
            assert!(buffers_by_block.contains(&pair));
        }
        // slot i is bound to the i-th block of the new order
        for (i, slot) in table.slots().iter().enumerate() {
            assert_eq!(slot.block_id, Some(store.blocks()[reversed[i]].id));
        }
        pool.shutdown();
    }

    #[test]
    fn demoted_block_promotes_back_without_a_disk_read() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = fixture(dir.path(), 2);
        let mut device = SoftwareDevice::new(8, 8);
        let mut cache = SubslotsCache::new(2);
        let mut pool = WorkerPool::spawn(1);
        let mut table = SlotTable::new(sizing(1, 2), false, &mut device);

        // frame 1: block 0 loads into the single slot
        let outcome = table.plan(&[0], store.blocks(), 1, &mut cache, &store, &pool, &mut device);
        table.drain(outcome.misses, &pool, &mut cache, &mut device);

        // frame 2: block 1 takes the slot; block 0 is not yet cached, so
        // this is a miss and block 0's payload is dropped (miss path does
        // not demote)
        let outcome = table.plan(&[1], store.blocks(), 1, &mut cache, &store, &pool, &mut device);
        assert_eq!(outcome.misses, 1);
        table.drain(outcome.misses, &pool, &mut cache, &mut device);

        // seed the cache with block 0 as a demotion would
        cache.put(CachedSlot {
            block_id: BlockId(0),
            count: 1,
            points: vec![Point::new(Vec3::ZERO, Vec3::ONE)],
        });

        // frame 3: block 0 returns via extract; block 1 is demoted
        std::fs::remove_file(store.path_for(BlockId(0))).unwrap();
        let outcome = table.plan(&[0], store.blocks(), 1, &mut cache, &store, &pool, &mut device);
        assert_eq!(outcome.subslot_hits, 1);
        assert_eq!(outcome.misses, 0);
        assert_eq!(table.slots()[0].block_id, Some(BlockId(0)));
        assert_eq!(table.slots()[0].status, SlotStatus::Loaded);
        assert!(cache.contains(BlockId(1)));
        pool.shutdown();
    }

    #[test]
    fn warmup_primes_the_cache_once() {
        let dir = tempfile::tempdir().unwrap();
        let (store, order) = fixture(dir.path(), 6);
        let mut device = SoftwareDevice::new(8, 8);
        let mut cache = SubslotsCache::new(2);
        let mut pool = WorkerPool::spawn(2);
        let mut table = SlotTable::new(sizing(2, 2), true, &mut device);

        // 2 slot misses + 2 warmup subslot loads
        let outcome = table.plan(&order, store.blocks(), 6, &mut cache, &store, &pool, &mut device);
        assert_eq!(outcome.misses, 4);
        assert_eq!(table.drain(outcome.misses, &pool, &mut cache, &mut device), 4);
        assert!(cache.contains(BlockId(2)));
        assert!(cache.contains(BlockId(3)));

        // warmup never fires twice
        let outcome = table.plan(&order, store.blocks(), 6, &mut cache, &store, &pool, &mut device);
        assert_eq!(outcome.misses, 0);
        pool.shutdown();
    }

    #[test]
    fn late_result_wins_the_slot_write() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = fixture(dir.path(), 2);
        let mut device = SoftwareDevice::new(8, 8);
        let mut cache = SubslotsCache::new(0);
        let mut pool = WorkerPool::spawn(1);
        let mut table = SlotTable::new(sizing(1, 0), false, &mut device);

        // frame 1 requests block 0 but drains nothing yet
        let first = table.plan(&[0], store.blocks(), 1, &mut cache, &store, &pool, &mut device);
        assert_eq!(first.misses, 1);

        // frame 2 rebinds the slot to block 1 before frame 1's result lands
        let second = table.plan(&[1], store.blocks(), 1, &mut cache, &store, &pool, &mut device);
        assert_eq!(second.misses, 1);

        // drain both: whichever result arrives last owns the slot
        table.drain(first.misses + second.misses, &pool, &mut cache, &mut device);
        assert_eq!(table.slots()[0].status, SlotStatus::Loaded);
        assert!(table.slots()[0].block_id.is_some());
        pool.shutdown();
    }
}
