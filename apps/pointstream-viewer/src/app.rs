//! Viewer orchestration: ingest, then the per-frame streaming loop.

use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{info, warn};

use pointstream_core::EngineError;

use pointstream_engine::{
    cull_blocks, order_blocks, BlockStore, EngineConfig, FrameStats, Frustum, SlotSizing,
    SlotTable, StatsAggregator, SubslotsCache, WorkerPool,
};
use pointstream_gpu::{GraphicsDevice, SoftwareDevice, VertexBufferId};
use pointstream_ingest::{partition, IngestManifest, PartitionOutput};

use crate::args::Args;
use crate::camera::Camera;

pub const WIDTH: u32 = 1280;
pub const HEIGHT: u32 = 720;

/// Fixed timestep for the headless loop; frames render as fast as they can,
/// so wall-clock deltas would make orbit exports non-reproducible.
const FRAME_DT: f32 = 1.0 / 60.0;

const CLEAR_COLOR: [u8; 4] = [13, 13, 20, 255];

enum Mode {
    /// Every retained block has its own buffer, uploaded once at init.
    InCore { buffers: Vec<VertexBufferId> },
    /// The streaming path: slot table, optional second tier, loader pool.
    OutOfCore {
        table: SlotTable,
        cache: SubslotsCache,
        pool: WorkerPool,
    },
}

pub struct Viewer {
    args: Args,
    store: BlockStore,
    camera: Camera,
    frustum: Frustum,
    device: SoftwareDevice,
    mode: Mode,
    stats: StatsAggregator,
}

impl Viewer {
    /// Ingest (or reuse) the block files and set up the chosen mode.
    pub fn init(args: Args) -> anyhow::Result<Self> {
        let output = ingest_or_reuse(&args)?;

        let mut store = BlockStore::new(&args.out_dir, output.blocks);
        let retained = store.filter_blocks();
        if retained == 0 {
            return Err(EngineError::InitFailed(format!(
                "no points in {}",
                args.ply_path.display()
            ))
            .into());
        }

        if let (Some(vert), Some(frag)) = (&args.shader_vert, &args.shader_frag) {
            // the software rasterizer has no shader stage
            info!(
                vert = %vert.display(),
                frag = %frag.display(),
                "shader paths recorded (unused by the software device)"
            );
        }

        let camera = Camera::frame_scene(&output.scene, WIDTH as f32 / HEIGHT as f32);
        let frustum = Frustum::from_projection(&camera.projection_matrix());
        let mut device = SoftwareDevice::new(WIDTH, HEIGHT);

        let mode = if args.ooc {
            let config = EngineConfig::default().with_subslots(args.cache);
            let sizing = SlotSizing::derive(&config, retained, output.vertex_count);
            let table = SlotTable::new(sizing, config.warmup && args.cache, &mut device);
            let cache = SubslotsCache::new(sizing.subslot_capacity);
            let pool = WorkerPool::spawn(config.num_workers);
            info!(
                retained,
                num_slots = sizing.num_slots,
                subslot_capacity = sizing.subslot_capacity,
                "out-of-core streaming enabled"
            );
            Mode::OutOfCore { table, cache, pool }
        } else {
            Mode::InCore {
                buffers: load_in_core(&store, &mut device)?,
            }
        };

        if let Some(dir) = &args.export {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating export directory {}", dir.display()))?;
        }

        Ok(Self {
            args,
            store,
            camera,
            frustum,
            device,
            mode,
            stats: StatsAggregator::new(Duration::from_secs(1)),
        })
    }

    /// Render the configured number of frames, then shut down cleanly.
    pub fn run(&mut self) -> anyhow::Result<()> {
        for frame in 0..self.args.frames {
            self.frame(frame)?;
        }
        self.shutdown();
        Ok(())
    }

    fn frame(&mut self, frame: u32) -> anyhow::Result<()> {
        let started = Instant::now();
        if self.args.test {
            self.camera.orbit(FRAME_DT);
        }

        let view = self.camera.view_matrix();
        self.device
            .begin_frame(self.camera.view_projection_matrix(), CLEAR_COLOR);

        let visible = cull_blocks(
            self.store.blocks_mut(),
            &view,
            &self.frustum,
            self.camera.z_near,
            self.camera.z_far,
        );

        let mut stats = FrameStats {
            visible,
            ..Default::default()
        };

        let Self {
            store,
            device,
            mode,
            ..
        } = self;
        match mode {
            Mode::InCore { buffers } => {
                for (block, &buffer) in store.blocks().iter().zip(buffers.iter()) {
                    if block.is_visible {
                        device.draw_points(buffer, block.count);
                        stats.draw_calls += 1;
                    }
                }
            }
            Mode::OutOfCore { table, cache, pool } => {
                let order = order_blocks(store.blocks());
                let outcome = table.plan(&order, store.blocks(), visible, cache, store, pool, device);
                stats.in_slot_hits = outcome.in_slot_hits;
                stats.subslot_hits = outcome.subslot_hits;
                stats.misses = outcome.misses;

                stats.draw_calls += table.draw_resident(&order, store.blocks(), device);
                // exactly as many results as jobs issued this frame
                stats.drained = table.drain(outcome.misses, pool, cache, device);
                stats.draw_calls += stats.drained;
            }
        }

        if let Some(dir) = &self.args.export {
            let path = dir.join(format!("frame_{frame:04}.png"));
            self.device
                .save_frame(&path)
                .with_context(|| format!("exporting {}", path.display()))?;
        }

        stats.frame_ms = started.elapsed().as_secs_f32() * 1000.0;
        self.stats.record(&stats);
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Mode::OutOfCore { pool, cache, .. } = &mut self.mode {
            pool.shutdown();
            cache.clear();
        }
        info!("viewer shut down");
    }
}

/// Partition the cloud, or rebuild metadata from a matching manifest.
fn ingest_or_reuse(args: &Args) -> anyhow::Result<PartitionOutput> {
    if args.reuse {
        match IngestManifest::load(&args.out_dir) {
            Ok(manifest) if manifest.matches(&args.ply_path) => {
                info!(dir = %args.out_dir.display(), "reusing partitioned blocks");
                return Ok(manifest.to_output());
            }
            Ok(_) => warn!("manifest does not match this cloud, re-partitioning"),
            Err(e) => warn!(error = %e, "no usable manifest, re-partitioning"),
        }
    }
    let output = partition(&args.ply_path, &args.out_dir)
        .with_context(|| format!("partitioning {}", args.ply_path.display()))?;
    IngestManifest::from_output(&args.ply_path, &output).write(&args.out_dir)?;
    Ok(output)
}

/// Read every retained block eagerly and give each its own buffer.
fn load_in_core(
    store: &BlockStore,
    device: &mut SoftwareDevice,
) -> anyhow::Result<Vec<VertexBufferId>> {
    let mut buffers = Vec::with_capacity(store.len());
    for block in store.blocks() {
        let points = store.read_points(block.id, block.count)?;
        let buffer =
            device.create_vertex_buffer(points.len() * std::mem::size_of::<pointstream_core::Point>());
        device.update_vertex_buffer_sub(buffer, 0, &points);
        buffers.push(buffer);
    }
    info!(
        blocks = buffers.len(),
        points = store.total_points(),
        "loaded scene in-core"
    );
    Ok(buffers)
}
