//! End-to-end streaming scenarios: ingest a synthetic cloud, then run the
//! cull → plan → drain loop against the software device.

use std::io::Write;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use pointstream_core::constants::GRID;
use pointstream_engine::{
    cull_blocks, order_blocks, BlockStore, EngineConfig, Frustum, SlotSizing, SlotTable,
    SubslotsCache, WorkerPool,
};
use pointstream_gpu::SoftwareDevice;
use pointstream_ingest::partition;

const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 500.0;

fn write_grid_ply(path: &Path) {
    // one point at the center of every cell of a 10^3 unit grid
    let mut rows = Vec::new();
    for iz in 0..GRID {
        for iy in 0..GRID {
            for ix in 0..GRID {
                rows.push((ix as f64 + 0.5, iy as f64 + 0.5, iz as f64 + 0.5));
            }
        }
    }
    let mut f = std::fs::File::create(path).unwrap();
    write!(
        f,
        "ply\nformat binary_little_endian 1.0\nelement vertex {}\n\
         property double x\nproperty double y\nproperty double z\n\
         property uchar red\nproperty uchar green\nproperty uchar blue\nend_header\n",
        rows.len()
    )
    .unwrap();
    for (x, y, z) in rows {
        f.write_all(&x.to_le_bytes()).unwrap();
        f.write_all(&y.to_le_bytes()).unwrap();
        f.write_all(&z.to_le_bytes()).unwrap();
        f.write_all(&[200, 200, 200]).unwrap();
    }
}

struct Scene {
    _dir: tempfile::TempDir,
    store: BlockStore,
    vertex_count: u64,
}

fn ingest_grid_scene() -> Scene {
    let dir = tempfile::tempdir().unwrap();
    let ply = dir.path().join("grid.ply");
    let out: PathBuf = dir.path().join("blocks");
    write_grid_ply(&ply);

    let output = partition(&ply, &out).unwrap();
    let mut store = BlockStore::new(&out, output.blocks);
    store.filter_blocks();
    Scene {
        _dir: dir,
        store,
        vertex_count: output.vertex_count,
    }
}

fn view_from(eye: Vec3, target: Vec3) -> Mat4 {
    Mat4::look_at_rh(eye, target, Vec3::Z)
}

fn projection() -> Mat4 {
    Mat4::perspective_rh_gl(std::f32::consts::FRAC_PI_4, 4.0 / 3.0, Z_NEAR, Z_FAR)
}

#[test]
fn full_pipeline_streams_every_visible_block() {
    let mut scene = ingest_grid_scene();
    assert_eq!(scene.store.len(), 1000);
    assert_eq!(scene.store.total_points(), 1000);

    let config = EngineConfig::default().with_slot_factor(0.05);
    let sizing = SlotSizing::derive(&config, scene.store.len(), scene.vertex_count);
    assert_eq!(sizing.num_slots, 50);

    let mut device = SoftwareDevice::new(64, 48);
    let mut cache = SubslotsCache::new(0);
    let mut pool = WorkerPool::spawn(config.num_workers);
    let mut table = SlotTable::new(sizing, false, &mut device);

    // camera far outside the scene looking at its center: everything visible
    let frustum = Frustum::from_projection(&projection());
    let view = view_from(Vec3::new(30.0, 30.0, 30.0), Vec3::splat(5.0));
    let visible = cull_blocks(scene.store.blocks_mut(), &view, &frustum, Z_NEAR, Z_FAR);
    assert_eq!(visible, 1000);

    let order = order_blocks(scene.store.blocks());
    let outcome = table.plan(
        &order,
        scene.store.blocks(),
        visible,
        &mut cache,
        &scene.store,
        &pool,
        &mut device,
    );

    // frame 1: nothing resident, every considered slot misses
    assert_eq!(outcome.considered, 50);
    assert_eq!(outcome.misses, 50);

    // slot-bind invariant: slot i targets the i-th block of the order
    for (i, slot) in table.slots().iter().enumerate() {
        assert_eq!(slot.block_id, Some(scene.store.blocks()[order[i]].id));
    }

    device.take_draw_calls();
    let resident_draws = table.draw_resident(&order, scene.store.blocks(), &mut device);
    assert_eq!(resident_draws, 0);
    let drained = table.drain(outcome.misses, &pool, &mut cache, &mut device);
    assert_eq!(drained, 50);

    // draw accounting: one call per resident slot plus one per drained result
    assert_eq!(device.take_draw_calls().len(), resident_draws + drained);
    pool.shutdown();
}

#[test]
fn second_frame_with_same_camera_is_all_hits() {
    let mut scene = ingest_grid_scene();
    let sizing = SlotSizing::derive(
        &EngineConfig::default(),
        scene.store.len(),
        scene.vertex_count,
    );

    let mut device = SoftwareDevice::new(32, 32);
    let mut cache = SubslotsCache::new(0);
    let mut pool = WorkerPool::spawn(4);
    let mut table = SlotTable::new(sizing, false, &mut device);

    let frustum = Frustum::from_projection(&projection());
    let view = view_from(Vec3::new(25.0, 20.0, 28.0), Vec3::splat(5.0));
    let visible = cull_blocks(scene.store.blocks_mut(), &view, &frustum, Z_NEAR, Z_FAR);
    let order = order_blocks(scene.store.blocks());

    let first = table.plan(
        &order,
        scene.store.blocks(),
        visible,
        &mut cache,
        &scene.store,
        &pool,
        &mut device,
    );
    assert!(first.misses > 0);
    table.drain(first.misses, &pool, &mut cache, &mut device);

    // identical camera: same order, zero enqueues, every slot loaded
    let second = table.plan(
        &order,
        scene.store.blocks(),
        visible,
        &mut cache,
        &scene.store,
        &pool,
        &mut device,
    );
    assert_eq!(second.misses, 0);
    assert_eq!(second.in_slot_hits, second.considered);
    let draws = table.draw_resident(&order, scene.store.blocks(), &mut device);
    assert_eq!(draws, second.considered);
    pool.shutdown();
}

#[test]
fn camera_swing_promotes_from_the_subslot_tier() {
    let mut scene = ingest_grid_scene();
    let config = EngineConfig::default()
        .with_slot_factor(0.02)
        .with_subslots(true);
    let mut sizing = SlotSizing::derive(&config, scene.store.len(), scene.vertex_count);
    sizing.subslot_capacity = 30;

    let mut device = SoftwareDevice::new(32, 32);
    let mut cache = SubslotsCache::new(sizing.subslot_capacity);
    let mut pool = WorkerPool::spawn(4);
    let mut table = SlotTable::new(sizing, false, &mut device);

    let frustum = Frustum::from_projection(&projection());

    // frame 1: look at the low corner
    let view_a = view_from(Vec3::new(-20.0, 5.0, 5.0), Vec3::new(2.0, 5.0, 5.0));
    let visible = cull_blocks(scene.store.blocks_mut(), &view_a, &frustum, Z_NEAR, Z_FAR);
    let order_a = order_blocks(scene.store.blocks());
    let f1 = table.plan(
        &order_a,
        scene.store.blocks(),
        visible,
        &mut cache,
        &scene.store,
        &pool,
        &mut device,
    );
    table.drain(f1.misses, &pool, &mut cache, &mut device);
    let corner_block = table.slots()[0].block_id.unwrap();

    // frame 2: swing to the opposite corner; old residents demote as the
    // new top-K misses in
    let view_b = view_from(Vec3::new(30.0, 5.0, 5.0), Vec3::new(8.0, 5.0, 5.0));
    let visible = cull_blocks(scene.store.blocks_mut(), &view_b, &frustum, Z_NEAR, Z_FAR);
    let order_b = order_blocks(scene.store.blocks());
    let f2 = table.plan(
        &order_b,
        scene.store.blocks(),
        visible,
        &mut cache,
        &scene.store,
        &pool,
        &mut device,
    );
    table.drain(f2.misses, &pool, &mut cache, &mut device);

    // a demotion only happens on a subslot hit, so manufacture residency
    // history: swing back and verify the old corner block reloads, this
    // time through whichever tier holds it
    let visible = cull_blocks(scene.store.blocks_mut(), &view_a, &frustum, Z_NEAR, Z_FAR);
    let order_c = order_blocks(scene.store.blocks());
    let f3 = table.plan(
        &order_c,
        scene.store.blocks(),
        visible,
        &mut cache,
        &scene.store,
        &pool,
        &mut device,
    );
    table.drain(f3.misses, &pool, &mut cache, &mut device);
    assert_eq!(table.slots()[0].block_id, Some(corner_block));
    assert_eq!(
        table.slots()[0].status,
        pointstream_engine::SlotStatus::Loaded
    );
    pool.shutdown();
}

#[test]
fn shutdown_with_jobs_in_flight_is_clean() {
    let mut scene = ingest_grid_scene();
    let sizing = SlotSizing {
        num_slots: 8,
        subslot_capacity: 0,
        points_per_slot: 4,
    };

    let mut device = SoftwareDevice::new(16, 16);
    let mut cache = SubslotsCache::new(0);
    let mut pool = WorkerPool::spawn(2);
    let mut table = SlotTable::new(sizing, false, &mut device);

    let frustum = Frustum::from_projection(&projection());
    let view = view_from(Vec3::new(30.0, 30.0, 30.0), Vec3::splat(5.0));
    let visible = cull_blocks(scene.store.blocks_mut(), &view, &frustum, Z_NEAR, Z_FAR);
    let order = order_blocks(scene.store.blocks());
    let outcome = table.plan(
        &order,
        scene.store.blocks(),
        visible,
        &mut cache,
        &scene.store,
        &pool,
        &mut device,
    );
    assert_eq!(outcome.misses, 8);

    // shut down without draining: workers join, pending results are dropped
    pool.shutdown();
    let drained = table.drain(outcome.misses, &pool, &mut cache, &mut device);
    assert!(drained <= outcome.misses);
}
