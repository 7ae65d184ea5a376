//! Two-pass PLY partitioner.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use pointstream_core::block::{bin_point, build_grid};
use pointstream_core::constants::{FLUSH_POINTS, GRID, NUM_BLOCKS, STREAM_CACHE_CAP};
use pointstream_core::{Aabb, Block, BlockId, EngineError, IoStage, Point, Result};

use crate::ply::{read_header, VertexReader};
use crate::stream_cache::FileStreamCache;

/// Result of a partition run.
#[derive(Clone, Debug)]
pub struct PartitionOutput {
    pub scene: Aabb,
    pub vertex_count: u64,
    pub blocks: Vec<Block>,
}

/// Path of a block's file under `out_dir`.
pub fn block_path(out_dir: &Path, id: BlockId) -> PathBuf {
    out_dir.join(id.file_name())
}

/// Remove block files from an earlier (possibly aborted) run.
///
/// Stale partial files must never be appended to, so this runs before every
/// partition.
fn clean_block_files(out_dir: &Path) -> Result<()> {
    let entries = match std::fs::read_dir(out_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(EngineError::io(IoStage::Open, out_dir, e)),
    };
    let mut removed = 0usize;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(IoStage::Read, out_dir, e))?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("block_") && name.ends_with(".bin") {
            std::fs::remove_file(&path).map_err(|e| EngineError::io(IoStage::Write, &path, e))?;
            removed += 1;
        }
    }
    if removed > 0 {
        info!(removed, dir = %out_dir.display(), "cleaned up old block files");
    }
    Ok(())
}

/// Partition `ply_path` into `GRID^3` block files under `out_dir`.
///
/// Pass A streams the vertex data to compute the scene bounding box; pass B
/// re-streams it, bins every point, and appends it to the matching block
/// file through the bounded writer pool.
pub fn partition(ply_path: &Path, out_dir: &Path) -> Result<PartitionOutput> {
    std::fs::create_dir_all(out_dir).map_err(|e| EngineError::io(IoStage::Open, out_dir, e))?;
    clean_block_files(out_dir)?;

    let header = read_header(ply_path)?;
    info!(
        vertices = header.vertex_count,
        path = %ply_path.display(),
        "partitioning point cloud"
    );

    // Pass A: global bounding box.
    let mut scene = Aabb::empty();
    let mut reader = VertexReader::open(ply_path, &header)?;
    while let Some(batch) = reader.next_batch()? {
        for fp in batch {
            scene.expand(fp.position());
        }
    }
    debug!(min = ?scene.min, max = ?scene.max, "scene bounds");

    let mut blocks = build_grid(&scene);
    let cell = scene.extent() / GRID as f32;

    // Pass B: bin and append through the writer pool.
    let mut cache = FileStreamCache::new(STREAM_CACHE_CAP);
    // touch every block file up front so empty cells still exist on disk
    for id in 0..NUM_BLOCKS {
        let id = BlockId(id);
        cache.get(id, &block_path(out_dir, id))?;
    }
    let mut out_buf: Vec<Vec<Point>> = (0..NUM_BLOCKS)
        .map(|_| Vec::with_capacity(FLUSH_POINTS))
        .collect();

    let mut reader = VertexReader::open(ply_path, &header)?;
    while let Some(batch) = reader.next_batch()? {
        for fp in batch {
            let p = fp.to_point();
            let id = bin_point(p.pos, scene.min, cell);
            out_buf[id.index()].push(p);
            blocks[id.index()].count += 1;
            if out_buf[id.index()].len() >= FLUSH_POINTS {
                flush(&mut cache, out_dir, id, &mut out_buf[id.index()])?;
            }
        }
    }

    // leftovers
    for id in 0..NUM_BLOCKS {
        let id = BlockId(id);
        flush(&mut cache, out_dir, id, &mut out_buf[id.index()])?;
    }
    cache.close_all()?;

    let occupied = blocks.iter().filter(|b| b.count > 0).count();
    info!(
        blocks = NUM_BLOCKS,
        occupied,
        vertices = header.vertex_count,
        "created block files"
    );

    Ok(PartitionOutput {
        scene,
        vertex_count: header.vertex_count,
        blocks,
    })
}

fn flush(
    cache: &mut FileStreamCache,
    out_dir: &Path,
    id: BlockId,
    buf: &mut Vec<Point>,
) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    let path = block_path(out_dir, id);
    let writer = cache.get(id, &path)?;
    std::io::Write::write_all(writer, bytemuck::cast_slice(buf))
        .map_err(|e| EngineError::io(IoStage::Write, &path, e))?;
    buf.clear();
    Ok(())
}
