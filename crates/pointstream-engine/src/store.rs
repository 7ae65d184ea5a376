//! Block metadata owner and block-file reads.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use pointstream_core::{Block, BlockId, EngineError, IoStage, Point, Result};

/// Read exactly `count` points from a block file.
///
/// The canonical block format is a raw sequence of 24-byte records with no
/// header, so the read starts at byte zero. Fewer bytes than requested is a
/// `ShortRead`.
pub fn read_block_points(path: &Path, count: u32) -> Result<Vec<Point>> {
    let mut file = File::open(path).map_err(|e| EngineError::io(IoStage::Open, path, e))?;
    let want = count as usize * std::mem::size_of::<Point>();
    let mut bytes = vec![0u8; want];
    let mut filled = 0;
    while filled < want {
        match file.read(&mut bytes[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(EngineError::io(IoStage::Read, path, e)),
        }
    }
    if filled < want {
        return Err(EngineError::ShortRead {
            path: path.to_path_buf(),
            expected: want as u64,
            got: filled as u64,
        });
    }
    let mut points = vec![Point::default(); count as usize];
    bytemuck::cast_slice_mut(&mut points).copy_from_slice(&bytes);
    Ok(points)
}

/// Owns per-block metadata and knows where each block lives on disk.
pub struct BlockStore {
    out_dir: PathBuf,
    blocks: Vec<Block>,
}

impl BlockStore {
    pub fn new(out_dir: impl Into<PathBuf>, blocks: Vec<Block>) -> Self {
        Self {
            out_dir: out_dir.into(),
            blocks,
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// On-disk path of a block's file.
    pub fn path_for(&self, id: BlockId) -> PathBuf {
        self.out_dir.join(id.file_name())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total points across the working set.
    pub fn total_points(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.count)).sum()
    }

    /// Drop empty blocks from the working set.
    ///
    /// Their zero-length files stay on disk; they just stop participating
    /// in culling and slot planning. Returns the retained count.
    pub fn filter_blocks(&mut self) -> usize {
        let before = self.blocks.len();
        self.blocks.retain(|b| b.count > 0);
        info!(
            retained = self.blocks.len(),
            dropped = before - self.blocks.len(),
            "filtered empty blocks from the working set"
        );
        self.blocks.len()
    }

    /// Read one block's full point array.
    pub fn read_points(&self, id: BlockId, count: u32) -> Result<Vec<Point>> {
        let path = self.path_for(id);
        debug!(block = %id, count, "reading block file");
        read_block_points(&path, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use pointstream_core::Aabb;
    use std::io::Write;

    fn write_points(path: &Path, points: &[Point]) {
        let mut f = File::create(path).unwrap();
        f.write_all(bytemuck::cast_slice(points)).unwrap();
    }

    fn block(id: u32, count: u32) -> Block {
        let mut b = Block::new(BlockId(id), Aabb::new(Vec3::ZERO, Vec3::ONE));
        b.count = count;
        b
    }

    #[test]
    fn reads_exact_point_count() {
        let dir = tempfile::tempdir().unwrap();
        let points = vec![
            Point::new(Vec3::new(1.0, 2.0, 3.0), Vec3::X),
            Point::new(Vec3::new(4.0, 5.0, 6.0), Vec3::Y),
        ];
        let store = BlockStore::new(dir.path(), vec![block(0, 2)]);
        write_points(&store.path_for(BlockId(0)), &points);

        let read = store.read_points(BlockId(0), 2).unwrap();
        assert_eq!(read, points);
    }

    #[test]
    fn truncated_file_is_a_short_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path(), vec![block(0, 2)]);
        write_points(
            &store.path_for(BlockId(0)),
            &[Point::new(Vec3::ONE, Vec3::ONE)],
        );
        assert!(matches!(
            store.read_points(BlockId(0), 2),
            Err(EngineError::ShortRead { .. })
        ));
    }

    #[test]
    fn missing_file_fails_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::new(dir.path(), vec![block(0, 1)]);
        assert!(matches!(
            store.read_points(BlockId(0), 1),
            Err(EngineError::Io {
                stage: IoStage::Open,
                ..
            })
        ));
    }

    #[test]
    fn filter_drops_only_empty_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlockStore::new(
            dir.path(),
            vec![block(0, 0), block(1, 5), block(2, 0), block(3, 1)],
        );
        assert_eq!(store.filter_blocks(), 2);
        let ids: Vec<u32> = store.blocks().iter().map(|b| b.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
