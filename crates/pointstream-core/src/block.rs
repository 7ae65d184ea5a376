//! Spatial blocks of the uniform grid partition.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::aabb::Aabb;
use crate::constants::GRID;

/// Identifier of a block in the `GRID^3` partition, `0..NUM_BLOCKS`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Compose an id from per-axis cell indices.
    #[inline]
    pub const fn from_cell(ix: u32, iy: u32, iz: u32) -> Self {
        Self(ix + GRID * iy + GRID * GRID * iz)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// On-disk file name, zero-padded: `block_0042.bin`.
    pub fn file_name(self) -> String {
        format!("block_{:04}.bin", self.0)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bin a world position into its block id.
///
/// Each axis index is `clamp(floor((p - bb_min) / cell), 0, GRID - 1)`, so
/// points on the scene max face land in the last cell.
#[inline]
pub fn bin_point(p: Vec3, bb_min: Vec3, cell: Vec3) -> BlockId {
    let hi = (GRID - 1) as i32;
    let ix = (((p.x - bb_min.x) / cell.x) as i32).clamp(0, hi);
    let iy = (((p.y - bb_min.y) / cell.y) as i32).clamp(0, hi);
    let iz = (((p.z - bb_min.z) / cell.z) as i32).clamp(0, hi);
    BlockId::from_cell(ix as u32, iy as u32, iz as u32)
}

/// Metadata for one spatial block.
///
/// Created once during ingest and immutable afterwards, except for the
/// per-frame scalars which only the render thread touches during culling.
#[derive(Clone, Debug)]
pub struct Block {
    pub id: BlockId,
    /// World-space bounds of the grid cell.
    pub aabb: Aabb,
    /// Number of points stored in the block file.
    pub count: u32,

    // Per-frame scalars, recomputed by the culler, never persisted.
    pub is_visible: bool,
    pub dist_to_camera: f32,
    pub dist_to_frustum_center: f32,
    pub min_plane_dist: f32,
}

impl Block {
    /// A fresh block with zero count and cleared frame state.
    pub fn new(id: BlockId, aabb: Aabb) -> Self {
        Self {
            id,
            aabb,
            count: 0,
            is_visible: false,
            dist_to_camera: 0.0,
            dist_to_frustum_center: 0.0,
            min_plane_dist: 0.0,
        }
    }
}

/// Build the `GRID^3` block metadata covering `scene`, cell by cell.
///
/// The union of the returned AABBs is exactly the scene box.
pub fn build_grid(scene: &Aabb) -> Vec<Block> {
    let cell = scene.extent() / GRID as f32;
    let mut blocks = Vec::with_capacity((GRID * GRID * GRID) as usize);
    for iz in 0..GRID {
        for iy in 0..GRID {
            for ix in 0..GRID {
                let id = BlockId::from_cell(ix, iy, iz);
                let mn = scene.min + Vec3::new(ix as f32, iy as f32, iz as f32) * cell;
                let mx = scene.min + Vec3::new((ix + 1) as f32, (iy + 1) as f32, (iz + 1) as f32) * cell;
                blocks.push(Block::new(id, Aabb::new(mn, mx)));
            }
        }
    }
    // ids double as indices
    debug_assert!(blocks.iter().enumerate().all(|(i, b)| b.id.index() == i));
    blocks
}
