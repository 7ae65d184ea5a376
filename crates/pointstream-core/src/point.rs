//! Point layouts for disk and GPU.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// A renderable point: position and normalized RGB color.
///
/// This is both the block-file record and the vertex layout, so it must stay
/// tightly packed at 24 bytes with no padding visible to the GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Point {
    pub pos: Vec3,
    pub color: Vec3,
}

/// One vertex row of the source PLY: f64 position, u8 color, 27 bytes,
/// little-endian, no padding.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FilePoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const _: () = assert!(std::mem::size_of::<Point>() == 24);
const _: () = assert!(std::mem::size_of::<FilePoint>() == 27);

impl Point {
    /// Create a point from raw components.
    #[inline]
    pub fn new(pos: Vec3, color: Vec3) -> Self {
        Self { pos, color }
    }
}

impl FilePoint {
    /// Position cast down to f32.
    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    /// Convert a file row into the render layout (u8 color mapped to [0, 1]).
    #[inline]
    pub fn to_point(&self) -> Point {
        Point {
            pos: self.position(),
            color: Vec3::new(
                f32::from(self.r) / 255.0,
                f32::from(self.g) / 255.0,
                f32::from(self.b) / 255.0,
            ),
        }
    }
}
