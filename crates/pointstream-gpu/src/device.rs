//! The graphics capability consumed by the streaming core.

use pointstream_core::Point;
use thiserror::Error;

/// Handle to a device vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexBufferId(pub u32);

/// Device-side errors.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("unknown vertex buffer {0:?}")]
    UnknownBuffer(VertexBufferId),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the streaming core needs from a renderer, and nothing more.
///
/// Buffers are allocated once at slot-table init and reused for the
/// program's lifetime; uploads are always sub-range writes from the start
/// of a buffer.
pub trait GraphicsDevice {
    /// Allocate a vertex buffer of `capacity_bytes`.
    fn create_vertex_buffer(&mut self, capacity_bytes: usize) -> VertexBufferId;

    /// Overwrite `[byte_offset, byte_offset + size_of_val(data))` of a buffer.
    fn update_vertex_buffer_sub(&mut self, id: VertexBufferId, byte_offset: usize, data: &[Point]);

    /// Draw the first `count` vertices of a buffer as points.
    fn draw_points(&mut self, id: VertexBufferId, count: u32);
}
