//! Software point rasterizer.
//!
//! Splats each vertex as a single pixel through a view-projection matrix
//! into an RGBA framebuffer with a depth buffer. Slow but dependency-free,
//! which keeps the whole streaming path testable without a window system.

use std::path::Path;

use glam::{Mat4, Vec4};
use image::{ImageBuffer, Rgba};
use tracing::debug;

use pointstream_core::Point;

use crate::device::{DeviceError, GraphicsDevice, VertexBufferId};

struct Buffer {
    capacity_bytes: usize,
    points: Vec<Point>,
}

/// CPU implementation of [`GraphicsDevice`] with a readable framebuffer.
pub struct SoftwareDevice {
    width: u32,
    height: u32,
    view_proj: Mat4,
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
    buffers: Vec<Buffer>,
    /// `(buffer, count)` per draw call since the last [`Self::take_draw_calls`].
    draw_log: Vec<(VertexBufferId, u32)>,
    points_drawn: u64,
}

impl SoftwareDevice {
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = (width * height) as usize;
        Self {
            width,
            height,
            view_proj: Mat4::IDENTITY,
            color: vec![[0, 0, 0, 255]; pixels],
            depth: vec![f32::MAX; pixels],
            buffers: Vec::new(),
            draw_log: Vec::new(),
            points_drawn: 0,
        }
    }

    /// Clear the frame and set the matrix subsequent draws project through.
    pub fn begin_frame(&mut self, view_proj: Mat4, clear: [u8; 4]) {
        self.view_proj = view_proj;
        self.color.fill(clear);
        self.depth.fill(f32::MAX);
        self.points_drawn = 0;
    }

    /// Total points splatted since `begin_frame`.
    pub fn points_drawn(&self) -> u64 {
        self.points_drawn
    }

    /// Draw calls recorded since the last call; clears the log.
    pub fn take_draw_calls(&mut self) -> Vec<(VertexBufferId, u32)> {
        std::mem::take(&mut self.draw_log)
    }

    /// Encode the current framebuffer as a PNG at `path`.
    pub fn save_frame(&self, path: &Path) -> Result<(), DeviceError> {
        let mut img = ImageBuffer::<Rgba<u8>, Vec<u8>>::new(self.width, self.height);
        for (i, px) in self.color.iter().enumerate() {
            let x = i as u32 % self.width;
            let y = i as u32 / self.width;
            img.put_pixel(x, y, Rgba(*px));
        }
        img.save(path)?;
        debug!(path = %path.display(), "saved frame");
        Ok(())
    }

    fn splat(&mut self, p: &Point) {
        let clip = self.view_proj * Vec4::new(p.pos.x, p.pos.y, p.pos.z, 1.0);
        if clip.w <= 0.0 {
            return;
        }
        let ndc = clip / clip.w;
        if ndc.x < -1.0 || ndc.x > 1.0 || ndc.y < -1.0 || ndc.y > 1.0 || ndc.z < -1.0 || ndc.z > 1.0
        {
            return;
        }
        let x = ((ndc.x * 0.5 + 0.5) * (self.width - 1) as f32).round() as u32;
        let y = ((1.0 - (ndc.y * 0.5 + 0.5)) * (self.height - 1) as f32).round() as u32;
        let i = (y * self.width + x) as usize;
        if ndc.z < self.depth[i] {
            self.depth[i] = ndc.z;
            self.color[i] = [
                (p.color.x.clamp(0.0, 1.0) * 255.0) as u8,
                (p.color.y.clamp(0.0, 1.0) * 255.0) as u8,
                (p.color.z.clamp(0.0, 1.0) * 255.0) as u8,
                255,
            ];
        }
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn create_vertex_buffer(&mut self, capacity_bytes: usize) -> VertexBufferId {
        let id = VertexBufferId(self.buffers.len() as u32);
        self.buffers.push(Buffer {
            capacity_bytes,
            points: Vec::new(),
        });
        id
    }

    fn update_vertex_buffer_sub(&mut self, id: VertexBufferId, byte_offset: usize, data: &[Point]) {
        let buf = &mut self.buffers[id.0 as usize];
        debug_assert_eq!(byte_offset % std::mem::size_of::<Point>(), 0);
        debug_assert!(byte_offset + std::mem::size_of_val(data) <= buf.capacity_bytes);
        let start = byte_offset / std::mem::size_of::<Point>();
        if buf.points.len() < start + data.len() {
            buf.points.resize(start + data.len(), Point::default());
        }
        buf.points[start..start + data.len()].copy_from_slice(data);
    }

    fn draw_points(&mut self, id: VertexBufferId, count: u32) {
        self.draw_log.push((id, count));
        // draws of a partially uploaded buffer clamp to what is resident
        let n = (count as usize).min(self.buffers[id.0 as usize].points.len());
        for i in 0..n {
            let p = self.buffers[id.0 as usize].points[i];
            self.splat(&p);
        }
        self.points_drawn += n as u64;
    }
}
