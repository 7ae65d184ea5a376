//! Core types, math, and errors for the pointstream viewer.
//!
//! This crate provides the foundational types used throughout the engine:
//! - `Point`/`FilePoint` wire and GPU layouts
//! - Spatial blocks and the uniform grid they live in
//! - Axis-aligned bounding boxes
//! - The engine-wide error sum type

pub mod aabb;
pub mod block;
pub mod error;
pub mod point;

pub use aabb::Aabb;
pub use block::{Block, BlockId};
pub use error::{EngineError, IoStage, Result};
pub use point::{FilePoint, Point};

/// Engine-wide constants
pub mod constants {
    /// Grid resolution per axis of the spatial partition
    pub const GRID: u32 = 10;
    /// Total number of logical blocks (10^3)
    pub const NUM_BLOCKS: u32 = GRID * GRID * GRID;
    /// Vertex rows read per batch during ingest
    pub const BATCH: usize = 1 << 16;
    /// Points buffered per block before a flush to disk
    pub const FLUSH_POINTS: usize = 4096;
    /// Maximum simultaneously open block writers during ingest
    pub const STREAM_CACHE_CAP: usize = 128;
    /// Default loader thread count
    pub const NUM_WORKERS: usize = 5;
}
