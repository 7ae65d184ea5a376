//! One-time ingest: PLY vertex stream to per-block binary files.
//!
//! The partitioner streams the source twice: pass A computes the global
//! bounding box, pass B bins every vertex into one of the grid blocks and
//! appends it to that block's file through a bounded pool of writers.

pub mod manifest;
pub mod partitioner;
pub mod ply;
pub mod stream_cache;

pub use manifest::IngestManifest;
pub use partitioner::{partition, PartitionOutput};
pub use ply::{PlyHeader, VertexReader};
pub use stream_cache::FileStreamCache;
