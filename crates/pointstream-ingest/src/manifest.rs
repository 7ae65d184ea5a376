//! Ingest manifest: lets the viewer reuse block files across runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use pointstream_core::block::build_grid;
use pointstream_core::constants::GRID;
use pointstream_core::{Aabb, Block, EngineError, Result};

use crate::partitioner::PartitionOutput;

pub const MANIFEST_NAME: &str = "manifest.json";

/// Everything needed to rebuild block metadata without re-reading the PLY.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestManifest {
    /// Source cloud the blocks were cut from.
    pub source: PathBuf,
    pub vertex_count: u64,
    pub grid: u32,
    pub bb_min: [f32; 3],
    pub bb_max: [f32; 3],
    /// Point count per block, indexed by block id.
    pub counts: Vec<u32>,
}

impl IngestManifest {
    pub fn from_output(source: &Path, out: &PartitionOutput) -> Self {
        Self {
            source: source.to_path_buf(),
            vertex_count: out.vertex_count,
            grid: GRID,
            bb_min: out.scene.min.to_array(),
            bb_max: out.scene.max.to_array(),
            counts: out.blocks.iter().map(|b| b.count).collect(),
        }
    }

    /// Serialize to `<out_dir>/manifest.json`.
    pub fn write(&self, out_dir: &Path) -> Result<()> {
        let path = out_dir.join(MANIFEST_NAME);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::Manifest(e.to_string()))?;
        std::fs::write(&path, json)
            .map_err(|e| EngineError::Manifest(format!("write {}: {e}", path.display())))?;
        info!(path = %path.display(), "wrote ingest manifest");
        Ok(())
    }

    /// Load `<out_dir>/manifest.json`.
    pub fn load(out_dir: &Path) -> Result<Self> {
        let path = out_dir.join(MANIFEST_NAME);
        let json = std::fs::read_to_string(&path)
            .map_err(|e| EngineError::Manifest(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&json).map_err(|e| EngineError::Manifest(e.to_string()))
    }

    /// Whether this manifest describes `source` with the current grid.
    pub fn matches(&self, source: &Path) -> bool {
        self.source == source && self.grid == GRID && self.counts.len() == (GRID * GRID * GRID) as usize
    }

    /// Rebuild block metadata from the recorded scene box and counts.
    pub fn to_output(&self) -> PartitionOutput {
        let scene = Aabb::new(self.bb_min.into(), self.bb_max.into());
        let mut blocks: Vec<Block> = build_grid(&scene);
        for (b, &count) in blocks.iter_mut().zip(&self.counts) {
            b.count = count;
        }
        PartitionOutput {
            scene,
            vertex_count: self.vertex_count,
            blocks,
        }
    }
}
