//! Bounded LRU pool of append-mode block writers.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use hashbrown::HashMap;
use tracing::{trace, warn};

use pointstream_core::{BlockId, EngineError, IoStage, Result};

struct CachedWriter {
    writer: BufWriter<std::fs::File>,
    /// Tick of the last `get`; the smallest tick is the eviction victim.
    last_used: u64,
}

/// Keeps at most `cap` block files open for appending.
///
/// `get` on an evicted id transparently reopens the file in append mode, so
/// eviction never loses data; it only costs a reopen.
pub struct FileStreamCache {
    cap: usize,
    tick: u64,
    entries: HashMap<BlockId, CachedWriter>,
}

impl FileStreamCache {
    pub fn new(cap: usize) -> Self {
        assert!(cap > 0, "writer cache needs a nonzero capacity");
        Self {
            cap,
            tick: 0,
            entries: HashMap::with_capacity(cap),
        }
    }

    /// Number of currently open writers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writer for `id`, opening `path` (create + append) on a miss.
    ///
    /// The LRU writer is flushed and closed first when the pool is full.
    pub fn get(&mut self, id: BlockId, path: &Path) -> Result<&mut BufWriter<std::fs::File>> {
        self.tick += 1;
        let tick = self.tick;

        if !self.entries.contains_key(&id) {
            if self.entries.len() >= self.cap {
                self.evict_one()?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    warn!(block = %id, path = %path.display(), error = %e, "failed to open block file");
                    EngineError::io(IoStage::Open, path, e)
                })?;
            self.entries.insert(
                id,
                CachedWriter {
                    writer: BufWriter::new(file),
                    last_used: tick,
                },
            );
        }

        let entry = self.entries.get_mut(&id).expect("entry was just ensured");
        entry.last_used = tick;
        Ok(&mut entry.writer)
    }

    fn evict_one(&mut self) -> Result<()> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(id, _)| *id)
            .expect("evict_one on an empty cache");
        trace!(block = %victim, "evicting idle block writer");
        let mut entry = self.entries.remove(&victim).expect("victim exists");
        entry.writer.flush().map_err(|e| {
            warn!(block = %victim, error = %e, "failed to flush evicted block writer");
            EngineError::io(IoStage::Close, victim.file_name(), e)
        })
    }

    /// Flush and close every resident writer.
    pub fn close_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for (id, entry) in self.entries.iter_mut() {
            if let Err(e) = entry.writer.flush() {
                warn!(block = %id, error = %e, "failed to flush block writer");
                first_err.get_or_insert(EngineError::io(IoStage::Close, id.file_name(), e));
            }
        }
        self.entries.clear();
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
