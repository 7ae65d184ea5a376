//! Loader thread pool.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::job::{LoadJob, LoadResult};
use crate::queue::BlockingQueue;
use crate::store::read_block_points;

/// Pool of loader threads turning [`LoadJob`]s into [`LoadResult`]s.
///
/// Workers never raise: a failed or short read produces a result with an
/// empty point vector, which the render thread draws as a no-op.
pub struct WorkerPool {
    jobs: Arc<BlockingQueue<LoadJob>>,
    results: Arc<BlockingQueue<LoadResult>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `num_workers` named loader threads.
    pub fn spawn(num_workers: usize) -> Self {
        let jobs = Arc::new(BlockingQueue::new());
        let results = Arc::new(BlockingQueue::new());

        let mut handles = Vec::with_capacity(num_workers);
        for i in 0..num_workers {
            let jobs = Arc::clone(&jobs);
            let results = Arc::clone(&results);
            let handle = thread::Builder::new()
                .name(format!("loader-{i}"))
                .spawn(move || worker_loop(&jobs, &results))
                .expect("failed to spawn loader thread");
            handles.push(handle);
        }
        info!(workers = num_workers, "loader pool started");

        Self {
            jobs,
            results,
            handles,
        }
    }

    /// Queue a load; a worker picks it up as soon as one is idle.
    pub fn enqueue(&self, job: LoadJob) {
        self.jobs.push(job);
    }

    /// Blocking pop of the next finished load.
    ///
    /// `None` only after the result queue has been stopped and drained.
    pub fn pop_result(&self) -> Option<LoadResult> {
        self.results.pop()
    }

    /// Non-blocking variant of [`Self::pop_result`].
    pub fn try_pop_result(&self) -> Option<LoadResult> {
        self.results.try_pop()
    }

    /// Jobs waiting for a worker.
    pub fn queued_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Stop the job queue, join every worker, then stop the result queue.
    ///
    /// Results from jobs the render loop never drained are dropped.
    pub fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.jobs.stop();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        self.results.stop();
        info!("loader pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(jobs: &BlockingQueue<LoadJob>, results: &BlockingQueue<LoadResult>) {
    while let Some(job) = jobs.pop() {
        let points = match read_block_points(&job.path, job.count) {
            Ok(points) => points,
            Err(e) => {
                // non-fatal at steady state: the block renders as empty
                warn!(block = %job.block_id, error = %e, "block load failed");
                Vec::new()
            }
        };
        results.push(LoadResult {
            block_id: job.block_id,
            slot_idx: job.slot_idx,
            count: job.count,
            destination: job.destination,
            points,
        });
    }
    // job queue stopped and drained
}
