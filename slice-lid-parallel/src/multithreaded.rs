//! Prefetching cache backed by worker threads sharing the upstream provider

use std::sync::Arc;

use ndarray::Array2;
use slice_lid_core::{Batch, BatchProvider, Result};
use tracing::info;

use crate::prefetch::Prefetcher;

/// Computes every upstream batch on a pool of threads at construction
///
/// Workers share the upstream provider through reference-counted handles.
/// Batches are handed out by index regardless of completion order and
/// retained for the lifetime of the cache.
pub struct MultithreadedCache {
    /// Provider the workers compute from
    upstream: Arc<dyn BatchProvider>,

    /// Reassembly buffer fed by the workers
    prefetch: Prefetcher<Result<Batch>>,
}

impl MultithreadedCache {
    /// Start prefetching all batches of `upstream` on `workers` threads
    pub fn new(upstream: Box<dyn BatchProvider>, workers: usize) -> Result<Self> {
        let upstream: Arc<dyn BatchProvider> = Arc::from(upstream);
        let len = upstream.len();

        let prefetch = Prefetcher::start(
            "slice-lid-thread",
            len,
            workers,
            |_| {
                let view = Arc::clone(&upstream);
                Ok(move |index: usize| view.get_batch(index))
            },
            std::convert::identity,
        )?;

        info!(batches = len, workers, "Started thread prefetch cache");
        Ok(Self { upstream, prefetch })
    }
}

impl BatchProvider for MultithreadedCache {
    fn len(&self) -> usize {
        self.upstream.len()
    }

    fn get_batch(&self, index: usize) -> Result<Batch> {
        self.prefetch.get(index, self.upstream.as_ref())
    }

    fn target_data(&self) -> Result<Array2<f32>> {
        self.upstream.target_data()
    }

    fn fork(&self) -> Result<Box<dyn BatchProvider>> {
        self.upstream.fork()
    }
}
