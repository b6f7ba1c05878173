//! Prefetching cache backed by share-nothing workers
//!
//! Each worker owns a forked copy of the upstream provider, including its
//! own row storage, and ships finished batches back as encoded bytes.
//! Nothing but those bytes crosses from a worker to the consumer.

use ndarray::Array2;
use slice_lid_core::{Batch, BatchProvider, Error, Result};
use tracing::info;

use crate::prefetch::Prefetcher;

/// Encoded batch or the worker's error message
type Shipped = std::result::Result<Vec<u8>, String>;

fn ship(provider: &dyn BatchProvider, index: usize) -> Shipped {
    provider
        .get_batch(index)
        .and_then(|batch| Ok(bincode::serialize(&batch)?))
        .map_err(|err| err.to_string())
}

fn unship(shipped: Shipped) -> Result<Batch> {
    let bytes = shipped.map_err(Error::PipelineExecution)?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Computes every upstream batch on isolated workers at construction
pub struct MultiprocessedCache {
    /// Provider used for length, targets and failed-batch recomputation
    upstream: Box<dyn BatchProvider>,

    /// Reassembly buffer fed by the workers
    prefetch: Prefetcher<Shipped>,
}

impl MultiprocessedCache {
    /// Start prefetching all batches of `upstream` on `workers` isolated
    /// workers
    pub fn new(upstream: Box<dyn BatchProvider>, workers: usize) -> Result<Self> {
        let len = upstream.len();

        let prefetch = Prefetcher::start(
            "slice-lid-process",
            len,
            workers,
            |_| {
                let forked = upstream.fork()?;
                Ok(move |index: usize| ship(&*forked, index))
            },
            unship,
        )?;

        info!(batches = len, workers, "Started isolated prefetch cache");
        Ok(Self { upstream, prefetch })
    }
}

impl BatchProvider for MultiprocessedCache {
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
