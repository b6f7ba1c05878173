//! Index-keyed reassembly of batches computed out of order by a worker pool

use std::sync::Mutex;

use slice_lid_core::{check_index, Batch, BatchProvider, Error, Result};
use tracing::{debug, warn};

use crate::pool::WorkerPool;

/// State of one batch index
enum Slot {
    /// Not yet delivered by a worker
    Pending,
    /// Delivered and decoded
    Ready(Batch),
    /// A worker failed; the error is reported on first retrieval
    Failed(Error),
    /// Failure already reported; later requests recompute synchronously
    Retry,
}

struct State<Output> {
    /// Live pool, dropped once every index has been delivered
    pool: Option<WorkerPool<Output>>,
    slots: Vec<Slot>,
    outstanding: usize,
}

/// Retains worker outputs by index and hands them out in any order
pub(crate) struct Prefetcher<Output> {
    state: Mutex<State<Output>>,
    decode: fn(Output) -> Result<Batch>,
}

impl<Output: Send + 'static> Prefetcher<Output> {
    /// Start computing all `len` batches on `num_workers` threads
    pub(crate) fn start<F, W>(
        name: &str,
        len: usize,
        num_workers: usize,
        make_worker: F,
        decode: fn(Output) -> Result<Batch>,
    ) -> Result<Self>
    where
        F: FnMut(usize) -> Result<W>,
        W: FnMut(usize) -> Output + Send + 'static,
    {
        let pool = if len == 0 {
            None
        } else {
            Some(WorkerPool::spawn(name, num_workers, 0..len, make_worker)?)
        };

        Ok(Self {
            state: Mutex::new(State {
                pool,
                slots: (0..len).map(|_| Slot::Pending).collect(),
                outstanding: len,
            }),
            decode,
        })
    }

    /// Batch `index`, blocking until a worker has delivered it
    ///
    /// `upstream` recomputes batches whose worker failed.
    pub(crate) fn get(&self, index: usize, upstream: &dyn BatchProvider) -> Result<Batch> {
        let mut state = self.state.lock()?;
        check_index(index, state.slots.len())?;

        loop {
            match std::mem::replace(&mut state.slots[index], Slot::Pending) {
                Slot::Ready(batch) => {
                    let out = batch.clone();
                    state.slots[index] = Slot::Ready(batch);
                    return Ok(out);
                }
                Slot::Failed(err) => {
                    state.slots[index] = Slot::Retry;
                    return Err(err);
                }
                Slot::Retry => {
                    state.slots[index] = Slot::Retry;
                    drop(state);
                    let batch = upstream.get_batch(index)?;
                    let mut state = self.state.lock()?;
                    state.slots[index] = Slot::Ready(batch.clone());
                    return Ok(batch);
                }
                Slot::Pending => {
                    let received = match state.pool.as_ref() {
                        Some(pool) => pool.recv(),
                        None => return Err(Error::WorkerDisconnected { index }),
                    };
                    let Ok((done, output)) = received else {
                        state.pool = None;
                        return Err(Error::WorkerDisconnected { index });
                    };

                    state.slots[done] = match (self.decode)(output) {
                        Ok(batch) => Slot::Ready(batch),
                        Err(err) => {
                            warn!(index = done, error = %err, "Prefetch worker failed");
                            Slot::Failed(err)
                        }
                    };
                    state.outstanding -= 1;
                    if state.outstanding == 0 {
                        debug!("All batches prefetched, stopping workers");
                        state.pool = None;
                    }
                }
            }
        }
    }
}
