//! Worker pool that computes indexed tasks on named threads.
//!
//! Every worker pulls batch indices from one shared queue and sends
//! `(index, output)` pairs back over an unbounded result channel. The queue
//! is filled and closed up front, so workers exit on their own once it is
//! drained. Dropping the pool signals shutdown and joins every worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{unbounded, Receiver, RecvError};
use slice_lid_core::{Error, Result};
use tracing::{debug, trace};

/// Pool of worker threads mapping task indices to outputs
pub(crate) struct WorkerPool<Output> {
    workers: Vec<thread::JoinHandle<()>>,
    output_rx: Receiver<(usize, Output)>,
    shutdown: Arc<AtomicBool>,
}

impl<Output: Send + 'static> WorkerPool<Output> {
    /// Spawn `num_workers` threads that together compute every index in
    /// `tasks`
    ///
    /// `make_worker` is called once per worker on the calling thread and
    /// returns the closure that worker runs for each index.
    pub(crate) fn spawn<F, W>(
        name: &str,
        num_workers: usize,
        tasks: impl IntoIterator<Item = usize>,
        mut make_worker: F,
    ) -> Result<Self>
    where
        F: FnMut(usize) -> Result<W>,
        W: FnMut(usize) -> Output + Send + 'static,
    {
        if num_workers == 0 {
            return Err(Error::Config(
                "cannot create a worker pool with 0 workers".to_string(),
            ));
        }

        let (task_tx, task_rx) = unbounded();
        for index in tasks {
            // the receiver is alive, so this cannot fail
            let _ = task_tx.send(index);
        }
        drop(task_tx);

        let (output_tx, output_rx) = unbounded();
        let mut pool = Self {
            workers: Vec::with_capacity(num_workers),
            output_rx,
            shutdown: Arc::new(AtomicBool::new(false)),
        };

        for worker_id in 0..num_workers {
            let mut work = make_worker(worker_id)?;
            let task_rx: Receiver<usize> = task_rx.clone();
            let output_tx = output_tx.clone();
            let shutdown = Arc::clone(&pool.shutdown);

            let handle = thread::Builder::new()
                .name(format!("{name}-{worker_id}"))
                .spawn(move || {
                    while !shutdown.load(Ordering::Relaxed) {
                        let Ok(index) = task_rx.recv() else {
                            break;
                        };
                        trace!(worker_id, index, "Computing batch");
                        if output_tx.send((index, work(index))).is_err() {
                            break;
                        }
                    }
                })?;
            pool.workers.push(handle);
        }

        debug!(name, workers = num_workers, "Started worker pool");
        Ok(pool)
    }

    /// Block until any worker delivers an output
    pub(crate) fn recv(&self) -> std::result::Result<(usize, Output), RecvError> {
        self.output_rx.recv()
    }
}

impl<Output> Drop for WorkerPool<Output> {
    fn drop(&mut self) {
        // Signal shutdown to all workers
        self.shutdown.store(true, Ordering::Relaxed);

        // Wait for workers to finish their current task
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
