//! Parallel prefetching for the slice-lid pipeline
//!
//! Both caches compute every batch of an upstream [`BatchProvider`] on a
//! bounded pool of workers as soon as they are built, then serve batches by
//! index regardless of completion order. [`MultithreadedCache`] shares the
//! upstream between threads, [`MultiprocessedCache`] gives every worker its
//! own forked copy and moves finished batches back as encoded bytes.
//!
//! [`BatchProvider`]: slice_lid_core::BatchProvider

#![warn(missing_docs)]

pub mod mode;
pub mod multiprocessed;
pub mod multithreaded;
mod pool;
mod prefetch;

#[cfg(test)]
mod testing;

pub use mode::{default_workers, prefetch_cache, ConcurrencyMode};
pub use multiprocessed::MultiprocessedCache;
pub use multithreaded::MultithreadedCache;
