//! Core types for the slice-lid batching pipeline
//!
//! This crate defines the row stores training samples live in, the row
//! selectors that filter and balance them, the batch layout handed to the
//! trainer and the [`BatchProvider`] contract every pipeline stage
//! implements.

#![warn(missing_docs)]

pub mod batch;
pub mod column;
pub mod error;
pub mod matching;
pub mod provider;
pub mod select;
pub mod split;
pub mod store;

// Re-export key types for convenience
pub use batch::{Batch, BatchInputs, INPUT_RAGGED, INPUT_SCALAR, TARGET};
pub use column::Column;
pub use error::{check_index, Error, Result};
pub use matching::{PdgIscc, PdgSign};
pub use provider::{BatchProvider, Batches};
pub use select::{BalancedSampler, DataFilter, RowSelector, DEFAULT_SEED};
pub use split::{shuffle, train_test_split, TestSize};
pub use store::{MemoryStore, MemoryStoreBuilder, RowSlice, RowStore};
