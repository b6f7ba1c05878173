//! Batch assembly for the slice-lid pipeline
//!
//! [`DataGenerator`] packs rows of a [`RowStore`] into fixed size batches of
//! scalar inputs, NaN padded ragged inputs and one-hot targets. Decorators
//! layered on top add class weights ([`DataClassWeights`]), in-memory and
//! on-disk caching ([`DataCache`], [`DataDiskCache`]) and NaN masking
//! ([`DataNANMask`]). [`create_data_generators`] assembles the whole stack
//! from a [`DataConfig`].
//!
//! [`RowStore`]: slice_lid_core::RowStore

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod disk_cache;
pub mod generator;
pub mod mask;
pub mod pipeline;
pub mod sequence;
pub mod weights;

#[cfg(test)]
mod fixtures;

// Re-export key types for convenience
pub use cache::DataCache;
pub use config::{DataConfig, DataMods, Preset, CONFIG_FILE, DATADIR_ENV};
pub use disk_cache::{fingerprint, DataDiskCache};
pub use generator::{DataGenerator, GeneratorSpec, DEFAULT_BATCH_SIZE};
pub use mask::{DataNANMask, DEFAULT_MASK};
pub use pipeline::{
    add_cache_decorators, add_class_weights, add_data_modifiers, add_disk_cache_decorators,
    construct_row_stores, create_basic_data_generators, create_data_generators,
    create_data_generators_from_partitions, create_data_generators_from_store, split_row_store,
};
pub use sequence::BatchSequence;
pub use weights::{calc_class_weights, equal_class_weights, ClassWeightsKind, DataClassWeights};
