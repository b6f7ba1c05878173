//! Assembly of the full data pipeline from a [`DataConfig`]
//!
//! Rows flow through the stages in this order:
//!
//! 1. load the dataset into a row store
//! 2. keep-list filter and balanced sampler from `data_mods`
//! 3. seeded shuffle, then train/test split
//! 4. one [`DataGenerator`] per partition
//! 5. disk cache, only for a train/test pair
//! 6. class weights
//! 7. in-memory or prefetching cache
//! 8. NaN mask
//! 9. [`BatchSequence`]

use std::path::Path;
use std::sync::Arc;

use slice_lid_core::{
    shuffle, train_test_split, BalancedSampler, BatchProvider, DataFilter, MemoryStore, Result,
    RowSelector, RowStore,
};
use slice_lid_parallel::{prefetch_cache, ConcurrencyMode};
use tracing::{info, warn};

use crate::cache::DataCache;
use crate::config::{DataConfig, DataMods};
use crate::disk_cache::DataDiskCache;
use crate::generator::{DataGenerator, GeneratorSpec};
use crate::mask::DataNANMask;
use crate::sequence::BatchSequence;
use crate::weights::{ClassWeightsKind, DataClassWeights};

/// Apply the selections of `data_mods`: the keep-list filter, then the
/// balanced sampler
pub fn add_data_modifiers(
    store: Arc<dyn RowStore>,
    data_mods: &DataMods,
    seed: u64,
    var_pdg: &str,
    var_iscc: &str,
) -> Result<Arc<dyn RowStore>> {
    let mut store = store;

    if let Some(keep_list) = &data_mods.keep_pdg_iscc_list {
        info!(patterns = ?keep_list, "Adding data filter");
        let filter = DataFilter::new(var_pdg, var_iscc, keep_list.clone());
        store = Arc::new(filter.apply(store)?);
    }

    if let Some(balance_list) = &data_mods.balance_pdg_iscc_list {
        info!(patterns = ?balance_list, "Adding balanced sampler");
        let sampler = BalancedSampler::new(var_pdg, var_iscc, balance_list.clone(), seed);
        store = Arc::new(sampler.apply(store)?);
    }

    Ok(store)
}

/// Select, shuffle and split `store` into one or two partitions
pub fn split_row_store(
    store: Arc<dyn RowStore>,
    config: &DataConfig,
) -> Result<Vec<Arc<dyn RowStore>>> {
    let store = add_data_modifiers(
        store,
        &config.data_mods,
        config.seed,
        &config.var_target_pdg,
        &config.var_target_iscc,
    )?;
    let shuffled: Arc<dyn RowStore> = Arc::new(shuffle(store, config.seed)?);
    train_test_split(shuffled, config.test_size)
}

/// Load the configured dataset and split it into partitions
pub fn construct_row_stores(config: &DataConfig) -> Result<Vec<Arc<dyn RowStore>>> {
    let path = config.dataset_path()?;
    info!(path = %path.display(), "Loading dataset");
    let store: Arc<dyn RowStore> = Arc::new(MemoryStore::from_json_file(&path)?);
    split_row_store(store, config)
}

/// One [`DataGenerator`] per partition
pub fn create_basic_data_generators(
    partitions: Vec<Arc<dyn RowStore>>,
    spec: &GeneratorSpec,
) -> Result<Vec<Box<dyn BatchProvider>>> {
    partitions
        .into_iter()
        .map(|store| -> Result<Box<dyn BatchProvider>> {
            Ok(Box::new(DataGenerator::new(store, spec.clone())?))
        })
        .collect()
}

/// Wrap each provider of a train/test pair in a [`DataDiskCache`]
///
/// Any other number of partitions is returned unchanged.
pub fn add_disk_cache_decorators(
    providers: Vec<Box<dyn BatchProvider>>,
    root: &Path,
    fingerprint: &str,
) -> Result<Vec<Box<dyn BatchProvider>>> {
    if providers.len() != 2 {
        info!(
            partitions = providers.len(),
            "Disk cache needs a train/test pair, skipping"
        );
        return Ok(providers);
    }

    providers
        .into_iter()
        .enumerate()
        .map(|(part, provider)| -> Result<Box<dyn BatchProvider>> {
            Ok(Box::new(DataDiskCache::new(provider, root, fingerprint, part)?))
        })
        .collect()
}

/// Wrap each provider in [`DataClassWeights`] when a scheme is set
pub fn add_class_weights(
    providers: Vec<Box<dyn BatchProvider>>,
    kind: Option<ClassWeightsKind>,
) -> Result<Vec<Box<dyn BatchProvider>>> {
    let Some(kind) = kind else {
        return Ok(providers);
    };
    providers
        .into_iter()
        .map(|provider| -> Result<Box<dyn BatchProvider>> {
            Ok(Box::new(DataClassWeights::new(provider, kind)?))
        })
        .collect()
}

/// Wrap each provider in the cache selected by `cache`, `concurrency` and
/// `workers`
///
/// With caching enabled, a concurrency mode and at least one worker select
/// a prefetching cache, anything else the plain [`DataCache`]. More than one
/// worker without a concurrency mode is logged as a warning.
pub fn add_cache_decorators(
    providers: Vec<Box<dyn BatchProvider>>,
    cache: bool,
    concurrency: Option<ConcurrencyMode>,
    workers: usize,
) -> Result<Vec<Box<dyn BatchProvider>>> {
    if !cache {
        return Ok(providers);
    }

    match concurrency {
        Some(mode) if workers > 0 => {
            info!(%mode, workers, "Using prefetching data cache");
            providers
                .into_iter()
                .map(|provider| prefetch_cache(provider, mode, workers))
                .collect()
        }
        None if workers > 1 => {
            warn!(
                workers,
                "Workers configured without a concurrency mode, using in-memory data cache"
            );
            Ok(in_memory_caches(providers))
        }
        _ => {
            info!("Using in-memory data cache");
            Ok(in_memory_caches(providers))
        }
    }
}

fn in_memory_caches(providers: Vec<Box<dyn BatchProvider>>) -> Vec<Box<dyn BatchProvider>> {
    providers
        .into_iter()
        .map(|provider| -> Box<dyn BatchProvider> { Box::new(DataCache::new(provider)) })
        .collect()
}

/// Build one batch sequence per partition
pub fn create_data_generators_from_partitions(
    partitions: Vec<Arc<dyn RowStore>>,
    config: &DataConfig,
) -> Result<Vec<BatchSequence>> {
    let mut providers = create_basic_data_generators(partitions, &config.generator_spec())?;

    if config.disk_cache {
        providers = add_disk_cache_decorators(
            providers,
            &config.cache_root()?,
            &config.fingerprint()?,
        )?;
    }

    providers = add_class_weights(providers, config.class_weights)?;
    providers = add_cache_decorators(
        providers,
        config.cache,
        config.concurrency,
        config.resolve_workers(),
    )?;

    Ok(providers
        .into_iter()
        .map(|provider| {
            BatchSequence::new(Box::new(DataNANMask::new(provider, config.mask_value)))
        })
        .collect())
}

/// Build one batch sequence per partition of an already loaded row store
pub fn create_data_generators_from_store(
    store: Arc<dyn RowStore>,
    config: &DataConfig,
) -> Result<Vec<BatchSequence>> {
    create_data_generators_from_partitions(split_row_store(store, config)?, config)
}

/// Load the configured dataset and build one batch sequence per partition
pub fn create_data_generators(config: &DataConfig) -> Result<Vec<BatchSequence>> {
    create_data_generators_from_partitions(construct_row_stores(config)?, config)
}
