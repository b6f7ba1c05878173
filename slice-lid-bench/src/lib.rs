//! Benchmarks for the slice-lid batching pipeline

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slice_lid_core::{
    BatchProvider, Error, MemoryStore, MemoryStoreBuilder, PdgIscc, Result, RowStore,
};
use slice_lid_generator::{
    add_cache_decorators, BatchSequence, DataGenerator, DataNANMask, GeneratorSpec, DEFAULT_MASK,
};
use slice_lid_parallel::ConcurrencyMode;
use tracing::debug;

/// Particle ids drawn for synthetic rows
const PDG_CHOICES: [i64; 4] = [12, -12, 14, 2112];

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Number of measured iterations
    pub iterations: usize,

    /// Warmup iterations
    pub warmup_iterations: usize,

    /// Rows of the synthetic dataset
    pub rows: usize,

    /// Rows per batch
    pub batch_size: usize,

    /// Upper bound on prongs per row
    pub max_prongs: usize,

    /// Ragged input variables per row
    pub ragged_vars: usize,

    /// Prefetch workers
    pub workers: usize,

    /// Seed of the synthetic dataset
    pub seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            warmup_iterations: 2,
            rows: 20_000,
            batch_size: 1024,
            max_prongs: 10,
            ragged_vars: 8,
            workers: 4,
            seed: 1337,
        }
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchResult {
    /// Name of the benchmark
    pub name: String,

    /// Total time taken
    pub total_time: Duration,

    /// Average time per iteration
    pub avg_time: Duration,

    /// Min time per iteration
    pub min_time: Duration,

    /// Max time per iteration
    pub max_time: Duration,

    /// Throughput (rows/second)
    pub throughput: f64,
}

/// Ragged variable names of the synthetic dataset
pub fn ragged_vars(config: &BenchConfig) -> Vec<String> {
    (0..config.ragged_vars).map(|i| format!("png.var{i}")).collect()
}

/// Random dataset with the layout the generator expects
///
/// Every row has a particle id, an interaction flag, one slice energy and
/// up to `max_prongs` values for each ragged variable.
pub fn synthetic_store(config: &BenchConfig) -> Result<MemoryStore> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let rows = config.rows;

    let pdg: Vec<i64> = (0..rows)
        .map(|_| PDG_CHOICES[rng.random_range(0..PDG_CHOICES.len())])
        .collect();
    let iscc: Vec<i64> = (0..rows).map(|_| i64::from(rng.random_bool(0.7))).collect();
    let energy: Vec<f64> = (0..rows).map(|_| rng.random_range(0.0..10.0)).collect();
    let prongs: Vec<usize> = (0..rows)
        .map(|_| rng.random_range(0..=config.max_prongs))
        .collect();

    let mut builder = MemoryStoreBuilder::new()
        .column("mc.pdg", pdg)
        .column("mc.isCC", iscc)
        .column("calE", energy);
    for name in ragged_vars(config) {
        let values: Vec<Vec<f64>> = prongs
            .iter()
            .map(|&n| (0..n).map(|_| rng.random::<f64>()).collect())
            .collect();
        builder = builder.column(&name, values);
    }
    builder.build()
}

/// Generator layout over the synthetic dataset
pub fn synthetic_spec(config: &BenchConfig) -> GeneratorSpec {
    GeneratorSpec {
        batch_size: config.batch_size,
        max_length: Some(config.max_prongs),
        target_pdg_iscc_list: vec![
            PdgIscc::new(12, 1),
            PdgIscc::new(14, 1),
            PdgIscc::new(2112, 0),
        ],
        vars_scalar: Some(vec!["calE".to_string()]),
        vars_ragged: Some(ragged_vars(config)),
        ..GeneratorSpec::default()
    }
}

/// Run a benchmark
///
/// `func` runs one iteration and returns the number of rows it processed.
#[allow(clippy::cast_precision_loss)]
pub fn run_benchmark<F>(name: &str, config: &BenchConfig, mut func: F) -> Result<BenchResult>
where
    F: FnMut() -> Result<usize>,
{
    if config.iterations == 0 {
        return Err(Error::InvalidArgument("iterations must be positive".to_string()));
    }

    for _ in 0..config.warmup_iterations {
        func()?;
    }

    let mut times = Vec::with_capacity(config.iterations);
    let mut rows = 0;
    let start_total = Instant::now();
    for _ in 0..config.iterations {
        let start = Instant::now();
        rows += func()?;
        times.push(start.elapsed());
    }
    let total_time = start_total.elapsed();

    let iterations = u32::try_from(times.len())
        .map_err(|_| Error::InvalidArgument("too many iterations".to_string()))?;
    let result = BenchResult {
        name: name.to_string(),
        total_time,
        avg_time: times.iter().sum::<Duration>() / iterations,
        min_time: times.iter().min().copied().unwrap_or_default(),
        max_time: times.iter().max().copied().unwrap_or_default(),
        throughput: rows as f64 / total_time.as_secs_f64(),
    };
    debug!(name, ?result.avg_time, "Benchmark finished");
    Ok(result)
}

/// Build a pipeline over `store` and iterate one full epoch
pub fn run_epoch(
    store: &Arc<dyn RowStore>,
    config: &BenchConfig,
    cache: bool,
    concurrency: Option<ConcurrencyMode>,
) -> Result<usize> {
    let generator: Box<dyn BatchProvider> =
        Box::new(DataGenerator::new(Arc::clone(store), synthetic_spec(config))?);
    let providers = add_cache_decorators(vec![generator], cache, concurrency, config.workers)?;

    let mut rows = 0;
    for provider in providers {
        let sequence = BatchSequence::new(Box::new(DataNANMask::new(provider, DEFAULT_MASK)));
        for batch in &sequence {
            rows += batch?.len();
        }
    }
    Ok(rows)
}

/// Compare the cache strategies on one synthetic dataset
pub fn compare_cache_strategies(config: &BenchConfig) -> Result<Vec<BenchResult>> {
    let store: Arc<dyn RowStore> = Arc::new(synthetic_store(config)?);
    let strategies: [(&str, bool, Option<ConcurrencyMode>); 4] = [
        ("No cache", false, None),
        ("Memory cache", true, None),
        ("Thread prefetch", true, Some(ConcurrencyMode::Thread)),
        ("Process prefetch", true, Some(ConcurrencyMode::Process)),
    ];

    strategies
        .into_iter()
        .map(|(name, cache, concurrency)| {
            run_benchmark(name, config, || run_epoch(&store, config, cache, concurrency))
        })
        .collect()
}
