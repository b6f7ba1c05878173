//! Benchmark runner for the slice-lid batching pipeline

use anyhow::Result;
use slice_lid_bench::{compare_cache_strategies, BenchConfig, BenchResult};
use tracing_subscriber::EnvFilter;

fn print_result(result: &BenchResult) {
    println!("\nStrategy: {}", result.name);
    println!("  Total time:   {:?}", result.total_time);
    println!("  Average time: {:?}", result.avg_time);
    println!("  Min time:     {:?}", result.min_time);
    println!("  Max time:     {:?}", result.max_time);
    println!("  Throughput:   {:.2} rows/sec", result.throughput);
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Slice LID Pipeline Benchmarks ===");

    let config = BenchConfig::default();
    println!(
        "\nRows: {}, batch size: {}, workers: {}",
        config.rows, config.batch_size, config.workers
    );
    for result in compare_cache_strategies(&config)? {
        print_result(&result);
    }

    println!("\n=== Batch Size Scaling ===");
    for batch_size in [128, 512, 2048] {
        let config = BenchConfig {
            iterations: 3,
            warmup_iterations: 1,
            batch_size,
            ..BenchConfig::default()
        };
        println!("\nBatch size: {batch_size}");
        for result in compare_cache_strategies(&config)? {
            println!("  {:<17} {:.2} rows/sec", result.name, result.throughput);
        }
    }

    Ok(())
}
