//! Runs the demonstration evaluation, then the throughput benchmarks

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use ml_eval_bench::{bench_evaluate, bench_gather, run_demo, BenchConfig, BenchResult};

fn print_result(result: &BenchResult) {
    println!("\nBenchmark: {}", result.name);
    println!("  Total time:   {:?}", result.total_time);
    println!("  Average time: {:?}", result.avg_time);
    println!("  Min time:     {:?}", result.min_time);
    println!("  Max time:     {:?}", result.max_time);
    println!("  Throughput:   {:.2} rows/sec", result.throughput);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ml_eval_core=info,ml_eval_bench=info,warn")),
        )
        .init();

    println!("=== Demo evaluation ===");
    let (table, stats) = run_demo(10).context("demo evaluation failed")?;
    println!("{table}");
    println!("{}", serde_json::to_string_pretty(&stats)?);

    println!("\n=== Throughput ===");
    for rows in [1_000, 10_000, 100_000] {
        let config = BenchConfig {
            iterations: 5,
            warmup_iterations: 1,
            rows,
        };

        print_result(&bench_gather(&config).with_context(|| format!("gather benchmark, {rows} rows"))?);
        print_result(&bench_evaluate(&config).with_context(|| format!("evaluate benchmark, {rows} rows"))?);
    }

    Ok(())
}
