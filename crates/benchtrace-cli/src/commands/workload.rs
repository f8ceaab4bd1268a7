//! `benchtrace workload`: synthetic batch-latency benchmark.
//!
//! Meant to be supervised: `benchtrace run -- benchtrace workload`.

use std::path::Path;

use benchtrace_core::BatchBenchConfig;
use benchtrace_core::workload::{run_sweep, write_latency_csv};

pub fn run(batches: &str, warmup: usize, runs: usize, output: &str) {
    let batches = match super::parse_batches(batches) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    let config = BatchBenchConfig {
        batches,
        warmup,
        runs,
        ..Default::default()
    };
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(2);
    }
    let rows = match run_sweep(&config, |s| {
        println!(
            "B={:>2} mean={:.2} ms p95={:.2} ms runs={}",
            s.batch, s.mean_ms, s.p95_ms, s.runs
        );
    }) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = write_latency_csv(Path::new(output), &rows) {
        eprintln!("Error writing {output}: {e}");
        std::process::exit(1);
    }
    println!("latency -> {output}");
}
