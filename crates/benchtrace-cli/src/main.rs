//! CLI for benchtrace: run a benchmark and record what the host was doing
//! while it ran.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "benchtrace")]
#[command(about = "benchtrace: telemetry-correlated benchmark harness")]
#[command(version = benchtrace_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Supervise one benchmark run while sampling host telemetry.
    /// Everything after `--` is the benchmark command line.
    Run {
        /// JSON harness config; flags below override its fields
        #[arg(long)]
        config: Option<String>,

        /// Output directory for metrics_<N>.csv / latency_<N>.csv / run_<N>.json
        #[arg(long)]
        output: Option<String>,

        /// Working directory for the benchmark process
        #[arg(long)]
        workdir: Option<String>,

        /// Telemetry samples per second
        #[arg(long)]
        hz: Option<f64>,

        /// Latency artifact the benchmark writes, relative to --workdir
        #[arg(long)]
        latency_artifact: Option<String>,

        /// Seconds to wait for the sampler to stop once the benchmark exits
        #[arg(long)]
        stop_timeout: Option<f64>,

        /// Benchmark command and arguments
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Sample telemetry only, into the next metrics_<N>.csv
    Sample {
        /// Output directory (default: ./runs/)
        #[arg(long, default_value = "runs")]
        output: String,

        /// Telemetry samples per second
        #[arg(long, default_value = "1.0")]
        hz: f64,

        /// Stop after this many seconds; default: until Ctrl+C
        #[arg(long)]
        duration: Option<f64>,
    },

    /// Take one reading from every telemetry source
    Probe {
        /// Output directory whose next run index to report
        #[arg(long, default_value = "runs")]
        output: String,
    },

    /// Built-in synthetic batch-latency workload (a benchmark to supervise)
    Workload {
        /// Comma-separated batch sizes
        #[arg(long, default_value = "1,2,4,8,16")]
        batches: String,

        /// Untimed passes per batch size
        #[arg(long, default_value = "5")]
        warmup: usize,

        /// Timed passes per batch size
        #[arg(long, default_value = "50")]
        runs: usize,

        /// Latency artifact path
        #[arg(long, default_value = "latency.csv")]
        output: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output,
            workdir,
            hz,
            latency_artifact,
            stop_timeout,
            command,
        } => commands::run::run(commands::run::RunCommandConfig {
            config_path: config.as_deref(),
            output: output.as_deref(),
            workdir: workdir.as_deref(),
            sample_hz: hz,
            latency_artifact: latency_artifact.as_deref(),
            stop_timeout_secs: stop_timeout,
            command,
        }),
        Commands::Sample {
            output,
            hz,
            duration,
        } => commands::sample::run(&output, hz, duration),
        Commands::Probe { output } => commands::probe::run(&output),
        Commands::Workload {
            batches,
            warmup,
            runs,
            output,
        } => commands::workload::run(&batches, warmup, runs, &output),
    }
}
