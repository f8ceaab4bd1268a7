//! # benchtrace-core
//!
//! **Run a benchmark and record what the host was doing while it ran.**
//!
//! `benchtrace-core` supervises an external benchmark process while a
//! background sampler records host telemetry (CPU utilization, pressure
//! stall information, RAPL energy). Each run leaves a uniquely indexed set
//! of artifacts in an output directory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use benchtrace_core::{HarnessConfig, Supervisor};
//!
//! let config = HarnessConfig {
//!     command: vec!["python".into(), "bench.py".into()],
//!     ..Default::default()
//! };
//! let outcome = Supervisor::new(config).run().expect("benchmark did not launch");
//! println!("run {} exited {}", outcome.run_index, outcome.exit_code);
//! println!("telemetry: {}", outcome.metrics_path.display());
//! ```
//!
//! ## Architecture
//!
//! Telemetry readers → CPU tracker / energy accumulator → Sampler thread →
//! `metrics_<N>.csv`, while the Supervisor spawns and waits on the
//! workload, then stops the sampler and moves the workload's latency
//! output to `latency_<N>.csv`.
//!
//! Readers never fail past their own boundary: a metric the host does not
//! expose becomes an empty CSV field for that row, never a zero and never
//! an aborted run.

pub mod config;
pub mod correlator;
pub mod error;
pub mod manifest;
pub mod sampler;
pub mod supervisor;
pub mod telemetry;
pub mod workload;

pub use config::HarnessConfig;
pub use correlator::{RunDescriptor, next_run_index};
pub use error::HarnessError;
pub use manifest::{MachineInfo, RunManifest, detect_machine_info};
pub use sampler::{
    METRICS_HEADER, MetricsSink, MetricsWriter, Sampler, SamplerConfig, SamplerExit,
    SamplerHandle, SamplerState, TelemetrySample,
};
pub use supervisor::{BenchmarkOutcome, Supervisor, relocate};
pub use telemetry::{
    CpuTimes, CpuTracker, EnergyAccumulator, PressureKind, Readings, TelemetryPaths,
    read_cpu_times, read_energy_joules, read_pressure_avg10,
};
pub use workload::{BatchBenchConfig, LATENCY_HEADER, LatencySummary};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
