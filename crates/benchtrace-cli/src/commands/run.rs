//! `benchtrace run`: supervise one benchmark under telemetry.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use benchtrace_core::{BenchmarkOutcome, HarnessConfig, SamplerExit, Supervisor};

/// Parsed `run` flags. `None` means "keep the config file / default value".
pub struct RunCommandConfig<'a> {
    pub config_path: Option<&'a str>,
    pub output: Option<&'a str>,
    pub workdir: Option<&'a str>,
    pub sample_hz: Option<f64>,
    pub latency_artifact: Option<&'a str>,
    pub stop_timeout_secs: Option<f64>,
    pub command: Vec<String>,
}

/// Merge a config file (if any) with command-line overrides.
pub fn build_harness_config(cfg: RunCommandConfig<'_>) -> Result<HarnessConfig, String> {
    let mut config = match cfg.config_path {
        Some(path) => HarnessConfig::load_from_path(Path::new(path)).map_err(|e| e.to_string())?,
        None => HarnessConfig::default(),
    };
    if let Some(output) = cfg.output {
        config.output_dir = PathBuf::from(output);
    }
    if let Some(workdir) = cfg.workdir {
        config.workdir = PathBuf::from(workdir);
    }
    if let Some(hz) = cfg.sample_hz {
        config.sample_hz = hz;
    }
    if let Some(artifact) = cfg.latency_artifact {
        config.latency_artifact = PathBuf::from(artifact);
    }
    if let Some(timeout) = cfg.stop_timeout_secs {
        config.stop_timeout_secs = timeout;
    }
    if !cfg.command.is_empty() {
        config.command = cfg.command;
    }
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Run the run command.
pub fn run(cfg: RunCommandConfig<'_>) {
    let config = match build_harness_config(cfg) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Usage: benchtrace run [OPTIONS] -- <command>...");
            std::process::exit(2);
        }
    };

    let interrupted = super::install_interrupt_flag();

    println!("Benchmark run");
    println!("  Command:   {}", config.command.join(" "));
    println!("  Workdir:   {}", config.workdir.display());
    println!("  Output:    {}", config.output_dir.display());
    println!("  Sampling:  {} Hz", config.sample_hz);
    println!();

    let outcome = match Supervisor::new(config).run() {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!();
    if interrupted.load(Ordering::SeqCst) {
        println!("Interrupted; artifacts were finalized.");
    }
    print_outcome(&outcome);

    if outcome.sampler_failed() {
        std::process::exit(1);
    }
}

fn print_outcome(outcome: &BenchmarkOutcome) {
    println!("Run {} finished in {:.1}s", outcome.run_index, outcome.elapsed_ms as f64 / 1000.0);
    if outcome.exit_code == 0 {
        println!("  Exit code: 0");
    } else {
        println!("  Exit code: {} (warning: benchmark reported failure)", outcome.exit_code);
    }
    match &outcome.sampler {
        SamplerExit::Stopped { rows } => {
            println!("  Metrics:   {} ({rows} rows)", outcome.metrics_path.display());
        }
        other => {
            println!("  Metrics:   {} (sampler {other})", outcome.metrics_path.display());
        }
    }
    match (&outcome.latency_path, &outcome.relocation_error) {
        (Some(path), _) => println!("  Latency:   {}", path.display()),
        (None, Some(err)) => println!("  Latency:   not moved ({err})"),
        (None, None) => println!("  Latency:   none (benchmark wrote no latency artifact)"),
    }
    if let Some(manifest) = &outcome.manifest_path {
        println!("  Manifest:  {}", manifest.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(command: &[&str]) -> RunCommandConfig<'static> {
        RunCommandConfig {
            config_path: None,
            output: None,
            workdir: None,
            sample_hz: None,
            latency_artifact: None,
            stop_timeout_secs: None,
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let cfg = RunCommandConfig {
            output: Some("out"),
            sample_hz: Some(5.0),
            latency_artifact: Some("ort_latency.csv"),
            ..flags(&["python", "bench.py"])
        };
        let c = build_harness_config(cfg).unwrap();
        assert_eq!(c.output_dir, PathBuf::from("out"));
        assert_eq!(c.sample_hz, 5.0);
        assert_eq!(c.latency_artifact, PathBuf::from("ort_latency.csv"));
        assert_eq!(c.command, vec!["python", "bench.py"]);
    }

    #[test]
    fn test_missing_command_is_rejected() {
        assert!(build_harness_config(flags(&[])).is_err());
    }

    #[test]
    fn test_bad_rate_is_rejected() {
        let cfg = RunCommandConfig {
            sample_hz: Some(0.0),
            ..flags(&["true"])
        };
        assert!(build_harness_config(cfg).is_err());
    }
}
