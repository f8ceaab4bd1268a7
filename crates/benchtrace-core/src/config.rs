//! Static harness configuration.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sampler::{DEFAULT_SAMPLE_HZ, SamplerConfig};
use crate::telemetry::TelemetryPaths;

/// Default relative path of the workload's latency artifact.
pub const DEFAULT_LATENCY_ARTIFACT: &str = "latency.csv";

/// Default bound on waiting for the sampler to stop.
pub const DEFAULT_STOP_TIMEOUT_SECS: f64 = 2.0;

/// Everything a supervised run needs, fixed before the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory receiving `metrics_<N>.csv`, `latency_<N>.csv` and `run_<N>.json`.
    pub output_dir: PathBuf,
    /// Workload argv; the first element is the program.
    pub command: Vec<String>,
    /// Working directory the workload runs in.
    pub workdir: PathBuf,
    /// Telemetry samples per second.
    pub sample_hz: f64,
    /// Where the workload writes its latency summary, relative to `workdir`.
    pub latency_artifact: PathBuf,
    pub stop_timeout_secs: f64,
    pub telemetry: TelemetryPaths,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("runs"),
            command: Vec::new(),
            workdir: PathBuf::from("."),
            sample_hz: DEFAULT_SAMPLE_HZ,
            latency_artifact: PathBuf::from(DEFAULT_LATENCY_ARTIFACT),
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
            telemetry: TelemetryPaths::default(),
        }
    }
}

impl HarnessConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load_from_path(path: &Path) -> io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str::<Self>(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to parse harness config {}: {e}", path.display()),
            )
        })
    }

    pub fn validate(&self) -> io::Result<()> {
        let invalid = |msg: String| Err(io::Error::new(io::ErrorKind::InvalidInput, msg));
        if self.command.first().is_none_or(|p| p.trim().is_empty()) {
            return invalid("no benchmark command configured".to_string());
        }
        self.sampler_config().interval()?;
        if !(self.stop_timeout_secs.is_finite() && self.stop_timeout_secs >= 0.0) {
            return invalid(format!(
                "stop_timeout_secs must be non-negative, got {}",
                self.stop_timeout_secs
            ));
        }
        Ok(())
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.stop_timeout_secs.max(0.0))
    }

    /// Absolute-or-workdir-relative location of the latency artifact.
    pub fn latency_source(&self) -> PathBuf {
        self.workdir.join(&self.latency_artifact)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            sample_hz: self.sample_hz,
            paths: self.telemetry.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = HarnessConfig::default();
        assert_eq!(c.sample_hz, 1.0);
        assert_eq!(c.output_dir, PathBuf::from("runs"));
        assert_eq!(c.stop_timeout(), Duration::from_secs(2));
        assert_eq!(c.latency_source(), PathBuf::from("./latency.csv"));
        assert!(c.validate().is_err(), "empty command must not validate");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("harness.json");
        std::fs::write(
            &path,
            r#"{ "command": ["python", "bench.py"], "sample_hz": 4.0,
                 "telemetry": { "proc_root": "/tmp/proc" } }"#,
        )
        .unwrap();

        let c = HarnessConfig::load_from_path(&path).unwrap();
        assert_eq!(c.command, vec!["python", "bench.py"]);
        assert_eq!(c.sample_hz, 4.0);
        assert_eq!(c.workdir, PathBuf::from("."));
        assert_eq!(c.telemetry.proc_root, PathBuf::from("/tmp/proc"));
        assert_eq!(
            c.telemetry.powercap_root,
            PathBuf::from("/sys/class/powercap")
        );
        assert!(c.validate().is_ok());
        assert_eq!(
            c.sampler_config().interval().unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn bad_json_names_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = HarnessConfig::load_from_path(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn rejects_bad_rates_and_timeouts() {
        let base = HarnessConfig {
            command: vec!["true".to_string()],
            ..Default::default()
        };
        assert!(base.validate().is_ok());

        for hz in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-20, f64::MIN_POSITIVE / 4.0] {
            let c = HarnessConfig {
                sample_hz: hz,
                ..base.clone()
            };
            assert!(c.validate().is_err(), "hz={hz}");
        }
        let c = HarnessConfig {
            stop_timeout_secs: -0.5,
            ..base.clone()
        };
        assert!(c.validate().is_err());
        let c = HarnessConfig {
            command: vec!["  ".to_string()],
            ..base
        };
        assert!(c.validate().is_err());
    }
}
