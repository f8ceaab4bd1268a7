//! Per-run manifest (`run_<N>.json`).
//!
//! Written next to the CSV artifacts once a supervised run has finished.
//! It records what was run, where, on which machine and how it ended, so a
//! `metrics_<N>.csv` / `latency_<N>.csv` pair can be interpreted later
//! without the harness's console output.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Machine info
// ---------------------------------------------------------------------------

/// Host description captured with each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub os: String,
    pub arch: String,
    pub cpu: String,
    pub cores: usize,
}

/// Describe the current host. Fields that cannot be read fall back to
/// `std::env::consts` values or `"unknown"`.
pub fn detect_machine_info() -> MachineInfo {
    let os = std::env::consts::OS;
    let pretty = read_field("/etc/os-release", "PRETTY_NAME", '=');
    MachineInfo {
        os: pretty.map_or_else(|| os.to_string(), |name| format!("{os} {name}")),
        arch: std::env::consts::ARCH.to_string(),
        cpu: read_field("/proc/cpuinfo", "model name", ':')
            .unwrap_or_else(|| "unknown".to_string()),
        cores: std::thread::available_parallelism().map_or(1, |n| n.get()),
    }
}

fn read_field(path: &str, key: &str, sep: char) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    field_value(&text, key, sep)
}

/// First `key<sep>value` line in `text`, value unquoted and trimmed.
/// Whitespace around the key is ignored, as `/proc/cpuinfo` pads it.
fn field_value(text: &str, key: &str, sep: char) -> Option<String> {
    text.lines().find_map(|line| {
        let (k, v) = line.split_once(sep)?;
        (k.trim() == key).then(|| v.trim().trim_matches('"').to_string())
    })
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Sampler result as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerRecord {
    /// `stopped`, `failed` or `timed_out`.
    pub status: String,
    pub rows: Option<u64>,
    pub error: Option<String>,
}

/// Contents of `run_<N>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub version: u32,
    pub id: String,
    pub run_index: u64,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub command: Vec<String>,
    pub workdir: PathBuf,
    pub sample_hz: f64,
    pub exit_code: i32,
    pub metrics_path: PathBuf,
    pub latency_path: Option<PathBuf>,
    pub relocation_error: Option<String>,
    pub sampler: SamplerRecord,
    pub machine: MachineInfo,
    pub benchtrace_version: String,
}

impl RunManifest {
    pub const VERSION: u32 = 1;

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("failed to parse run manifest {}: {e}", path.display()),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Format a wall-clock instant as ISO-8601 UTC, e.g. `2026-02-15T01:30:00Z`.
pub fn format_iso8601(at: SystemTime) -> String {
    let secs = at
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    let (year, month, day, hour, min, sec) = secs_to_utc(secs);
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}Z")
}

/// Seconds since the Unix epoch to (year, month, day, hour, minute, second)
/// UTC, ignoring leap seconds. Days are mapped to the proleptic Gregorian
/// calendar with a March-based year so February is the last month.
fn secs_to_utc(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let (days, rem) = (secs / 86_400, secs % 86_400);

    // Shift the epoch to 0000-03-01 and split into 400-year eras.
    let z = days + 719_468;
    let era = z / 146_097;
    let day_of_era = z % 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let mp = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = era * 400 + year_of_era + u64::from(month <= 2);

    (year, month, day, rem / 3600, (rem / 60) % 60, rem % 60)
}
