//! Run indexing and artifact naming.
//!
//! An output directory accumulates one artifact set per run:
//! - `metrics_<N>.csv`: sampled telemetry
//! - `latency_<N>.csv`: the workload's own latency summary
//! - `run_<N>.json`: run manifest
//!
//! `N` is taken from the `metrics_` names only, so a run that never
//! produced latency output still reserves its index.

use std::io;
use std::path::{Path, PathBuf};

const METRICS_PREFIX: &str = "metrics_";
const LATENCY_PREFIX: &str = "latency_";
const MANIFEST_PREFIX: &str = "run_";

/// Output paths for one run. Computed once and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDescriptor {
    pub run_index: u64,
    pub metrics_path: PathBuf,
    pub latency_path: PathBuf,
    pub manifest_path: PathBuf,
}

impl RunDescriptor {
    /// Paths for run `run_index` inside `output_dir`.
    pub fn for_index(output_dir: &Path, run_index: u64) -> Self {
        Self {
            run_index,
            metrics_path: output_dir.join(format!("{METRICS_PREFIX}{run_index}.csv")),
            latency_path: output_dir.join(format!("{LATENCY_PREFIX}{run_index}.csv")),
            manifest_path: output_dir.join(format!("{MANIFEST_PREFIX}{run_index}.json")),
        }
    }

    /// Create `output_dir` if needed and allocate the next unused index.
    pub fn allocate(output_dir: &Path) -> io::Result<Self> {
        let run_index = next_run_index(output_dir)?;
        Ok(Self::for_index(output_dir, run_index))
    }
}

/// Index encoded in a `metrics_<N>.csv` file name.
pub fn parse_metrics_index(file_name: &str) -> Option<u64> {
    let digits = file_name
        .strip_prefix(METRICS_PREFIX)?
        .strip_suffix(".csv")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// One past the largest metrics index in `output_dir`, or 1 if there is
/// none. Creates the directory when absent. Unrelated or unparsable names
/// are ignored.
pub fn next_run_index(output_dir: &Path) -> io::Result<u64> {
    std::fs::create_dir_all(output_dir)?;
    let mut max_seen = 0u64;
    for entry in std::fs::read_dir(output_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(n) = parse_metrics_index(name) {
            max_seen = max_seen.max(n);
        }
    }
    max_seen.checked_add(1).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("run index space exhausted in {}", output_dir.display()),
        )
    })
}
