//! RAPL energy counters via the powercap sysfs class.
//!
//! Domains appear as `intel-rapl:<n>` with sub-domains nested one level
//! below (`intel-rapl:0/intel-rapl:0:0`); each exposes a cumulative
//! `energy_uj` counter in microjoules.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::TelemetryPaths;

const DOMAIN_PREFIX: &str = "intel-rapl:";
const COUNTER_FILE: &str = "energy_uj";

fn subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect()
}

/// Every `energy_uj` file under top-level domains and their direct
/// sub-domains. Symlinked aliases resolve to one canonical path.
pub fn discover_energy_counters(powercap_root: &Path) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    let domains = subdirs(powercap_root).into_iter().filter(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(DOMAIN_PREFIX))
    });
    for domain in domains {
        let mut candidates = vec![domain.join(COUNTER_FILE)];
        candidates.extend(subdirs(&domain).into_iter().map(|d| d.join(COUNTER_FILE)));
        for file in candidates.into_iter().filter(|f| f.is_file()) {
            let key = std::fs::canonicalize(&file).unwrap_or(file);
            found.insert(key);
        }
    }
    found.into_iter().collect()
}

fn read_counter_uj(path: &Path) -> Option<u64> {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|raw| raw.trim().parse::<u64>().map_err(|e| e.to_string()));
    match parsed {
        Ok(uj) => Some(uj),
        Err(e) => {
            log::debug!("skipping energy counter {}: {e}", path.display());
            None
        }
    }
}

/// Sum of all readable energy counters, in joules.
///
/// `None` when the host exposes no counters or none could be read, which
/// keeps "no RAPL support" apart from a genuine zero.
pub fn read_energy_joules(paths: &TelemetryPaths) -> Option<f64> {
    let readings: Vec<u64> = discover_energy_counters(&paths.powercap_root)
        .iter()
        .filter_map(|p| read_counter_uj(p))
        .collect();
    if readings.is_empty() {
        return None;
    }
    let total_uj: u128 = readings.iter().map(|&v| u128::from(v)).sum();
    Some(total_uj as f64 / 1e6)
}

/// Energy consumed since a baseline captured at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyAccumulator {
    baseline: Option<f64>,
}

impl EnergyAccumulator {
    /// Capture the baseline from the host counters.
    pub fn start(paths: &TelemetryPaths) -> Self {
        let baseline = read_energy_joules(paths);
        if baseline.is_none() {
            log::info!(
                "no readable RAPL counters under {}; energy column will be empty",
                paths.powercap_root.display()
            );
        }
        Self::with_baseline(baseline)
    }

    pub fn with_baseline(baseline: Option<f64>) -> Self {
        Self { baseline }
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    /// `current - baseline`, unavailable if either side is.
    pub fn relative(&self, current: Option<f64>) -> Option<f64> {
        Some(current? - self.baseline?)
    }

    /// Read the counters now and return the relative value.
    pub fn sample(&self, paths: &TelemetryPaths) -> Option<f64> {
        self.relative(read_energy_joules(paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn powercap(root: &Path) -> TelemetryPaths {
        let paths = TelemetryPaths::rooted_at(root);
        std::fs::create_dir_all(&paths.powercap_root).unwrap();
        paths
    }

    fn write_counter(dir: &Path, uj: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(COUNTER_FILE), uj).unwrap();
    }

    #[test]
    fn sums_domains_and_subdomains() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = powercap(tmp.path());
        let pkg0 = paths.powercap_root.join("intel-rapl:0");
        write_counter(&pkg0, "1000000\n");
        write_counter(&pkg0.join("intel-rapl:0:0"), "500000\n");
        write_counter(&paths.powercap_root.join("intel-rapl:1"), "2500000\n");
        // not a RAPL domain
        write_counter(&paths.powercap_root.join("dtpm:0"), "9999999\n");

        assert_eq!(discover_energy_counters(&paths.powercap_root).len(), 3);
        let j = read_energy_joules(&paths).unwrap();
        assert!((j - 4.0).abs() < 1e-9);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_alias_counted_once() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = powercap(tmp.path());
        let sub = paths.powercap_root.join("intel-rapl:0").join("intel-rapl:0:0");
        write_counter(&paths.powercap_root.join("intel-rapl:0"), "1000000");
        write_counter(&sub, "1000000");
        std::os::unix::fs::symlink(&sub, paths.powercap_root.join("intel-rapl:0:0")).unwrap();

        let j = read_energy_joules(&paths).unwrap();
        assert!((j - 2.0).abs() < 1e-9);
    }

    #[test]
    fn no_counters_is_unavailable_not_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = powercap(tmp.path());
        assert_eq!(read_energy_joules(&paths), None);

        let missing = TelemetryPaths::rooted_at(&tmp.path().join("nope"));
        assert_eq!(read_energy_joules(&missing), None);
    }

    #[test]
    fn unreadable_counters_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = powercap(tmp.path());
        write_counter(&paths.powercap_root.join("intel-rapl:0"), "garbage");
        assert_eq!(read_energy_joules(&paths), None);

        write_counter(&paths.powercap_root.join("intel-rapl:1"), "3000000");
        assert_eq!(read_energy_joules(&paths), Some(3.0));
    }

    #[test]
    fn zero_counter_is_a_real_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = powercap(tmp.path());
        write_counter(&paths.powercap_root.join("intel-rapl:0"), "0");
        assert_eq!(read_energy_joules(&paths), Some(0.0));
    }

    #[test]
    fn relative_energy_against_baseline() {
        let acc = EnergyAccumulator::with_baseline(Some(10.0));
        let rel = acc.relative(Some(12.5)).unwrap();
        assert!(rel >= 0.0);
        assert!((rel - 2.5).abs() < 1e-9);
        assert_eq!(acc.relative(None), None);
        assert_eq!(EnergyAccumulator::with_baseline(None).relative(Some(5.0)), None);
    }

    #[test]
    fn accumulator_tracks_counter_growth() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = powercap(tmp.path());
        let pkg = paths.powercap_root.join("intel-rapl:0");
        write_counter(&pkg, "1000000");
        let acc = EnergyAccumulator::start(&paths);
        assert_eq!(acc.baseline(), Some(1.0));

        write_counter(&pkg, "1750000");
        let rel = acc.sample(&paths).unwrap();
        assert!((rel - 0.75).abs() < 1e-9);
    }

    #[test]
    fn accumulator_without_counters_stays_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = powercap(tmp.path());
        let acc = EnergyAccumulator::start(&paths);
        assert_eq!(acc.baseline(), None);
        assert_eq!(acc.sample(&paths), None);
    }
}
