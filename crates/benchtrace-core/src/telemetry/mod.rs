//! Best-effort host telemetry readers.
//!
//! Every reader is stateless and works without elevated privileges where
//! possible. A metric the host does not expose is reported as `None`
//! rather than guessed, so "unavailable" stays distinct from zero.
//!
//! All OS paths hang off a [`TelemetryPaths`] value so the readers can be
//! pointed at a synthetic tree in tests.

pub mod cpu;
pub mod energy;
pub mod pressure;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use cpu::{CpuTimes, CpuTracker, read_cpu_times, utilization_pct};
pub use energy::{EnergyAccumulator, read_energy_joules};
pub use pressure::{PressureKind, read_pressure_avg10};

/// Roots of the OS interfaces the readers consult.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryPaths {
    /// procfs mount point (`/proc`): `stat` and `pressure/*` live here.
    pub proc_root: PathBuf,
    /// powercap class directory holding `intel-rapl:*` domains.
    pub powercap_root: PathBuf,
}

impl Default for TelemetryPaths {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            powercap_root: PathBuf::from("/sys/class/powercap"),
        }
    }
}

impl TelemetryPaths {
    /// Paths rooted under `root`, laid out as `root/proc` and
    /// `root/sys/class/powercap`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            proc_root: root.join("proc"),
            powercap_root: root.join("sys").join("class").join("powercap"),
        }
    }

    pub fn pressure_file(&self, kind: PressureKind) -> PathBuf {
        self.proc_root.join("pressure").join(kind.file_name())
    }

    pub fn stat_file(&self) -> PathBuf {
        self.proc_root.join("stat")
    }
}

/// One sampler row's worth of readings, each independently unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Readings {
    pub cpu_pct: Option<f64>,
    pub psi_cpu_avg10: Option<f64>,
    pub psi_mem_avg10: Option<f64>,
    pub psi_io_avg10: Option<f64>,
    pub energy_j_rel: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_point_at_host() {
        let p = TelemetryPaths::default();
        assert_eq!(p.stat_file(), PathBuf::from("/proc/stat"));
        assert_eq!(
            p.pressure_file(PressureKind::Memory),
            PathBuf::from("/proc/pressure/memory")
        );
    }

    #[test]
    fn rooted_paths_mirror_host_layout() {
        let p = TelemetryPaths::rooted_at(Path::new("/tmp/fake"));
        assert_eq!(p.stat_file(), PathBuf::from("/tmp/fake/proc/stat"));
        assert_eq!(
            p.powercap_root,
            PathBuf::from("/tmp/fake/sys/class/powercap")
        );
    }
}
