//! Aggregate CPU utilization from `/proc/stat`.

use std::io;

use super::TelemetryPaths;

/// Cumulative CPU time counters from the aggregate `cpu` line, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub total_ticks: u64,
    pub idle_ticks: u64,
}

impl CpuTimes {
    /// Parse the aggregate `cpu  user nice system idle iowait irq softirq ...`
    /// line. Fields past `softirq` (steal, guest, ...) are ignored.
    pub fn parse_line(line: &str) -> io::Result<Self> {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some(label) if label.starts_with("cpu") => {}
            _ => return Err(invalid(format!("not a cpu line: {line:?}"))),
        }

        let mut fields = [0u64; 7];
        for (i, slot) in fields.iter_mut().enumerate() {
            let token = parts
                .next()
                .ok_or_else(|| invalid(format!("cpu line has {i} counters, need 7")))?;
            *slot = token
                .parse()
                .map_err(|e| invalid(format!("bad cpu counter {token:?}: {e}")))?;
        }
        let [user, nice, system, idle, iowait, irq, softirq] = fields;

        let idle_ticks = idle.saturating_add(iowait);
        let total_ticks = [user, nice, system, irq, softirq]
            .into_iter()
            .fold(idle_ticks, u64::saturating_add);
        Ok(Self {
            total_ticks,
            idle_ticks,
        })
    }
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Read the first line of the stat file. Fails on a missing file or a
/// structurally malformed line; callers treat that as an unavailable sample.
pub fn read_cpu_times(paths: &TelemetryPaths) -> io::Result<CpuTimes> {
    let raw = std::fs::read_to_string(paths.stat_file())?;
    let first = raw
        .lines()
        .next()
        .ok_or_else(|| invalid("empty stat file".to_string()))?;
    CpuTimes::parse_line(first)
}

/// Busy percentage between two snapshots: `100 * (1 - Δidle / Δtotal)`.
///
/// `Δtotal` is floored at 1 and the result is clamped to `[0, 100]`, so
/// counter resets or inconsistent pairs never produce out-of-range values.
pub fn utilization_pct(prev: CpuTimes, cur: CpuTimes) -> f64 {
    let d_total = cur.total_ticks.saturating_sub(prev.total_ticks).max(1);
    let d_idle = cur.idle_ticks.saturating_sub(prev.idle_ticks);
    let pct = 100.0 * (1.0 - d_idle as f64 / d_total as f64);
    pct.clamp(0.0, 100.0)
}

/// Derives utilization from consecutive snapshots.
///
/// The previous snapshot is threaded through explicitly: each call takes
/// what the last call returned and hands back the snapshot to use next time.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuTracker;

impl CpuTracker {
    /// Take a fresh snapshot and compare it with `prev`.
    ///
    /// With no previous snapshot the change is zero, so the result is `0.0`.
    /// A failed read yields `(None, None)` and the next call starts over.
    pub fn sample(
        &self,
        paths: &TelemetryPaths,
        prev: Option<CpuTimes>,
    ) -> (Option<f64>, Option<CpuTimes>) {
        match read_cpu_times(paths) {
            Ok(cur) => (Some(self.step(prev, cur)), Some(cur)),
            Err(e) => {
                log::debug!("cpu utilization unavailable: {e}");
                (None, None)
            }
        }
    }

    /// Pure half of [`CpuTracker::sample`], usable with synthetic snapshots.
    pub fn step(&self, prev: Option<CpuTimes>, cur: CpuTimes) -> f64 {
        match prev {
            Some(prev) => utilization_pct(prev, cur),
            None => 0.0,
        }
    }
}
