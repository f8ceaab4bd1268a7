//! Pressure stall information (`/proc/pressure/{cpu,memory,io}`).
//!
//! Each file looks like:
//!
//! ```text
//! some avg10=0.00 avg60=0.00 avg300=0.00 total=0
//! full avg10=0.00 avg60=0.00 avg300=0.00 total=0
//! ```
//!
//! Only the `some` line's `avg10` is sampled.

use std::fmt;

use super::TelemetryPaths;

/// Resource class with a PSI file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressureKind {
    Cpu,
    Memory,
    Io,
}

impl PressureKind {
    pub const ALL: [PressureKind; 3] = [Self::Cpu, Self::Memory, Self::Io];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for PressureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Read the `some avg10` value for `kind`, or `None` when the file is
/// missing, has no `some` line, or the value does not parse.
pub fn read_pressure_avg10(paths: &TelemetryPaths, kind: PressureKind) -> Option<f64> {
    let path = paths.pressure_file(kind);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            log::debug!("psi {kind} unavailable ({}): {e}", path.display());
            return None;
        }
    };
    let value = parse_some_avg10(&raw);
    if value.is_none() {
        log::debug!("psi {kind}: no parsable `some avg10` in {}", path.display());
    }
    value
}

/// Extract `avg10` from the `some` line of a PSI file body.
pub fn parse_some_avg10(raw: &str) -> Option<f64> {
    let line = raw.lines().find(|l| l.split_whitespace().next() == Some("some"))?;
    line.split_whitespace()
        .skip(1)
        .filter_map(|item| item.split_once('='))
        .find(|(k, _)| *k == "avg10")
        .and_then(|(_, v)| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
