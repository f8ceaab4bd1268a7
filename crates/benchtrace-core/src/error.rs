//! Harness-level failures.
//!
//! Only conditions that prevent a run from happening at all are errors.
//! Problems during a run that did happen (nonzero exit, missing latency
//! output, a sampler that failed or would not stop) are reported in the
//! [`BenchmarkOutcome`](crate::supervisor::BenchmarkOutcome) instead.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("invalid harness configuration: {0}")]
    Config(#[source] io::Error),

    #[error("failed to allocate a run index: {0}")]
    Correlate(#[source] io::Error),

    #[error("failed to start the telemetry sampler: {0}")]
    SamplerStart(#[source] io::Error),

    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting for the benchmark process: {0}")]
    Wait(#[source] io::Error),
}

impl HarnessError {
    /// True for failures to even start the workload process.
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::Launch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn launch_error_names_program_and_keeps_source() {
        let err = HarnessError::Launch {
            program: "missing-bench".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file"),
        };
        assert!(err.is_launch_failure());
        assert!(err.to_string().contains("missing-bench"));
        assert!(err.source().is_some());
    }
}
