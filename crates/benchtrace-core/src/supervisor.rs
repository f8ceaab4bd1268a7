//! End-to-end orchestration of one benchmark run.
//!
//! 1. allocate a [`RunDescriptor`] in the output directory
//! 2. start the [`Sampler`] on `metrics_<N>.csv`
//! 3. spawn the workload and wait for it
//! 4. stop the sampler, waiting at most `stop_timeout`
//! 5. move the workload's latency artifact to `latency_<N>.csv`
//! 6. write `run_<N>.json` and return the [`BenchmarkOutcome`]

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{Instant, SystemTime};

use crate::config::HarnessConfig;
use crate::correlator::RunDescriptor;
use crate::error::HarnessError;
use crate::manifest::{RunManifest, SamplerRecord, detect_machine_info, format_iso8601};
use crate::sampler::{Sampler, SamplerExit};

/// What a finished run produced.
#[derive(Debug)]
pub struct BenchmarkOutcome {
    pub run_index: u64,
    /// Workload exit code; `-signal` if it was killed by a signal.
    pub exit_code: i32,
    pub metrics_path: PathBuf,
    /// `None` when the workload left no latency artifact behind, or it
    /// could not be moved.
    pub latency_path: Option<PathBuf>,
    /// Set when a latency artifact existed but could not be moved.
    pub relocation_error: Option<String>,
    pub sampler: SamplerExit,
    pub manifest_path: Option<PathBuf>,
    pub elapsed_ms: u64,
}

impl BenchmarkOutcome {
    /// Exit 0, latency artifact in place, sampler stopped cleanly.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.latency_path.is_some() && self.sampler.is_clean()
    }

    pub fn sampler_failed(&self) -> bool {
        matches!(self.sampler, SamplerExit::Failed { .. })
    }
}

/// Move `from` to `to`, copying across filesystems when a link is not
/// possible. Never replaces an existing `to`.
///
/// Once `to` holds the full contents the move counts as done; failing to
/// remove `from` afterwards is only logged.
pub fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::hard_link(from, to) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            ));
        }
        Err(e) => {
            log::debug!(
                "link {} -> {} failed ({e}); copying instead",
                from.display(),
                to.display()
            );
            copy_new(from, to)?;
        }
    }
    if let Err(e) = std::fs::remove_file(from) {
        log::warn!(
            "moved {} to {} but could not remove the original: {e}",
            from.display(),
            to.display()
        );
    }
    Ok(())
}

/// Copy into a newly created `to`. A failed copy leaves no `to` behind.
fn copy_new(from: &Path, to: &Path) -> io::Result<()> {
    let mut src = File::open(from)?;
    let mut dst = OpenOptions::new().write(true).create_new(true).open(to)?;
    let copied = io::copy(&mut src, &mut dst).and_then(|_| dst.sync_all());
    if let Err(e) = copied {
        drop(dst);
        if let Err(rm) = std::fs::remove_file(to) {
            log::warn!("could not remove partial copy {}: {rm}", to.display());
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn sampler_record(exit: &SamplerExit) -> SamplerRecord {
    let (status, error) = match exit {
        SamplerExit::Stopped { .. } => ("stopped", None),
        SamplerExit::Failed { error, .. } => ("failed", Some(error.to_string())),
        SamplerExit::TimedOut => ("timed_out", None),
    };
    SamplerRecord {
        status: status.to_string(),
        rows: exit.rows(),
        error,
    }
}

/// Runs one workload under telemetry.
pub struct Supervisor {
    config: HarnessConfig,
}

impl Supervisor {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Run the workload once.
    ///
    /// Returns `Err` only if the run could not happen: bad config, no index,
    /// sampler could not start, or the workload could not be launched or
    /// waited on. Whatever the sampler wrote before such a failure stays on
    /// disk.
    pub fn run(&self) -> Result<BenchmarkOutcome, HarnessError> {
        let config = &self.config;
        config.validate().map_err(HarnessError::Config)?;

        let run = RunDescriptor::allocate(&config.output_dir).map_err(HarnessError::Correlate)?;
        log::info!("run {} -> {}", run.run_index, config.output_dir.display());

        let started_at = SystemTime::now();
        let started = Instant::now();
        let sampler = Sampler::new(config.sampler_config(), &run.metrics_path)
            .start()
            .map_err(HarnessError::SamplerStart)?;

        let program = &config.command[0];
        log::info!(
            "starting benchmark: {} (in {})",
            config.command.join(" "),
            config.workdir.display()
        );
        let status = Command::new(program)
            .args(&config.command[1..])
            .current_dir(&config.workdir)
            .spawn()
            .map_err(|source| HarnessError::Launch {
                program: program.clone(),
                source,
            })
            .and_then(|mut child| child.wait().map_err(HarnessError::Wait));

        // The sampler is stopped on every path, including launch failure.
        let sampler_exit = sampler.stop_and_join(config.stop_timeout());
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                log::error!("{e}; partial metrics kept at {}", run.metrics_path.display());
                return Err(e);
            }
        };

        let exit_code = exit_code_of(status);
        if exit_code == 0 {
            log::info!("benchmark exited successfully");
        } else {
            log::warn!("benchmark exited with code {exit_code}");
        }
        if !sampler_exit.is_clean() {
            log::warn!("sampler {sampler_exit}");
        }

        let (latency_path, relocation_error) = self.collect_latency(&run);

        let mut outcome = BenchmarkOutcome {
            run_index: run.run_index,
            exit_code,
            metrics_path: run.metrics_path.clone(),
            latency_path,
            relocation_error,
            sampler: sampler_exit,
            manifest_path: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        let manifest = self.manifest(&outcome, started_at);
        match manifest.write(&run.manifest_path) {
            Ok(()) => outcome.manifest_path = Some(run.manifest_path),
            Err(e) => log::warn!(
                "could not write run manifest {}: {e}",
                run.manifest_path.display()
            ),
        }

        Ok(outcome)
    }

    fn collect_latency(&self, run: &RunDescriptor) -> (Option<PathBuf>, Option<String>) {
        let source = self.config.latency_source();
        if !source.is_file() {
            log::warn!(
                "benchmark produced no latency artifact at {}",
                source.display()
            );
            return (None, None);
        }
        match relocate(&source, &run.latency_path) {
            Ok(()) => (Some(run.latency_path.clone()), None),
            Err(e) => {
                log::error!(
                    "could not move {} to {}: {e}",
                    source.display(),
                    run.latency_path.display()
                );
                (None, Some(e.to_string()))
            }
        }
    }

    fn manifest(&self, outcome: &BenchmarkOutcome, started_at: SystemTime) -> RunManifest {
        let config = &self.config;
        RunManifest {
            version: RunManifest::VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            run_index: outcome.run_index,
            started_at: format_iso8601(started_at),
            ended_at: format_iso8601(SystemTime::now()),
            duration_ms: outcome.elapsed_ms,
            command: config.command.clone(),
            workdir: config.workdir.clone(),
            sample_hz: config.sample_hz,
            exit_code: outcome.exit_code,
            metrics_path: outcome.metrics_path.clone(),
            latency_path: outcome.latency_path.clone(),
            relocation_error: outcome.relocation_error.clone(),
            sampler: sampler_record(&outcome.sampler),
            machine: detect_machine_info(),
            benchtrace_version: crate::VERSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocate_moves_file() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("latency.csv");
        let to = tmp.path().join("latency_1.csv");
        std::fs::write(&from, "batch,mean_ms,p95_ms,runs\n").unwrap();
        relocate(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(
            std::fs::read_to_string(&to).unwrap(),
            "batch,mean_ms,p95_ms,runs\n"
        );
    }

    #[test]
    fn relocate_never_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("latency.csv");
        let to = tmp.path().join("latency_1.csv");
        std::fs::write(&from, "new").unwrap();
        std::fs::write(&to, "old").unwrap();
        let err = relocate(&from, &to).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "old");
        assert!(from.exists());
    }

    #[test]
    fn relocate_missing_source_is_error_and_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let to = tmp.path().join("dst");
        assert!(relocate(&tmp.path().join("nope"), &to).is_err());
        assert!(!to.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_copy_leaves_no_partial_target() {
        let tmp = tempfile::tempdir().unwrap();
        // Opening a directory succeeds on Linux but reading it fails.
        let from = tmp.path().join("not_a_file");
        std::fs::create_dir(&from).unwrap();
        let to = tmp.path().join("latency_1.csv");
        assert!(copy_new(&from, &to).is_err());
        assert!(!to.exists());
    }

    #[test]
    fn copy_refuses_existing_target() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("latency.csv");
        let to = tmp.path().join("latency_1.csv");
        std::fs::write(&from, "new").unwrap();
        std::fs::write(&to, "old").unwrap();
        let err = copy_new(&from, &to).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "old");
    }

    #[cfg(unix)]
    #[test]
    fn relocate_succeeds_when_source_cannot_be_removed() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        std::fs::create_dir(&work).unwrap();
        let from = work.join("latency.csv");
        let to = tmp.path().join("latency_1.csv");
        std::fs::write(&from, "batch,mean_ms,p95_ms,runs\n").unwrap();
        // Read-only parent: unlinking `from` fails unless running as root.
        std::fs::set_permissions(&work, std::fs::Permissions::from_mode(0o555)).unwrap();

        let result = relocate(&from, &to);
        std::fs::set_permissions(&work, std::fs::Permissions::from_mode(0o755)).unwrap();

        result.unwrap();
        assert_eq!(
            std::fs::read_to_string(&to).unwrap(),
            "batch,mean_ms,p95_ms,runs\n"
        );
    }

    #[test]
    fn sampler_failure_marks_the_outcome() {
        let outcome = BenchmarkOutcome {
            run_index: 1,
            exit_code: 0,
            metrics_path: PathBuf::from("metrics_1.csv"),
            latency_path: Some(PathBuf::from("latency_1.csv")),
            relocation_error: None,
            sampler: SamplerExit::Failed {
                rows: 2,
                error: io::Error::other("disk full"),
            },
            manifest_path: None,
            elapsed_ms: 10,
        };
        assert!(outcome.sampler_failed());
        assert!(!outcome.is_success());

        let timed_out = BenchmarkOutcome {
            sampler: SamplerExit::TimedOut,
            ..outcome
        };
        assert!(!timed_out.sampler_failed());
        assert!(!timed_out.is_success());
    }

    #[test]
    fn empty_command_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let sup = Supervisor::new(HarnessConfig {
            output_dir: tmp.path().join("runs"),
            ..Default::default()
        });
        let err = sup.run().unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
        assert!(!tmp.path().join("runs").exists());
    }

    #[test]
    fn sampler_records_name_status() {
        let r = sampler_record(&SamplerExit::Stopped { rows: 3 });
        assert_eq!((r.status.as_str(), r.rows), ("stopped", Some(3)));
        let r = sampler_record(&SamplerExit::TimedOut);
        assert_eq!((r.status.as_str(), r.rows), ("timed_out", None));
        let r = sampler_record(&SamplerExit::Failed {
            rows: 1,
            error: io::Error::other("disk full"),
        });
        assert_eq!(r.status, "failed");
        assert_eq!(r.error.as_deref(), Some("disk full"));
    }
}
