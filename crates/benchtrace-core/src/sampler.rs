//! Background telemetry sampler.
//!
//! A [`Sampler`] polls the telemetry readers at a fixed rate on its own
//! thread and appends one row per cycle to a metrics CSV:
//!
//! ```text
//! t_sec,cpu_pct,psi_cpu_avg10,psi_mem_avg10,psi_io_avg10,energy_j_rel
//! 0.000,0.00,1.250,0.000,0.310,0.000000
//! 1.001,37.52,1.300,0.000,0.290,14.221004
//! ```
//!
//! Unavailable readings are written as empty fields. A reader failure only
//! blanks its own field for that row; a write failure ends the sampler and
//! is reported when it is joined.
//!
//! Lifecycle: `Idle` ([`Sampler`]) → `Running` ([`SamplerHandle`]) →
//! `Stopped` (thread exited, artifact flushed). The stop signal is the only
//! state shared with the caller.

use std::fmt::{self, Write as _};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::telemetry::{
    CpuTracker, EnergyAccumulator, PressureKind, Readings, TelemetryPaths, read_pressure_avg10,
};

/// Metrics artifact header.
pub const METRICS_HEADER: &str = "t_sec,cpu_pct,psi_cpu_avg10,psi_mem_avg10,psi_io_avg10,energy_j_rel";

/// Default sampling rate in samples per second.
pub const DEFAULT_SAMPLE_HZ: f64 = 1.0;

/// Granularity at which a sleeping sampler notices the stop signal.
const STOP_POLL: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One metrics row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub elapsed_secs: f64,
    pub readings: Readings,
}

fn push_field(out: &mut String, value: Option<f64>, decimals: usize) {
    out.push(',');
    if let Some(v) = value.filter(|v| v.is_finite()) {
        let _ = write!(out, "{v:.decimals$}");
    }
}

impl TelemetrySample {
    /// Render as a CSV row (no trailing newline).
    pub fn to_csv_row(&self) -> String {
        let r = &self.readings;
        let mut row = format!("{:.3}", self.elapsed_secs);
        push_field(&mut row, r.cpu_pct, 2);
        push_field(&mut row, r.psi_cpu_avg10, 3);
        push_field(&mut row, r.psi_mem_avg10, 3);
        push_field(&mut row, r.psi_io_avg10, 3);
        push_field(&mut row, r.energy_j_rel, 6);
        row
    }
}

/// Destination of metrics rows.
pub trait MetricsSink: Write {
    /// Make everything written so far durable. Called once, on a clean stop.
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl MetricsSink for BufWriter<File> {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_ref().sync_all()
    }
}

/// Append-only writer for a metrics artifact.
///
/// Each row reaches the sink in a single `write_all`, so a failed append
/// never leaves a partial line behind an earlier complete one.
pub struct MetricsWriter<W: MetricsSink = BufWriter<File>> {
    path: PathBuf,
    out: W,
    rows: u64,
}

impl MetricsWriter {
    /// Create `path` and write the header. Refuses to replace an existing
    /// artifact.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        Self::with_sink(path, BufWriter::new(file))
    }
}

impl<W: MetricsSink> MetricsWriter<W> {
    /// Write the header to `out`. `path` names the artifact in log lines.
    pub fn with_sink(path: impl Into<PathBuf>, mut out: W) -> io::Result<Self> {
        out.write_all(format!("{METRICS_HEADER}\n").as_bytes())?;
        out.flush()?;
        Ok(Self {
            path: path.into(),
            out,
            rows: 0,
        })
    }

    /// Append one row and flush it.
    pub fn append(&mut self, sample: &TelemetrySample) -> io::Result<()> {
        let mut line = sample.to_csv_row();
        line.push('\n');
        self.out.write_all(line.as_bytes())?;
        self.out.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and sync, returning the row count.
    pub fn finish(mut self) -> io::Result<u64> {
        self.out.sync()?;
        Ok(self.rows)
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Sampler settings.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub sample_hz: f64,
    pub paths: TelemetryPaths,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_hz: DEFAULT_SAMPLE_HZ,
            paths: TelemetryPaths::default(),
        }
    }
}

impl SamplerConfig {
    /// Time between cycles. Rejects rates that are not positive or whose
    /// period does not fit in a [`Duration`].
    pub fn interval(&self) -> io::Result<Duration> {
        let hz = self.sample_hz;
        if !(hz.is_finite() && hz > 0.0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("sample rate must be positive, got {hz}"),
            ));
        }
        Duration::try_from_secs_f64(1.0 / hz).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("sample rate {hz} Hz has no representable interval: {e}"),
            )
        })
    }
}

/// Observable sampler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Running,
    Stopped,
}

/// How a sampler ended, as seen by whoever joined it.
#[derive(Debug)]
pub enum SamplerExit {
    /// Observed the stop signal and flushed `rows` data rows.
    Stopped { rows: u64 },
    /// Ended early on an artifact write error after `rows` rows.
    Failed { rows: u64, error: io::Error },
    /// Did not stop within the join timeout; the thread is left detached.
    TimedOut,
}

impl SamplerExit {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }

    pub fn rows(&self) -> Option<u64> {
        match self {
            Self::Stopped { rows } | Self::Failed { rows, .. } => Some(*rows),
            Self::TimedOut => None,
        }
    }
}

impl fmt::Display for SamplerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped { rows } => write!(f, "stopped after {rows} rows"),
            Self::Failed { rows, error } => {
                write!(f, "failed after {rows} rows: {error}")
            }
            Self::TimedOut => write!(f, "did not stop before the join timeout"),
        }
    }
}

/// An idle sampler bound to a metrics path.
#[derive(Debug, Clone)]
pub struct Sampler {
    config: SamplerConfig,
    metrics_path: PathBuf,
}

impl Sampler {
    pub fn new(config: SamplerConfig, metrics_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            metrics_path: metrics_path.into(),
        }
    }

    /// Create the artifact, write its header and launch the polling thread.
    ///
    /// Errors here (existing artifact, unwritable directory, thread spawn
    /// failure) happen before any row is sampled.
    pub fn start(self) -> io::Result<SamplerHandle> {
        let interval = self.config.interval()?;
        let writer = MetricsWriter::create(&self.metrics_path)?;
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();

        let thread_stop = Arc::clone(&stop);
        let sample_hz = self.config.sample_hz;
        let paths = self.config.paths;
        let thread = std::thread::Builder::new()
            .name("benchtrace-sampler".to_string())
            .spawn(move || {
                let exit = sample_loop(&paths, interval, writer, &thread_stop);
                let _ = done_tx.send(exit);
            })?;

        log::info!(
            "sampler running at {sample_hz} Hz -> {}",
            self.metrics_path.display()
        );
        Ok(SamplerHandle {
            stop,
            done: done_rx,
            thread: Some(thread),
            metrics_path: self.metrics_path,
            finished: None,
        })
    }
}

/// Sleep for `interval` unless stopped first. Returns true if stopped.
///
/// An interval too long for the monotonic clock waits for the stop signal.
fn sleep_or_stop(interval: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now().checked_add(interval);
    loop {
        if stop.load(Ordering::SeqCst) {
            return true;
        }
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => STOP_POLL,
        };
        if remaining.is_zero() {
            return stop.load(Ordering::SeqCst);
        }
        std::thread::sleep(remaining.min(STOP_POLL));
    }
}

fn sample_loop<W: MetricsSink>(
    paths: &TelemetryPaths,
    interval: Duration,
    mut writer: MetricsWriter<W>,
    stop: &AtomicBool,
) -> SamplerExit {
    let t0 = Instant::now();
    let energy = EnergyAccumulator::start(paths);
    let tracker = CpuTracker;
    let mut prev_cpu = None;

    loop {
        let elapsed_secs = t0.elapsed().as_secs_f64();
        let (cpu_pct, next_cpu) = tracker.sample(paths, prev_cpu);
        prev_cpu = next_cpu;
        let sample = TelemetrySample {
            elapsed_secs,
            readings: Readings {
                cpu_pct,
                psi_cpu_avg10: read_pressure_avg10(paths, PressureKind::Cpu),
                psi_mem_avg10: read_pressure_avg10(paths, PressureKind::Memory),
                psi_io_avg10: read_pressure_avg10(paths, PressureKind::Io),
                energy_j_rel: energy.sample(paths),
            },
        };

        if let Err(error) = writer.append(&sample) {
            let rows = writer.rows();
            log::error!("sampler write to {} failed: {error}", writer.path().display());
            return SamplerExit::Failed { rows, error };
        }

        if sleep_or_stop(interval, stop) {
            break;
        }
    }

    let rows = writer.rows();
    match writer.finish() {
        Ok(rows) => {
            log::info!("sampler stopped after {rows} rows");
            SamplerExit::Stopped { rows }
        }
        Err(error) => SamplerExit::Failed { rows, error },
    }
}

/// A running sampler. Dropping it without [`SamplerHandle::stop_and_join`]
/// signals the thread to stop but does not wait for it.
pub struct SamplerHandle {
    stop: Arc<AtomicBool>,
    done: Receiver<SamplerExit>,
    thread: Option<JoinHandle<()>>,
    metrics_path: PathBuf,
    finished: Option<SamplerExit>,
}

impl SamplerHandle {
    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }

    /// Ask the sampler to stop at the top of its next cycle.
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// `Stopped` once the thread has reported its exit, else `Running`.
    pub fn state(&mut self) -> SamplerState {
        if self.finished.is_none()
            && let Ok(exit) = self.done.try_recv()
        {
            self.finished = Some(exit);
        }
        if self.finished.is_some() {
            SamplerState::Stopped
        } else {
            SamplerState::Running
        }
    }

    /// Signal stop and wait up to `timeout` for the thread to exit.
    pub fn stop_and_join(mut self, timeout: Duration) -> SamplerExit {
        self.signal_stop();
        let exit = match self.finished.take() {
            Some(exit) => exit,
            None => match self.done.recv_timeout(timeout) {
                Ok(exit) => exit,
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "sampler did not stop within {:.1}s; leaving it detached",
                        timeout.as_secs_f64()
                    );
                    return SamplerExit::TimedOut;
                }
                Err(RecvTimeoutError::Disconnected) => SamplerExit::Failed {
                    rows: 0,
                    error: io::Error::other("sampler thread exited without reporting"),
                },
            },
        };
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::error!("sampler thread panicked");
        }
        exit
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.signal_stop();
    }
}
