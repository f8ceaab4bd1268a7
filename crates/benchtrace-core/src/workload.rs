//! Built-in synthetic batch-latency workload.
//!
//! Any executable can be supervised. This one is here so the harness can
//! be exercised without an external model runtime. It follows the same
//! contract: build the "model" once; for each batch size run untimed
//! warmup passes, then timed passes; write
//! `batch,mean_ms,p95_ms,runs` to the latency artifact.
//!
//! The model is a single dense layer with ReLU over random inputs. It is
//! sized so one pass costs a measurable fraction of a millisecond.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Latency artifact header.
pub const LATENCY_HEADER: &str = "batch,mean_ms,p95_ms,runs";

/// Sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchBenchConfig {
    pub batches: Vec<usize>,
    pub warmup: usize,
    pub runs: usize,
    /// Input width per sample.
    pub features: usize,
    /// Output width per sample.
    pub classes: usize,
    pub seed: u64,
}

impl Default for BatchBenchConfig {
    fn default() -> Self {
        Self {
            batches: vec![1, 2, 4, 8, 16],
            warmup: 5,
            runs: 50,
            features: 3 * 32 * 32,
            classes: 100,
            seed: 0x5eed,
        }
    }
}

impl BatchBenchConfig {
    /// Reject sweeps the synthetic model cannot run.
    pub fn validate(&self) -> io::Result<()> {
        let invalid = |msg: &str| Err(io::Error::new(io::ErrorKind::InvalidInput, msg));
        if self.features == 0 || self.classes == 0 {
            return invalid("features and classes must be at least 1");
        }
        if self.runs == 0 {
            return invalid("runs must be at least 1");
        }
        if self.batches.contains(&0) {
            return invalid("batch sizes must be at least 1");
        }
        Ok(())
    }
}

/// One latency artifact row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub batch: usize,
    pub mean_ms: f64,
    pub p95_ms: f64,
    pub runs: usize,
}

impl LatencySummary {
    /// Summarise per-pass timings for one batch size.
    pub fn from_timings(batch: usize, timings_ms: &[f64]) -> Self {
        let mut sorted = timings_ms.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mean_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };
        Self {
            batch,
            mean_ms,
            p95_ms: percentile(&sorted, 95.0),
            runs: sorted.len(),
        }
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{:.4},{:.4},{}",
            self.batch, self.mean_ms, self.p95_ms, self.runs
        )
    }
}

/// Percentile of a **sorted** slice, linearly interpolated between the
/// closest ranks. Empty input yields 0.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (pct.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Dense layer standing in for an inference session.
pub struct SyntheticModel {
    features: usize,
    classes: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl SyntheticModel {
    pub fn new(features: usize, classes: usize, rng: &mut impl Rng) -> Self {
        let scale = 1.0 / (features.max(1) as f32).sqrt();
        let weights = (0..features * classes)
            .map(|_| rng.random_range(-scale..=scale))
            .collect();
        let bias = (0..classes).map(|_| rng.random_range(-0.1..=0.1)).collect();
        Self {
            features,
            classes,
            weights,
            bias,
        }
    }

    pub fn features(&self) -> usize {
        self.features
    }

    /// Forward pass over `batch` rows of `input`; returns `batch * classes`
    /// activations.
    pub fn forward(&self, input: &[f32], batch: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; batch * self.classes];
        for (row, x) in input.chunks_exact(self.features).take(batch).enumerate() {
            let y = &mut out[row * self.classes..(row + 1) * self.classes];
            for (c, slot) in y.iter_mut().enumerate() {
                let w = &self.weights[c * self.features..(c + 1) * self.features];
                let dot: f32 = w.iter().zip(x).map(|(a, b)| a * b).sum();
                *slot = (dot + self.bias[c]).max(0.0);
            }
        }
        out
    }
}

/// Time one batch size: `warmup` untimed passes, then `runs` timed ones.
pub fn bench_batch(
    model: &SyntheticModel,
    batch: usize,
    warmup: usize,
    runs: usize,
    rng: &mut impl Rng,
) -> LatencySummary {
    let input: Vec<f32> = (0..batch * model.features())
        .map(|_| rng.random_range(-1.0f32..1.0))
        .collect();
    for _ in 0..warmup {
        std::hint::black_box(model.forward(&input, batch));
    }
    let timings: Vec<f64> = (0..runs)
        .map(|_| {
            let t0 = Instant::now();
            std::hint::black_box(model.forward(&input, batch));
            t0.elapsed().as_secs_f64() * 1000.0
        })
        .collect();
    LatencySummary::from_timings(batch, &timings)
}

/// Run the whole sweep, calling `on_batch` after each batch size.
pub fn run_sweep(
    config: &BatchBenchConfig,
    mut on_batch: impl FnMut(&LatencySummary),
) -> io::Result<Vec<LatencySummary>> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let model = SyntheticModel::new(config.features, config.classes, &mut rng);
    let rows: Vec<LatencySummary> = config
        .batches
        .iter()
        .map(|&b| {
            let summary = bench_batch(&model, b, config.warmup, config.runs, &mut rng);
            on_batch(&summary);
            summary
        })
        .collect();
    Ok(rows)
}

/// Write the latency artifact.
pub fn write_latency_csv(path: &Path, rows: &[LatencySummary]) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{LATENCY_HEADER}")?;
    for row in rows {
        writeln!(out, "{}", row.to_csv_row())?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let v: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 10.0);
        assert!((percentile(&v, 50.0) - 5.5).abs() < 1e-12);
        assert!((percentile(&v, 95.0) - 9.55).abs() < 1e-12);
        assert_eq!(percentile(&[], 95.0), 0.0);
        assert_eq!(percentile(&[4.0], 95.0), 4.0);
    }

    #[test]
    fn summary_from_unsorted_timings() {
        let s = LatencySummary::from_timings(4, &[3.0, 1.0, 2.0, 4.0]);
        assert_eq!(s.batch, 4);
        assert_eq!(s.runs, 4);
        assert!((s.mean_ms - 2.5).abs() < 1e-12);
        assert!((s.p95_ms - 3.85).abs() < 1e-12);
        assert_eq!(s.to_csv_row(), "4,2.5000,3.8500,4");
    }

    #[test]
    fn forward_shape_and_relu() {
        let mut rng = StdRng::seed_from_u64(1);
        let model = SyntheticModel::new(8, 3, &mut rng);
        let input = vec![0.5f32; 2 * 8];
        let out = model.forward(&input, 2);
        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|&v| v >= 0.0));
        assert_eq!(out[0..3], out[3..6]);
    }

    #[test]
    fn degenerate_sweeps_are_rejected() {
        let base = BatchBenchConfig {
            batches: vec![1],
            warmup: 0,
            runs: 1,
            features: 4,
            classes: 2,
            ..Default::default()
        };
        assert!(base.validate().is_ok());
        let bad = [
            BatchBenchConfig {
                features: 0,
                ..base.clone()
            },
            BatchBenchConfig {
                classes: 0,
                ..base.clone()
            },
            BatchBenchConfig {
                runs: 0,
                ..base.clone()
            },
            BatchBenchConfig {
                batches: vec![2, 0],
                ..base.clone()
            },
        ];
        for config in bad {
            let mut called = false;
            let err = run_sweep(&config, |_| called = true).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{config:?}");
            assert!(!called);
        }
    }

    #[test]
    fn small_sweep_writes_artifact() {
        let config = BatchBenchConfig {
            batches: vec![1, 2],
            warmup: 1,
            runs: 3,
            features: 16,
            classes: 4,
            ..Default::default()
        };
        let mut seen = Vec::new();
        let rows = run_sweep(&config, |s| seen.push(s.batch)).unwrap();
        assert_eq!(seen, vec![1, 2]);
        assert!(rows.iter().all(|r| r.runs == 3 && r.p95_ms >= 0.0));

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("latency.csv");
        write_latency_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], LATENCY_HEADER);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1,"));
        assert!(lines[2].ends_with(",3"));
    }
}
