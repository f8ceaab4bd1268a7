//! `benchtrace sample`: telemetry without a workload.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use benchtrace_core::{RunDescriptor, Sampler, SamplerConfig, SamplerExit};

const STOP_TIMEOUT: Duration = Duration::from_secs(2);

pub fn run(output: &str, hz: f64, duration: Option<f64>) {
    let max_duration = match duration {
        Some(secs) if !(secs.is_finite() && secs > 0.0) => {
            eprintln!("Error: --duration must be a positive number of seconds");
            std::process::exit(2);
        }
        Some(secs) => Some(Duration::from_secs_f64(secs)),
        None => None,
    };

    let run = match RunDescriptor::allocate(Path::new(output)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error preparing {output}: {e}");
            std::process::exit(1);
        }
    };

    let interrupted = super::install_interrupt_flag();
    let config = SamplerConfig {
        sample_hz: hz,
        ..Default::default()
    };
    let handle = match Sampler::new(config, &run.metrics_path).start() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error starting sampler: {e}");
            std::process::exit(1);
        }
    };

    println!("Sampling telemetry");
    println!("  Rate:      {hz} Hz");
    match max_duration {
        Some(d) => println!("  Duration:  {:.1}s", d.as_secs_f64()),
        None => println!("  Duration:  until Ctrl+C"),
    }
    println!("  Output:    {}", run.metrics_path.display());

    let start = Instant::now();
    while !interrupted.load(Ordering::SeqCst) {
        if max_duration.is_some_and(|max| start.elapsed() >= max) {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    match handle.stop_and_join(STOP_TIMEOUT) {
        SamplerExit::Stopped { rows } => {
            println!();
            println!("Wrote {rows} rows to {}", run.metrics_path.display());
        }
        other => {
            eprintln!("Sampler {other}");
            std::process::exit(1);
        }
    }
}
