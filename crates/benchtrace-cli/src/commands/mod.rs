pub mod probe;
pub mod run;
pub mod sample;
pub mod workload;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Install a Ctrl+C handler that only records the interrupt.
///
/// The harness keeps running so it can stop the sampler and finish its
/// artifacts; a foreground child gets the same SIGINT from the terminal.
pub fn install_interrupt_flag() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }
    interrupted
}

/// Parse a comma-separated list of positive batch sizes.
pub fn parse_batches(s: &str) -> Result<Vec<usize>, String> {
    let batches = s
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| match t.parse::<usize>() {
            Ok(0) | Err(_) => Err(format!("invalid batch size '{t}'")),
            Ok(b) => Ok(b),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if batches.is_empty() {
        return Err("no batch sizes given".to_string());
    }
    Ok(batches)
}

/// Render an optional reading, `unavailable` when absent.
pub fn format_reading(value: Option<f64>, decimals: usize, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}{unit}"),
        None => "unavailable".to_string(),
    }
}
