//! `benchtrace probe`: one reading from every telemetry source.

use std::path::Path;
use std::time::Duration;

use benchtrace_core::telemetry::energy::discover_energy_counters;
use benchtrace_core::{
    CpuTracker, PressureKind, TelemetryPaths, detect_machine_info, next_run_index,
    read_energy_joules, read_pressure_avg10,
};

use super::format_reading;

/// Window between the two CPU snapshots.
const CPU_WINDOW: Duration = Duration::from_millis(250);

pub fn run(output: &str) {
    let paths = TelemetryPaths::default();
    let machine = detect_machine_info();
    println!("Host: {} {} ({}, {} cores)", machine.os, machine.arch, machine.cpu, machine.cores);
    println!();

    let tracker = CpuTracker;
    let (_, first) = tracker.sample(&paths, None);
    std::thread::sleep(CPU_WINDOW);
    let (cpu_pct, _) = match first {
        Some(prev) => tracker.sample(&paths, Some(prev)),
        None => (None, None),
    };
    println!("  {:<14} {}", "cpu_pct", format_reading(cpu_pct, 2, "%"));

    for kind in PressureKind::ALL {
        let label = format!("psi_{kind}_avg10");
        let value = read_pressure_avg10(&paths, kind);
        println!("  {label:<14} {}", format_reading(value, 3, "%"));
    }

    let counters = discover_energy_counters(&paths.powercap_root);
    println!(
        "  {:<14} {} ({} counter file(s))",
        "energy_total",
        format_reading(read_energy_joules(&paths), 6, " J"),
        counters.len()
    );

    println!();
    match next_run_index(Path::new(output)) {
        Ok(n) => println!("Next run index in {output}: {n}"),
        Err(e) => {
            eprintln!("Error reading {output}: {e}");
            std::process::exit(1);
        }
    }
}
