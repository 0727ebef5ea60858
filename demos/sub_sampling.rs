// Sub-sampling example
//
// Configures a sub-sampled sweep, releases the trigger hold and reads the sweep
// back once the repetitive signal has been captured.

use clap::Parser;
use hp3458a::{Hp3458a, SessionConfig, SubSampling};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sub_sampling")]
#[command(about = "Sub-sampled capture of a repetitive signal with an HP3458A")]
struct Args {
    /// Serial port of the GPIB controller (auto-detected if omitted)
    #[arg(long)]
    port: Option<String>,

    /// Number of samples in the sweep
    #[arg(short, long, default_value_t = 2000)]
    samples: u32,

    /// Effective sampling frequency in hertz
    #[arg(short, long, default_value_t = 1e6)]
    frequency: f64,

    /// Seconds to wait for the sweep to complete
    #[arg(short, long, default_value_t = 10)]
    wait: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    #[cfg(feature = "cpu-profiling")]
    let _profiler = tracy_client::Client::start();

    let mut dmm = Hp3458a::connect(args.port.as_deref(), SessionConfig::default())?;

    dmm.configure_sub_sampling(&SubSampling::new(args.samples, args.frequency))?;
    dmm.release_trigger_hold()?;
    println!("Sweep armed, waiting {} s...", args.wait);
    std::thread::sleep(Duration::from_secs(args.wait));

    let readings = dmm
        .acquire(args.samples as usize)?
        .with_sample_period(1.0 / args.frequency);

    let min = readings.voltages.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = readings.voltages.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    println!("Captured {} samples, {:.6} V to {:.6} V", readings.len(), min, max);
    println!("Error bound is a placeholder in this mode: {:?}", readings.uncertainty);

    Ok(())
}
