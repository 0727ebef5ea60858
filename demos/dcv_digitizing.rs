// Timed DCV digitizing example
//
// Configures DCV digitizing, waits for the external trigger to fill the reading
// memory, then prints or saves the readings with their error bars.

use clap::Parser;
use hp3458a::{aperture_time_is_valid, DcvDigitizing, Hp3458a, SessionConfig};
use std::fs::File;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dcv_digitizing")]
#[command(about = "Timed DCV digitizing with an HP3458A")]
struct Args {
    /// Serial port of the GPIB controller (auto-detected if omitted)
    #[arg(long)]
    port: Option<String>,

    /// GPIB address of the multimeter
    #[arg(short, long, default_value_t = 22)]
    address: u8,

    /// Number of readings per burst
    #[arg(short, long, default_value_t = 1000)]
    samples: u32,

    /// Sampling frequency in hertz
    #[arg(short, long, default_value_t = 10e3)]
    frequency: f64,

    /// Aperture time in seconds
    #[arg(long, default_value_t = 2e-6)]
    aperture: f64,

    /// Expected maximum input in volts, selects the range
    #[arg(short, long, default_value_t = 10.0)]
    range: f64,

    /// Seconds to wait for the burst to complete
    #[arg(short, long, default_value_t = 5)]
    wait: u64,

    /// Write the readings to this CSV file instead of printing them
    #[arg(short, long)]
    output: Option<String>,

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

    if !aperture_time_is_valid(args.aperture) {
        eprintln!("Aperture must be between 500 ns and 1 s, got {} s", args.aperture);
        std::process::exit(1);
    }

    let config = SessionConfig::default().with_gpib_address(args.address);
    let mut dmm = Hp3458a::connect(args.port.as_deref(), config)?;
    println!("Connected to {}", dmm.identify()?);

    let mode = DcvDigitizing::new(args.samples, args.frequency, args.aperture)
        .with_max_input(args.range);
    println!(
        "Configuring {} readings at {} Hz ({} format)",
        args.samples,
        args.frequency,
        mode.memory_format()
    );
    dmm.configure_dcv_digitizing(&mode)?;

    println!("Waiting {} s for the external trigger...", args.wait);
    std::thread::sleep(Duration::from_secs(args.wait));

    let readings = dmm
        .acquire(args.samples as usize)?
        .with_sample_period(1.0 / args.frequency);

    match args.output {
        Some(path) => {
            readings.write_csv(File::create(&path)?)?;
            println!("Wrote {} readings to {}", readings.len(), path);
        }
        None => println!("{}", readings.to_dataframe()?),
    }

    Ok(())
}
