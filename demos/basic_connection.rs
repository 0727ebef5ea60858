// Controller discovery and connection example
//
// Lists GPIB-USB controllers, connects to the HP3458A behind the first one and
// reports its identity and current operating mode.

use hp3458a::{Hp3458a, Hp3458aConnector, SessionConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("HP3458A Connection Example");
    println!("==========================\n");

    println!("1. Discovering GPIB controllers...");
    let adapters = Hp3458aConnector::get_available_adapters()?;

    if adapters.is_empty() {
        println!("No GPIB controller found. Please connect one and try again.");
        return Ok(());
    }

    println!("Found {} controller(s):", adapters.len());
    for (i, adapter) in adapters.iter().enumerate() {
        println!("  {}. {} at {}", i + 1, adapter.name, adapter.port);
    }
    println!();

    println!("2. Connecting to the multimeter at GPIB address 22...");
    let mut dmm = Hp3458a::connect(None, SessionConfig::default())?;
    println!("   Identity: {}", dmm.identify()?);

    println!("\n3. Uncertainty for the current mode:");
    match dmm.uncertainty() {
        Ok(bound) => println!(
            "   {:.1} ppm of reading + {:.3e} V",
            bound.relative * 1e6,
            bound.absolute
        ),
        Err(e) => println!("   Not available: {}", e),
    }

    Ok(())
}
