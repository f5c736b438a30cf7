//! Example: controller status, clock and run/stop
//!
//! Run with: cargo run --example plc_control -- 192.168.1.250
//!
//! WARNING: this switches the PLC between program and monitor mode.

use std::net::IpAddr;

use omron_fins_client::{Client, ClientConfig, ErrorKind, PlcMode};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let ip: IpAddr = std::env::args()
        .nth(1)
        .as_deref()
        .unwrap_or("192.168.1.250")
        .parse()?;
    let client = Client::new(ClientConfig::new(ip, 1, 0))?;

    let info = client.controller_data()?;
    println!("Model:   {}", info.model);
    println!("Version: {}", info.version);
    if let Some(area) = info.area_data {
        println!("DM words: {}, EM banks: {}", area.dm_words, area.em_banks);
    }

    let status = client.status()?;
    println!("Run state: {:?}, mode: {:?}", status.run_state, status.mode);
    if status.has_fatal_error() || status.has_non_fatal_error() {
        println!(
            "Errors: fatal=0x{:04X} non-fatal=0x{:04X} code=0x{:04X} {}",
            status.fatal_errors, status.non_fatal_errors, status.error_code, status.error_message
        );
    }

    let clock = client.read_clock()?;
    println!("PLC clock: {} (day of week {})", clock, clock.day_of_week);

    client.stop()?;
    println!("Stopped: {:?}", client.status()?.mode);

    match client.run(PlcMode::Monitor) {
        Ok(()) => println!("Running in monitor mode"),
        Err(e) if e.kind() == ErrorKind::Protocol => {
            println!("PLC refused to start: {}", e);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
