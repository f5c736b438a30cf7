//! Example: reading and writing PLC memory
//!
//! Run with: cargo run --example read_write -- 192.168.1.250 [udp|tcp]
//!
//! This example demonstrates:
//! - Symbolic addresses for words and bits
//! - Multiple-address reads
//! - Typed helpers (f32, i32, strings)
//! - Fill and transfer

use std::net::IpAddr;

use omron_fins_client::utils::word_to_bits;
use omron_fins_client::{Client, ClientConfig, MultiReadValue, Protocol};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let ip: IpAddr = args.next().as_deref().unwrap_or("192.168.1.250").parse()?;
    let protocol: Protocol = args.next().as_deref().unwrap_or("udp").parse()?;

    let config = ClientConfig::new(ip, 1, 0).with_protocol(protocol);
    let client = Client::new(config)?;
    println!("Connected: {:?}", client);

    // Words
    let data = client.read("DM100", 5)?;
    println!("DM100-DM104: {:?}", data);

    client.write("DM1001", &[1234])?;
    println!("DM1001 <- 1234, read back {:?}", client.read("DM1001", 1)?);

    // Bits
    let bit = client.read_bit("CIO0.05")?;
    println!("CIO0.05 = {}", bit);
    client.write_bit("CIO0.05", !bit)?;

    let word = client.read("CIO100", 1)?[0];
    let on: Vec<usize> = word_to_bits(word)
        .iter()
        .enumerate()
        .filter(|(_, on)| **on)
        .map(|(i, _)| i)
        .collect();
    println!("CIO100 = 0x{:04X}, bits ON: {:?}", word, on);

    // Several areas in one request
    let tokens = ["DM1000", "CIO100.05", "WR200"];
    for (token, value) in tokens.iter().zip(client.read_multiple(tokens)?) {
        match value {
            MultiReadValue::Bit(b) => println!("{:<10} = {}", token, b),
            MultiReadValue::Word(w) => println!("{:<10} = 0x{:04X}", token, w),
            MultiReadValue::DoubleWord(d) => println!("{:<10} = 0x{:08X}", token, d),
        }
    }

    // Typed values
    client.write_f32("DM300", 25.5)?;
    println!("DM300 (REAL) = {}", client.read_f32("DM300")?);
    client.write_i32("DM302", -123456)?;
    println!("DM302 (DINT) = {}", client.read_i32("DM302")?);
    client.write_string("DM310", "PRODUCT-001")?;
    println!("DM310 (STRING) = {}", client.read_string("DM310", 6)?);

    // Bulk operations
    client.fill("DM500", 10, 0)?;
    client.transfer("DM100", "DM500", 5)?;
    println!("DM500-DM509: {:?}", client.read("DM500", 10)?);

    client.disconnect();
    Ok(())
}
