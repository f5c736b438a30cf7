//! Example: many threads sharing one client
//!
//! Run with: cargo run --example concurrent_reads -- 192.168.1.250
//!
//! Every request carries its own SID, so replies are routed to the right
//! thread whatever order the PLC answers in.

use std::net::IpAddr;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use omron_fins_client::{Client, ClientConfig, CommandCode, Protocol};
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
    let client = Arc::new(Client::new(ClientConfig::new(ip, 1, 0).with_protocol(Protocol::Tcp))?);

    let started = Instant::now();
    let workers: Vec<_> = (0..8u16)
        .map(|worker| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                let address = format!("DM{}", worker * 100);
                (0..25)
                    .map(|_| client.read(address.as_str(), 10).map(|words| words[0]))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for (worker, handle) in workers.into_iter().enumerate() {
        let results = handle.join().map_err(|_| "worker panicked")?;
        let failures = results.iter().filter(|r| r.is_err()).count();
        println!("worker {}: {} reads, {} failed", worker, results.len(), failures);
    }
    println!("elapsed: {:?}", started.elapsed());

    // Pipelining on the raw session: submit first, wait later.
    let session = client.session();
    let body = [0x82, 0x00, 0x00, 0x00, 0x00, 0x01];
    let pending: Vec<_> = (0..4)
        .map(|_| session.submit(CommandCode::MemoryAreaRead, &body, client.timeout()))
        .collect::<Result<_, _>>()?;
    for reply in pending {
        let sid = reply.sid();
        let response = reply.wait()?;
        println!("SID {} -> {:?}", sid, response.to_words()?);
    }

    Ok(())
}
