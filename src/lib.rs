//! # Omron FINS Client
//!
//! A Rust client for Omron PLCs speaking FINS (Factory Interface Network
//! Service) over UDP or TCP.
//!
//! Each call produces exactly one request and one reply. Requests from many
//! threads share one socket: every frame carries a Service ID (SID) and a
//! background thread routes replies back to their callers, in any order.
//! There are no retries, no caching and no reconnection.
//!
//! ## Features
//!
//! - **Symbolic addresses**: `"DM100"`, `"CIO0.05"`, `"wr200"`, validated
//!   before any I/O
//! - **UDP and TCP**: FINS/TCP node address handshake included
//! - **Concurrent**: `Client` is `Send + Sync`; replies are matched by SID
//! - **Typed commands**: read, write, fill, transfer, multiple read,
//!   run/stop, status, controller data, clock
//! - **Typed errors**: one [`FinsError`] enum with a coarse [`ErrorKind`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use omron_fins_client::{Client, ClientConfig};
//! use std::net::Ipv4Addr;
//!
//! fn main() -> omron_fins_client::Result<()> {
//!     let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 250), 1, 0);
//!     let client = Client::new(config)?;
//!
//!     let data = client.read("DM100", 10)?;
//!     println!("DM100-109: {:?}", data);
//!
//!     client.write("DM1001", &[1234])?;
//!     client.write_bit("CIO0.05", true)?;
//!
//!     let values = client.read_multiple(["DM1000", "CIO100.05", "WR200"])?;
//!     println!("{:?}", values);
//!     Ok(())
//! }
//! ```
//!
//! ## Memory Areas
//!
//! | Area | Words | Bit access |
//! |------|-------|:----------:|
//! | [`MemoryArea::CIO`] | 0-6143 | ✓ |
//! | [`MemoryArea::WR`] | 0-511 | ✓ |
//! | [`MemoryArea::HR`] | 0-511 | ✓ |
//! | [`MemoryArea::AR`] | 0-959 | ✓ |
//! | [`MemoryArea::DM`] | 0-32767 | ✓ |
//! | [`MemoryArea::EM`] | 0-32767 | ✓ |
//! | [`MemoryArea::TIM`] | 0-4095 | ✗ |
//! | [`MemoryArea::CNT`] | 0-4095 | ✗ |
//! | [`MemoryArea::DR`] | 0-15 | ✗ |
//! | [`MemoryArea::IR`] | 0-15 (32-bit) | ✗ |
//!
//! ## PLC Control
//!
//! ```no_run
//! # use omron_fins_client::{Client, ClientConfig, ClockTime, PlcMode};
//! # use std::net::Ipv4Addr;
//! # let client = Client::new(ClientConfig::new(Ipv4Addr::new(192, 168, 1, 250), 1, 0)).unwrap();
//! let status = client.status()?;
//! if status.has_fatal_error() {
//!     client.stop()?;
//! } else {
//!     client.run(PlcMode::Monitor)?;
//! }
//!
//! let now = client.read_clock()?;
//! client.write_clock(&ClockTime::new(2024, 3, 15, 14, 30, 0, 5)?)?;
//! # Ok::<(), omron_fins_client::FinsError>(())
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use omron_fins_client::{Client, ClientConfig, ErrorKind};
//! use std::net::Ipv4Addr;
//!
//! let client = Client::new(ClientConfig::new(Ipv4Addr::new(192, 168, 1, 250), 1, 0))?;
//!
//! match client.read("DM100", 10) {
//!     Ok(data) => println!("Data: {:?}", data),
//!     Err(e) => match e.kind() {
//!         ErrorKind::Timeout => println!("PLC did not answer"),
//!         ErrorKind::Protocol => println!("PLC rejected the command: {}", e),
//!         ErrorKind::InvalidAddress => println!("Bad address: {}", e),
//!         _ => println!("Error: {}", e),
//!     },
//! }
//! # Ok::<(), omron_fins_client::FinsError>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]: connection lifecycle at `info`,
//! operations and discarded frames at `debug`/`trace`, anomalies at `warn`.
//! Install any subscriber to see them.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod address;
mod client;
mod clock;
mod command;
mod controller;
mod end_code;
mod error;
mod header;
mod memory;
mod response;
mod sequence;
mod session;
mod tcp;
mod transport;
pub mod utils;

// Public re-exports
pub use address::{Address, IntoAddress, ADDRESS_SIZE, MAX_BIT};
pub use client::{Client, ClientConfig, Protocol};
pub use clock::{ClockReadCommand, ClockTime, ClockWriteCommand, CLOCK_SIZE};
pub use command::{
    Command, CommandCode, FillCommand, MultiReadValue, MultipleReadCommand, ReadCommand,
    TransferCommand, WriteCommand, WriteData, MAX_MULTI_READ_ADDRESSES, MAX_WORDS_PER_COMMAND,
};
pub use controller::{
    AreaData, ControllerData, ControllerDataReadCommand, ControllerStatus,
    ControllerStatusReadCommand, OperatingMode, PlcMode, RunCommand, RunState, StopCommand,
};
pub use end_code::{EndCode, EndCodeCategory};
pub use error::{ErrorKind, FinsError, Result};
pub use header::{FinsHeader, NodeAddress, FINS_HEADER_SIZE};
pub use memory::MemoryArea;
pub use response::{FinsResponse, MIN_RESPONSE_SIZE};
pub use sequence::{SidAllocator, SID_SPACE};
pub use session::{PendingReply, SessionState, TransportSession};
pub use tcp::{
    tcp_error_description, NodeAssignment, TcpCommand, TcpFrame, TcpFrameDecoder, MAX_TCP_LENGTH,
    MIN_TCP_LENGTH, TCP_HEADER_SIZE, TCP_MAGIC,
};
pub use transport::{
    FrameTransport, TcpTransport, UdpTransport, DEFAULT_FINS_PORT, DEFAULT_TIMEOUT,
    MAX_PACKET_SIZE,
};
