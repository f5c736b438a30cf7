//! High-level FINS client for Omron PLCs.
//!
//! [`Client`] wraps a [`TransportSession`] and turns each operation into one
//! typed command. Addresses are accepted as symbolic tokens (`"DM100"`,
//! `"CIO0.05"`) or as parsed [`Address`] values, and are validated before
//! anything is sent.
//!
//! # Example
//!
//! ```no_run
//! use omron_fins_client::{Client, ClientConfig, Protocol};
//! use std::net::Ipv4Addr;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 250), 1, 0)
//!     .with_protocol(Protocol::Tcp);
//! let client = Client::new(config)?;
//!
//! let words = client.read("DM100", 10)?;
//! client.write("DM200", &[0x1234, 0x5678])?;
//!
//! let running = client.read_bit("CIO0.05")?;
//! client.write_bit("CIO0.05", !running)?;
//!
//! let temperature = client.read_f32("DM300")?;
//! # Ok::<(), omron_fins_client::FinsError>(())
//! ```
//!
//! # Thread Safety
//!
//! `Client` is `Send + Sync`. Share it behind an `Arc` and call it from
//! several threads; requests are correlated by SID and do not wait for each
//! other.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::address::{Address, IntoAddress};
use crate::clock::{ClockReadCommand, ClockTime, ClockWriteCommand};
use crate::command::{
    Command, FillCommand, MultiReadValue, MultipleReadCommand, ReadCommand, TransferCommand,
    WriteCommand,
};
use crate::controller::{
    ControllerData, ControllerDataReadCommand, ControllerStatus, ControllerStatusReadCommand,
    PlcMode, RunCommand, StopCommand,
};
use crate::error::{FinsError, Result};
use crate::header::NodeAddress;
use crate::session::TransportSession;
use crate::transport::{DEFAULT_FINS_PORT, DEFAULT_TIMEOUT};
use crate::utils;

/// Socket protocol used to reach the PLC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Protocol {
    /// FINS/UDP, one datagram per frame.
    #[default]
    Udp,
    /// FINS/TCP with node address handshake.
    Tcp,
}

impl FromStr for Protocol {
    type Err = FinsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Protocol::Udp),
            "tcp" => Ok(Protocol::Tcp),
            other => Err(FinsError::invalid_parameter(
                "protocol",
                format!("expected 'udp' or 'tcp', got '{}'", other),
            )),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => f.write_str("udp"),
            Protocol::Tcp => f.write_str("tcp"),
        }
    }
}

/// Configuration for creating a FINS client.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientConfig {
    /// PLC socket address.
    pub plc_addr: SocketAddr,
    /// Socket protocol.
    pub protocol: Protocol,
    /// Source node address (this client). Over TCP the node number is
    /// requested in the handshake; 0 lets the PLC assign one.
    pub source: NodeAddress,
    /// Destination node address (the PLC).
    pub destination: NodeAddress,
    /// Per-request timeout, also used for connect and handshake.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a UDP configuration on port 9600 with the default timeout.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins_client::{ClientConfig, Protocol};
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 250), 1, 0);
    /// assert_eq!(config.plc_addr.port(), 9600);
    /// assert_eq!(config.protocol, Protocol::Udp);
    /// ```
    pub fn new(plc_ip: impl Into<IpAddr>, source_node: u8, dest_node: u8) -> Self {
        Self {
            plc_addr: SocketAddr::new(plc_ip.into(), DEFAULT_FINS_PORT),
            protocol: Protocol::Udp,
            source: NodeAddress::new(0, source_node, 0),
            destination: NodeAddress::new(0, dest_node, 0),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the PLC port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.plc_addr.set_port(port);
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the socket protocol.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the source network address.
    pub fn with_source_network(mut self, network: u8) -> Self {
        self.source.network = network;
        self
    }

    /// Sets the source unit address.
    pub fn with_source_unit(mut self, unit: u8) -> Self {
        self.source.unit = unit;
        self
    }

    /// Sets the destination network address.
    pub fn with_dest_network(mut self, network: u8) -> Self {
        self.destination.network = network;
        self
    }

    /// Sets the destination unit address.
    pub fn with_dest_unit(mut self, unit: u8) -> Self {
        self.destination.unit = unit;
        self
    }
}

/// FINS client for Omron PLCs.
///
/// Each operation sends exactly one command and waits for its reply. There
/// are no retries, no caching and no reconnection; after a
/// `ConnectionFailure` create a new client.
pub struct Client {
    session: TransportSession,
    timeout: Duration,
}

impl Client {
    /// Connects to the PLC described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailure` if the socket cannot be opened or, over
    /// TCP, the handshake fails.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let session = TransportSession::connect(&config)?;
        Ok(Self {
            session,
            timeout: config.timeout,
        })
    }

    /// Executes any [`Command`] with the client timeout.
    ///
    /// # Errors
    ///
    /// Returns transport, protocol and decode errors.
    pub fn execute<C: Command>(&self, command: &C) -> Result<C::Output> {
        self.session.execute(command, self.timeout)
    }

    /// Reads `count` elements starting at `address`.
    ///
    /// Bit addresses yield 0 or 1 per bit; IR addresses yield two words per
    /// register.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress`/`InvalidParameter` before any I/O for bad
    /// input, otherwise transport and protocol errors.
    pub fn read(&self, address: impl IntoAddress, count: u16) -> Result<Vec<u16>> {
        let address = address.into_address()?;
        tracing::debug!(%address, count, "read");
        self.execute(&ReadCommand::new(address, count)?)
    }

    /// Reads one bit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` if `address` is not a bit address.
    pub fn read_bit(&self, address: impl IntoAddress) -> Result<bool> {
        let bits = self.read_bits(address, 1)?;
        bits.first()
            .copied()
            .ok_or_else(|| FinsError::malformed_response("empty bit read"))
    }

    /// Reads `count` consecutive bits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` if `address` is not a bit address.
    pub fn read_bits(&self, address: impl IntoAddress, count: u16) -> Result<Vec<bool>> {
        let address = bit_address(address)?;
        let values = self.read(address, count)?;
        Ok(values.into_iter().map(|v| v != 0).collect())
    }

    /// Writes `data` starting at `address`.
    ///
    /// For a bit address every value is one bit (non-zero = ON).
    ///
    /// # Errors
    ///
    /// Returns validation errors before any I/O, otherwise transport and
    /// protocol errors.
    pub fn write(&self, address: impl IntoAddress, data: &[u16]) -> Result<()> {
        let address = address.into_address()?;
        tracing::debug!(%address, len = data.len(), "write");
        self.execute(&WriteCommand::new(address, data)?)
    }

    /// Writes one bit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` if `address` is not a bit address.
    pub fn write_bit(&self, address: impl IntoAddress, value: bool) -> Result<()> {
        self.write_bits(address, &[value])
    }

    /// Writes consecutive bits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` if `address` is not a bit address.
    pub fn write_bits(&self, address: impl IntoAddress, values: &[bool]) -> Result<()> {
        let address = address.into_address()?;
        tracing::debug!(%address, len = values.len(), "write bits");
        self.execute(&WriteCommand::bits(address, values)?)
    }

    /// Writes `value` to `count` consecutive words.
    ///
    /// # Errors
    ///
    /// Returns validation errors for bit or IR addresses and bad counts.
    pub fn fill(&self, address: impl IntoAddress, count: u16, value: u16) -> Result<()> {
        let address = address.into_address()?;
        tracing::debug!(%address, count, value, "fill");
        self.execute(&FillCommand::new(address, count, value)?)
    }

    /// Copies `count` words from `source` to `destination` inside the PLC.
    ///
    /// # Errors
    ///
    /// Returns validation errors for bit or IR addresses and bad counts.
    pub fn transfer(
        &self,
        source: impl IntoAddress,
        destination: impl IntoAddress,
        count: u16,
    ) -> Result<()> {
        let source = source.into_address()?;
        let destination = destination.into_address()?;
        tracing::debug!(%source, %destination, count, "transfer");
        self.execute(&TransferCommand::new(source, destination, count)?)
    }

    /// Reads several unrelated addresses in one request.
    ///
    /// The result is positional: element `i` belongs to address `i`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` for the first bad token and
    /// `InvalidParameter` for an empty or oversized list.
    pub fn read_multiple<I>(&self, addresses: I) -> Result<Vec<MultiReadValue>>
    where
        I: IntoIterator,
        I::Item: IntoAddress,
    {
        let addresses = addresses
            .into_iter()
            .map(IntoAddress::into_address)
            .collect::<Result<Vec<Address>>>()?;
        tracing::debug!(count = addresses.len(), "read multiple");
        self.execute(&MultipleReadCommand::new(addresses)?)
    }

    /// Reads the controller status.
    ///
    /// # Errors
    ///
    /// Returns transport, protocol and decode errors.
    pub fn status(&self) -> Result<ControllerStatus> {
        self.execute(&ControllerStatusReadCommand)
    }

    /// Reads the controller model, version and memory layout.
    ///
    /// # Errors
    ///
    /// Returns transport, protocol and decode errors.
    pub fn controller_data(&self) -> Result<ControllerData> {
        self.execute(&ControllerDataReadCommand)
    }

    /// Puts the PLC into `mode`.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn run(&self, mode: PlcMode) -> Result<()> {
        tracing::info!(?mode, "run");
        self.execute(&RunCommand::new(mode))
    }

    /// Puts the PLC into program mode.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn stop(&self) -> Result<()> {
        tracing::info!("stop");
        self.execute(&StopCommand)
    }

    /// Reads the PLC clock.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` for invalid clock data.
    pub fn read_clock(&self) -> Result<ClockTime> {
        self.execute(&ClockReadCommand)
    }

    /// Sets the PLC clock.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for out-of-range fields before any I/O.
    pub fn write_clock(&self, time: &ClockTime) -> Result<()> {
        tracing::info!(%time, "write clock");
        self.execute(&ClockWriteCommand::new(*time)?)
    }

    /// Reads a REAL from two words, low word first.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn read_f32(&self, address: impl IntoAddress) -> Result<f32> {
        let words = self.read(address, 2)?;
        Ok(utils::words_to_f32(utils::take_words(&words)?))
    }

    /// Writes a REAL to two words, low word first.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn write_f32(&self, address: impl IntoAddress, value: f32) -> Result<()> {
        self.write(address, &utils::f32_to_words(value))
    }

    /// Reads an LREAL from four words, least significant first.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn read_f64(&self, address: impl IntoAddress) -> Result<f64> {
        let words = self.read(address, 4)?;
        Ok(utils::words_to_f64(utils::take_words(&words)?))
    }

    /// Writes an LREAL to four words, least significant first.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn write_f64(&self, address: impl IntoAddress, value: f64) -> Result<()> {
        self.write(address, &utils::f64_to_words(value))
    }

    /// Reads a DINT from two words, low word first.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn read_i32(&self, address: impl IntoAddress) -> Result<i32> {
        let words = self.read(address, 2)?;
        Ok(utils::words_to_i32(utils::take_words(&words)?))
    }

    /// Writes a DINT to two words, low word first.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn write_i32(&self, address: impl IntoAddress, value: i32) -> Result<()> {
        self.write(address, &utils::i32_to_words(value))
    }

    /// Reads an ASCII string stored in `word_count` words.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn read_string(&self, address: impl IntoAddress, word_count: u16) -> Result<String> {
        let words = self.read(address, word_count)?;
        Ok(utils::words_to_string(&words))
    }

    /// Writes an ASCII string, two characters per word.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for empty, non-ASCII or overlong strings.
    pub fn write_string(&self, address: impl IntoAddress, value: &str) -> Result<()> {
        self.write(address, &utils::string_to_words(value)?)
    }

    /// Closes the connection. Later calls fail with `ConnectionFailure`.
    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    /// Returns whether the connection is usable.
    pub fn is_connected(&self) -> bool {
        self.session.is_ready()
    }

    /// Source node address used in headers.
    pub fn source(&self) -> NodeAddress {
        self.session.source()
    }

    /// Destination node address used in headers.
    pub fn destination(&self) -> NodeAddress {
        self.session.destination()
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Underlying session, for pipelined use with
    /// [`TransportSession::submit`].
    pub fn session(&self) -> &TransportSession {
        &self.session
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn bit_address(address: impl IntoAddress) -> Result<Address> {
    let address = address.into_address()?;
    if !address.is_bit() {
        return Err(FinsError::invalid_address(format!(
            "bit access requires a bit address, got {}",
            address
        )));
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, UdpSocket};

    #[test]
    fn test_client_config_new() {
        let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 250), 1, 0);

        assert_eq!(config.plc_addr.ip(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 250)));
        assert_eq!(config.plc_addr.port(), DEFAULT_FINS_PORT);
        assert_eq!(config.protocol, Protocol::Udp);
        assert_eq!(config.source.node, 1);
        assert_eq!(config.destination.node, 0);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_client_config_builders() {
        let config = ClientConfig::new(Ipv4Addr::LOCALHOST, 1, 0)
            .with_port(9601)
            .with_timeout(Duration::from_secs(5))
            .with_protocol(Protocol::Tcp)
            .with_source_network(1)
            .with_source_unit(2)
            .with_dest_network(3)
            .with_dest_unit(4);

        assert_eq!(config.plc_addr.port(), 9601);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.protocol, Protocol::Tcp);
        assert_eq!(config.source, NodeAddress::new(1, 1, 2));
        assert_eq!(config.destination, NodeAddress::new(3, 0, 4));
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("UDP".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert!("serial".parse::<Protocol>().is_err());
        assert_eq!(Protocol::Tcp.to_string(), "tcp");
    }

    #[test]
    fn test_validation_happens_before_io() {
        // Nothing listens here; validation must fail first.
        let plc = UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = ClientConfig::new(Ipv4Addr::LOCALHOST, 1, 0)
            .with_port(plc.local_addr().unwrap().port())
            .with_timeout(Duration::from_millis(100));
        let client = Client::new(config).unwrap();

        assert!(client.read("DM32768", 1).unwrap_err().is_validation_error());
        assert!(client.read("DM0", 0).unwrap_err().is_validation_error());
        assert!(client.read_bit("DM0").unwrap_err().is_validation_error());
        assert!(client.write_bit("CNT1", true).unwrap_err().is_validation_error());
        assert!(client.fill("DM0.01", 1, 0).unwrap_err().is_validation_error());
        let none: [&str; 0] = [];
        assert!(client.read_multiple(none).unwrap_err().is_validation_error());
        assert!(client.write_string("DM0", "").unwrap_err().is_validation_error());

        let mut buf = [0u8; 64];
        plc.set_nonblocking(true).unwrap();
        assert!(plc.recv_from(&mut buf).is_err());
    }

    #[test]
    fn test_client_debug_and_disconnect() {
        let plc = UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = ClientConfig::new(Ipv4Addr::LOCALHOST, 1, 10)
            .with_port(plc.local_addr().unwrap().port());
        let client = Client::new(config).unwrap();
        assert!(client.is_connected());
        assert!(format!("{:?}", client).contains("Client"));

        client.disconnect();
        assert!(!client.is_connected());
        assert!(client.read("DM0", 1).unwrap_err().is_connection_failure());
    }
}
