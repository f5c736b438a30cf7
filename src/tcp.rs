//! FINS/TCP framing.
//!
//! Over TCP every FINS frame is wrapped in a 16-byte envelope:
//!
//! | Bytes | Field | Description |
//! |-------|-------|-------------|
//! | 0-3 | Magic | ASCII `FINS` |
//! | 4-7 | Length | Bytes following this field (command + error code + payload) |
//! | 8-11 | Command | See [`TcpCommand`] |
//! | 12-15 | Error code | 0 on success, see [`tcp_error_description`] |
//! | 16.. | Payload | FINS frame or node numbers |
//!
//! Before any FINS traffic the client sends a node address request and the
//! PLC answers with the node numbers both sides must use. [`TcpFrameDecoder`]
//! cuts a byte stream into envelopes using the length field.
//!
//! # Example
//!
//! ```
//! use omron_fins_client::{TcpCommand, TcpFrame, TcpFrameDecoder};
//!
//! let request = TcpFrame::node_address_request(0).encode();
//! assert_eq!(&request[..4], b"FINS");
//!
//! let mut decoder = TcpFrameDecoder::new();
//! decoder.push(&request[..10]);
//! assert!(decoder.next_frame().unwrap().is_none());
//! decoder.push(&request[10..]);
//! let frame = decoder.next_frame().unwrap().unwrap();
//! assert_eq!(frame.command(), Some(TcpCommand::NodeAddressRequest));
//! ```

use crate::error::{FinsError, Result};
use crate::transport::MAX_PACKET_SIZE;

/// Envelope magic.
pub const TCP_MAGIC: [u8; 4] = *b"FINS";

/// Size of the envelope before the payload.
pub const TCP_HEADER_SIZE: usize = 16;

/// Smallest legal length field (command + error code).
pub const MIN_TCP_LENGTH: usize = 8;

/// Largest legal length field.
pub const MAX_TCP_LENGTH: usize = MIN_TCP_LENGTH + MAX_PACKET_SIZE;

const PREFIX_SIZE: usize = 8;

/// FINS/TCP envelope commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TcpCommand {
    /// Client to PLC: request node numbers.
    NodeAddressRequest = 0,
    /// PLC to client: assigned node numbers.
    NodeAddressResponse = 1,
    /// A FINS frame.
    Frame = 2,
    /// PLC could not deliver a FINS frame.
    FrameSendError = 3,
    /// Connection confirmation.
    ConnectionConfirmation = 6,
}

impl TcpCommand {
    /// Looks up a command by value.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(TcpCommand::NodeAddressRequest),
            1 => Some(TcpCommand::NodeAddressResponse),
            2 => Some(TcpCommand::Frame),
            3 => Some(TcpCommand::FrameSendError),
            6 => Some(TcpCommand::ConnectionConfirmation),
            _ => None,
        }
    }
}

/// Describes a FINS/TCP error code.
pub fn tcp_error_description(code: u32) -> &'static str {
    match code {
        0x00 => "normal",
        0x01 => "the header is not 'FINS'",
        0x02 => "the data length is too long",
        0x03 => "the command is not supported",
        0x20 => "all connections are in use",
        0x21 => "the specified node is already connected",
        0x22 => "attempt to access a protected node from an unspecified IP address",
        0x23 => "the client FINS node address is out of range",
        0x24 => "the same FINS node address is being used by the client and server",
        0x25 => "all the node addresses available for allocation have been used",
        _ => "unknown FINS/TCP error",
    }
}

/// One FINS/TCP envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpFrame {
    /// Raw command value.
    pub command: u32,
    /// Raw error code.
    pub error_code: u32,
    /// Payload.
    pub payload: Vec<u8>,
}

impl TcpFrame {
    /// Creates an envelope.
    pub fn new(command: TcpCommand, payload: Vec<u8>) -> Self {
        Self {
            command: command as u32,
            error_code: 0,
            payload,
        }
    }

    /// Wraps a FINS frame.
    pub fn fins(frame: &[u8]) -> Self {
        Self::new(TcpCommand::Frame, frame.to_vec())
    }

    /// Node address request. `client_node` 0 asks the PLC to pick one.
    pub fn node_address_request(client_node: u8) -> Self {
        Self::new(
            TcpCommand::NodeAddressRequest,
            u32::from(client_node).to_be_bytes().to_vec(),
        )
    }

    /// Node address response carrying both node numbers.
    pub fn node_address_response(client_node: u8, server_node: u8) -> Self {
        let mut payload = u32::from(client_node).to_be_bytes().to_vec();
        payload.extend_from_slice(&u32::from(server_node).to_be_bytes());
        Self::new(TcpCommand::NodeAddressResponse, payload)
    }

    /// Returns a copy with the given error code.
    pub fn with_error(mut self, error_code: u32) -> Self {
        self.error_code = error_code;
        self
    }

    /// Known command, if any.
    pub fn command(&self) -> Option<TcpCommand> {
        TcpCommand::from_u32(self.command)
    }

    /// Serializes the envelope.
    pub fn encode(&self) -> Vec<u8> {
        let length = (MIN_TCP_LENGTH + self.payload.len()) as u32;
        let mut bytes = Vec::with_capacity(TCP_HEADER_SIZE + self.payload.len());
        bytes.extend_from_slice(&TCP_MAGIC);
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.extend_from_slice(&self.command.to_be_bytes());
        bytes.extend_from_slice(&self.error_code.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Node numbers agreed during the FINS/TCP handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeAssignment {
    /// Node number the client must use as SA1.
    pub client_node: u8,
    /// Node number of the PLC, used as DA1.
    pub server_node: u8,
}

impl NodeAssignment {
    /// Parses a node address response.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailure` if the PLC reported an error or sent
    /// something other than a node address response, and
    /// `MalformedResponse` for a short payload or node numbers above 255.
    pub fn from_frame(frame: &TcpFrame) -> Result<Self> {
        if frame.error_code != 0 {
            return Err(FinsError::connection_failure(format!(
                "FINS/TCP handshake rejected: 0x{:02X} ({})",
                frame.error_code,
                tcp_error_description(frame.error_code)
            )));
        }
        if frame.command() != Some(TcpCommand::NodeAddressResponse) {
            return Err(FinsError::connection_failure(format!(
                "expected node address response, got FINS/TCP command {}",
                frame.command
            )));
        }
        if frame.payload.len() < 8 {
            return Err(FinsError::malformed_response(format!(
                "node address response needs 8 bytes, got {}",
                frame.payload.len()
            )));
        }

        let node = |offset: usize| -> Result<u8> {
            let raw = u32::from_be_bytes([
                frame.payload[offset],
                frame.payload[offset + 1],
                frame.payload[offset + 2],
                frame.payload[offset + 3],
            ]);
            u8::try_from(raw).map_err(|_| {
                FinsError::malformed_response(format!("node number {} out of range", raw))
            })
        };

        Ok(Self {
            client_node: node(0)?,
            server_node: node(4)?,
        })
    }
}

/// Incremental decoder for a FINS/TCP byte stream.
#[derive(Debug, Default)]
pub struct TcpFrameDecoder {
    buf: Vec<u8>,
}

impl TcpFrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete envelope, or `None` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` on a bad magic or an illegal length. The
    /// stream cannot be resynchronized after that.
    pub fn next_frame(&mut self) -> Result<Option<TcpFrame>> {
        let magic_len = self.buf.len().min(TCP_MAGIC.len());
        if self.buf[..magic_len] != TCP_MAGIC[..magic_len] {
            return Err(FinsError::malformed_response(format!(
                "bad FINS/TCP magic {:02X?}",
                &self.buf[..magic_len]
            )));
        }
        if self.buf.len() < PREFIX_SIZE {
            return Ok(None);
        }

        let length =
            u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;
        if !(MIN_TCP_LENGTH..=MAX_TCP_LENGTH).contains(&length) {
            return Err(FinsError::malformed_response(format!(
                "FINS/TCP length {} outside {}-{}",
                length, MIN_TCP_LENGTH, MAX_TCP_LENGTH
            )));
        }
        if self.buf.len() < PREFIX_SIZE + length {
            return Ok(None);
        }

        let frame: Vec<u8> = self.buf.drain(..PREFIX_SIZE + length).collect();
        Ok(Some(TcpFrame {
            command: u32::from_be_bytes([frame[8], frame[9], frame[10], frame[11]]),
            error_code: u32::from_be_bytes([frame[12], frame[13], frame[14], frame[15]]),
            payload: frame[TCP_HEADER_SIZE..].to_vec(),
        }))
    }
}
