//! FINS header structures and node addressing.
//!
//! The FINS header is a 10-byte structure that precedes every FINS command
//! and response:
//!
//! | Byte | Field | Description |
//! |------|-------|-------------|
//! | 0 | ICF | Information Control Field |
//! | 1 | RSV | Reserved (always 0x00) |
//! | 2 | GCT | Gateway Count |
//! | 3 | DNA | Destination Network Address |
//! | 4 | DA1 | Destination Node Address |
//! | 5 | DA2 | Destination Unit Address |
//! | 6 | SNA | Source Network Address |
//! | 7 | SA1 | Source Node Address |
//! | 8 | SA2 | Source Unit Address |
//! | 9 | SID | Service ID |
//!
//! # Example
//!
//! ```
//! use omron_fins_client::{FinsHeader, NodeAddress};
//!
//! let header =
//!     FinsHeader::new_command(NodeAddress::new(0, 10, 0), NodeAddress::new(0, 1, 0), 0x01);
//! assert_eq!(
//!     header.to_bytes(),
//!     [0x80, 0x00, 0x02, 0x00, 0x0A, 0x00, 0x00, 0x01, 0x00, 0x01]
//! );
//!
//! let reply = header.response();
//! assert!(reply.is_response());
//! assert_eq!(reply.destination(), header.source());
//! ```

use crate::error::{FinsError, Result};

/// FINS header size in bytes.
pub const FINS_HEADER_SIZE: usize = 10;

/// ICF for a command that requires a response.
pub const ICF_COMMAND: u8 = 0x80;

/// ICF for a response.
pub const ICF_RESPONSE: u8 = 0xC0;

const ICF_RESPONSE_BIT: u8 = 0x40;

/// Default gateway count.
pub const DEFAULT_GCT: u8 = 0x02;

/// Node address for FINS communication (network/node/unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeAddress {
    /// Network address (0 = local network).
    pub network: u8,
    /// Node address.
    pub node: u8,
    /// Unit address (0 = CPU unit).
    pub unit: u8,
}

impl NodeAddress {
    /// Creates a new node address.
    pub fn new(network: u8, node: u8, unit: u8) -> Self {
        Self {
            network,
            node,
            unit,
        }
    }

    /// Local network, node 0, CPU unit.
    pub fn local() -> Self {
        Self::new(0, 0, 0)
    }

    /// Returns a copy with a different node number.
    pub fn with_node(self, node: u8) -> Self {
        Self { node, ..self }
    }
}

impl Default for NodeAddress {
    fn default() -> Self {
        Self::local()
    }
}

impl std::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.network, self.node, self.unit)
    }
}

/// FINS command/response header (10 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinsHeader {
    /// Information Control Field. Bit 7 set = response required, bit 6 set =
    /// response frame.
    pub icf: u8,
    /// Reserved byte.
    pub rsv: u8,
    /// Gateway Count.
    pub gct: u8,
    /// Destination Network Address.
    pub dna: u8,
    /// Destination Node Address.
    pub da1: u8,
    /// Destination Unit Address.
    pub da2: u8,
    /// Source Network Address.
    pub sna: u8,
    /// Source Node Address.
    pub sa1: u8,
    /// Source Unit Address.
    pub sa2: u8,
    /// Service ID, echoed by the responder.
    pub sid: u8,
}

impl FinsHeader {
    /// Creates a command header that requests a response.
    pub fn new_command(destination: NodeAddress, source: NodeAddress, sid: u8) -> Self {
        Self {
            icf: ICF_COMMAND,
            rsv: 0x00,
            gct: DEFAULT_GCT,
            dna: destination.network,
            da1: destination.node,
            da2: destination.unit,
            sna: source.network,
            sa1: source.node,
            sa2: source.unit,
            sid,
        }
    }

    /// Builds the header a responder sends back for this command: addresses
    /// swapped, same SID, response ICF.
    pub fn response(self) -> Self {
        Self {
            icf: ICF_RESPONSE,
            rsv: 0x00,
            gct: DEFAULT_GCT,
            dna: self.sna,
            da1: self.sa1,
            da2: self.sa2,
            sna: self.dna,
            sa1: self.da1,
            sa2: self.da2,
            sid: self.sid,
        }
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(self) -> [u8; FINS_HEADER_SIZE] {
        [
            self.icf, self.rsv, self.gct, self.dna, self.da1, self.da2, self.sna, self.sa1,
            self.sa2, self.sid,
        ]
    }

    /// Parses a header from the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::MalformedResponse` if fewer than 10 bytes are given.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < FINS_HEADER_SIZE {
            return Err(FinsError::malformed_response(format!(
                "header too short: expected {} bytes, got {}",
                FINS_HEADER_SIZE,
                data.len()
            )));
        }

        Ok(Self {
            icf: data[0],
            rsv: data[1],
            gct: data[2],
            dna: data[3],
            da1: data[4],
            da2: data[5],
            sna: data[6],
            sa1: data[7],
            sa2: data[8],
            sid: data[9],
        })
    }

    /// Returns whether this is a response header.
    pub fn is_response(self) -> bool {
        (self.icf & ICF_RESPONSE_BIT) != 0
    }

    /// Destination node address.
    pub fn destination(self) -> NodeAddress {
        NodeAddress::new(self.dna, self.da1, self.da2)
    }

    /// Source node address.
    pub fn source(self) -> NodeAddress {
        NodeAddress::new(self.sna, self.sa1, self.sa2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_new_command() {
        let header =
            FinsHeader::new_command(NodeAddress::new(0, 10, 0), NodeAddress::new(0, 1, 0), 0x42);

        assert_eq!(header.icf, 0x80);
        assert_eq!(header.gct, 0x02);
        assert_eq!(header.da1, 10);
        assert_eq!(header.sa1, 1);
        assert_eq!(header.sid, 0x42);
        assert!(!header.is_response());
    }

    #[test]
    fn test_header_from_bytes() {
        let bytes = [0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x07];
        let header = FinsHeader::from_bytes(&bytes).unwrap();

        assert!(header.is_response());
        assert_eq!(header.destination(), NodeAddress::new(0, 1, 0));
        assert_eq!(header.source(), NodeAddress::new(0, 10, 0));
        assert_eq!(header.sid, 0x07);
        assert_eq!(header.to_bytes(), bytes);
    }

    #[test]
    fn test_header_from_bytes_too_short() {
        let err = FinsHeader::from_bytes(&[0xC0, 0x00, 0x02]).unwrap_err();
        assert!(matches!(err, FinsError::MalformedResponse { .. }));
    }

    #[test]
    fn test_response_swaps_addresses() {
        let command =
            FinsHeader::new_command(NodeAddress::new(1, 20, 0), NodeAddress::new(2, 30, 5), 0xFF);
        let response = command.response();
        assert_eq!(response.icf, ICF_RESPONSE);
        assert_eq!(response.source(), command.destination());
        assert_eq!(response.destination(), command.source());
        assert_eq!(response.sid, 0xFF);
    }

    #[test]
    fn test_node_address_display() {
        assert_eq!(NodeAddress::new(0, 10, 0).to_string(), "0.10.0");
        assert_eq!(NodeAddress::local().with_node(3), NodeAddress::new(0, 3, 0));
    }
}
