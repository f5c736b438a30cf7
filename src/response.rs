//! FINS response parsing and validation.
//!
//! # Response Structure
//!
//! | Component | Size | Description |
//! |-----------|------|-------------|
//! | Header | 10 bytes | FINS header, SID echoed from the command |
//! | Command code | 2 bytes | Echo of the command code (MRC, SRC) |
//! | End code | 2 bytes | MRES, SRES (see [`EndCode`]) |
//! | Data | Variable | Response data (if any) |
//!
//! # Example
//!
//! ```
//! use omron_fins_client::FinsResponse;
//!
//! let bytes = [
//!     0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x01, // header
//!     0x01, 0x01, // memory area read
//!     0x00, 0x00, // end code
//!     0x12, 0x34, 0x56, 0x78, // data
//! ];
//!
//! let response = FinsResponse::from_bytes(&bytes).unwrap();
//! assert!(response.end_code.is_success());
//! assert_eq!(response.command_code, 0x0101);
//! assert_eq!(response.to_words().unwrap(), vec![0x1234, 0x5678]);
//! ```

use crate::end_code::EndCode;
use crate::error::{FinsError, Result};
use crate::header::{FinsHeader, FINS_HEADER_SIZE};

/// Minimum response size: header (10) + command code (2) + end code (2).
pub const MIN_RESPONSE_SIZE: usize = FINS_HEADER_SIZE + 4;

/// Parsed FINS response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinsResponse {
    /// Response header.
    pub header: FinsHeader,
    /// Echoed command code.
    pub command_code: u16,
    /// End code.
    pub end_code: EndCode,
    /// Response data following the end code.
    pub data: Vec<u8>,
}

impl FinsResponse {
    /// Parses a FINS response from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::MalformedResponse` if the frame is shorter than 14
    /// bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_RESPONSE_SIZE {
            return Err(FinsError::malformed_response(format!(
                "response too short: expected at least {} bytes, got {}",
                MIN_RESPONSE_SIZE,
                data.len()
            )));
        }

        let header = FinsHeader::from_bytes(&data[..FINS_HEADER_SIZE])?;

        Ok(Self {
            header,
            command_code: u16::from_be_bytes([data[FINS_HEADER_SIZE], data[FINS_HEADER_SIZE + 1]]),
            end_code: EndCode::new(data[FINS_HEADER_SIZE + 2], data[FINS_HEADER_SIZE + 3]),
            data: data[MIN_RESPONSE_SIZE..].to_vec(),
        })
    }

    /// Serializes the response back to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MIN_RESPONSE_SIZE + self.data.len());
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&self.command_code.to_be_bytes());
        bytes.extend_from_slice(&[self.end_code.main, self.end_code.sub]);
        bytes.extend_from_slice(&self.data);
        bytes
    }

    /// Validates the end code.
    ///
    /// Relay and CPU error flags do not fail the command on their own.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::Protocol` carrying the raw end code.
    pub fn check_error(&self) -> Result<()> {
        if self.end_code.is_success() {
            if self.end_code.raw() != 0 {
                tracing::warn!(
                    sid = self.header.sid,
                    end_code = %self.end_code,
                    relay_error = self.end_code.relay_error(),
                    fatal_cpu_error = self.end_code.fatal_cpu_error(),
                    non_fatal_cpu_error = self.end_code.non_fatal_cpu_error(),
                    "command completed with error flags set"
                );
            }
            Ok(())
        } else {
            Err(FinsError::protocol(self.end_code))
        }
    }

    /// Validates the echoed command code.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::MalformedResponse` on mismatch.
    pub fn check_command(&self, expected: u16) -> Result<()> {
        if self.command_code == expected {
            Ok(())
        } else {
            Err(FinsError::malformed_response(format!(
                "command code mismatch: expected 0x{:04X}, received 0x{:04X}",
                expected, self.command_code
            )))
        }
    }

    /// Converts response data to big-endian words.
    ///
    /// # Errors
    ///
    /// Returns an error if the data length is odd.
    pub fn to_words(&self) -> Result<Vec<u16>> {
        bytes_to_words(&self.data)
    }
}

/// Splits big-endian bytes into words.
pub(crate) fn bytes_to_words(data: &[u8]) -> Result<Vec<u16>> {
    if data.len() % 2 != 0 {
        return Err(FinsError::malformed_response(
            "data length must be even for word conversion",
        ));
    }
    Ok(data
        .chunks_exact(2)
        .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(main: u8, sub: u8, data: &[u8]) -> Vec<u8> {
        let mut bytes = vec![
            0xC0, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x0A, 0x00, 0x01, // header
            0x01, 0x01, // command code
            main, sub,
        ];
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn test_response_from_bytes() {
        let bytes = make_response(0x00, 0x00, &[0x12, 0x34]);
        let response = FinsResponse::from_bytes(&bytes).unwrap();

        assert_eq!(response.header.sid, 0x01);
        assert_eq!(response.command_code, 0x0101);
        assert!(response.end_code.is_success());
        assert_eq!(response.data, vec![0x12, 0x34]);
        assert_eq!(response.to_bytes(), bytes);
    }

    #[test]
    fn test_response_too_short() {
        let err = FinsResponse::from_bytes(&[0xC0, 0x00, 0x02]).unwrap_err();
        assert!(matches!(err, FinsError::MalformedResponse { .. }));
    }

    #[test]
    fn test_check_error() {
        let ok = FinsResponse::from_bytes(&make_response(0x00, 0x00, &[])).unwrap();
        assert!(ok.check_error().is_ok());

        let flagged = FinsResponse::from_bytes(&make_response(0x00, 0x40, &[0x00, 0x01])).unwrap();
        assert!(flagged.check_error().is_ok());

        let failed = FinsResponse::from_bytes(&make_response(0x11, 0x03, &[])).unwrap();
        match failed.check_error().unwrap_err() {
            FinsError::Protocol { end_code } => assert_eq!(end_code.raw(), 0x1103),
            other => panic!("Expected Protocol, got {:?}", other),
        }
    }

    #[test]
    fn test_check_command() {
        let response = FinsResponse::from_bytes(&make_response(0x00, 0x00, &[])).unwrap();
        assert!(response.check_command(0x0101).is_ok());
        assert!(response.check_command(0x0102).is_err());
    }

    #[test]
    fn test_to_words() {
        let data = [0x12, 0x34, 0xAB, 0xCD];
        let response = FinsResponse::from_bytes(&make_response(0x00, 0x00, &data)).unwrap();
        assert_eq!(response.to_words().unwrap(), vec![0x1234, 0xABCD]);

        let odd = FinsResponse::from_bytes(&make_response(0x00, 0x00, &[0x12])).unwrap();
        assert!(odd.to_words().is_err());
    }
}
