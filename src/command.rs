//! FINS command codec.
//!
//! Every FINS service is a type implementing [`Command`]: it knows its
//! command code, how to serialize its body, and how to decode the data of a
//! successful response. The header (and with it the SID) is not part of a
//! command; the session stamps it when the frame is sent.
//!
//! # Memory area commands
//!
//! | Type | Code | Body |
//! |------|------|------|
//! | [`ReadCommand`] | 0x0101 | address(4) + count(2) |
//! | [`WriteCommand`] | 0x0102 | address(4) + count(2) + data |
//! | [`FillCommand`] | 0x0103 | address(4) + count(2) + value(2) |
//! | [`MultipleReadCommand`] | 0x0104 | address(4) × n |
//! | [`TransferCommand`] | 0x0105 | source(4) + destination(4) + count(2) |
//!
//! Controller and clock services live in [`crate::controller`] and
//! [`crate::clock`].
//!
//! # Example
//!
//! ```
//! use omron_fins_client::{Address, Command, WriteCommand};
//!
//! let addr: Address = "DM1001".parse().unwrap();
//! let cmd = WriteCommand::new(addr, &[1234]).unwrap();
//! assert_eq!(
//!     cmd.body(),
//!     vec![0x82, 0x03, 0xE9, 0x00, 0x00, 0x01, 0x04, 0xD2]
//! );
//! ```

use crate::address::{Address, ADDRESS_SIZE};
use crate::error::{FinsError, Result};
use crate::header::{FinsHeader, FINS_HEADER_SIZE};
use crate::memory::MemoryArea;
use crate::response::{bytes_to_words, FinsResponse};

/// Maximum number of elements read or written by a single command.
pub const MAX_WORDS_PER_COMMAND: u16 = 999;

/// Maximum number of addresses in one multiple memory area read.
pub const MAX_MULTI_READ_ADDRESSES: usize = 167;

/// FINS command codes (MRC in the high byte, SRC in the low byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandCode {
    /// Memory area read.
    MemoryAreaRead = 0x0101,
    /// Memory area write.
    MemoryAreaWrite = 0x0102,
    /// Memory area fill.
    MemoryAreaFill = 0x0103,
    /// Multiple memory area read.
    MultipleMemoryAreaRead = 0x0104,
    /// Memory area transfer.
    MemoryAreaTransfer = 0x0105,
    /// Run.
    Run = 0x0401,
    /// Stop.
    Stop = 0x0402,
    /// Controller (CPU unit) data read.
    ControllerDataRead = 0x0501,
    /// Controller status read.
    ControllerStatusRead = 0x0601,
    /// Clock read.
    ClockRead = 0x0701,
    /// Clock write.
    ClockWrite = 0x0702,
}

impl CommandCode {
    /// Every supported command code.
    pub const ALL: [CommandCode; 11] = [
        CommandCode::MemoryAreaRead,
        CommandCode::MemoryAreaWrite,
        CommandCode::MemoryAreaFill,
        CommandCode::MultipleMemoryAreaRead,
        CommandCode::MemoryAreaTransfer,
        CommandCode::Run,
        CommandCode::Stop,
        CommandCode::ControllerDataRead,
        CommandCode::ControllerStatusRead,
        CommandCode::ClockRead,
        CommandCode::ClockWrite,
    ];

    /// Numeric value of the code.
    pub fn value(self) -> u16 {
        self as u16
    }

    /// Looks up a command code by value.
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.value() == value)
    }

    /// Big-endian wire bytes.
    pub fn to_bytes(self) -> [u8; 2] {
        self.value().to_be_bytes()
    }
}

/// A FINS service: body encoder plus response decoder.
pub trait Command {
    /// Decoded result of a successful response.
    type Output;

    /// Command code of this service.
    fn code(&self) -> CommandCode;

    /// Appends the command body (everything after the command code).
    fn encode_body(&self, buf: &mut Vec<u8>);

    /// Decodes the data that follows the end code of a successful response.
    fn decode_data(&self, data: &[u8]) -> Result<Self::Output>;

    /// Returns the encoded body.
    fn body(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_body(&mut buf);
        buf
    }

    /// Encodes a complete FINS frame with the given header.
    fn to_frame(&self, header: FinsHeader) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FINS_HEADER_SIZE + 2 + 16);
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(&self.code().to_bytes());
        self.encode_body(&mut frame);
        frame
    }

    /// Decodes a response: echoed command code first, then the end code,
    /// then the data.
    fn decode(&self, response: &FinsResponse) -> Result<Self::Output> {
        response.check_command(self.code().value())?;
        response.check_error()?;
        self.decode_data(&response.data)
    }
}

fn check_count(parameter: &str, count: usize) -> Result<u16> {
    if count == 0 {
        return Err(FinsError::invalid_parameter(
            parameter,
            "must be greater than 0",
        ));
    }
    if count > usize::from(MAX_WORDS_PER_COMMAND) {
        return Err(FinsError::invalid_parameter(
            parameter,
            format!("must not exceed {}", MAX_WORDS_PER_COMMAND),
        ));
    }
    Ok(count as u16)
}

fn require_plain_words(address: &Address, what: &str) -> Result<()> {
    address.require_word(what)?;
    if address.area() == MemoryArea::IR {
        return Err(FinsError::invalid_address(format!(
            "{} is not supported for the IR area",
            what
        )));
    }
    Ok(())
}

fn expect_empty(data: &[u8]) -> Result<()> {
    if !data.is_empty() {
        tracing::debug!(len = data.len(), "ignoring unexpected response data");
    }
    Ok(())
}

/// Memory area read (0x0101).
///
/// Word addresses return one value per element (index registers return two
/// words per register, high word first). Bit addresses return one value per
/// bit, `0` or `1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCommand {
    address: Address,
    count: u16,
}

impl ReadCommand {
    /// Creates a read of `count` elements (1-999) starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for a bad count and `InvalidAddress` when
    /// the range runs past the end of the area.
    pub fn new(address: Address, count: u16) -> Result<Self> {
        let count = check_count("count", usize::from(count))?;
        address.check_span(count)?;
        Ok(Self { address, count })
    }

    /// Start address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Number of elements.
    pub fn count(&self) -> u16 {
        self.count
    }
}

impl Command for ReadCommand {
    type Output = Vec<u16>;

    fn code(&self) -> CommandCode {
        CommandCode::MemoryAreaRead
    }

    fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.address.encode());
        buf.extend_from_slice(&self.count.to_be_bytes());
    }

    fn decode_data(&self, data: &[u8]) -> Result<Vec<u16>> {
        let expected = usize::from(self.count) * self.address.value_size();
        if data.len() != expected {
            return Err(FinsError::malformed_response(format!(
                "read of {} x {} expected {} data bytes, got {}",
                self.count,
                self.address,
                expected,
                data.len()
            )));
        }
        if self.address.is_bit() {
            Ok(data.iter().map(|b| u16::from(*b)).collect())
        } else {
            bytes_to_words(data)
        }
    }
}

/// Payload of a [`WriteCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteData {
    /// 16-bit words, packed big-endian.
    Words(Vec<u16>),
    /// Bits, one byte each (0x00 / 0x01).
    Bits(Vec<bool>),
}

/// Memory area write (0x0102).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteCommand {
    address: Address,
    data: WriteData,
    count: u16,
}

impl WriteCommand {
    /// Creates a write starting at `address`.
    ///
    /// The encoding follows the address: word addresses write `values` as
    /// words, bit addresses write one bit per value (non-zero = ON).
    /// Index registers take two words per register, high word first.
    ///
    /// # Errors
    ///
    /// Returns an error if `values` is empty, longer than 999 elements, runs
    /// past the end of the area, or has an odd length for IR.
    pub fn new(address: Address, values: &[u16]) -> Result<Self> {
        if address.is_bit() {
            let bits: Vec<bool> = values.iter().map(|v| *v != 0).collect();
            return Self::bits(address, &bits);
        }

        let per_element = address.area().word_size() / 2;
        if values.len() % per_element != 0 {
            return Err(FinsError::invalid_parameter(
                "data",
                format!("{} takes {} words per element", address.area(), per_element),
            ));
        }
        let count = check_count("data", values.len() / per_element)?;
        address.check_span(count)?;

        Ok(Self {
            address,
            data: WriteData::Words(values.to_vec()),
            count,
        })
    }

    /// Creates a bit write starting at a bit address.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` if `address` is not a bit address.
    pub fn bits(address: Address, values: &[bool]) -> Result<Self> {
        if !address.is_bit() {
            return Err(FinsError::invalid_address(format!(
                "bit write requires a bit address, got {}",
                address
            )));
        }
        let count = check_count("data", values.len())?;
        address.check_span(count)?;

        Ok(Self {
            address,
            data: WriteData::Bits(values.to_vec()),
            count,
        })
    }

    /// Start address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Payload.
    pub fn data(&self) -> &WriteData {
        &self.data
    }
}

impl Command for WriteCommand {
    type Output = ();

    fn code(&self) -> CommandCode {
        CommandCode::MemoryAreaWrite
    }

    fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.address.encode());
        buf.extend_from_slice(&self.count.to_be_bytes());
        match &self.data {
            WriteData::Words(words) => {
                for word in words {
                    buf.extend_from_slice(&word.to_be_bytes());
                }
            }
            WriteData::Bits(bits) => buf.extend(bits.iter().map(|bit| u8::from(*bit))),
        }
    }

    fn decode_data(&self, data: &[u8]) -> Result<()> {
        expect_empty(data)
    }
}

/// Memory area fill (0x0103): writes `value` to `count` consecutive words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillCommand {
    address: Address,
    count: u16,
    value: u16,
}

impl FillCommand {
    /// Creates a fill command.
    ///
    /// # Errors
    ///
    /// Returns an error for bit or IR addresses, a bad count, or a range past
    /// the end of the area.
    pub fn new(address: Address, count: u16, value: u16) -> Result<Self> {
        require_plain_words(&address, "fill")?;
        let count = check_count("count", usize::from(count))?;
        address.check_span(count)?;
        Ok(Self {
            address,
            count,
            value,
        })
    }
}

impl Command for FillCommand {
    type Output = ();

    fn code(&self) -> CommandCode {
        CommandCode::MemoryAreaFill
    }

    fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.address.encode());
        buf.extend_from_slice(&self.count.to_be_bytes());
        buf.extend_from_slice(&self.value.to_be_bytes());
    }

    fn decode_data(&self, data: &[u8]) -> Result<()> {
        expect_empty(data)
    }
}

/// Memory area transfer (0x0105): copies `count` words inside the PLC.
///
/// Overlapping ranges are passed through unchanged; the PLC defines the
/// result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    source: Address,
    destination: Address,
    count: u16,
}

impl TransferCommand {
    /// Creates a transfer command.
    ///
    /// # Errors
    ///
    /// Returns an error for bit or IR addresses, a bad count, or a range past
    /// the end of either area.
    pub fn new(source: Address, destination: Address, count: u16) -> Result<Self> {
        require_plain_words(&source, "transfer")?;
        require_plain_words(&destination, "transfer")?;
        let count = check_count("count", usize::from(count))?;
        source.check_span(count)?;
        destination.check_span(count)?;
        Ok(Self {
            source,
            destination,
            count,
        })
    }
}

impl Command for TransferCommand {
    type Output = ();

    fn code(&self) -> CommandCode {
        CommandCode::MemoryAreaTransfer
    }

    fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.source.encode());
        buf.extend_from_slice(&self.destination.encode());
        buf.extend_from_slice(&self.count.to_be_bytes());
    }

    fn decode_data(&self, data: &[u8]) -> Result<()> {
        expect_empty(data)
    }
}

/// One element of a multiple memory area read result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MultiReadValue {
    /// Bit address value.
    Bit(bool),
    /// Word address value.
    Word(u16),
    /// Index register value.
    DoubleWord(u32),
}

impl MultiReadValue {
    /// Bit value, if this element came from a bit address.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            MultiReadValue::Bit(bit) => Some(bit),
            _ => None,
        }
    }

    /// Word value, if this element came from a word address.
    pub fn as_u16(self) -> Option<u16> {
        match self {
            MultiReadValue::Word(word) => Some(word),
            _ => None,
        }
    }

    /// Value widened to 32 bits.
    pub fn as_u32(self) -> u32 {
        match self {
            MultiReadValue::Bit(bit) => u32::from(bit),
            MultiReadValue::Word(word) => u32::from(word),
            MultiReadValue::DoubleWord(value) => value,
        }
    }
}

/// Multiple memory area read (0x0104).
///
/// Results are positional: element `i` of the output belongs to address `i`
/// of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleReadCommand {
    addresses: Vec<Address>,
}

impl MultipleReadCommand {
    /// Creates a multiple read of up to 167 addresses.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `addresses` is empty or too long.
    pub fn new(addresses: Vec<Address>) -> Result<Self> {
        if addresses.is_empty() {
            return Err(FinsError::invalid_parameter(
                "addresses",
                "must not be empty",
            ));
        }
        if addresses.len() > MAX_MULTI_READ_ADDRESSES {
            return Err(FinsError::invalid_parameter(
                "addresses",
                format!("must not exceed {}", MAX_MULTI_READ_ADDRESSES),
            ));
        }
        Ok(Self { addresses })
    }

    /// Requested addresses, in order.
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }
}

impl Command for MultipleReadCommand {
    type Output = Vec<MultiReadValue>;

    fn code(&self) -> CommandCode {
        CommandCode::MultipleMemoryAreaRead
    }

    fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.addresses.len() * ADDRESS_SIZE);
        for address in &self.addresses {
            buf.extend_from_slice(&address.encode());
        }
    }

    fn decode_data(&self, data: &[u8]) -> Result<Vec<MultiReadValue>> {
        let mut values = Vec::with_capacity(self.addresses.len());
        let mut pos = 0;

        for (index, address) in self.addresses.iter().enumerate() {
            let size = address.value_size();
            let element = data.get(pos..pos + 1 + size).ok_or_else(|| {
                FinsError::malformed_response(format!(
                    "multiple read truncated at element {} ({})",
                    index, address
                ))
            })?;

            if element[0] != address.area_code() {
                return Err(FinsError::malformed_response(format!(
                    "element {} ({}): expected area code 0x{:02X}, got 0x{:02X}",
                    index,
                    address,
                    address.area_code(),
                    element[0]
                )));
            }

            let raw = &element[1..];
            let value = match *raw {
                [bit] => MultiReadValue::Bit(bit != 0),
                [a, b, c, d] => MultiReadValue::DoubleWord(u32::from_be_bytes([a, b, c, d])),
                _ => MultiReadValue::Word(u16::from_be_bytes([raw[0], raw[1]])),
            };
            values.push(value);
            pos += 1 + size;
        }

        if pos != data.len() {
            return Err(FinsError::malformed_response(format!(
                "multiple read has {} trailing bytes",
                data.len() - pos
            )));
        }

        Ok(values)
    }
}
