//! PLC clock read and write.
//!
//! The clock travels as 7 BCD bytes: year, month, day, hour, minute, second,
//! day of week. Two-digit years 00-97 map to 2000-2097 and 98-99 to
//! 1998-1999; day of week is 0 (Sunday) to 6.
//!
//! # Example
//!
//! ```
//! use omron_fins_client::ClockTime;
//!
//! let time = ClockTime::new(2024, 3, 15, 14, 30, 45, 5).unwrap();
//! assert_eq!(time.to_bcd(), [0x24, 0x03, 0x15, 0x14, 0x30, 0x45, 0x05]);
//! assert_eq!(ClockTime::from_bcd(&time.to_bcd()).unwrap(), time);
//! ```

use crate::command::{Command, CommandCode};
use crate::error::{FinsError, Result};

/// Encoded clock size in bytes.
pub const CLOCK_SIZE: usize = 7;

/// Earliest representable year.
pub const MIN_YEAR: u16 = 1998;
/// Latest representable year.
pub const MAX_YEAR: u16 = 2097;

/// A validated PLC clock value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockTime {
    /// Four-digit year (1998-2097).
    pub year: u16,
    /// Month (1-12).
    pub month: u8,
    /// Day of month (1-31).
    pub day: u8,
    /// Hour (0-23).
    pub hour: u8,
    /// Minute (0-59).
    pub minute: u8,
    /// Second (0-59).
    pub second: u8,
    /// Day of week, 0 = Sunday (0-6).
    pub day_of_week: u8,
}

impl ClockTime {
    /// Creates a clock value, validating every field.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::InvalidParameter` naming the first field out of
    /// range.
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        day_of_week: u8,
    ) -> Result<Self> {
        let time = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            day_of_week,
        };
        time.validate()?;
        Ok(time)
    }

    /// Checks every field against its range.
    ///
    /// Fields are public, so values built by hand are re-checked before
    /// encoding.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(out_of_range("year", self.year, MIN_YEAR, MAX_YEAR));
        }
        let fields = [
            ("month", self.month, 1, 12),
            ("day", self.day, 1, 31),
            ("hour", self.hour, 0, 23),
            ("minute", self.minute, 0, 59),
            ("second", self.second, 0, 59),
            ("day_of_week", self.day_of_week, 0, 6),
        ];
        for (name, value, min, max) in fields {
            if !(min..=max).contains(&value) {
                return Err(out_of_range(name, value, min, max));
            }
        }
        Ok(())
    }

    /// Encodes the clock as 7 BCD bytes.
    pub fn to_bcd(&self) -> [u8; CLOCK_SIZE] {
        [
            to_bcd((self.year % 100) as u8),
            to_bcd(self.month),
            to_bcd(self.day),
            to_bcd(self.hour),
            to_bcd(self.minute),
            to_bcd(self.second),
            to_bcd(self.day_of_week),
        ]
    }

    /// Decodes 7 BCD bytes.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::MalformedResponse` for short input, invalid BCD
    /// digits or out-of-range fields.
    pub fn from_bcd(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CLOCK_SIZE {
            return Err(FinsError::malformed_response(format!(
                "clock data needs {} bytes, got {}",
                CLOCK_SIZE,
                bytes.len()
            )));
        }

        let mut fields = [0u8; CLOCK_SIZE];
        for (field, byte) in fields.iter_mut().zip(bytes) {
            *field = from_bcd(*byte).ok_or_else(|| {
                FinsError::malformed_response(format!("invalid BCD byte 0x{:02X} in clock", byte))
            })?;
        }

        let [yy, month, day, hour, minute, second, day_of_week] = fields;
        let year = if yy >= 98 {
            1900 + u16::from(yy)
        } else {
            2000 + u16::from(yy)
        };

        Self::new(year, month, day, hour, minute, second, day_of_week).map_err(|e| {
            FinsError::malformed_response(format!("clock value out of range: {}", e))
        })
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Reads the PLC clock (0x0701).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockReadCommand;

impl Command for ClockReadCommand {
    type Output = ClockTime;

    fn code(&self) -> CommandCode {
        CommandCode::ClockRead
    }

    fn encode_body(&self, _buf: &mut Vec<u8>) {}

    fn decode_data(&self, data: &[u8]) -> Result<ClockTime> {
        ClockTime::from_bcd(data)
    }
}

/// Sets the PLC clock (0x0702).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockWriteCommand {
    time: ClockTime,
}

impl ClockWriteCommand {
    /// Creates a clock write.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::InvalidParameter` if any field is out of range.
    pub fn new(time: ClockTime) -> Result<Self> {
        time.validate()?;
        Ok(Self { time })
    }
}

impl Command for ClockWriteCommand {
    type Output = ();

    fn code(&self) -> CommandCode {
        CommandCode::ClockWrite
    }

    fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.time.to_bcd());
    }

    fn decode_data(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

fn from_bcd(byte: u8) -> Option<u8> {
    let (hi, lo) = (byte >> 4, byte & 0x0F);
    (hi <= 9 && lo <= 9).then_some(hi * 10 + lo)
}

fn out_of_range<T: std::fmt::Display>(field: &str, value: T, min: T, max: T) -> FinsError {
    FinsError::invalid_parameter(field, format!("{} is outside {}-{}", value, min, max))
}
