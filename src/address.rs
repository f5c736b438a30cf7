//! Symbolic PLC addresses.
//!
//! An [`Address`] names one word or one bit inside a [`MemoryArea`]. It is
//! usually created by parsing a token of the form `AREA<word>[.<bit>]`:
//!
//! | Token | Area | Word | Bit |
//! |-------|------|------|-----|
//! | `DM1000` | DM | 1000 | - |
//! | `CIO100.05` | CIO | 100 | 5 |
//! | `wr200` | WR | 200 | - |
//!
//! Every `Address` is validated on construction, so command builders never
//! repeat range checks. On the wire an address takes 4 bytes:
//! `[area_code, word_hi, word_lo, bit]`, where the area code is the word or
//! bit access code depending on whether a bit is present.
//!
//! # Example
//!
//! ```
//! use omron_fins_client::{Address, MemoryArea};
//!
//! let addr: Address = "CIO100.05".parse().unwrap();
//! assert_eq!(addr.area(), MemoryArea::CIO);
//! assert_eq!(addr.word(), 100);
//! assert_eq!(addr.bit(), Some(5));
//! assert_eq!(addr.encode(), [0x30, 0x00, 0x64, 0x05]);
//! assert_eq!(addr.to_string(), "CIO100.05");
//!
//! assert!("DM32768".parse::<Address>().is_err());
//! assert!("CNT100.05".parse::<Address>().is_err());
//! ```

use std::str::FromStr;

use crate::error::{FinsError, Result};
use crate::memory::{MemoryArea, COUNTER_WIRE_OFFSET};

/// Size of an encoded address in bytes.
pub const ADDRESS_SIZE: usize = 4;

/// Highest valid bit position within a word.
pub const MAX_BIT: u8 = 15;

/// A validated word or bit address inside a memory area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    area: MemoryArea,
    word: u16,
    bit: Option<u8>,
}

impl Address {
    /// Creates a word address.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::InvalidAddress` if `word` is outside the area range.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins_client::{Address, MemoryArea};
    ///
    /// let addr = Address::new_word(MemoryArea::DM, 1001).unwrap();
    /// assert_eq!(addr.encode(), [0x82, 0x03, 0xE9, 0x00]);
    /// ```
    pub fn new_word(area: MemoryArea, word: u16) -> Result<Self> {
        check_word(area, word)?;
        Ok(Self {
            area,
            word,
            bit: None,
        })
    }

    /// Creates a bit address.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::InvalidAddress` if the area has no bit access, the
    /// word is out of range, or `bit` is greater than 15.
    pub fn new_bit(area: MemoryArea, word: u16, bit: u8) -> Result<Self> {
        if !area.supports_bit_access() {
            return Err(FinsError::invalid_address(format!(
                "{} area does not support bit access",
                area
            )));
        }
        if bit > MAX_BIT {
            return Err(FinsError::invalid_address(format!(
                "bit must be 0-{}, got {}",
                MAX_BIT, bit
            )));
        }
        check_word(area, word)?;
        Ok(Self {
            area,
            word,
            bit: Some(bit),
        })
    }

    /// Parses a symbolic address such as `DM1000` or `CIO100.05`.
    ///
    /// The area name is case-insensitive and surrounding whitespace is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `FinsError::InvalidAddress` for unknown areas, malformed tokens
    /// and out-of-range word or bit offsets.
    pub fn parse(token: &str) -> Result<Self> {
        let trimmed = token.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (name, rest) = trimmed.split_at(split);

        if name.is_empty() {
            return Err(FinsError::invalid_address(format!(
                "missing memory area in '{}'",
                token
            )));
        }
        let area: MemoryArea = name.parse()?;

        let (word_part, bit_part) = match rest.split_once('.') {
            Some((word, bit)) => (word, Some(bit)),
            None => (rest, None),
        };

        let word = parse_digits(word_part, token, "word")?;
        let word = u16::try_from(word)
            .ok()
            .filter(|w| *w <= area.max_word())
            .ok_or_else(|| out_of_range(area, word))?;

        match bit_part {
            None => Self::new_word(area, word),
            Some(bit) => {
                let bit = parse_digits(bit, token, "bit")?;
                let bit = u8::try_from(bit).map_err(|_| {
                    FinsError::invalid_address(format!("bit must be 0-{}, got {}", MAX_BIT, bit))
                })?;
                Self::new_bit(area, word, bit)
            }
        }
    }

    /// Decodes a 4-byte address field.
    ///
    /// `hint` restricts the accepted area; without it the area is looked up
    /// from the code (TIM and CNT are told apart by the counter wire offset).
    ///
    /// # Errors
    ///
    /// Returns `FinsError::InvalidAddress` for unknown codes, codes that do
    /// not belong to the hinted area, out-of-range words, and a non-zero bit
    /// byte on a word code.
    ///
    /// # Example
    ///
    /// ```
    /// use omron_fins_client::{Address, MemoryArea};
    ///
    /// let addr = Address::decode([0x89, 0x80, 0x0A, 0x00], None).unwrap();
    /// assert_eq!(addr.area(), MemoryArea::CNT);
    /// assert_eq!(addr.word(), 10);
    /// ```
    pub fn decode(bytes: [u8; ADDRESS_SIZE], hint: Option<MemoryArea>) -> Result<Self> {
        let [code, hi, lo, bit] = bytes;
        let raw = u16::from_be_bytes([hi, lo]);

        let (area, is_bit) = match hint {
            Some(area) if area.word_code() == code => (area, false),
            Some(area) if area.bit_code() == Some(code) => (area, true),
            Some(area) => {
                return Err(FinsError::invalid_address(format!(
                    "area code 0x{:02X} does not belong to {}",
                    code, area
                )))
            }
            None => area_for_code(code, raw).ok_or_else(|| {
                FinsError::invalid_address(format!("unknown area code 0x{:02X}", code))
            })?,
        };

        let word = raw.checked_sub(area.wire_offset()).ok_or_else(|| {
            FinsError::invalid_address(format!(
                "wire offset 0x{:04X} is outside the {} area",
                raw, area
            ))
        })?;

        if is_bit {
            Self::new_bit(area, word, bit)
        } else if bit != 0 {
            Err(FinsError::invalid_address(format!(
                "word access code 0x{:02X} with non-zero bit {}",
                code, bit
            )))
        } else {
            Self::new_word(area, word)
        }
    }

    /// Serializes the address to its 4-byte wire form.
    pub fn encode(&self) -> [u8; ADDRESS_SIZE] {
        let [hi, lo] = (self.word + self.area.wire_offset()).to_be_bytes();
        [self.area_code(), hi, lo, self.bit.unwrap_or(0)]
    }

    /// Area code used on the wire: the bit code for bit addresses, the word
    /// code otherwise.
    pub fn area_code(&self) -> u8 {
        match (self.bit, self.area.bit_code()) {
            (Some(_), Some(code)) => code,
            _ => self.area.word_code(),
        }
    }

    /// Memory area.
    pub fn area(&self) -> MemoryArea {
        self.area
    }

    /// Word offset within the area.
    pub fn word(&self) -> u16 {
        self.word
    }

    /// Bit position, `None` for word access.
    pub fn bit(&self) -> Option<u8> {
        self.bit
    }

    /// Returns whether this is a bit address.
    pub fn is_bit(&self) -> bool {
        self.bit.is_some()
    }

    /// Bytes per element transferred for this address.
    pub fn value_size(&self) -> usize {
        if self.is_bit() {
            1
        } else {
            self.area.word_size()
        }
    }

    /// Checks that `count` consecutive elements starting here stay inside
    /// the area. `count` must be at least 1.
    pub(crate) fn check_span(&self, count: u16) -> Result<()> {
        let count = u32::from(count.max(1));
        let (last, max) = match self.bit {
            None => (
                u32::from(self.word) + count - 1,
                u32::from(self.area.max_word()),
            ),
            Some(bit) => (
                u32::from(self.word) * 16 + u32::from(bit) + count - 1,
                u32::from(self.area.max_word()) * 16 + u32::from(MAX_BIT),
            ),
        };
        if last > max {
            return Err(FinsError::invalid_address(format!(
                "{} elements from {} run past the end of the {} area",
                count, self, self.area
            )));
        }
        Ok(())
    }

    pub(crate) fn require_word(&self, what: &str) -> Result<()> {
        if self.is_bit() {
            return Err(FinsError::invalid_address(format!(
                "{} requires a word address, got {}",
                what, self
            )));
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = FinsError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.bit {
            Some(bit) => write!(f, "{}{}.{:02}", self.area, self.word, bit),
            None => write!(f, "{}{}", self.area, self.word),
        }
    }
}

/// Conversion into a validated [`Address`].
///
/// Lets client operations accept either a parsed `Address` or a token.
pub trait IntoAddress {
    /// Performs the conversion.
    fn into_address(self) -> Result<Address>;
}

impl IntoAddress for Address {
    fn into_address(self) -> Result<Address> {
        Ok(self)
    }
}

impl IntoAddress for &Address {
    fn into_address(self) -> Result<Address> {
        Ok(*self)
    }
}

impl IntoAddress for &str {
    fn into_address(self) -> Result<Address> {
        Address::parse(self)
    }
}

impl IntoAddress for String {
    fn into_address(self) -> Result<Address> {
        Address::parse(&self)
    }
}

impl IntoAddress for &String {
    fn into_address(self) -> Result<Address> {
        Address::parse(self)
    }
}

fn check_word(area: MemoryArea, word: u16) -> Result<()> {
    if word > area.max_word() {
        return Err(out_of_range(area, u32::from(word)));
    }
    Ok(())
}

fn out_of_range(area: MemoryArea, word: u32) -> FinsError {
    FinsError::invalid_address(format!(
        "word {} out of range for {} (0-{})",
        word,
        area,
        area.max_word()
    ))
}

fn parse_digits(digits: &str, token: &str, what: &str) -> Result<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FinsError::invalid_address(format!(
            "malformed {} in '{}'",
            what, token
        )));
    }
    // Only overflow can fail here; report it as out of range.
    digits.parse::<u32>().map_err(|_| {
        FinsError::invalid_address(format!("{} offset too large in '{}'", what, token))
    })
}

fn area_for_code(code: u8, raw: u16) -> Option<(MemoryArea, bool)> {
    if code == MemoryArea::TIM.word_code() {
        let area = if raw >= COUNTER_WIRE_OFFSET {
            MemoryArea::CNT
        } else {
            MemoryArea::TIM
        };
        return Some((area, false));
    }
    MemoryArea::ALL.into_iter().find_map(|area| {
        if area.word_code() == code {
            Some((area, false))
        } else if area.bit_code() == Some(code) {
            Some((area, true))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_examples() {
        let cases = [
            ("DM1000", MemoryArea::DM, 1000, None),
            ("CIO100.05", MemoryArea::CIO, 100, Some(5)),
            ("WR200", MemoryArea::WR, 200, None),
            ("HR300.15", MemoryArea::HR, 300, Some(15)),
            ("DM0", MemoryArea::DM, 0, None),
            ("CIO0.00", MemoryArea::CIO, 0, Some(0)),
            ("  em12 ", MemoryArea::EM, 12, None),
            ("cnt7", MemoryArea::CNT, 7, None),
        ];
        for (token, area, word, bit) in cases {
            let addr = Address::parse(token).unwrap();
            assert_eq!(addr.area(), area, "{}", token);
            assert_eq!(addr.word(), word, "{}", token);
            assert_eq!(addr.bit(), bit, "{}", token);
        }
    }

    #[test]
    fn test_parse_rejects() {
        let invalid = [
            "",
            "DM",
            "1000",
            "INVALID1000",
            "DM1000.16",
            "DM1000.99",
            "DM32768",
            "CNT100.05",
            "TIM1.00",
            "IR0.1",
            "CIO100.16",
            "DM10x",
            "DM10.",
            "DM10.1.2",
            "DM-1",
            "DM99999999999",
            "DM.5",
        ];
        for token in invalid {
            let err = Address::parse(token).unwrap_err();
            assert!(
                matches!(err, FinsError::InvalidAddress { .. }),
                "{} -> {:?}",
                token,
                err
            );
        }
    }

    #[test]
    fn test_boundaries() {
        assert!(Address::parse("DM32767").is_ok());
        assert!(Address::parse("DM32768").is_err());
        assert!(Address::parse("CIO6143.15").is_ok());
        assert!(Address::parse("CIO6144").is_err());
        assert!(Address::parse("DR15").is_ok());
        assert!(Address::parse("DR16").is_err());
    }

    #[test]
    fn test_encode() {
        let addr = Address::parse("DM1001").unwrap();
        assert_eq!(addr.encode(), [0x82, 0x03, 0xE9, 0x00]);

        let addr = Address::parse("CIO100.05").unwrap();
        assert_eq!(addr.encode(), [0x30, 0x00, 0x64, 0x05]);

        let addr = Address::parse("CNT10").unwrap();
        assert_eq!(addr.encode(), [0x89, 0x80, 0x0A, 0x00]);

        let addr = Address::parse("TIM10").unwrap();
        assert_eq!(addr.encode(), [0x89, 0x00, 0x0A, 0x00]);
    }

    #[test]
    fn test_round_trip_all_areas() {
        for area in MemoryArea::ALL {
            for word in [0, 1, area.max_word() / 2, area.max_word()] {
                let mut tokens = vec![format!("{}{}", area, word)];
                if area.supports_bit_access() {
                    tokens.push(format!("{}{}.00", area, word));
                    tokens.push(format!("{}{}.15", area, word));
                }
                for token in tokens {
                    let parsed = Address::parse(&token).unwrap();
                    let bytes = parsed.encode();
                    let decoded = Address::decode(bytes, None).unwrap();
                    assert_eq!(decoded, parsed, "{}", token);
                    assert_eq!(decoded.encode(), bytes, "{}", token);
                    assert_eq!(Address::decode(bytes, Some(area)).unwrap(), parsed);
                    assert_eq!(Address::parse(&parsed.to_string()).unwrap(), parsed);
                }
            }
        }
    }

    #[test]
    fn test_decode_rejects() {
        // Unknown code
        assert!(Address::decode([0x7F, 0x00, 0x00, 0x00], None).is_err());
        // Wrong hint
        assert!(Address::decode([0x82, 0x00, 0x01, 0x00], Some(MemoryArea::HR)).is_err());
        // Word code with bit byte set
        assert!(Address::decode([0x82, 0x00, 0x01, 0x03], None).is_err());
        // Out of range word
        assert!(Address::decode([0xB1, 0x02, 0x00, 0x00], None).is_err());
        // Counter offset below the counter region
        assert!(Address::decode([0x89, 0x00, 0x01, 0x00], Some(MemoryArea::CNT)).is_err());
        // Timer hint with a counter wire offset
        assert!(Address::decode([0x89, 0x80, 0x01, 0x00], Some(MemoryArea::TIM)).is_err());
    }

    #[test]
    fn test_check_span() {
        let addr = Address::parse("DM32760").unwrap();
        assert!(addr.check_span(8).is_ok());
        assert!(addr.check_span(9).is_err());

        let bit = Address::parse("WR511.14").unwrap();
        assert!(bit.check_span(2).is_ok());
        assert!(bit.check_span(3).is_err());
    }

    #[test]
    fn test_into_address() {
        assert!("DM5".into_address().is_ok());
        assert!(String::from("WR1.01").into_address().is_ok());
        let addr = Address::new_word(MemoryArea::HR, 3).unwrap();
        assert_eq!((&addr).into_address().unwrap(), addr);
        assert!("bogus".into_address().is_err());
    }

    #[test]
    fn test_value_size() {
        assert_eq!(Address::parse("IR3").unwrap().value_size(), 4);
        assert_eq!(Address::parse("DM3").unwrap().value_size(), 2);
        assert_eq!(Address::parse("DM3.01").unwrap().value_size(), 1);
    }
}
