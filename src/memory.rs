//! Memory area definitions for the FINS protocol.
//!
//! This module defines the [`MemoryArea`] enum which represents the different
//! memory areas of CS/CJ-series Omron PLCs, together with their FINS area
//! codes and valid word ranges.
//!
//! # Memory Areas Overview
//!
//! | Area | Description | Words | Word code | Bit code |
//! |------|-------------|-------|:---------:|:--------:|
//! | CIO | Core I/O | 0-6143 | 0xB0 | 0x30 |
//! | WR | Work area | 0-511 | 0xB1 | 0x31 |
//! | HR | Holding area | 0-511 | 0xB2 | 0x32 |
//! | AR | Auxiliary area | 0-959 | 0xB3 | 0x33 |
//! | DM | Data Memory | 0-32767 | 0x82 | 0x02 |
//! | EM | Extended Memory (bank 0) | 0-32767 | 0xA0 | 0x20 |
//! | TIM | Timer present values | 0-4095 | 0x89 | ✗ |
//! | CNT | Counter present values | 0-4095 | 0x89 (+0x8000) | ✗ |
//! | DR | Data registers | 0-15 | 0xBC | ✗ |
//! | IR | Index registers (32-bit) | 0-15 | 0xDC | ✗ |
//!
//! # Example
//!
//! ```
//! use omron_fins_client::MemoryArea;
//!
//! assert!(MemoryArea::CIO.supports_bit_access());
//! assert!(!MemoryArea::CNT.supports_bit_access());
//! assert_eq!(MemoryArea::DM.max_word(), 32767);
//! assert_eq!("hr".parse::<MemoryArea>().unwrap(), MemoryArea::HR);
//! ```

use std::str::FromStr;

use crate::error::FinsError;

/// Wire offset of the counter region inside the shared TIM/CNT area code.
pub(crate) const COUNTER_WIRE_OFFSET: u16 = 0x8000;

/// Memory areas available in CS/CJ-series Omron PLCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryArea {
    /// Core I/O area.
    CIO,
    /// Work area.
    WR,
    /// Holding area, retains values on power loss.
    HR,
    /// Auxiliary area, system status and control.
    AR,
    /// Data Memory.
    DM,
    /// Extended Memory, bank 0.
    EM,
    /// Timer present values.
    TIM,
    /// Counter present values.
    CNT,
    /// Data registers.
    DR,
    /// Index registers, 32 bits each.
    IR,
}

impl MemoryArea {
    /// All memory areas, in declaration order.
    pub const ALL: [MemoryArea; 10] = [
        MemoryArea::CIO,
        MemoryArea::WR,
        MemoryArea::HR,
        MemoryArea::AR,
        MemoryArea::DM,
        MemoryArea::EM,
        MemoryArea::TIM,
        MemoryArea::CNT,
        MemoryArea::DR,
        MemoryArea::IR,
    ];

    /// Returns the FINS area code for word access.
    pub fn word_code(self) -> u8 {
        match self {
            MemoryArea::CIO => 0xB0,
            MemoryArea::WR => 0xB1,
            MemoryArea::HR => 0xB2,
            MemoryArea::AR => 0xB3,
            MemoryArea::DM => 0x82,
            MemoryArea::EM => 0xA0,
            MemoryArea::TIM | MemoryArea::CNT => 0x89,
            MemoryArea::DR => 0xBC,
            MemoryArea::IR => 0xDC,
        }
    }

    /// Returns the FINS area code for bit access, or `None` if the area is
    /// word-only.
    pub fn bit_code(self) -> Option<u8> {
        match self {
            MemoryArea::CIO => Some(0x30),
            MemoryArea::WR => Some(0x31),
            MemoryArea::HR => Some(0x32),
            MemoryArea::AR => Some(0x33),
            MemoryArea::DM => Some(0x02),
            MemoryArea::EM => Some(0x20),
            MemoryArea::TIM | MemoryArea::CNT | MemoryArea::DR | MemoryArea::IR => None,
        }
    }

    /// Returns whether this memory area supports bit access.
    pub fn supports_bit_access(self) -> bool {
        self.bit_code().is_some()
    }

    /// Highest valid word offset.
    pub fn max_word(self) -> u16 {
        match self {
            MemoryArea::CIO => 6143,
            MemoryArea::WR | MemoryArea::HR => 511,
            MemoryArea::AR => 959,
            MemoryArea::DM | MemoryArea::EM => 32767,
            MemoryArea::TIM | MemoryArea::CNT => 4095,
            MemoryArea::DR | MemoryArea::IR => 15,
        }
    }

    /// Bytes per element for word access. Index registers are 32-bit.
    pub fn word_size(self) -> usize {
        match self {
            MemoryArea::IR => 4,
            _ => 2,
        }
    }

    /// Offset added to the word number on the wire.
    pub(crate) fn wire_offset(self) -> u16 {
        match self {
            MemoryArea::CNT => COUNTER_WIRE_OFFSET,
            _ => 0,
        }
    }

    /// Canonical area name.
    pub fn name(self) -> &'static str {
        match self {
            MemoryArea::CIO => "CIO",
            MemoryArea::WR => "WR",
            MemoryArea::HR => "HR",
            MemoryArea::AR => "AR",
            MemoryArea::DM => "DM",
            MemoryArea::EM => "EM",
            MemoryArea::TIM => "TIM",
            MemoryArea::CNT => "CNT",
            MemoryArea::DR => "DR",
            MemoryArea::IR => "IR",
        }
    }
}

impl FromStr for MemoryArea {
    type Err = FinsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemoryArea::ALL
            .into_iter()
            .find(|area| area.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| FinsError::invalid_address(format!("unknown memory area '{}'", s)))
    }
}

impl std::fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_word_codes() {
        assert_eq!(MemoryArea::CIO.word_code(), 0xB0);
        assert_eq!(MemoryArea::WR.word_code(), 0xB1);
        assert_eq!(MemoryArea::HR.word_code(), 0xB2);
        assert_eq!(MemoryArea::AR.word_code(), 0xB3);
        assert_eq!(MemoryArea::DM.word_code(), 0x82);
        assert_eq!(MemoryArea::EM.word_code(), 0xA0);
        assert_eq!(MemoryArea::TIM.word_code(), 0x89);
        assert_eq!(MemoryArea::CNT.word_code(), 0x89);
        assert_eq!(MemoryArea::DR.word_code(), 0xBC);
        assert_eq!(MemoryArea::IR.word_code(), 0xDC);
    }

    #[test]
    fn test_bit_codes() {
        assert_eq!(MemoryArea::CIO.bit_code(), Some(0x30));
        assert_eq!(MemoryArea::DM.bit_code(), Some(0x02));
        assert_eq!(MemoryArea::EM.bit_code(), Some(0x20));
        for area in [MemoryArea::TIM, MemoryArea::CNT, MemoryArea::DR, MemoryArea::IR] {
            assert_eq!(area.bit_code(), None);
            assert!(!area.supports_bit_access());
        }
    }

    #[test]
    fn test_codes_distinct_with_wire_offset() {
        let mut seen = HashSet::new();
        for area in MemoryArea::ALL {
            assert!(seen.insert((area.word_code(), area.wire_offset())));
            if let Some(code) = area.bit_code() {
                assert!(seen.insert((code, 0xFFFF)));
                assert_ne!(code, area.word_code());
            }
        }
    }

    #[test]
    fn test_from_str_case_insensitive() {
        assert_eq!("cio".parse::<MemoryArea>().unwrap(), MemoryArea::CIO);
        assert_eq!("Tim".parse::<MemoryArea>().unwrap(), MemoryArea::TIM);
        assert!("XX".parse::<MemoryArea>().is_err());
        assert!("".parse::<MemoryArea>().is_err());
    }

    #[test]
    fn test_display() {
        for area in MemoryArea::ALL {
            assert_eq!(area.to_string().parse::<MemoryArea>().unwrap(), area);
        }
        assert_eq!(MemoryArea::DM.to_string(), "DM");
    }
}
