//! Conversions between PLC words and Rust values.
//!
//! CS/CJ PLCs store multi-word values with the least significant word at
//! the lowest address, and strings with the first character in the low byte
//! of each word. These helpers apply that layout; the typed client methods
//! (`read_f32`, `write_string`, ...) are thin wrappers over them.
//!
//! # Example
//!
//! ```
//! use omron_fins_client::utils::{f32_to_words, words_to_f32, get_bit, set_bit};
//!
//! let words = f32_to_words(1.5);
//! assert_eq!(words, [0x0000, 0x3FC0]);
//! assert_eq!(words_to_f32(words), 1.5);
//!
//! let flags = set_bit(0, 3, true);
//! assert!(get_bit(flags, 3));
//! ```

use crate::error::{FinsError, Result};

/// Returns bit `bit` (0 = LSB) of `value`.
#[inline]
pub fn get_bit(value: u16, bit: u8) -> bool {
    (value >> (bit & 0x0F)) & 1 != 0
}

/// Returns `value` with bit `bit` set to `state`.
#[inline]
pub fn set_bit(value: u16, bit: u8, state: bool) -> u16 {
    let mask = 1u16 << (bit & 0x0F);
    if state {
        value | mask
    } else {
        value & !mask
    }
}

/// Expands a word into its 16 bits, LSB first.
pub fn word_to_bits(value: u16) -> [bool; 16] {
    std::array::from_fn(|bit| get_bit(value, bit as u8))
}

/// Packs 16 bits, LSB first, into a word.
pub fn bits_to_word(bits: &[bool; 16]) -> u16 {
    bits.iter()
        .enumerate()
        .fold(0, |word, (bit, on)| set_bit(word, bit as u8, *on))
}

/// Low word first.
pub fn u32_to_words(value: u32) -> [u16; 2] {
    [value as u16, (value >> 16) as u16]
}

/// Inverse of [`u32_to_words`].
pub fn words_to_u32(words: [u16; 2]) -> u32 {
    u32::from(words[0]) | (u32::from(words[1]) << 16)
}

/// Splits an `i32` (DINT) into two words, low word first.
pub fn i32_to_words(value: i32) -> [u16; 2] {
    u32_to_words(value as u32)
}

/// Joins two words, low word first, into an `i32`.
pub fn words_to_i32(words: [u16; 2]) -> i32 {
    words_to_u32(words) as i32
}

/// Splits an `f32` (REAL) into two words, low word first.
pub fn f32_to_words(value: f32) -> [u16; 2] {
    u32_to_words(value.to_bits())
}

/// Joins two words, low word first, into an `f32`.
pub fn words_to_f32(words: [u16; 2]) -> f32 {
    f32::from_bits(words_to_u32(words))
}

/// Splits an `f64` (LREAL) into four words, least significant first.
pub fn f64_to_words(value: f64) -> [u16; 4] {
    let bits = value.to_bits();
    std::array::from_fn(|i| (bits >> (16 * i)) as u16)
}

/// Joins four words, least significant first, into an `f64`.
pub fn words_to_f64(words: [u16; 4]) -> f64 {
    let bits = words
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, word)| acc | (u64::from(*word) << (16 * i)));
    f64::from_bits(bits)
}

/// Packs an ASCII string into words, first character in the low byte. An odd
/// trailing character is padded with 0x00.
///
/// # Errors
///
/// Returns `InvalidParameter` for empty or non-ASCII strings.
pub fn string_to_words(value: &str) -> Result<Vec<u16>> {
    if value.is_empty() {
        return Err(FinsError::invalid_parameter("value", "string cannot be empty"));
    }
    if !value.is_ascii() {
        return Err(FinsError::invalid_parameter("value", "string must be ASCII"));
    }
    Ok(value
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let low = u16::from(pair[0]);
            let high = pair.get(1).copied().map(u16::from).unwrap_or(0);
            (high << 8) | low
        })
        .collect())
}

/// Unpacks words into a string, first character in the low byte. Trailing
/// NUL bytes are dropped.
pub fn words_to_string(words: &[u16]) -> String {
    let mut bytes: Vec<u8> = words
        .iter()
        .flat_map(|word| [(*word & 0xFF) as u8, (*word >> 8) as u8])
        .collect();
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Copies a fixed-size array out of a word slice.
pub(crate) fn take_words<const N: usize>(words: &[u16]) -> Result<[u16; N]> {
    words.get(..N).and_then(|w| w.try_into().ok()).ok_or_else(|| {
        FinsError::malformed_response(format!("expected {} words, got {}", N, words.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits() {
        let value = 0b1010_0101_1100_0011;
        assert!(get_bit(value, 0));
        assert!(!get_bit(value, 2));
        assert!(get_bit(value, 15));
        assert_eq!(set_bit(value, 2, true), 0b1010_0101_1100_0111);
        assert_eq!(set_bit(value, 0, false), 0b1010_0101_1100_0010);
        assert_eq!(bits_to_word(&word_to_bits(value)), value);
    }

    #[test]
    fn test_f32_layout() {
        // 25.5 = 0x41CC0000
        assert_eq!(f32_to_words(25.5), [0x0000, 0x41CC]);
        assert_eq!(words_to_f32([0x0000, 0x41CC]), 25.5);
    }

    #[test]
    fn test_f64_layout() {
        // 1.0 = 0x3FF0000000000000
        assert_eq!(f64_to_words(1.0), [0, 0, 0, 0x3FF0]);
        assert_eq!(words_to_f64([0, 0, 0, 0x3FF0]), 1.0);
        let pi = std::f64::consts::PI;
        assert_eq!(words_to_f64(f64_to_words(pi)), pi);
    }

    #[test]
    fn test_i32_layout() {
        assert_eq!(i32_to_words(0x0001_0002), [0x0002, 0x0001]);
        assert_eq!(i32_to_words(-1), [0xFFFF, 0xFFFF]);
        assert_eq!(words_to_i32([0xFFFE, 0xFFFF]), -2);
    }

    #[test]
    fn test_string_packing() {
        assert_eq!(string_to_words("Hi").unwrap(), vec![0x6948]);
        assert_eq!(
            string_to_words("Hello").unwrap(),
            vec![0x6548, 0x6C6C, 0x006F]
        );
        assert_eq!(words_to_string(&[0x6548, 0x6C6C, 0x006F]), "Hello");
        assert_eq!(words_to_string(&[0x0000]), "");
        assert!(string_to_words("").is_err());
        assert!(string_to_words("Grüße").is_err());
    }

    #[test]
    fn test_take_words() {
        assert_eq!(take_words::<2>(&[1, 2, 3]).unwrap(), [1, 2]);
        assert!(take_words::<4>(&[1, 2]).is_err());
    }
}
