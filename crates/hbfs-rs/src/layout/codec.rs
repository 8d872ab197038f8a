//! Fixed-width little-endian word helpers.
//!
//! Every integer on disk is a signed 64-bit value. The engine only stores
//! non-negative quantities, so a negative word marks a corrupt image.

use crate::error::{FsError, FsResult};

/// WORD is the byte width of every on-disk integer.
pub const WORD: usize = 8;

#[must_use]
pub fn encode_word(value: u64) -> [u8; WORD] {
    i64::try_from(value).unwrap_or(i64::MAX).to_le_bytes()
}

pub fn decode_word(bytes: &[u8]) -> FsResult<u64> {
    let raw: [u8; WORD] = bytes
        .get(..WORD)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| FsError::corrupt("truncated 64-bit word"))?;
    let value = i64::from_le_bytes(raw);
    u64::try_from(value).map_err(|_| FsError::corrupt(format!("negative word {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_signed_little_endian() {
        assert_eq!(encode_word(1), [1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(encode_word(0x0102), [2, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(decode_word(&encode_word(987_654_321)).expect("decode"), 987_654_321);
    }

    #[test]
    fn negative_or_short_words_are_corrupt() {
        assert!(decode_word(&(-5i64).to_le_bytes()).is_err());
        assert!(decode_word(&[1, 2, 3]).is_err());
    }
}
