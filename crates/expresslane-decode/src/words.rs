//! 32-byte word reader over ABI-encoded data.
//!
//! Offsets are byte offsets into the data the reader was built from (calldata
//! with the selector stripped, or a log's `data` field).

use alloy_primitives::U256;

use crate::error::DecodeError;
use crate::value::u256_to_u128;

pub const WORD: usize = 32;

/// Bounds-checked view over ABI-encoded words.
#[derive(Debug, Clone, Copy)]
pub struct Words<'a> {
    data: &'a [u8],
}

impl<'a> Words<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Number of complete words in the data.
    pub fn len(&self) -> usize {
        self.data.len() / WORD
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The word starting at byte `offset`.
    pub fn word_at(&self, offset: usize) -> Result<&'a [u8], DecodeError> {
        let end = offset.checked_add(WORD).ok_or(DecodeError::OffsetOverflow { at: offset })?;
        self.data.get(offset..end).ok_or(DecodeError::OutOfBounds {
            offset,
            len: self.data.len(),
        })
    }

    /// Full word as a big-endian unsigned integer.
    pub fn uint_at(&self, offset: usize) -> Result<U256, DecodeError> {
        Ok(U256::from_be_slice(self.word_at(offset)?))
    }

    /// Low 20 bytes of the word as a lower-case `0x` address.
    pub fn address_at(&self, offset: usize) -> Result<String, DecodeError> {
        Ok(word_to_address(self.word_at(offset)?))
    }

    /// A word holding a byte offset or length, narrowed to `usize`.
    pub fn offset_at(&self, offset: usize) -> Result<usize, DecodeError> {
        let v = self.uint_at(offset)?;
        u256_to_u128(&v)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(DecodeError::OffsetOverflow { at: offset })
    }

    /// Length-prefixed byte string: the word at `pointer` holds an offset
    /// relative to `base`; the word there is the length, raw bytes follow.
    pub fn bytes_at(&self, base: usize, pointer: usize) -> Result<&'a [u8], DecodeError> {
        let rel = self.offset_at(pointer)?;
        let len_pos = base.checked_add(rel).ok_or(DecodeError::OffsetOverflow { at: pointer })?;
        let len = self.offset_at(len_pos)?;
        let start = len_pos + WORD;
        let end = start.checked_add(len).ok_or(DecodeError::OffsetOverflow { at: len_pos })?;
        self.data.get(start..end).ok_or(DecodeError::OutOfBounds {
            offset: start,
            len: self.data.len(),
        })
    }
}

/// Right-aligned address in a 32-byte word (also used for indexed topics).
pub fn word_to_address(word: &[u8]) -> String {
    let tail = &word[word.len().saturating_sub(20)..];
    format!("0x{}", hex::encode(tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_u64(v: u64) -> [u8; 32] {
        let mut w = [0u8; 32];
        w[24..].copy_from_slice(&v.to_be_bytes());
        w
    }

    #[test]
    fn reads_uint_and_address() {
        let mut data = word_u64(1_000_000).to_vec();
        let mut addr = [0u8; 32];
        addr[12..].copy_from_slice(&[0xAB; 20]);
        data.extend_from_slice(&addr);

        let w = Words::new(&data);
        assert_eq!(w.len(), 2);
        assert_eq!(w.uint_at(0).unwrap(), U256::from(1_000_000u64));
        assert_eq!(w.address_at(32).unwrap(), format!("0x{}", "ab".repeat(20)));
    }

    #[test]
    fn short_data_is_out_of_bounds() {
        let data = [0u8; 40];
        let w = Words::new(&data);
        assert!(matches!(w.word_at(32), Err(DecodeError::OutOfBounds { offset: 32, len: 40 })));
    }

    #[test]
    fn reads_length_prefixed_bytes() {
        // head: pointer = 0x20; tail: len = 3, then "abc" padded
        let mut data = word_u64(32).to_vec();
        data.extend_from_slice(&word_u64(3));
        let mut payload = [0u8; 32];
        payload[..3].copy_from_slice(b"abc");
        data.extend_from_slice(&payload);

        let w = Words::new(&data);
        assert_eq!(w.bytes_at(0, 0).unwrap(), b"abc");
    }

    #[test]
    fn absurd_offset_does_not_panic() {
        let mut data = [0xffu8; 32].to_vec();
        data.extend_from_slice(&[0u8; 32]);
        let w = Words::new(&data);
        assert!(w.bytes_at(0, 0).is_err());
    }
}
