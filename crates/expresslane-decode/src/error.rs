//! Error types for calldata and log decoding.

use thiserror::Error;

/// Errors raised inside the word reader.
///
/// These never escape the public decode functions; they end up as the
/// `_decode_error` entry of the decoded field map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("word at byte {offset} out of range ({len} bytes available)")]
    OutOfBounds { offset: usize, len: usize },

    #[error("offset word at byte {at} does not fit in memory")]
    OffsetOverflow { at: usize },

    #[error("invalid hex: {reason}")]
    InvalidHex { reason: String },

    #[error("topic {index} is not a 32-byte word")]
    BadTopic { index: usize },
}
