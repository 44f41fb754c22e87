//! expresslane-decode: fixed-table decoding of express lane auction traffic.
//!
//! There is no general ABI decoder here. Every function and event
//! this crate understands is listed in a static table, and a single word reader
//! walks calldata and log data following the ABI head/tail layout.
//!
//! - [`selectors`]: 4-byte selector → function name
//! - [`calldata`]: selector → ordered field descriptors
//! - [`events`]: topic0 → event name, plus two structured event decoders
//! - [`words`]: the 32-byte word reader
//! - [`value`]: decoded value type and its JSON form

pub mod calldata;
pub mod error;
pub mod events;
pub mod selectors;
pub mod value;
pub mod words;

pub use calldata::decode_fields;
pub use error::DecodeError;
pub use events::{decode_event, event_name};
pub use selectors::{decode_selector, is_auction_selector, NATIVE_OR_EMPTY, UNKNOWN_FUNCTION};
pub use value::{DecodedFields, FieldValue, DECODE_ERROR_KEY};

/// Decode a `0x`-prefixed (or bare) hex string into bytes.
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, DecodeError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| DecodeError::InvalidHex {
        reason: e.to_string(),
    })
}
