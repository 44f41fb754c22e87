//! Decoded values and their JSON representation.

use alloy_primitives::U256;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Key under which a decode failure is recorded.
pub const DECODE_ERROR_KEY: &str = "_decode_error";

/// Ordered field name → value map; insertion order is declaration order.
pub type DecodedFields = IndexMap<String, FieldValue>;

/// A single decoded field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Lower-case `0x`-prefixed 20-byte address.
    Address(String),
    /// Full-width unsigned integer.
    Uint(U256),
    /// A wei amount scaled to ether.
    Ether(f64),
    Bool(bool),
    /// Raw bytes, rendered as `0x` hex.
    Bytes(Vec<u8>),
    Text(String),
}

impl FieldValue {
    pub fn uint(v: u64) -> Self {
        Self::Uint(U256::from(v))
    }

    /// Returns the integer if this is a `Uint` that fits in `u128`.
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            Self::Uint(v) => u256_to_u128(v),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Address(a) => s.serialize_str(a),
            Self::Uint(v) => serialize_u256(v, s),
            Self::Ether(v) => s.serialize_f64(*v),
            Self::Bool(b) => s.serialize_bool(*b),
            Self::Bytes(b) => s.serialize_str(&format!("0x{}", hex::encode(b))),
            Self::Text(t) => s.serialize_str(t),
        }
    }
}

/// Narrow a `U256` to `u128` when the high half is zero.
pub fn u256_to_u128(v: &U256) -> Option<u128> {
    let bytes = v.to_be_bytes::<32>();
    if bytes[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&bytes[16..]);
    Some(u128::from_be_bytes(low))
}

/// Emit a JSON number when the value fits in `u128`, a decimal string otherwise.
pub fn serialize_u256<S: Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
    match u256_to_u128(v) {
        Some(n) => s.serialize_u128(n),
        None => s.collect_str(v),
    }
}

/// Wei → ether as a float; precision loss is accepted for this display field.
pub fn wei_to_ether(v: &U256) -> f64 {
    let wei = match u256_to_u128(v) {
        Some(n) => n as f64,
        None => v.to_string().parse::<f64>().unwrap_or(f64::INFINITY),
    };
    wei / 1e18
}
