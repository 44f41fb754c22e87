//! Raw block metadata bitmask.
//!
//! Byte 0 is a version prefix. In the bytes after it, bit `i` (least
//! significant first) of byte `j` flags transaction index `j * 8 + i`.

use expresslane_decode::{hex_to_bytes, DecodeError};

/// Transaction indices flagged in a metadata blob, ascending.
pub fn flagged_indices(raw: &[u8]) -> Vec<u64> {
    let Some((_version, mask)) = raw.split_first() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (j, byte) in mask.iter().enumerate() {
        for bit in 0..8 {
            if byte & (1 << bit) != 0 {
                out.push(j as u64 * 8 + bit);
            }
        }
    }
    out
}

/// [`flagged_indices`] over the `0x`-hex form returned by the node.
pub fn decode_raw_metadata(raw: &str) -> Result<Vec<u64>, DecodeError> {
    Ok(flagged_indices(&hex_to_bytes(raw)?))
}
