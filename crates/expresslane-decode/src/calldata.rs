//! Declarative calldata layouts for the known selectors.
//!
//! Each layout is an ordered list of field descriptors. A descriptor names the
//! output key, how to interpret the word, and where the word lives: either a
//! head word of the argument list, or a word inside a tuple whose start is
//! given by a head offset word.

use crate::error::DecodeError;
use crate::selectors::{
    DEPOSIT, ERC20_APPROVE, ERC20_TRANSFER, ERC20_TRANSFER_FROM, RESOLVE_MULTI_BID,
    RESOLVE_SINGLE_BID, SET_TRANSFEROR, TRANSFER_CONTROLLER, WETH_WITHDRAW,
};
use crate::value::{wei_to_ether, DecodedFields, FieldValue, DECODE_ERROR_KEY};
use crate::words::{Words, WORD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Low 20 bytes of the word.
    Address,
    /// Whole word, big-endian.
    Uint,
    /// Whole word as wei, reported in ether.
    Ether,
    /// The word is a pointer to a length-prefixed byte string.
    Bytes,
    /// Length of the byte string the word points to.
    BytesLen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// `n`-th head word of the argument list.
    Head(usize),
    /// `index`-th word of the tuple whose byte offset is stored in head word `head`.
    Tuple { head: usize, index: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub slot: Slot,
}

const fn field(name: &'static str, kind: FieldKind, slot: Slot) -> FieldSpec {
    FieldSpec { name, kind, slot }
}

const fn bid(head: usize, index: usize) -> Slot {
    Slot::Tuple { head, index }
}

use FieldKind::*;
use Slot::Head;

// struct Bid { address expressLaneController; uint256 amount; bytes signature; }
static RESOLVE_SINGLE_FIELDS: &[FieldSpec] = &[
    field("expressLaneController", Address, bid(0, 0)),
    field("amount_wei", Uint, bid(0, 1)),
    field("amount_eth", Ether, bid(0, 1)),
    field("signature_len", BytesLen, bid(0, 2)),
    field("signature_hex", Bytes, bid(0, 2)),
];

static RESOLVE_MULTI_FIELDS: &[FieldSpec] = &[
    field("first_expressLaneController", Address, bid(0, 0)),
    field("first_amount_wei", Uint, bid(0, 1)),
    field("first_amount_eth", Ether, bid(0, 1)),
    field("second_expressLaneController", Address, bid(1, 0)),
    field("second_amount_wei", Uint, bid(1, 1)),
    field("second_amount_eth", Ether, bid(1, 1)),
];

/// Selector → field layout. Selectors absent here decode to an empty map.
pub static CALL_LAYOUTS: &[(&str, &[FieldSpec])] = &[
    (DEPOSIT, &[field("amount_wei", Uint, Head(0)), field("amount_eth", Ether, Head(0))]),
    (RESOLVE_SINGLE_BID, RESOLVE_SINGLE_FIELDS),
    (RESOLVE_MULTI_BID, RESOLVE_MULTI_FIELDS),
    (
        TRANSFER_CONTROLLER,
        &[field("round", Uint, Head(0)), field("newExpressLaneController", Address, Head(1))],
    ),
    // (address,uint64) is a static tuple, encoded inline in the head.
    (
        SET_TRANSFEROR,
        &[field("transferor_addr", Address, Head(0)), field("fixedUntilRound", Uint, Head(1))],
    ),
    (ERC20_TRANSFER, &[field("to", Address, Head(0)), field("amount", Uint, Head(1))]),
    (ERC20_APPROVE, &[field("spender", Address, Head(0)), field("amount", Uint, Head(1))]),
    (
        ERC20_TRANSFER_FROM,
        &[
            field("from", Address, Head(0)),
            field("to", Address, Head(1)),
            field("amount", Uint, Head(2)),
        ],
    ),
    (WETH_WITHDRAW, &[field("amount_wei", Uint, Head(0)), field("amount_eth", Ether, Head(0))]),
];

pub fn layout_for(selector: &str) -> Option<&'static [FieldSpec]> {
    CALL_LAYOUTS
        .iter()
        .find(|(sel, _)| sel.eq_ignore_ascii_case(selector))
        .map(|(_, fields)| *fields)
}

/// Decode the arguments of a known function.
///
/// `calldata` is the full transaction input, selector included. Never fails:
/// fields decoded before a problem are kept and the problem is recorded under
/// `_decode_error`.
pub fn decode_fields(calldata: &[u8], selector: &str) -> DecodedFields {
    let mut out = DecodedFields::new();
    let Some(layout) = layout_for(selector) else {
        return out;
    };
    if calldata.len() < 4 {
        return out;
    }

    let words = Words::new(&calldata[4..]);
    for spec in layout {
        match read_field(&words, spec) {
            Ok(value) => {
                out.insert(spec.name.to_string(), value);
            }
            Err(e) => {
                out.insert(DECODE_ERROR_KEY.to_string(), FieldValue::Text(format!("{}: {e}", spec.name)));
                break;
            }
        }
    }
    out
}

fn read_field(words: &Words<'_>, spec: &FieldSpec) -> Result<FieldValue, DecodeError> {
    let (base, pos) = locate(words, spec.slot)?;
    Ok(match spec.kind {
        Address => FieldValue::Address(words.address_at(pos)?),
        Uint => FieldValue::Uint(words.uint_at(pos)?),
        Ether => FieldValue::Ether(wei_to_ether(&words.uint_at(pos)?)),
        Bytes => FieldValue::Bytes(words.bytes_at(base, pos)?.to_vec()),
        BytesLen => FieldValue::uint(words.bytes_at(base, pos)?.len() as u64),
    })
}

/// Resolve a slot to `(tuple base, word byte position)`.
fn locate(words: &Words<'_>, slot: Slot) -> Result<(usize, usize), DecodeError> {
    match slot {
        Head(n) => Ok((0, n * WORD)),
        Slot::Tuple { head, index } => {
            let base = words.offset_at(head * WORD)?;
            let pos = base
                .checked_add(index * WORD)
                .ok_or(DecodeError::OffsetOverflow { at: head * WORD })?;
            Ok((base, pos))
        }
    }
}
