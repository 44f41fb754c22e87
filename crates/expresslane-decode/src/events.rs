//! Auction contract events: topic0 → name, plus field decoders for
//! `AuctionResolved` and `SetExpressLaneController`.

use crate::value::{DecodedFields, FieldValue, DECODE_ERROR_KEY};
use crate::words::{word_to_address, Words, WORD};
use crate::{hex_to_bytes, DecodeError};

pub const AUCTION_RESOLVED: &str =
    "0x7f5bdabbd27a8fc572781b177055488d7c6729a2bade4f57da9d200f31c15d47";
pub const SET_EXPRESS_LANE_CONTROLLER: &str =
    "0xb59adc820ca642dad493a0a6e0bdf979dcae037dea114b70d5c66b1c0b791c4b";

/// topic0 → event signature.
pub static EVENT_TOPICS: &[(&str, &str)] = &[
    (
        "0xe1fffcc4923d04b559f4d29a8bfc6cda04eb5b0d3c460751c2402c5c5cc9109c",
        "Deposit(address,uint256)",
    ),
    (
        "0x31f69201fab7912e3ec9850e3ab705964bf46d9d4276bdcbb6d05e965e5f5401",
        "WithdrawalInitiated(address,uint256,uint256)",
    ),
    (
        "0x9e5c4f9f4e46b8629d3dda85f43a69194f50254404a72dc62b9e932d9c94eda8",
        "WithdrawalFinalized(address,uint256)",
    ),
    (
        AUCTION_RESOLVED,
        "AuctionResolved(bool,uint64,address,address,uint256,uint256,uint64,uint64)",
    ),
    (
        SET_EXPRESS_LANE_CONTROLLER,
        "SetExpressLaneController(uint64,address,address,address,uint64,uint64)",
    ),
    (
        "0xf6d28df235d9fa45a42d45dbb7c4f4ac76edb51e528f09f25a0650d32b8b33c0",
        "SetTransferor(address,address,uint64)",
    ),
    (
        "0x5848068f11aa3ba9fe3fc33c5f9f2a3cd1aed67986b85b5e0cedc67dbe96f0f0",
        "SetMinReservePrice(uint256,uint256)",
    ),
    (
        "0x9725e37e079c5bda6009a8f54d86265849f30acf61c630f9e1ac91e67de98794",
        "SetReservePrice(uint256,uint256)",
    ),
    (
        "0x8a0149b2f3ddf2c9ee85738165131d82babbb938f749321d59f75750afa7f4e6",
        "SetBeneficiary(address,address)",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopicKind {
    Bool,
    Address,
}

struct EventLayout {
    topic0: &'static str,
    /// Indexed fields, topics[1..].
    indexed: &'static [(&'static str, TopicKind)],
    /// Non-indexed fields, one uint word each.
    data: &'static [&'static str],
}

static EVENT_LAYOUTS: &[EventLayout] = &[
    EventLayout {
        topic0: AUCTION_RESOLVED,
        indexed: &[
            ("isMultiBidAuction", TopicKind::Bool),
            ("firstPriceBidder", TopicKind::Address),
            ("firstPriceExpressLaneController", TopicKind::Address),
        ],
        data: &[
            "round",
            "firstPriceAmount_wei",
            "price_paid_wei",
            "roundStartTimestamp",
            "roundEndTimestamp",
        ],
    },
    EventLayout {
        topic0: SET_EXPRESS_LANE_CONTROLLER,
        indexed: &[
            ("previousExpressLaneController", TopicKind::Address),
            ("newExpressLaneController", TopicKind::Address),
            ("transferor", TopicKind::Address),
        ],
        data: &["round", "startTimestamp", "endTimestamp"],
    },
];

/// Event signature for a topic0, if the event is one of ours.
pub fn event_name(topic0: &str) -> Option<&'static str> {
    EVENT_TOPICS
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(topic0))
        .map(|(_, name)| *name)
}

/// Decode a log's fields.
///
/// Only `AuctionResolved` and `SetExpressLaneController` carry a layout; every
/// other event yields an empty map. Each group (indexed topics, data words) is
/// decoded only when complete; a missing group is silently skipped.
pub fn decode_event(topics: &[String], data: &str) -> DecodedFields {
    let mut out = DecodedFields::new();
    let Some(topic0) = topics.first() else {
        return out;
    };
    let Some(layout) = EVENT_LAYOUTS.iter().find(|l| l.topic0.eq_ignore_ascii_case(topic0)) else {
        return out;
    };

    if let Err(e) = decode_into(layout, topics, data, &mut out) {
        out.insert(DECODE_ERROR_KEY.to_string(), FieldValue::Text(e.to_string()));
    }
    out
}

fn decode_into(
    layout: &EventLayout,
    topics: &[String],
    data: &str,
    out: &mut DecodedFields,
) -> Result<(), DecodeError> {
    if topics.len() > layout.indexed.len() {
        for (i, (name, kind)) in layout.indexed.iter().enumerate() {
            let word = topic_word(&topics[i + 1], i + 1)?;
            let value = match kind {
                TopicKind::Bool => FieldValue::Bool(word[WORD - 1] != 0),
                TopicKind::Address => FieldValue::Address(word_to_address(&word)),
            };
            out.insert((*name).to_string(), value);
        }
    }

    let bytes = hex_to_bytes(data)?;
    let words = Words::new(&bytes);
    if words.len() >= layout.data.len() {
        for (i, name) in layout.data.iter().enumerate() {
            out.insert((*name).to_string(), FieldValue::Uint(words.uint_at(i * WORD)?));
        }
    }
    Ok(())
}

fn topic_word(topic: &str, index: usize) -> Result<Vec<u8>, DecodeError> {
    let word = hex_to_bytes(topic)?;
    if word.len() != WORD {
        return Err(DecodeError::BadTopic { index });
    }
    Ok(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_addr(byte: u8) -> String {
        format!("0x{}{}", "00".repeat(12), format!("{byte:02x}").repeat(20))
    }

    fn topic_u8(v: u8) -> String {
        format!("0x{}{v:02x}", "00".repeat(31))
    }

    fn data_words(vals: &[u64]) -> String {
        let body: String = vals.iter().map(|v| format!("{v:064x}")).collect();
        format!("0x{body}")
    }

    #[test]
    fn names_cover_all_nine_events() {
        assert_eq!(EVENT_TOPICS.len(), 9);
        let upper = format!("0x{}", AUCTION_RESOLVED[2..].to_uppercase());
        assert_eq!(
            event_name(&upper),
            Some("AuctionResolved(bool,uint64,address,address,uint256,uint256,uint64,uint64)")
        );
        assert_eq!(event_name("0x1234"), None);
    }

    #[test]
    fn auction_resolved_full() {
        let topics = vec![AUCTION_RESOLVED.to_string(), topic_u8(1), topic_addr(0xaa), topic_addr(0xbb)];
        let data = data_words(&[77, 1_000, 900, 1_700_000_000, 1_700_000_060]);
        let fields = decode_event(&topics, &data);

        assert_eq!(fields["isMultiBidAuction"], FieldValue::Bool(true));
        assert_eq!(fields["firstPriceBidder"], FieldValue::Address(format!("0x{}", "aa".repeat(20))));
        assert_eq!(
            fields["firstPriceExpressLaneController"],
            FieldValue::Address(format!("0x{}", "bb".repeat(20)))
        );
        assert_eq!(fields["round"].as_u128(), Some(77));
        assert_eq!(fields["price_paid_wei"].as_u128(), Some(900));
        assert_eq!(fields["roundEndTimestamp"].as_u128(), Some(1_700_000_060));
        assert!(!fields.contains_key(DECODE_ERROR_KEY));
    }

    #[test]
    fn indexed_bool_uses_last_byte() {
        let topics = vec![AUCTION_RESOLVED.to_string(), topic_u8(0), topic_addr(1), topic_addr(2)];
        let fields = decode_event(&topics, "0x");
        assert_eq!(fields["isMultiBidAuction"], FieldValue::Bool(false));

        let mut high_only = format!("0x01{}", "00".repeat(31));
        let topics = vec![AUCTION_RESOLVED.to_string(), high_only.clone(), topic_addr(1), topic_addr(2)];
        assert_eq!(decode_event(&topics, "0x")["isMultiBidAuction"], FieldValue::Bool(false));

        high_only.replace_range(64.., "02");
        let topics = vec![AUCTION_RESOLVED.to_string(), high_only, topic_addr(1), topic_addr(2)];
        assert_eq!(decode_event(&topics, "0x")["isMultiBidAuction"], FieldValue::Bool(true));
    }

    #[test]
    fn short_groups_are_skipped() {
        let topics = vec![AUCTION_RESOLVED.to_string(), topic_u8(1)];
        let fields = decode_event(&topics, &data_words(&[1, 2]));
        assert!(fields.is_empty());
    }

    #[test]
    fn set_controller_topic_positions() {
        let topics = vec![
            SET_EXPRESS_LANE_CONTROLLER.to_string(),
            topic_addr(0x01),
            topic_addr(0x02),
            topic_addr(0x03),
        ];
        let fields = decode_event(&topics, &data_words(&[5, 100, 160]));
        assert_eq!(fields["previousExpressLaneController"], FieldValue::Address(format!("0x{}", "01".repeat(20))));
        assert_eq!(fields["newExpressLaneController"], FieldValue::Address(format!("0x{}", "02".repeat(20))));
        assert_eq!(fields["transferor"], FieldValue::Address(format!("0x{}", "03".repeat(20))));
        assert_eq!(fields["startTimestamp"].as_u128(), Some(100));
    }

    #[test]
    fn malformed_hex_is_recorded() {
        let topics = vec![SET_EXPRESS_LANE_CONTROLLER.to_string()];
        let fields = decode_event(&topics, "0xzz");
        assert!(matches!(fields.get(DECODE_ERROR_KEY), Some(FieldValue::Text(_))));

        let topics = vec![AUCTION_RESOLVED.to_string(), "0x01".into(), topic_addr(1), topic_addr(2)];
        let fields = decode_event(&topics, "0x");
        assert!(fields.contains_key(DECODE_ERROR_KEY));
    }

    #[test]
    fn other_events_decode_empty() {
        let topics = vec![EVENT_TOPICS[0].0.to_string()];
        assert!(decode_event(&topics, "0x").is_empty());
    }
}
