//! Output rows.

use alloy_primitives::U256;
use serde::Serialize;

use expresslane_decode::value::serialize_u256;
use expresslane_decode::{
    decode_event, decode_fields, decode_selector, event_name, is_auction_selector, DecodedFields,
    FieldValue, DECODE_ERROR_KEY, NATIVE_OR_EMPTY,
};

use crate::types::{BlockRecord, LogEntry, Receipt, TransactionRecord};

/// Match source for a receipt carrying `timeboosted: true`.
pub const SOURCE_RECEIPT_BOOST: &str = "receipt_boost_flag";
/// Match source added when the metadata bitmask also flagged the tx.
pub const SOURCE_METADATA_BITMASK: &str = "metadata_bitmask";

/// One JSON-lines record. Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    pub block: u64,
    pub timestamp: u64,
    pub from: String,
    pub to: String,
    #[serde(serialize_with = "serialize_u256")]
    pub value_wei: U256,
    pub selector: String,
    pub function_name: String,
    pub decoded_fields: DecodedFields,
    pub match_source: String,
    pub priority_flag: bool,
    pub logs: Vec<LogRow>,
    pub gas_used: Option<u64>,
    pub tx_index: u64,
    pub timeboosted: Option<bool>,
}

/// A log with a recognized topic0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRow {
    #[serde(rename = "logIndex")]
    pub log_index: u64,
    pub event: &'static str,
    pub topic0: String,
    #[serde(flatten)]
    pub fields: DecodedFields,
}

/// Priority rows: high-value auction actions, or anything the receipt says
/// was boosted.
pub fn priority_flag(selector: &str, receipt: Option<&Receipt>) -> bool {
    is_auction_selector(selector) || receipt.is_some_and(Receipt::is_boosted)
}

/// Assemble a row. Pure; `gas_used` and `timeboosted` are `null` without a
/// receipt. `logs` are the tx's logs; unrecognized topics are dropped.
/// `priority_flag` follows [`priority_flag`] on the decoded selector.
pub fn build_row(
    tx: &TransactionRecord,
    receipt: Option<&Receipt>,
    block: Option<&BlockRecord>,
    logs: &[LogEntry],
    match_source: &str,
) -> OutputRow {
    let (selector, function_name, decoded_fields) = match tx.input_bytes() {
        Ok(input) => {
            let (selector, name) = decode_selector(&input);
            let fields = decode_fields(&input, &selector);
            (selector, name.to_string(), fields)
        }
        Err(e) => {
            let mut fields = DecodedFields::new();
            fields.insert(DECODE_ERROR_KEY.into(), FieldValue::Text(format!("input: {e}")));
            (String::new(), NATIVE_OR_EMPTY.to_string(), fields)
        }
    };

    let priority = priority_flag(&selector, receipt);
    OutputRow {
        tx_hash: tx.hash.clone(),
        block: tx
            .block_number
            .or(block.map(|b| b.number))
            .or(receipt.and_then(|r| r.block_number))
            .unwrap_or(0),
        timestamp: block.and_then(|b| b.timestamp).unwrap_or(0),
        from: tx.from.to_ascii_lowercase(),
        to: tx.to.as_deref().unwrap_or_default().to_ascii_lowercase(),
        value_wei: tx.value.unwrap_or(U256::ZERO),
        selector,
        function_name,
        decoded_fields,
        match_source: match_source.to_string(),
        priority_flag: priority,
        logs: logs.iter().filter_map(log_row).collect(),
        gas_used: receipt.and_then(|r| r.gas_used),
        tx_index: tx
            .transaction_index
            .or(receipt.and_then(|r| r.tx_index))
            .unwrap_or(0),
        timeboosted: receipt.map(Receipt::is_boosted),
    }
}

fn log_row(log: &LogEntry) -> Option<LogRow> {
    let topic0 = log.topic0()?.to_ascii_lowercase();
    let event = event_name(&topic0)?;
    Some(LogRow {
        log_index: log.log_index.unwrap_or(0),
        event,
        fields: decode_event(&log.topics, &log.data),
        topic0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use expresslane_decode::events::AUCTION_RESOLVED;
    use serde_json::{json, Value};

    fn tx(input: &str) -> TransactionRecord {
        TransactionRecord {
            hash: "0xAB".into(),
            from: "0xAAAA000000000000000000000000000000000001".into(),
            to: Some("0x5FCB496A31B7AE91E7C9078EC662BD7A55CD3079".into()),
            input: input.into(),
            value: Some(U256::from(5u64)),
            block_number: Some(42),
            transaction_index: Some(3),
        }
    }

    fn receipt(boosted: Option<bool>) -> Receipt {
        serde_json::from_value(json!({
            "transactionHash": "0xab",
            "transactionIndex": "0x3",
            "gasUsed": "0x5208",
            "timeboosted": boosted,
            "logs": [
                {"topics": ["0xdeadbeef"], "data": "0x", "logIndex": "0x0"},
                {"topics": [AUCTION_RESOLVED], "data": "0x", "logIndex": "0x1"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn field_order_and_nulls() {
        let row = build_row(&tx("0x"), None, None, &[], "auction_call");
        let v = serde_json::to_value(&row).unwrap();
        let keys: Vec<_> = v.as_object().unwrap().keys().cloned().collect();
        let text = serde_json::to_string(&row).unwrap();
        assert!(text.starts_with(r#"{"txHash":"0xAB","block":42,"timestamp":0,"from":"0xaaaa"#));
        assert!(text.ends_with(r#""gas_used":null,"tx_index":3,"timeboosted":null}"#));
        assert_eq!(keys.len(), 15);
        assert_eq!(v["to"], "0x5fcb496a31b7ae91e7c9078ec662bd7a55cd3079");
        assert_eq!(v["selector"], "");
        assert_eq!(v["function_name"], NATIVE_OR_EMPTY);
        assert_eq!(v["value_wei"], 5);
        assert_eq!(v["priority_flag"], false);
    }

    #[test]
    fn receipt_fields_and_recognized_logs_only() {
        let r = receipt(Some(true));
        let row = build_row(&tx("0x"), Some(&r), None, &r.logs, SOURCE_RECEIPT_BOOST);
        assert_eq!(row.gas_used, Some(21_000));
        assert_eq!(row.timeboosted, Some(true));
        assert!(row.priority_flag);
        assert_eq!(row.logs.len(), 1);
        assert_eq!(row.logs[0].log_index, 1);
        assert!(row.logs[0].event.starts_with("AuctionResolved("));

        let v: Value = serde_json::to_value(&row).unwrap();
        assert_eq!(v["logs"][0]["topic0"], AUCTION_RESOLVED);
    }

    #[test]
    fn decodes_known_calldata() {
        let input = format!("0xb6b55f25{:064x}", 0u64);
        let row = build_row(&tx(&input), None, None, &[], "auction_call");
        assert_eq!(row.selector, "0xb6b55f25");
        assert_eq!(row.function_name, "deposit(uint256)");
        assert_eq!(row.decoded_fields["amount_wei"].as_u128(), Some(0));
        assert!(!row.priority_flag);

        let resolve = build_row(&tx("0x6dc4fc4e"), None, None, &[], "auction_call");
        assert!(resolve.priority_flag);
    }

    #[test]
    fn bad_input_hex_is_recorded() {
        let row = build_row(&tx("0xzz"), None, None, &[], "auction_call");
        assert_eq!(row.selector, "");
        assert!(row.decoded_fields.contains_key(DECODE_ERROR_KEY));
    }

    #[test]
    fn priority_rules() {
        assert!(priority_flag("0x6dc4fc4e", None));
        assert!(!priority_flag("0xb6b55f25", None));
        assert!(priority_flag("0xb6b55f25", Some(&receipt(Some(true)))));
        assert!(!priority_flag("", Some(&receipt(None))));
    }
}
