//! Chain data as returned by the JSON-RPC endpoint.
//!
//! Quantities arrive as `0x` hex strings from a node and occasionally as plain
//! numbers from hand-built datasets; both are accepted. Missing fields stay
//! `None` so the row builder can tell "absent" from zero.

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use expresslane_decode::{hex_to_bytes, DecodeError};

/// A transaction body from `eth_getBlockByNumber(n, true)` or
/// `eth_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub hash: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default = "empty_hex", alias = "data")]
    pub input: String,
    #[serde(default, deserialize_with = "quantity::u256_opt")]
    pub value: Option<U256>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub transaction_index: Option<u64>,
}

impl TransactionRecord {
    pub fn input_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        hex_to_bytes(&self.input)
    }

    /// `true` if the recipient equals `address` (case-insensitive).
    pub fn is_to(&self, address: &str) -> bool {
        self.to.as_deref().is_some_and(|to| to.eq_ignore_ascii_case(address))
    }
}

/// A receipt from `eth_getBlockReceipts`. The only source of the boost flag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "transactionIndex", default, deserialize_with = "quantity::opt")]
    pub tx_index: Option<u64>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub status: Option<u64>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub gas_used: Option<u64>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub gas_used_for_l1: Option<u64>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub l1_block_number: Option<u64>,
    #[serde(default)]
    pub timeboosted: Option<bool>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl Receipt {
    /// Boosted only when the flag is present and `true`.
    pub fn is_boosted(&self) -> bool {
        self.timeboosted == Some(true)
    }
}

/// A log from `eth_getLogs` or embedded in a receipt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "empty_hex")]
    pub data: String,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub log_index: Option<u64>,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(rename = "transactionHash", default)]
    pub tx_hash: Option<String>,
}

impl LogEntry {
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }
}

/// Transaction list of a block: full bodies or hashes only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BlockTransactions {
    Full(Vec<TransactionRecord>),
    Hashes(Vec<String>),
}

impl Default for BlockTransactions {
    fn default() -> Self {
        Self::Hashes(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockRecord {
    #[serde(deserialize_with = "quantity::required")]
    pub number: u64,
    #[serde(default, deserialize_with = "quantity::opt")]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub transactions: BlockTransactions,
}

impl BlockRecord {
    pub fn is_full(&self) -> bool {
        matches!(self.transactions, BlockTransactions::Full(_))
    }

    /// Full transaction bodies; empty for a hash-only block.
    pub fn transactions(&self) -> &[TransactionRecord] {
        match &self.transactions {
            BlockTransactions::Full(txs) => txs,
            BlockTransactions::Hashes(_) => &[],
        }
    }

    pub fn tx_by_index(&self, index: u64) -> Option<&TransactionRecord> {
        self.transactions()
            .iter()
            .find(|tx| tx.transaction_index == Some(index))
    }

    pub fn tx_by_hash(&self, hash: &str) -> Option<&TransactionRecord> {
        self.transactions()
            .iter()
            .find(|tx| tx.hash.eq_ignore_ascii_case(hash))
    }
}

/// One entry of `arb_getRawBlockMetadata`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlockMetadata {
    #[serde(deserialize_with = "quantity::required")]
    pub block_number: u64,
    #[serde(default = "empty_hex")]
    pub raw_metadata: String,
}

fn empty_hex() -> String {
    "0x".into()
}

/// Parse a JSON quantity: `0x` hex string, decimal string, or number.
pub fn parse_quantity(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some("") => Some(0),
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
}

/// Encode a block number as an RPC quantity.
pub fn to_quantity(n: u64) -> String {
    format!("{n:#x}")
}

mod quantity {
    use std::str::FromStr;

    use serde::de::Error;

    use super::*;

    pub fn opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(v) => parse_quantity(&v)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid quantity {v}"))),
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        opt(d)?.ok_or_else(|| D::Error::custom("missing quantity"))
    }

    pub fn u256_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<U256>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|n| Some(U256::from(n)))
                .ok_or_else(|| D::Error::custom(format!("invalid quantity {n}"))),
            Some(Value::String(s)) if s == "0x" => Ok(Some(U256::ZERO)),
            Some(Value::String(s)) => U256::from_str(&s)
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid quantity {s}: {e}"))),
            Some(other) => Err(D::Error::custom(format!("invalid quantity {other}"))),
        }
    }
}
