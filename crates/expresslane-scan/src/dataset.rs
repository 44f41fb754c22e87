//! Offline replay of a pre-fetched dataset through the [`RpcTransport`] seam.
//!
//! A dataset is a JSON array. Each element is either a block object (with a
//! `number`, optionally carrying `receipts` and `rawMetadata`) or a bare
//! transaction object, grouped into a header-less block by its `blockNumber`.
//! A block without `receipts` whose transactions carry their own `timeboosted`
//! flag gets receipts built from those transactions.
//! Only the read methods the scanner uses are answered; anything else gets
//! `-32601` like a node without the namespace.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use expresslane_rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcTransport, TransportError};

use crate::error::ScanError;
use crate::types::{parse_quantity, to_quantity};

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Tx field → receipt field, for receipts built from transactions.
const RECEIPT_FIELDS: &[(&str, &str)] = &[
    ("hash", "transactionHash"),
    ("transactionIndex", "transactionIndex"),
    ("from", "from"),
    ("to", "to"),
    ("timeboosted", "timeboosted"),
    ("logs", "logs"),
];

#[derive(Debug, Clone, Default)]
struct DatasetBlock {
    /// Block fields other than `transactions`, `receipts` and `rawMetadata`.
    header: Map<String, Value>,
    transactions: Vec<Value>,
    receipts: Option<Vec<Value>>,
    raw_metadata: Option<String>,
}

/// Blocks keyed by number.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    blocks: BTreeMap<u64, DatasetBlock>,
}

impl Dataset {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        let dataset = Self::from_value(value)?;
        tracing::info!(path = %path.display(), blocks = dataset.len(), "dataset loaded");
        Ok(dataset)
    }

    pub fn from_value(value: Value) -> Result<Self, ScanError> {
        let Value::Array(items) = value else {
            return Err(ScanError::Dataset("expected a JSON array".into()));
        };
        let mut dataset = Self::default();
        for (i, item) in items.into_iter().enumerate() {
            let Value::Object(mut obj) = item else {
                return Err(ScanError::Dataset(format!("entry {i} is not an object")));
            };
            if let Some(number) = obj.get("number").and_then(parse_quantity) {
                let entry = dataset.blocks.entry(number).or_default();
                if let Some(Value::Array(txs)) = obj.remove("transactions") {
                    entry.transactions.extend(txs);
                }
                if let Some(Value::Array(receipts)) = obj.remove("receipts") {
                    entry.receipts.get_or_insert_with(Vec::new).extend(receipts);
                }
                if let Some(Value::String(raw)) = obj.remove("rawMetadata") {
                    entry.raw_metadata = Some(raw);
                }
                entry.header.extend(obj);
            } else if let Some(number) = obj.get("blockNumber").and_then(parse_quantity) {
                dataset
                    .blocks
                    .entry(number)
                    .or_default()
                    .transactions
                    .push(Value::Object(obj));
            } else {
                return Err(ScanError::Dataset(format!(
                    "entry {i} has neither `number` nor `blockNumber`"
                )));
            }
        }
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn latest(&self) -> Option<u64> {
        self.blocks.keys().next_back().copied()
    }

    fn has_metadata(&self) -> bool {
        self.blocks.values().any(|b| b.raw_metadata.is_some())
    }

    /// Transactions of `number` with `blockNumber` and `transactionIndex`
    /// filled in when the dataset left them out.
    fn transactions(&self, number: u64) -> Vec<Value> {
        let Some(block) = self.blocks.get(&number) else {
            return Vec::new();
        };
        block
            .transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| {
                let mut tx = tx.clone();
                if let Value::Object(obj) = &mut tx {
                    obj.entry("blockNumber").or_insert_with(|| json!(to_quantity(number)));
                    obj.entry("transactionIndex").or_insert_with(|| json!(to_quantity(i as u64)));
                }
                tx
            })
            .collect()
    }

    fn block(&self, number: u64, full: bool) -> Value {
        let Some(block) = self.blocks.get(&number) else {
            return Value::Null;
        };
        let mut obj = block.header.clone();
        obj.insert("number".into(), json!(to_quantity(number)));
        let txs = self.transactions(number);
        let txs = if full {
            txs
        } else {
            txs.into_iter().filter_map(|tx| tx.get("hash").cloned()).collect()
        };
        obj.insert("transactions".into(), Value::Array(txs));
        Value::Object(obj)
    }

    /// Recorded receipts, or receipts built from tx-level `timeboosted` flags.
    fn block_receipts(&self, number: u64) -> Option<Vec<Value>> {
        let block = self.blocks.get(&number)?;
        if let Some(receipts) = &block.receipts {
            return Some(receipts.clone());
        }
        if !block.transactions.iter().any(|tx| tx.get("timeboosted").is_some()) {
            return None;
        }
        let receipts = self
            .transactions(number)
            .iter()
            .map(|tx| {
                let mut receipt = Map::new();
                for (from, to) in RECEIPT_FIELDS {
                    if let Some(v) = tx.get(*from).filter(|v| !v.is_null()) {
                        receipt.insert((*to).into(), v.clone());
                    }
                }
                Value::Object(receipt)
            })
            .collect();
        Some(receipts)
    }

    fn receipts(&self, number: u64) -> Value {
        match self.block_receipts(number) {
            Some(receipts) => Value::Array(
                receipts
                    .into_iter()
                    .map(|mut r| {
                        if let Value::Object(obj) = &mut r {
                            obj.entry("blockNumber").or_insert_with(|| json!(to_quantity(number)));
                        }
                        r
                    })
                    .collect(),
            ),
            None => Value::Null,
        }
    }

    fn logs(&self, filter: &LogFilter) -> Value {
        let mut out = Vec::new();
        for number in self.blocks.range(filter.from..=filter.to).map(|(&n, _)| n) {
            let Some(receipts) = self.block_receipts(number) else {
                continue;
            };
            let mut log_index = 0u64;
            for receipt in &receipts {
                let tx_hash = receipt.get("transactionHash").cloned().unwrap_or(Value::Null);
                let logs = receipt.get("logs").and_then(Value::as_array).into_iter().flatten();
                for log in logs {
                    let mut log = log.clone();
                    if let Value::Object(obj) = &mut log {
                        obj.entry("blockNumber").or_insert_with(|| json!(to_quantity(number)));
                        obj.entry("transactionHash").or_insert_with(|| tx_hash.clone());
                        obj.entry("logIndex").or_insert_with(|| json!(to_quantity(log_index)));
                    }
                    log_index += 1;
                    if filter.matches(&log) {
                        out.push(log);
                    }
                }
            }
        }
        Value::Array(out)
    }

    fn transaction_by_hash(&self, hash: &str) -> Value {
        for &number in self.blocks.keys() {
            let found = self.transactions(number).into_iter().find(|tx| {
                tx.get("hash")
                    .and_then(Value::as_str)
                    .is_some_and(|h| h.eq_ignore_ascii_case(hash))
            });
            if let Some(tx) = found {
                return tx;
            }
        }
        Value::Null
    }

    fn raw_metadata(&self, from: u64, to: u64) -> Value {
        let entries = self
            .blocks
            .range(from..=to)
            .filter_map(|(&number, block)| {
                block.raw_metadata.as_ref().map(|raw| {
                    json!({"blockNumber": to_quantity(number), "rawMetadata": raw})
                })
            })
            .collect();
        Value::Array(entries)
    }
}

/// Parsed `eth_getLogs` filter.
struct LogFilter {
    from: u64,
    to: u64,
    addresses: Vec<String>,
    /// Positional; an empty alternative list matches anything.
    topics: Vec<Vec<String>>,
}

impl LogFilter {
    fn parse(value: &Value, latest: u64) -> Option<Self> {
        let block = |key: &str| match value.get(key) {
            None => Some(latest),
            Some(Value::String(tag)) if tag == "latest" => Some(latest),
            Some(v) => parse_quantity(v),
        };
        let from = block("fromBlock")?;
        let to = block("toBlock")?;
        if from > to {
            return None;
        }
        let addresses = match value.get("address") {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => strings(v),
        };
        let topics = match value.get("topics") {
            Some(Value::Array(items)) => items.iter().map(strings).collect(),
            _ => Vec::new(),
        };
        Some(Self {
            from,
            to,
            addresses,
            topics,
        })
    }

    fn matches(&self, log: &Value) -> bool {
        if !self.addresses.is_empty() {
            let address = log.get("address").and_then(Value::as_str).unwrap_or_default();
            if !self.addresses.iter().any(|a| a.eq_ignore_ascii_case(address)) {
                return false;
            }
        }
        let topics = log.get("topics").and_then(Value::as_array);
        self.topics.iter().enumerate().all(|(i, wanted)| {
            if wanted.is_empty() {
                return true;
            }
            let actual = topics
                .and_then(|t| t.get(i))
                .and_then(Value::as_str)
                .unwrap_or_default();
            wanted.iter().any(|w| w.eq_ignore_ascii_case(actual))
        })
    }
}

/// A string or an array of strings; `null` yields nothing.
fn strings(v: &Value) -> Vec<String> {
    match v {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).map(String::from).collect(),
        _ => Vec::new(),
    }
}

/// Serves a [`Dataset`] as if it were a node.
pub struct DatasetTransport {
    dataset: Dataset,
    label: String,
}

impl DatasetTransport {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            label: "dataset:memory".into(),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        Ok(Self {
            dataset: Dataset::load(path)?,
            label: format!("dataset:{}", path.display()),
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn dispatch(&self, method: &str, params: &[Value]) -> Result<Value, JsonRpcError> {
        let quantity = |i: usize| -> Result<u64, JsonRpcError> {
            match params.get(i) {
                Some(Value::String(tag)) if tag == "latest" => Ok(self.dataset.latest().unwrap_or(0)),
                Some(v) => parse_quantity(v).ok_or_else(|| invalid_params(method)),
                None => Err(invalid_params(method)),
            }
        };

        match method {
            "eth_blockNumber" => Ok(self
                .dataset
                .latest()
                .map_or(Value::Null, |n| json!(to_quantity(n)))),
            "eth_getBlockByNumber" => {
                let full = params.get(1).and_then(Value::as_bool).unwrap_or(false);
                Ok(self.dataset.block(quantity(0)?, full))
            }
            "eth_getBlockReceipts" => Ok(self.dataset.receipts(quantity(0)?)),
            "eth_getLogs" => {
                let latest = self.dataset.latest().unwrap_or(0);
                let filter = params
                    .first()
                    .and_then(|f| LogFilter::parse(f, latest))
                    .ok_or_else(|| invalid_params(method))?;
                Ok(self.dataset.logs(&filter))
            }
            "eth_getTransactionByHash" => {
                let hash = params
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid_params(method))?;
                Ok(self.dataset.transaction_by_hash(hash))
            }
            "arb_getRawBlockMetadata" if self.dataset.has_metadata() => {
                let (from, to) = (quantity(0)?, quantity(1)?);
                if from > to {
                    return Err(invalid_params(method));
                }
                Ok(self.dataset.raw_metadata(from, to))
            }
            _ => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("the method {method} does not exist/is not available"),
            )),
        }
    }
}

fn invalid_params(method: &str) -> JsonRpcError {
    JsonRpcError::new(INVALID_PARAMS, format!("invalid params for {method}"))
}

#[async_trait]
impl RpcTransport for DatasetTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let resp = match self.dispatch(&req.method, &req.params) {
            Ok(result) => JsonRpcResponse::success(req.id, result),
            Err(error) => JsonRpcResponse::failure(req.id, error),
        };
        Ok(resp)
    }

    fn url(&self) -> &str {
        &self.label
    }
}
