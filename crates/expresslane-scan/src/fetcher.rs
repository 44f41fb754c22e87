//! Typed read operations over the RPC client.
//!
//! Every call is followed by a pacing sleep of `rate_limit × cost`. `null`
//! results and "unsupported" protocol errors come back as `None`; callers skip
//! rather than fail. Blocks go through a [`BlockCache`] owned by this fetcher.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use expresslane_rpc::{RpcClient, RpcTransport};

use crate::cache::{BlockCache, Lookup};
use crate::error::ScanError;
use crate::types::{parse_quantity, to_quantity, BlockRecord, LogEntry, RawBlockMetadata, Receipt, TransactionRecord};

/// Relative price of a call, used to scale the pacing delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CallCost {
    /// Metadata, headers, head number.
    Light,
    /// Full blocks, receipts, logs, transactions.
    Heavy,
}

impl CallCost {
    fn factor(self) -> f64 {
        match self {
            Self::Light => 0.5,
            Self::Heavy => 1.0,
        }
    }
}

/// Delays applied between calls and after a failed unit of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacing {
    /// Base delay after each call, scaled by [`CallCost`].
    pub rate_limit: Duration,
    /// Sleep after a block or batch failed, before moving on.
    pub failure_backoff: Duration,
}

/// Counters reported at the end of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub calls: u64,
    pub cache_hits: u64,
    pub cached_blocks: usize,
}

pub struct Fetcher {
    client: RpcClient<Box<dyn RpcTransport>>,
    cache: BlockCache,
    pacing: Pacing,
    log_chunk: u64,
    calls: u64,
}

impl Fetcher {
    pub fn new(client: RpcClient<Box<dyn RpcTransport>>, pacing: Pacing, log_chunk: u64) -> Self {
        Self {
            client,
            cache: BlockCache::new(),
            pacing,
            log_chunk: log_chunk.max(1),
            calls: 0,
        }
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            calls: self.calls,
            cache_hits: self.cache.hits(),
            cached_blocks: self.cache.len(),
        }
    }

    /// Current head via `eth_blockNumber`.
    pub async fn latest_block_number(&mut self) -> Result<u64, ScanError> {
        let method = "eth_blockNumber";
        let value = self
            .raw(method, vec![], CallCost::Light)
            .await?
            .ok_or_else(|| ScanError::Unavailable { method: method.into() })?;
        parse_quantity(&value).ok_or_else(|| ScanError::Malformed {
            what: method,
            reason: format!("not a quantity: {value}"),
        })
    }

    /// Block `number`, served from the cache when possible.
    pub async fn get_block(&mut self, number: u64, full_tx: bool) -> Result<Option<Arc<BlockRecord>>, ScanError> {
        match self.cache.lookup(number, full_tx) {
            Lookup::Hit(block) => return Ok(Some(block)),
            Lookup::Absent => return Ok(None),
            Lookup::Miss | Lookup::Upgrade => {}
        }
        let cost = if full_tx { CallCost::Heavy } else { CallCost::Light };
        let block: Option<BlockRecord> = self
            .typed(
                "eth_getBlockByNumber",
                vec![json!(to_quantity(number)), json!(full_tx)],
                cost,
            )
            .await?;
        Ok(self.cache.store(number, block))
    }

    /// Logs in `[from, to]` emitted by `address`, split into `log_chunk`-block
    /// queries. `topics` is the positional topic filter, if any.
    pub async fn get_logs(
        &mut self,
        from: u64,
        to: u64,
        address: &str,
        topics: Option<&[&str]>,
    ) -> Result<Vec<LogEntry>, ScanError> {
        let mut logs = Vec::new();
        let mut start = from;
        while start <= to {
            let end = start.saturating_add(self.log_chunk - 1).min(to);
            let mut filter = Map::new();
            filter.insert("fromBlock".into(), json!(to_quantity(start)));
            filter.insert("toBlock".into(), json!(to_quantity(end)));
            filter.insert("address".into(), json!(address));
            if let Some(topics) = topics {
                filter.insert("topics".into(), json!(topics));
            }

            let chunk: Option<Vec<LogEntry>> = self
                .typed("eth_getLogs", vec![Value::Object(filter)], CallCost::Heavy)
                .await?;
            match chunk {
                Some(chunk) => logs.extend(chunk),
                None => tracing::warn!(start, end, "eth_getLogs unsupported for range, skipping"),
            }
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }
        Ok(logs)
    }

    pub async fn get_receipts(&mut self, block: u64) -> Result<Option<Vec<Receipt>>, ScanError> {
        self.typed("eth_getBlockReceipts", vec![json!(to_quantity(block))], CallCost::Heavy)
            .await
    }

    pub async fn get_transaction(&mut self, hash: &str) -> Result<Option<TransactionRecord>, ScanError> {
        self.typed("eth_getTransactionByHash", vec![json!(hash)], CallCost::Heavy)
            .await
    }

    /// `arb_getRawBlockMetadata` over `[from, to]`; `None` when the endpoint
    /// does not offer it.
    pub async fn raw_block_metadata(&mut self, from: u64, to: u64) -> Result<Option<Vec<RawBlockMetadata>>, ScanError> {
        self.typed(
            "arb_getRawBlockMetadata",
            vec![json!(to_quantity(from)), json!(to_quantity(to))],
            CallCost::Light,
        )
        .await
    }

    async fn typed<T: DeserializeOwned>(
        &mut self,
        method: &'static str,
        params: Vec<Value>,
        cost: CallCost,
    ) -> Result<Option<T>, ScanError> {
        match self.raw(method, params, cost).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ScanError::Malformed {
                    what: method,
                    reason: e.to_string(),
                }),
        }
    }

    async fn raw(&mut self, method: &'static str, params: Vec<Value>, cost: CallCost) -> Result<Option<Value>, ScanError> {
        let logged = serde_json::Value::Array(params.clone());
        tracing::debug!(method, params = %logged, "rpc call");
        let result = self.client.call(method, params).await;
        self.calls += 1;
        self.pace(cost).await;
        Ok(result?)
    }

    async fn pace(&self, cost: CallCost) {
        if self.pacing.rate_limit.is_zero() {
            return;
        }
        tokio::time::sleep(self.pacing.rate_limit.mul_f64(cost.factor())).await;
    }

    /// Sleep for the failure backoff before the next unit of work.
    pub async fn back_off(&self) {
        if !self.pacing.failure_backoff.is_zero() {
            tokio::time::sleep(self.pacing.failure_backoff).await;
        }
    }
}
