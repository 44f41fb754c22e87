//! Candidate location.
//!
//! Each strategy narrows a block range to a [`CandidateSet`]. Block sets are
//! supersets that the receipt confirmer filters; transaction sets are exact
//! matches against the auction contract and are emitted as-is.
//!
//! | strategy          | yields                                   |
//! |-------------------|------------------------------------------|
//! | `auction-logs`    | txs that emitted a contract log          |
//! | `auction-calls`   | the above plus direct calls in the same blocks |
//! | `metadata`        | blocks with a flagged bit, or a stride sample |
//! | `auction-windows` | `window` blocks after each resolved auction |
//! | `exhaustive`      | every block                              |

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use expresslane_decode::events::AUCTION_RESOLVED;

use crate::config::{ScanConfig, Strategy};
use crate::error::ScanError;
use crate::fetcher::Fetcher;
use crate::metadata::decode_raw_metadata;
use crate::types::{BlockRecord, LogEntry, TransactionRecord};

/// Match source recorded for a tx found through a contract log.
pub const SOURCE_AUCTION_LOG: &str = "auction_log";
/// Match source recorded for a tx sent directly to the contract.
pub const SOURCE_AUCTION_CALL: &str = "auction_call";

/// Inclusive block range a scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
    /// Derived from a lookback against the head rather than given explicitly.
    pub auto: bool,
}

impl BlockRange {
    pub fn explicit(from: u64, to: u64) -> Self {
        Self { from, to, auto: false }
    }

    /// The last `lookback` blocks up to `latest`.
    pub fn lookback(latest: u64, lookback: u64) -> Self {
        Self {
            from: latest.saturating_sub(lookback),
            to: latest,
            auto: true,
        }
    }

    pub fn len(&self) -> u64 {
        self.to.saturating_sub(self.from) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }

    pub fn contains(&self, n: u64) -> bool {
        self.from <= n && n <= self.to
    }
}

/// An exact transaction match, ready for the row builder.
#[derive(Debug, Clone)]
pub struct TxMatch {
    pub tx: TransactionRecord,
    pub block: Option<Arc<BlockRecord>>,
    /// Sources in the order they were recorded.
    pub sources: Vec<&'static str>,
    /// Contract logs emitted by this transaction.
    pub logs: Vec<LogEntry>,
}

impl TxMatch {
    fn record(&mut self, source: &'static str) {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }

    fn sort_key(&self) -> (u64, u64) {
        let block = self
            .tx
            .block_number
            .or(self.block.as_ref().map(|b| b.number))
            .unwrap_or(0);
        (block, self.tx.transaction_index.unwrap_or(0))
    }
}

/// Output of a locator.
#[derive(Debug, Clone)]
pub enum CandidateSet {
    /// Block → tx indices flagged by a prefilter (empty when unknown).
    Blocks(BTreeMap<u64, BTreeSet<u64>>),
    /// Exact matches, ordered by block and index.
    Transactions(Vec<TxMatch>),
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        match self {
            Self::Blocks(blocks) => blocks.len(),
            Self::Transactions(txs) => txs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn unflagged(blocks: impl IntoIterator<Item = u64>) -> Self {
        Self::Blocks(blocks.into_iter().map(|n| (n, BTreeSet::new())).collect())
    }
}

/// A candidate search strategy.
#[async_trait]
pub trait CandidateLocator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn locate(&self, fetcher: &mut Fetcher, range: BlockRange) -> Result<CandidateSet, ScanError>;
}

/// Build the locator selected by `config.strategy`.
pub fn locator_for(config: &ScanConfig) -> Box<dyn CandidateLocator> {
    let contract = config.contract.to_ascii_lowercase();
    match config.strategy {
        Strategy::AuctionLogs => Box::new(AuctionLogs { contract }),
        Strategy::AuctionCalls => Box::new(AuctionCalls { contract }),
        Strategy::Metadata => Box::new(MetadataPrefilter {
            batch: config.meta_batch,
            stride: config.fallback_stride,
        }),
        Strategy::AuctionWindows => Box::new(AuctionWindows {
            contract,
            window: config.window,
            auto_fallback: config.auto_fallback_blocks,
        }),
        Strategy::Exhaustive => Box::new(Exhaustive),
    }
}

// ─── Log-driven strategies ───────────────────────────────────────────────────

/// Transactions that emitted at least one log from the contract.
pub struct AuctionLogs {
    pub contract: String,
}

#[async_trait]
impl CandidateLocator for AuctionLogs {
    fn name(&self) -> &'static str {
        Strategy::AuctionLogs.as_str()
    }

    async fn locate(&self, fetcher: &mut Fetcher, range: BlockRange) -> Result<CandidateSet, ScanError> {
        let logs = fetcher.get_logs(range.from, range.to, &self.contract, None).await?;
        let mut matches = IndexMap::new();
        resolve_logged(fetcher, group_by_tx(logs), &mut matches).await;
        Ok(finish(matches))
    }
}

/// [`AuctionLogs`] plus any transaction in a touched block whose `to` is the
/// contract, which catches calls that emit no event.
pub struct AuctionCalls {
    pub contract: String,
}

#[async_trait]
impl CandidateLocator for AuctionCalls {
    fn name(&self) -> &'static str {
        Strategy::AuctionCalls.as_str()
    }

    async fn locate(&self, fetcher: &mut Fetcher, range: BlockRange) -> Result<CandidateSet, ScanError> {
        let logs = fetcher.get_logs(range.from, range.to, &self.contract, None).await?;
        let touched: BTreeSet<u64> = logs.iter().filter_map(|l| l.block_number).collect();
        let grouped = group_by_tx(logs);

        let mut matches = IndexMap::new();
        resolve_logged(fetcher, grouped.clone(), &mut matches).await;

        for number in touched {
            let block = match fetcher.get_block(number, true).await {
                Ok(Some(block)) => block,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(block = number, error = %e, "block fetch failed, skipping");
                    fetcher.back_off().await;
                    continue;
                }
            };
            for tx in block.transactions().iter().filter(|tx| tx.is_to(&self.contract)) {
                let key = tx.hash.to_ascii_lowercase();
                matches
                    .entry(key.clone())
                    .or_insert_with(|| TxMatch {
                        tx: tx.clone(),
                        block: Some(Arc::clone(&block)),
                        sources: Vec::new(),
                        logs: grouped.get(&key).cloned().unwrap_or_default(),
                    })
                    .record(SOURCE_AUCTION_CALL);
            }
        }
        Ok(finish(matches))
    }
}

/// Group logs by lower-cased tx hash, keeping first-seen order.
fn group_by_tx(logs: Vec<LogEntry>) -> IndexMap<String, Vec<LogEntry>> {
    let mut grouped: IndexMap<String, Vec<LogEntry>> = IndexMap::new();
    for log in logs {
        let Some(hash) = log.tx_hash.as_deref() else {
            continue;
        };
        grouped.entry(hash.to_ascii_lowercase()).or_default().push(log);
    }
    grouped
}

/// Find the body of every logged tx: in its (cached) block first, then by
/// hash. Failures skip the tx.
async fn resolve_logged(
    fetcher: &mut Fetcher,
    grouped: IndexMap<String, Vec<LogEntry>>,
    matches: &mut IndexMap<String, TxMatch>,
) {
    for (hash, logs) in grouped {
        match resolve_tx(fetcher, &hash, &logs).await {
            Ok(Some((tx, block))) => {
                matches
                    .entry(hash)
                    .or_insert_with(|| TxMatch {
                        tx,
                        block,
                        sources: Vec::new(),
                        logs,
                    })
                    .record(SOURCE_AUCTION_LOG);
            }
            Ok(None) => tracing::warn!(tx = %hash, "logged transaction not found, skipping"),
            Err(e) => {
                tracing::warn!(tx = %hash, error = %e, "transaction lookup failed, skipping");
                fetcher.back_off().await;
            }
        }
    }
}

async fn resolve_tx(
    fetcher: &mut Fetcher,
    hash: &str,
    logs: &[LogEntry],
) -> Result<Option<(TransactionRecord, Option<Arc<BlockRecord>>)>, ScanError> {
    if let Some(number) = logs.iter().find_map(|l| l.block_number) {
        if let Some(block) = fetcher.get_block(number, true).await? {
            if let Some(tx) = block.tx_by_hash(hash) {
                return Ok(Some((tx.clone(), Some(Arc::clone(&block)))));
            }
        }
    }

    let Some(tx) = fetcher.get_transaction(hash).await? else {
        return Ok(None);
    };
    let block = match tx.block_number {
        Some(number) => fetcher.get_block(number, false).await?,
        None => None,
    };
    Ok(Some((tx, block)))
}

fn finish(matches: IndexMap<String, TxMatch>) -> CandidateSet {
    let mut txs: Vec<TxMatch> = matches.into_values().collect();
    txs.sort_by_key(TxMatch::sort_key);
    CandidateSet::Transactions(txs)
}

// ─── Block-driven strategies ─────────────────────────────────────────────────

/// Blocks whose metadata bitmask flags at least one transaction.
///
/// When nothing is flagged (including when the endpoint lacks the call) every
/// `stride`-th block is sampled instead.
pub struct MetadataPrefilter {
    pub batch: u64,
    pub stride: u64,
}

#[async_trait]
impl CandidateLocator for MetadataPrefilter {
    fn name(&self) -> &'static str {
        Strategy::Metadata.as_str()
    }

    async fn locate(&self, fetcher: &mut Fetcher, range: BlockRange) -> Result<CandidateSet, ScanError> {
        let mut flagged: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();
        let mut start = range.from;
        while start <= range.to {
            let end = start.saturating_add(self.batch.max(1) - 1).min(range.to);
            match fetcher.raw_block_metadata(start, end).await {
                Ok(Some(entries)) => {
                    for entry in entries.into_iter().filter(|e| range.contains(e.block_number)) {
                        match decode_raw_metadata(&entry.raw_metadata) {
                            Ok(indices) if !indices.is_empty() => {
                                flagged.insert(entry.block_number, indices.into_iter().collect());
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!(
                                block = entry.block_number,
                                error = %e,
                                "unreadable block metadata"
                            ),
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!("arb_getRawBlockMetadata unavailable, stopping prefilter");
                    break;
                }
                Err(e) => {
                    tracing::warn!(start, end, error = %e, "metadata batch failed, skipping");
                    fetcher.back_off().await;
                }
            }
            tracing::debug!(start, end, flagged = flagged.len(), "metadata batch done");
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }

        if flagged.is_empty() {
            let sample = stride_sample(range, self.stride);
            tracing::info!(
                stride = self.stride,
                sampled = sample.len(),
                "no flagged blocks, falling back to stride sampling"
            );
            return Ok(CandidateSet::unflagged(sample));
        }
        tracing::info!(candidates = flagged.len(), "metadata prefilter done");
        Ok(CandidateSet::Blocks(flagged))
    }
}

/// Every `stride`-th block starting at `range.from`.
pub fn stride_sample(range: BlockRange, stride: u64) -> Vec<u64> {
    (range.from..=range.to).step_by(stride.max(1) as usize).collect()
}

/// The `window` blocks after each block that emitted `AuctionResolved`.
pub struct AuctionWindows {
    pub contract: String,
    pub window: u64,
    /// Trailing blocks to scan when a lookback range has no auction.
    pub auto_fallback: u64,
}

#[async_trait]
impl CandidateLocator for AuctionWindows {
    fn name(&self) -> &'static str {
        Strategy::AuctionWindows.as_str()
    }

    async fn locate(&self, fetcher: &mut Fetcher, range: BlockRange) -> Result<CandidateSet, ScanError> {
        let logs = fetcher
            .get_logs(range.from, range.to, &self.contract, Some(&[AUCTION_RESOLVED][..]))
            .await?;
        let auctions: Vec<u64> = logs.iter().filter_map(|l| l.block_number).collect();
        tracing::info!(auctions = auctions.len(), "resolved auctions in range");

        if auctions.is_empty() {
            if range.auto {
                let from = range.to.saturating_sub(self.auto_fallback);
                tracing::info!(from, to = range.to, "no auctions, scanning trailing blocks");
                return Ok(CandidateSet::unflagged(from..=range.to));
            }
            return Ok(CandidateSet::Blocks(BTreeMap::new()));
        }

        let upper = if range.auto {
            range.to
        } else {
            range.to.saturating_add(self.window)
        };
        let blocks = window_candidates(&auctions, self.window)
            .into_iter()
            .filter(|n| range.from <= *n && *n <= upper);
        Ok(CandidateSet::unflagged(blocks))
    }
}

/// Union of `b+1 ..= b+window` over every auction block `b`, sorted.
pub fn window_candidates(auction_blocks: &[u64], window: u64) -> BTreeSet<u64> {
    let mut out = BTreeSet::new();
    for &block in auction_blocks {
        let last = block.saturating_add(window);
        out.extend(block.saturating_add(1)..=last);
    }
    out
}

/// Every block in range.
pub struct Exhaustive;

#[async_trait]
impl CandidateLocator for Exhaustive {
    fn name(&self) -> &'static str {
        Strategy::Exhaustive.as_str()
    }

    async fn locate(&self, _fetcher: &mut Fetcher, range: BlockRange) -> Result<CandidateSet, ScanError> {
        Ok(CandidateSet::unflagged(range.from..=range.to))
    }
}
