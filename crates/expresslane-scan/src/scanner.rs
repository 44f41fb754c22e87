//! The scan loop: locate, confirm, build, emit.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::Serialize;

use expresslane_rpc::{RpcClient, RpcTransport};

use crate::config::{RangeSpec, ScanConfig, Strategy};
use crate::confirm::{confirm_block, ConfirmedBlock};
use crate::emit::JsonlEmitter;
use crate::error::ScanError;
use crate::fetcher::{FetchStats, Fetcher};
use crate::locator::{locator_for, BlockRange, CandidateLocator, CandidateSet, TxMatch, SOURCE_AUCTION_CALL};
use crate::row::{build_row, OutputRow, SOURCE_METADATA_BITMASK, SOURCE_RECEIPT_BOOST};

/// Separator between match sources in `match_source`.
const SOURCE_SEPARATOR: &str = "|";

/// What one scan did.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub strategy: Strategy,
    pub from_block: u64,
    pub to_block: u64,
    pub candidates: usize,
    pub rows_written: u64,
    pub duplicates: u64,
    pub blocks_failed: u64,
    pub rpc_calls: u64,
    pub cache_hits: u64,
    pub elapsed_ms: u64,
}

/// One scan invocation over one transport.
///
/// Owns the fetcher (and with it the block cache), so every block number is
/// fetched at most once per scanner.
pub struct Scanner {
    config: ScanConfig,
    fetcher: Fetcher,
    locator: Box<dyn CandidateLocator>,
}

impl Scanner {
    /// Validate `config` and wire up the pipeline. No RPC work happens here.
    pub fn new(config: ScanConfig, transport: Box<dyn RpcTransport>) -> Result<Self, ScanError> {
        config.validate()?;
        let client = RpcClient::new(transport, config.retry_config());
        let fetcher = Fetcher::new(client, config.pacing(), config.log_chunk);
        let locator = locator_for(&config);
        Ok(Self {
            config,
            fetcher,
            locator,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn fetch_stats(&self) -> FetchStats {
        self.fetcher.stats()
    }

    /// Turn the configured range into concrete block numbers. A lookback asks
    /// the endpoint for its head.
    pub async fn resolve_range(&mut self) -> Result<BlockRange, ScanError> {
        match self.config.range {
            Some(RangeSpec::Explicit { from, to }) => Ok(BlockRange::explicit(from, to)),
            Some(RangeSpec::Lookback(blocks)) => {
                let latest = self.fetcher.latest_block_number().await?;
                Ok(BlockRange::lookback(latest, blocks))
            }
            None => Err(ScanError::config("no block range configured")),
        }
    }

    /// Run the scan, writing rows to `emitter`.
    ///
    /// Single-block failures are logged and skipped; configuration and output
    /// errors abort.
    pub async fn run(&mut self, emitter: &mut JsonlEmitter) -> Result<ScanReport, ScanError> {
        let started = Instant::now();
        let range = self.resolve_range().await?;
        tracing::info!(
            strategy = self.locator.name(),
            from = range.from,
            to = range.to,
            out = %emitter.path().display(),
            "scan started"
        );

        let candidates = self.locator.locate(&mut self.fetcher, range).await?;
        tracing::info!(candidates = candidates.len(), "candidates located");

        let written_before = emitter.written();
        let duplicates_before = emitter.duplicates();
        let candidate_count = candidates.len();
        let blocks_failed = match candidates {
            CandidateSet::Blocks(blocks) => {
                let total = blocks.len();
                let mut failed = 0;
                // Exhaustive also keeps unboosted direct calls to the contract.
                let calls_to = (self.config.strategy == Strategy::Exhaustive).then_some(self.config.contract.as_str());
                for (i, (number, flagged)) in blocks.into_iter().enumerate() {
                    match confirm_block(&mut self.fetcher, number, calls_to).await {
                        Ok(Some(confirmed)) => self.emit_confirmed(emitter, &confirmed, &flagged)?,
                        Ok(None) => {}
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            failed += 1;
                            tracing::warn!(block = number, error = %e, "block failed, skipping");
                            self.fetcher.back_off().await;
                        }
                    }
                    if (i + 1) % 100 == 0 {
                        tracing::info!(done = i + 1, total, rows = emitter.written(), "progress");
                    }
                }
                failed
            }
            CandidateSet::Transactions(matches) => {
                for m in &matches {
                    emitter.emit(&match_row(m))?;
                }
                0
            }
        };

        let fetch = self.fetcher.stats();
        let report = ScanReport {
            strategy: self.config.strategy,
            from_block: range.from,
            to_block: range.to,
            candidates: candidate_count,
            rows_written: emitter.written() - written_before,
            duplicates: emitter.duplicates() - duplicates_before,
            blocks_failed,
            rpc_calls: fetch.calls,
            cache_hits: fetch.cache_hits,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            rows = report.rows_written,
            duplicates = report.duplicates,
            failed = report.blocks_failed,
            calls = report.rpc_calls,
            elapsed_ms = report.elapsed_ms,
            "scan finished"
        );
        Ok(report)
    }

    fn emit_confirmed(
        &self,
        emitter: &mut JsonlEmitter,
        confirmed: &ConfirmedBlock,
        flagged: &BTreeSet<u64>,
    ) -> Result<(), ScanError> {
        for c in &confirmed.txs {
            let mut sources = vec![SOURCE_RECEIPT_BOOST];
            if c.receipt.tx_index.or(c.tx.transaction_index).is_some_and(|i| flagged.contains(&i)) {
                sources.push(SOURCE_METADATA_BITMASK);
            }
            if c.tx.is_to(&self.config.contract) {
                sources.push(SOURCE_AUCTION_CALL);
            }
            let row = build_row(
                &c.tx,
                Some(&c.receipt),
                confirmed.block.as_deref(),
                &c.receipt.logs,
                &sources.join(SOURCE_SEPARATOR),
            );
            emitter.emit(&row)?;
        }
        for call in &confirmed.calls {
            let logs = call.receipt.as_ref().map_or(&[][..], |r| r.logs.as_slice());
            let row = build_row(
                &call.tx,
                call.receipt.as_ref(),
                confirmed.block.as_deref(),
                logs,
                SOURCE_AUCTION_CALL,
            );
            emitter.emit(&row)?;
        }
        Ok(())
    }
}

fn match_row(m: &TxMatch) -> OutputRow {
    build_row(
        &m.tx,
        None,
        m.block.as_deref(),
        &m.logs,
        &m.sources.join(SOURCE_SEPARATOR),
    )
}
