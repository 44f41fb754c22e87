//! Scan configuration and its fluent builder.
//!
//! # Example
//!
//! ```rust
//! use expresslane_scan::{ScanBuilder, Strategy};
//!
//! let config = ScanBuilder::new()
//!     .strategy(Strategy::Metadata)
//!     .range(433_502_500, 433_503_000)
//!     .meta_batch(250)
//!     .out("boosted.jsonl")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.fallback_stride, 10);
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use expresslane_rpc::RetryConfig;

use crate::error::ScanError;
use crate::fetcher::Pacing;

/// Express lane auction contract on Arbitrum One.
pub const DEFAULT_AUCTION_CONTRACT: &str = "0x5fcb496a31b7ae91e7c9078ec662bd7a55cd3079";

/// How candidates are located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Log query against the auction contract; exact by hash.
    AuctionLogs,
    /// Log query plus direct calls found in the touched blocks.
    AuctionCalls,
    /// Metadata bitmask prefilter, confirmed through receipts.
    Metadata,
    /// Blocks following each `AuctionResolved`, confirmed through receipts.
    AuctionWindows,
    /// Every block in range, confirmed through receipts.
    Exhaustive,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Self::AuctionLogs,
        Self::AuctionCalls,
        Self::Metadata,
        Self::AuctionWindows,
        Self::Exhaustive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuctionLogs => "auction-logs",
            Self::AuctionCalls => "auction-calls",
            Self::Metadata => "metadata",
            Self::AuctionWindows => "auction-windows",
            Self::Exhaustive => "exhaustive",
        }
    }

    /// `true` for strategies whose candidates go through receipt confirmation.
    pub fn confirms_receipts(self) -> bool {
        matches!(self, Self::Metadata | Self::AuctionWindows | Self::Exhaustive)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|s| s.as_str()).collect();
                format!("unknown strategy '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

/// Which blocks to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSpec {
    /// Inclusive `[from, to]`.
    Explicit { from: u64, to: u64 },
    /// The last `n` blocks up to the head at scan start.
    Lookback(u64),
}

/// Configuration for one scan invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub strategy: Strategy,
    /// Required; `None` fails validation.
    #[serde(default)]
    pub range: Option<RangeSpec>,
    /// Tracked auction contract (lower-case hex).
    #[serde(default = "default_contract")]
    pub contract: String,
    /// Blocks scanned after each resolved auction.
    #[serde(default = "default_window")]
    pub window: u64,
    /// Blocks per `arb_getRawBlockMetadata` call.
    #[serde(default = "default_meta_batch")]
    pub meta_batch: u64,
    /// Sampling stride when the metadata prefilter finds nothing.
    #[serde(default = "default_fallback_stride")]
    pub fallback_stride: u64,
    /// Trailing blocks scanned when a lookback range holds no auction.
    #[serde(default = "default_auto_fallback_blocks")]
    pub auto_fallback_blocks: u64,
    /// Blocks per `eth_getLogs` call.
    #[serde(default = "default_log_chunk")]
    pub log_chunk: u64,
    /// Base delay after each RPC call, in milliseconds.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
    /// Sleep after a failed block, in milliseconds.
    #[serde(default = "default_failure_backoff_ms")]
    pub failure_backoff_ms: u64,
    /// Retries per RPC call after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// JSON-lines output path.
    pub out: PathBuf,
    /// Keep existing rows and skip hashes already written.
    #[serde(default)]
    pub append: bool,
}

fn default_contract() -> String { DEFAULT_AUCTION_CONTRACT.into() }
fn default_window() -> u64 { 300 }
fn default_meta_batch() -> u64 { 500 }
fn default_fallback_stride() -> u64 { 10 }
fn default_auto_fallback_blocks() -> u64 { 500 }
fn default_log_chunk() -> u64 { 10_000 }
fn default_rate_limit_ms() -> u64 { 100 }
fn default_failure_backoff_ms() -> u64 { 1_000 }
fn default_max_retries() -> u32 { 3 }

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Exhaustive,
            range: None,
            contract: default_contract(),
            window: default_window(),
            meta_batch: default_meta_batch(),
            fallback_stride: default_fallback_stride(),
            auto_fallback_blocks: default_auto_fallback_blocks(),
            log_chunk: default_log_chunk(),
            rate_limit_ms: default_rate_limit_ms(),
            failure_backoff_ms: default_failure_backoff_ms(),
            max_retries: default_max_retries(),
            out: PathBuf::from("expresslane_candidates.jsonl"),
            append: false,
        }
    }
}

impl ScanConfig {
    /// Reject invocations that cannot run, before any RPC work.
    pub fn validate(&self) -> Result<(), ScanError> {
        match self.range {
            None => {
                return Err(ScanError::config(
                    "a block range (--from-block/--to-block) or --lookback is required",
                ))
            }
            Some(RangeSpec::Explicit { from, to }) if from > to => {
                return Err(ScanError::config(format!("from-block {from} is after to-block {to}")));
            }
            Some(RangeSpec::Lookback(0)) => return Err(ScanError::config("lookback must be positive")),
            Some(_) => {}
        }
        for (name, value) in [
            ("window", self.window),
            ("meta-batch", self.meta_batch),
            ("fallback-stride", self.fallback_stride),
            ("log-chunk", self.log_chunk),
        ] {
            if value == 0 {
                return Err(ScanError::config(format!("{name} must be positive")));
            }
        }
        if !is_address(&self.contract) {
            return Err(ScanError::config(format!("invalid contract address '{}'", self.contract)));
        }
        if self.out.as_os_str().is_empty() {
            return Err(ScanError::config("output path is empty"));
        }
        Ok(())
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            rate_limit: Duration::from_millis(self.rate_limit_ms),
            failure_backoff: Duration::from_millis(self.failure_backoff_ms),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            ..RetryConfig::default()
        }
    }
}

fn is_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Fluent builder for [`ScanConfig`].
#[derive(Debug, Default)]
pub struct ScanBuilder {
    config: ScanConfig,
}

impl ScanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Scan the inclusive range `[from, to]`.
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.config.range = Some(RangeSpec::Explicit { from, to });
        self
    }

    /// Scan the last `blocks` blocks up to the current head.
    pub fn lookback(mut self, blocks: u64) -> Self {
        self.config.range = Some(RangeSpec::Lookback(blocks));
        self
    }

    /// Track a different auction contract. Stored lower-case.
    pub fn contract(mut self, address: impl AsRef<str>) -> Self {
        self.config.contract = address.as_ref().to_ascii_lowercase();
        self
    }

    pub fn window(mut self, blocks: u64) -> Self {
        self.config.window = blocks;
        self
    }

    pub fn meta_batch(mut self, blocks: u64) -> Self {
        self.config.meta_batch = blocks;
        self
    }

    pub fn fallback_stride(mut self, stride: u64) -> Self {
        self.config.fallback_stride = stride;
        self
    }

    pub fn auto_fallback_blocks(mut self, blocks: u64) -> Self {
        self.config.auto_fallback_blocks = blocks;
        self
    }

    pub fn log_chunk(mut self, blocks: u64) -> Self {
        self.config.log_chunk = blocks;
        self
    }

    pub fn rate_limit(mut self, delay: Duration) -> Self {
        self.config.rate_limit_ms = delay.as_millis() as u64;
        self
    }

    pub fn failure_backoff(mut self, delay: Duration) -> Self {
        self.config.failure_backoff_ms = delay.as_millis() as u64;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn out(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.out = path.into();
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.config.append = append;
        self
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
