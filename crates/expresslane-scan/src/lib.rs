//! expresslane-scan: locate, confirm and emit express lane transactions.
//!
//! # Pipeline
//!
//! ```text
//! CandidateLocator ──► Fetcher (BlockCache) ──► confirm_block ──► build_row ──► JsonlEmitter
//! ```
//!
//! - [`locator`]: the five candidate strategies behind [`CandidateLocator`]
//! - [`fetcher`]: typed, paced RPC reads with a per-scan block cache
//! - [`confirm`]: receipt-based confirmation of the boost flag
//! - [`row`] / [`emit`]: row assembly and crash-safe JSON-lines output
//! - [`dataset`]: offline replay through the same transport seam
//! - [`scanner`]: the loop tying it together
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use expresslane_rpc::HttpTransport;
//! use expresslane_scan::{JsonlEmitter, ScanBuilder, Scanner, Strategy};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScanBuilder::new()
//!     .strategy(Strategy::AuctionCalls)
//!     .lookback(5_000)
//!     .out("auction.jsonl")
//!     .build()?;
//! let transport = HttpTransport::default_for("https://arb1.arbitrum.io/rpc")?;
//! let mut emitter = JsonlEmitter::create(&config.out, config.append)?;
//! let mut scanner = Scanner::new(config, Box::new(transport))?;
//! let report = scanner.run(&mut emitter).await?;
//! println!("{} rows", report.rows_written);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod confirm;
pub mod dataset;
pub mod emit;
pub mod error;
pub mod fetcher;
pub mod locator;
pub mod metadata;
pub mod row;
pub mod scanner;
pub mod stats;
pub mod types;

pub use config::{RangeSpec, ScanBuilder, ScanConfig, Strategy, DEFAULT_AUCTION_CONTRACT};
pub use confirm::{confirm_block, ConfirmedBlock, ConfirmedTx, ContractCall};
pub use dataset::{Dataset, DatasetTransport};
pub use emit::{dedup_file, read_rows, DedupReport, JsonlEmitter};
pub use error::ScanError;
pub use fetcher::{FetchStats, Fetcher, Pacing};
pub use locator::{locator_for, BlockRange, CandidateLocator, CandidateSet, TxMatch};
pub use row::{build_row, OutputRow};
pub use scanner::{ScanReport, Scanner};
pub use stats::RowStats;
pub use types::{BlockRecord, LogEntry, Receipt, TransactionRecord};
