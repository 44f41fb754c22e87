//! expresslane CLI: find express lane traffic and post-process the output.
//!
//! # Commands
//! ```text
//! expresslane scan      --strategy <s> (--rpc <url> | --dataset <path>)
//!                       (--from-block <n> --to-block <m> | --lookback <n>) --out <path>
//! expresslane dedup     --input <path> [--output <path>]
//! expresslane stats     --input <path> [--top <n>] [--json]
//! expresslane selectors [--json]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::json;

use expresslane_decode::events::EVENT_TOPICS;
use expresslane_decode::selectors::{is_auction_selector, is_lifecycle_selector, SELECTORS};
use expresslane_scan::{dedup_file, read_rows, RowStats};

mod cmd_scan;
mod logging;

#[derive(Parser)]
#[command(
    name = "expresslane",
    about = "Extract express lane (timeboost) transactions from Arbitrum",
    long_about = "
Locates auction-contract activity and receipt-confirmed priority transactions,
decodes known calldata and events, and writes one JSON line per transaction.

ENVIRONMENT VARIABLES:
  ARB_RPC     Arbitrum JSON-RPC endpoint for `scan`
  ETH_RPC     Fallback endpoint when ARB_RPC is unset
  RUST_LOG    Log filter, overrides -v
",
    version
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a block range and write matching transactions as JSON lines
    Scan(cmd_scan::ScanArgs),

    /// Drop repeated transactions from an output file, keeping the first
    Dedup {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to rewriting the input in place
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Summarize an output file
    Stats {
        #[arg(long)]
        input: PathBuf,
        /// Entries per ranking
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the selectors and events the decoder understands
    Selectors {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&logging::LogConfig::from_verbosity(cli.verbose, cli.log_json));

    match cli.command {
        Commands::Scan(args) => cmd_scan::run(args).await,
        Commands::Dedup { input, output } => cmd_dedup(&input, output.as_deref().unwrap_or(input.as_path())),
        Commands::Stats { input, top, json } => cmd_stats(&input, top, json),
        Commands::Selectors { json } => cmd_selectors(json),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn cmd_dedup(input: &Path, output: &Path) -> Result<()> {
    let report = dedup_file(input, output).with_context(|| format!("dedup '{}'", input.display()))?;
    tracing::info!(
        kept = report.kept,
        dropped = report.dropped,
        malformed = report.malformed,
        output = %output.display(),
        "dedup done"
    );
    println!("kept {} rows, dropped {} duplicates, {} unreadable", report.kept, report.dropped, report.malformed);
    Ok(())
}

fn cmd_stats(input: &Path, top: usize, as_json: bool) -> Result<()> {
    let rows = read_rows(input).with_context(|| format!("read '{}'", input.display()))?;
    let stats = RowStats::from_rows(&rows, top);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{stats}");
    }
    Ok(())
}

fn cmd_selectors(as_json: bool) -> Result<()> {
    let kind = |selector: &str| {
        if is_auction_selector(selector) {
            "auction"
        } else if is_lifecycle_selector(selector) {
            "lifecycle"
        } else {
            "token"
        }
    };

    if as_json {
        let info = json!({
            "functions": SELECTORS.iter().map(|&(selector, name)| {
                json!({ "selector": selector, "name": name, "kind": kind(selector) })
            }).collect::<Vec<_>>(),
            "events": EVENT_TOPICS.iter().map(|&(topic0, name)| {
                json!({ "topic0": topic0, "name": name })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Functions:");
        for &(selector, name) in SELECTORS {
            println!("  {selector}  {:<10} {name}", kind(selector));
        }
        println!("\nEvents:");
        for &(topic0, name) in EVENT_TOPICS {
            println!("  {topic0}  {name}");
        }
    }
    Ok(())
}
