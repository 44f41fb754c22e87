//! `expresslane scan`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;

use expresslane_rpc::{HttpClientConfig, HttpTransport, RpcTransport};
use expresslane_scan::{DatasetTransport, JsonlEmitter, ScanBuilder, ScanConfig, Scanner, Strategy, DEFAULT_AUCTION_CONTRACT};

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// auction-logs | auction-calls | metadata | auction-windows | exhaustive
    #[arg(long)]
    pub strategy: Strategy,

    /// JSON-RPC endpoint (falls back to ETH_RPC when ARB_RPC is unset).
    /// Ignored when --dataset is given.
    #[arg(long, env = "ARB_RPC")]
    pub rpc: Option<String>,

    /// Replay a pre-fetched JSON dataset instead of calling an endpoint
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// First block of an explicit range (inclusive)
    #[arg(long, requires = "to_block", conflicts_with = "lookback")]
    pub from_block: Option<u64>,

    /// Last block of an explicit range (inclusive)
    #[arg(long, requires = "from_block")]
    pub to_block: Option<u64>,

    /// Scan the last N blocks up to the current head
    #[arg(long)]
    pub lookback: Option<u64>,

    /// Auction contract address
    #[arg(long, default_value = DEFAULT_AUCTION_CONTRACT)]
    pub contract: String,

    /// Blocks scanned after each resolved auction
    #[arg(long, default_value_t = 300)]
    pub window: u64,

    /// Blocks per arb_getRawBlockMetadata call
    #[arg(long, default_value_t = 500)]
    pub meta_batch: u64,

    /// Sampling stride when the metadata prefilter finds nothing
    #[arg(long, default_value_t = 10)]
    pub fallback_stride: u64,

    /// Trailing blocks scanned when a lookback window holds no auction
    #[arg(long, default_value_t = 500)]
    pub auto_fallback_blocks: u64,

    /// Blocks per eth_getLogs query
    #[arg(long, default_value_t = 10_000)]
    pub log_chunk: u64,

    /// Delay after each RPC call, in seconds
    #[arg(long, default_value_t = 0.1)]
    pub rate_limit: f64,

    /// Sleep after a failed block, in seconds
    #[arg(long, default_value_t = 1.0)]
    pub failure_backoff: f64,

    /// Retries per RPC call
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// HTTP request timeout, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// JSON-lines output file
    #[arg(long)]
    pub out: PathBuf,

    /// Keep existing rows and skip transactions already written
    #[arg(long)]
    pub append: bool,
}

impl ScanArgs {
    fn config(&self) -> Result<ScanConfig> {
        let mut builder = ScanBuilder::new()
            .strategy(self.strategy)
            .contract(&self.contract)
            .window(self.window)
            .meta_batch(self.meta_batch)
            .fallback_stride(self.fallback_stride)
            .auto_fallback_blocks(self.auto_fallback_blocks)
            .log_chunk(self.log_chunk)
            .rate_limit(seconds("--rate-limit", self.rate_limit)?)
            .failure_backoff(seconds("--failure-backoff", self.failure_backoff)?)
            .max_retries(self.max_retries)
            .out(&self.out)
            .append(self.append);

        match (self.from_block, self.to_block, self.lookback) {
            (Some(from), Some(to), None) => builder = builder.range(from, to),
            (None, None, Some(n)) => builder = builder.lookback(n),
            _ => {}
        }
        Ok(builder.build()?)
    }

    fn transport(&self) -> Result<Box<dyn RpcTransport>> {
        if let Some(path) = &self.dataset {
            let transport = DatasetTransport::open(path)
                .with_context(|| format!("load dataset '{}'", path.display()))?;
            return Ok(Box::new(transport));
        }
        let Some(url) = self.rpc.clone().or_else(|| std::env::var("ETH_RPC").ok()) else {
            bail!("no endpoint: pass --rpc (or set ARB_RPC / ETH_RPC) or --dataset");
        };
        let config = HttpClientConfig {
            request_timeout: Duration::from_secs(self.timeout),
        };
        Ok(Box::new(HttpTransport::new(url, config)?))
    }
}

fn seconds(flag: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).with_context(|| format!("{flag} must be a non-negative number of seconds"))
}

pub async fn run(args: ScanArgs) -> Result<()> {
    let config = args.config()?;
    let transport = args.transport()?;
    tracing::info!(endpoint = transport.url(), "using endpoint");

    let mut emitter = JsonlEmitter::create(&config.out, config.append)
        .with_context(|| format!("open output '{}'", config.out.display()))?;
    let mut scanner = Scanner::new(config, transport)?;
    let report = scanner.run(&mut emitter).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ScanArgs,
    }

    fn parse(argv: &[&str]) -> Result<ScanArgs, clap::Error> {
        let mut full = vec!["scan"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).map(|h| h.args)
    }

    #[test]
    fn explicit_range() {
        let args = parse(&[
            "--strategy", "metadata", "--dataset", "d.json", "--from-block", "10", "--to-block", "20",
            "--out", "o.jsonl",
        ])
        .unwrap();
        let config = args.config().unwrap();
        assert_eq!(config.strategy, Strategy::Metadata);
        assert_eq!(config.rate_limit_ms, 100);
        assert_eq!(config.range, Some(expresslane_scan::RangeSpec::Explicit { from: 10, to: 20 }));
    }

    #[test]
    fn range_flags_are_exclusive() {
        assert!(parse(&["--strategy", "exhaustive", "--from-block", "1", "--out", "o"]).is_err());
        assert!(parse(&[
            "--strategy", "exhaustive", "--from-block", "1", "--to-block", "2", "--lookback", "5", "--out", "o",
        ])
        .is_err());
        assert!(parse(&["--strategy", "full", "--lookback", "5", "--out", "o"]).is_err());
    }

    #[test]
    fn missing_range_fails_validation() {
        let args = parse(&["--strategy", "exhaustive", "--dataset", "d.json", "--out", "o"]).unwrap();
        assert!(args.config().is_err());
    }

    #[test]
    fn dataset_wins_over_endpoint_from_env() {
        std::env::set_var("ARB_RPC", "http://127.0.0.1:8547");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.json");
        std::fs::write(&path, r#"[{"number": "0x10", "transactions": []}]"#).unwrap();

        let args = parse(&[
            "--strategy", "exhaustive", "--dataset", path.to_str().unwrap(), "--lookback", "5", "--out", "o",
        ])
        .unwrap();
        assert_eq!(args.rpc.as_deref(), Some("http://127.0.0.1:8547"));
        let transport = args.transport().unwrap();
        assert!(transport.url().starts_with("dataset:"));
    }

    #[test]
    fn negative_rate_limit_is_rejected() {
        let args = parse(&[
            "--strategy", "exhaustive", "--lookback", "5", "--rate-limit=-1", "--out", "o",
        ])
        .unwrap();
        assert!(args.config().is_err());
    }
}
