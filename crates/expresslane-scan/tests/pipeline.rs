//! End-to-end scans over a replayed dataset.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use expresslane_rpc::{JsonRpcRequest, JsonRpcResponse, RpcTransport, TransportError};
use expresslane_decode::events::{AUCTION_RESOLVED, SET_EXPRESS_LANE_CONTROLLER};
use expresslane_scan::{
    dedup_file, read_rows, Dataset, DatasetTransport, JsonlEmitter, ScanBuilder, ScanConfig, ScanReport, Scanner,
    Strategy, DEFAULT_AUCTION_CONTRACT as CONTRACT,
};

const OTHER: &str = "0x00000000000000000000000000000000000000ee";

fn deposit_input() -> String {
    format!("0xb6b55f25{:064x}", 1_000_000u64)
}

fn tx(hash: &str, index: u64, to: &str, input: &str) -> Value {
    json!({
        "hash": hash,
        "from": "0xAAAA000000000000000000000000000000000001",
        "to": to,
        "input": input,
        "value": "0x0",
        "transactionIndex": format!("{index:#x}"),
    })
}

fn receipt(hash: &str, index: u64, boosted: bool, logs: Value) -> Value {
    json!({
        "transactionHash": hash,
        "transactionIndex": format!("{index:#x}"),
        "status": "0x1",
        "gasUsed": "0x5208",
        "timeboosted": boosted,
        "logs": logs,
    })
}

/// Blocks 100..=110 with an auction at 100, boosted txs at 101, 103 and 110,
/// a direct contract call at 105 and a block (102) without receipts.
fn blocks(with_metadata: bool) -> Vec<Value> {
    let contract_log = |topic0: &str| json!([{"address": CONTRACT, "topics": [topic0], "data": "0x"}]);
    let mut blocks = Vec::new();
    for number in 100u64..=110 {
        let (txs, receipts) = match number {
            100 => (
                vec![tx("0xa100", 0, CONTRACT, "0x6dc4fc4e")],
                json!([receipt("0xa100", 0, false, contract_log(AUCTION_RESOLVED))]),
            ),
            101 => (
                vec![tx("0xb101", 0, OTHER, "0x"), tx("0xc101", 1, OTHER, "0x")],
                json!([receipt("0xb101", 0, true, json!([])), receipt("0xc101", 1, false, json!([]))]),
            ),
            103 => (
                vec![tx("0xb103", 0, CONTRACT, &deposit_input())],
                json!([receipt("0xb103", 0, true, json!([]))]),
            ),
            105 => (
                vec![tx("0xd105", 0, CONTRACT, &deposit_input()), tx("0xe105", 1, OTHER, "0x")],
                json!([
                    receipt("0xd105", 0, false, json!([])),
                    receipt("0xe105", 1, false, contract_log(SET_EXPRESS_LANE_CONTROLLER))
                ]),
            ),
            110 => (
                vec![tx("0xb110", 0, OTHER, "0xa9059cbb")],
                json!([receipt("0xb110", 0, true, json!([]))]),
            ),
            _ => (vec![], json!([])),
        };

        let mut block = json!({
            "number": format!("{number:#x}"),
            "timestamp": format!("{:#x}", 1_700_000_000 + number),
            "transactions": txs,
        });
        if number != 102 {
            block["receipts"] = receipts;
        }
        if with_metadata {
            block["rawMetadata"] = json!(if number == 101 { "0x0001" } else { "0x0000" });
        }
        blocks.push(block);
    }
    blocks
}

fn dataset(with_metadata: bool) -> Dataset {
    Dataset::from_value(Value::Array(blocks(with_metadata))).unwrap()
}

fn builder(strategy: Strategy, out: &Path) -> ScanBuilder {
    ScanBuilder::new()
        .strategy(strategy)
        .range(100, 110)
        .rate_limit(Duration::ZERO)
        .failure_backoff(Duration::ZERO)
        .max_retries(0)
        .log_chunk(4)
        .out(out)
}

async fn scan(config: ScanConfig, dataset: Dataset) -> (ScanReport, Vec<Value>) {
    let mut emitter = JsonlEmitter::create(&config.out, config.append).unwrap();
    let out = config.out.clone();
    let mut scanner = Scanner::new(config, Box::new(DatasetTransport::new(dataset))).unwrap();
    let report = scanner.run(&mut emitter).await.unwrap();
    drop(emitter);
    (report, read_rows(&out).unwrap())
}

fn hashes(rows: &[Value]) -> Vec<&str> {
    rows.iter().map(|r| r["txHash"].as_str().unwrap()).collect()
}

fn source_of<'a>(rows: &'a [Value], hash: &str) -> &'a str {
    rows.iter()
        .find(|r| r["txHash"] == hash)
        .and_then(|r| r["match_source"].as_str())
        .unwrap()
}

#[tokio::test]
async fn exhaustive_emits_boosted_rows_and_contract_calls() {
    let dir = tempfile::tempdir().unwrap();
    let config = builder(Strategy::Exhaustive, &dir.path().join("out.jsonl")).build().unwrap();
    let (report, rows) = scan(config, dataset(false)).await;

    assert_eq!(hashes(&rows), vec!["0xa100", "0xb101", "0xb103", "0xd105", "0xb110"]);
    assert_eq!(report.candidates, 11);
    assert_eq!(report.rows_written, 5);
    assert_eq!(report.blocks_failed, 0);

    assert_eq!(source_of(&rows, "0xa100"), "auction_call");
    assert_eq!(source_of(&rows, "0xb101"), "receipt_boost_flag");
    assert_eq!(source_of(&rows, "0xb103"), "receipt_boost_flag|auction_call");
    assert_eq!(source_of(&rows, "0xd105"), "auction_call");

    let resolve = &rows[0];
    assert_eq!(resolve["timeboosted"], false);
    assert_eq!(resolve["priority_flag"], true);
    assert_eq!(resolve["logs"][0]["topic0"], AUCTION_RESOLVED);
    assert_eq!(rows[3]["priority_flag"], false);

    let deposit = &rows[2];
    assert_eq!(deposit["block"], 103);
    assert_eq!(deposit["timestamp"], 1_700_000_103u64);
    assert_eq!(deposit["to"], CONTRACT);
    assert_eq!(deposit["from"], "0xaaaa000000000000000000000000000000000001");
    assert_eq!(deposit["function_name"], "deposit(uint256)");
    assert_eq!(deposit["decoded_fields"]["amount_wei"], 1_000_000);
    assert_eq!(deposit["gas_used"], 21_000);
    assert_eq!(deposit["timeboosted"], true);
    assert_eq!(deposit["priority_flag"], true);
}

/// Fails `eth_getBlockReceipts` for one block, otherwise replays the dataset.
struct FlakyReceipts {
    inner: DatasetTransport,
    failing_block: String,
}

#[async_trait]
impl RpcTransport for FlakyReceipts {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        if req.method == "eth_getBlockReceipts" && req.params.first().and_then(Value::as_str) == Some(self.failing_block.as_str()) {
            return Err(TransportError::Http("502 Bad Gateway".into()));
        }
        self.inner.send(req).await
    }

    fn url(&self) -> &str {
        self.inner.url()
    }
}

#[tokio::test]
async fn failing_block_is_skipped_and_scan_continues() {
    let dir = tempfile::tempdir().unwrap();
    let config = builder(Strategy::Exhaustive, &dir.path().join("out.jsonl")).build().unwrap();
    let out = config.out.clone();
    let transport = FlakyReceipts {
        inner: DatasetTransport::new(dataset(false)),
        failing_block: "0x67".into(),
    };

    let mut emitter = JsonlEmitter::create(&out, false).unwrap();
    let mut scanner = Scanner::new(config, Box::new(transport)).unwrap();
    let report = scanner.run(&mut emitter).await.unwrap();
    drop(emitter);

    assert_eq!(report.blocks_failed, 1);
    assert_eq!(report.rows_written, 4);
    let rows = read_rows(&out).unwrap();
    assert_eq!(hashes(&rows), vec!["0xa100", "0xb101", "0xd105", "0xb110"]);
}

#[tokio::test]
async fn bare_transaction_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = Dataset::from_value(json!([
        {"hash": "0xaa", "from": "0x01", "to": CONTRACT, "input": format!("0xb6b55f25{:064x}", 5), "blockNumber": "0x10"},
        {"hash": "0xcc", "from": "0x03", "to": OTHER, "input": "0x", "blockNumber": "0x10"},
        {"hash": "0xbb", "from": "0x02", "to": OTHER, "input": "0x", "timeboosted": true, "blockNumber": "0x11"}
    ]))
    .unwrap();
    let config = builder(Strategy::Exhaustive, &dir.path().join("out.jsonl")).range(0x10, 0x11).build().unwrap();
    let (report, rows) = scan(config, dataset).await;

    assert_eq!(report.blocks_failed, 0);
    assert_eq!(hashes(&rows), vec!["0xaa", "0xbb"]);

    let call = &rows[0];
    assert_eq!(call["match_source"], "auction_call");
    assert_eq!(call["function_name"], "deposit(uint256)");
    assert_eq!(call["decoded_fields"]["amount_wei"], 5);
    assert_eq!(call["timeboosted"], Value::Null);
    assert_eq!(call["gas_used"], Value::Null);

    let boosted = &rows[1];
    assert_eq!(boosted["match_source"], "receipt_boost_flag");
    assert_eq!(boosted["timeboosted"], true);
    assert_eq!(boosted["priority_flag"], true);
}

#[tokio::test]
async fn exhaustive_twice_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.jsonl");
    let second = dir.path().join("second.jsonl");
    scan(builder(Strategy::Exhaustive, &first).build().unwrap(), dataset(false)).await;
    scan(builder(Strategy::Exhaustive, &second).build().unwrap(), dataset(false)).await;

    let a = std::fs::read_to_string(&first).unwrap();
    let b = std::fs::read_to_string(&second).unwrap();
    assert!(!a.is_empty());
    assert_eq!(a, b);
}

#[tokio::test]
async fn resumed_append_run_matches_single_run() {
    let dir = tempfile::tempdir().unwrap();
    let full = dir.path().join("full.jsonl");
    let (_, full_rows) = scan(builder(Strategy::Exhaustive, &full).build().unwrap(), dataset(false)).await;

    // Interrupted after block 104, with a torn final line.
    let resumed = dir.path().join("resumed.jsonl");
    let partial = builder(Strategy::Exhaustive, &resumed).range(100, 104).build().unwrap();
    scan(partial, dataset(false)).await;
    let mut text = std::fs::read_to_string(&resumed).unwrap();
    text.push_str("{\"txHash\":\"0xb1");
    std::fs::write(&resumed, text).unwrap();

    let config = builder(Strategy::Exhaustive, &resumed).append(true).build().unwrap();
    let (report, _) = scan(config, dataset(false)).await;
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.duplicates, 3);

    let report = dedup_file(&resumed, &resumed).unwrap();
    assert_eq!(report.dropped, 0);
    assert_eq!(report.malformed, 1);

    let want: BTreeSet<_> = hashes(&full_rows).into_iter().map(String::from).collect();
    let rows = read_rows(&resumed).unwrap();
    let got: BTreeSet<_> = hashes(&rows).into_iter().map(String::from).collect();
    assert_eq!(got, want);
}

#[tokio::test]
async fn metadata_prefilter_marks_flagged_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = builder(Strategy::Metadata, &dir.path().join("out.jsonl")).meta_batch(3).build().unwrap();
    let (report, rows) = scan(config, dataset(true)).await;

    assert_eq!(report.candidates, 1);
    assert_eq!(hashes(&rows), vec!["0xb101"]);
    assert_eq!(source_of(&rows, "0xb101"), "receipt_boost_flag|metadata_bitmask");
}

#[tokio::test]
async fn metadata_unsupported_falls_back_to_stride() {
    let dir = tempfile::tempdir().unwrap();
    let config = builder(Strategy::Metadata, &dir.path().join("out.jsonl")).build().unwrap();
    let (report, rows) = scan(config, dataset(false)).await;

    // Stride 10 from 100 samples {100, 110}.
    assert_eq!(report.candidates, 2);
    assert_eq!(hashes(&rows), vec!["0xb110"]);
    assert_eq!(source_of(&rows, "0xb110"), "receipt_boost_flag");
}

#[tokio::test]
async fn auction_logs_are_exact_matches() {
    let dir = tempfile::tempdir().unwrap();
    let config = builder(Strategy::AuctionLogs, &dir.path().join("out.jsonl")).build().unwrap();
    let (_, rows) = scan(config, dataset(false)).await;

    assert_eq!(hashes(&rows), vec!["0xa100", "0xe105"]);
    let resolve = &rows[0];
    assert_eq!(resolve["match_source"], "auction_log");
    assert_eq!(resolve["priority_flag"], true);
    assert_eq!(resolve["gas_used"], Value::Null);
    assert_eq!(resolve["timeboosted"], Value::Null);
    assert_eq!(resolve["logs"][0]["topic0"], AUCTION_RESOLVED);
    assert!(resolve["decoded_fields"]["_decode_error"].is_string());
    assert_eq!(rows[1]["priority_flag"], false);
}

#[tokio::test]
async fn auction_calls_merge_sources() {
    let dir = tempfile::tempdir().unwrap();
    let config = builder(Strategy::AuctionCalls, &dir.path().join("out.jsonl")).build().unwrap();
    let (_, rows) = scan(config, dataset(false)).await;

    assert_eq!(hashes(&rows), vec!["0xa100", "0xd105", "0xe105"]);
    assert_eq!(source_of(&rows, "0xa100"), "auction_log|auction_call");
    assert_eq!(source_of(&rows, "0xd105"), "auction_call");
    assert_eq!(source_of(&rows, "0xe105"), "auction_log");
}

#[tokio::test]
async fn auction_windows_follow_resolved_auctions() {
    let dir = tempfile::tempdir().unwrap();
    let config = builder(Strategy::AuctionWindows, &dir.path().join("out.jsonl"))
        .window(5)
        .build()
        .unwrap();
    let (report, rows) = scan(config, dataset(false)).await;

    assert_eq!(report.candidates, 5);
    assert_eq!(hashes(&rows), vec!["0xb101", "0xb103"]);
}

#[tokio::test]
async fn auction_windows_explicit_range_without_auction_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = builder(Strategy::AuctionWindows, &dir.path().join("out.jsonl"))
        .range(106, 110)
        .build()
        .unwrap();
    let (report, rows) = scan(config, dataset(false)).await;
    assert_eq!(report.candidates, 0);
    assert!(rows.is_empty());
}

#[tokio::test]
async fn auction_windows_lookback_without_auction_scans_trailing_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let config = builder(Strategy::AuctionWindows, &dir.path().join("out.jsonl"))
        .lookback(3)
        .auto_fallback_blocks(10)
        .build()
        .unwrap();
    let (report, rows) = scan(config, dataset(false)).await;

    assert_eq!((report.from_block, report.to_block), (107, 110));
    assert_eq!(report.candidates, 11);
    assert_eq!(hashes(&rows), vec!["0xb101", "0xb103", "0xb110"]);
}

#[tokio::test]
async fn invalid_config_fails_before_any_rpc() {
    let err = ScanBuilder::new().strategy(Strategy::Exhaustive).out("x.jsonl").build().unwrap_err();
    assert!(err.is_fatal());

    let config = ScanConfig {
        range: None,
        ..ScanConfig::default()
    };
    assert!(Scanner::new(config, Box::new(DatasetTransport::new(dataset(false)))).is_err());
}
