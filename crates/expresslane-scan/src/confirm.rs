//! Receipt confirmation: the only authority on whether a tx was boosted.

use std::sync::Arc;

use crate::error::ScanError;
use crate::fetcher::Fetcher;
use crate::types::{BlockRecord, Receipt, TransactionRecord};

/// A receipt with the boost flag set, joined with its transaction body.
#[derive(Debug, Clone)]
pub struct ConfirmedTx {
    pub tx: TransactionRecord,
    pub receipt: Receipt,
}

/// A direct call to the auction contract that was not boosted.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub tx: TransactionRecord,
    /// `None` when the endpoint had no receipts for the block.
    pub receipt: Option<Receipt>,
}

/// Boosted transactions of one block, plus its direct contract calls when
/// they were asked for.
#[derive(Debug, Clone)]
pub struct ConfirmedBlock {
    pub number: u64,
    /// `None` when the full block could not be fetched.
    pub block: Option<Arc<BlockRecord>>,
    pub txs: Vec<ConfirmedTx>,
    pub calls: Vec<ContractCall>,
}

/// Confirm one candidate block.
///
/// Returns `Ok(None)` when nothing in the block matched. Without `calls_to`
/// the full block is fetched only when a receipt carries `timeboosted: true`,
/// and a block without receipts is skipped. With `calls_to` the full block is
/// always read and every tx sent to that address is kept as a [`ContractCall`].
pub async fn confirm_block(
    fetcher: &mut Fetcher,
    number: u64,
    calls_to: Option<&str>,
) -> Result<Option<ConfirmedBlock>, ScanError> {
    let receipts = fetcher.get_receipts(number).await?;
    if receipts.is_none() {
        tracing::warn!(block = number, "eth_getBlockReceipts unsupported for block, skipping");
        if calls_to.is_none() {
            return Ok(None);
        }
    }

    let (boosted, plain): (Vec<Receipt>, Vec<Receipt>) =
        receipts.unwrap_or_default().into_iter().partition(Receipt::is_boosted);
    if boosted.is_empty() && calls_to.is_none() {
        return Ok(None);
    }

    let block = fetcher.get_block(number, true).await?;
    if block.is_none() {
        tracing::warn!(block = number, "block body unavailable, rows built from receipts only");
    }

    let txs: Vec<ConfirmedTx> = boosted
        .into_iter()
        .map(|receipt| {
            let tx = block
                .as_deref()
                .and_then(|b| body_for(b, &receipt))
                .cloned()
                .unwrap_or_else(|| stub_from_receipt(&receipt, number));
            ConfirmedTx { tx, receipt }
        })
        .collect();

    let calls: Vec<ContractCall> = match (calls_to, block.as_deref()) {
        (Some(contract), Some(b)) => b
            .transactions()
            .iter()
            .filter(|tx| tx.is_to(contract))
            .filter(|tx| !txs.iter().any(|c| c.tx.hash.eq_ignore_ascii_case(&tx.hash)))
            .map(|tx| ContractCall {
                tx: tx.clone(),
                receipt: plain.iter().find(|r| r.tx_hash.eq_ignore_ascii_case(&tx.hash)).cloned(),
            })
            .collect(),
        _ => Vec::new(),
    };

    if txs.is_empty() && calls.is_empty() {
        return Ok(None);
    }
    Ok(Some(ConfirmedBlock {
        number,
        block,
        txs,
        calls,
    }))
}

fn body_for<'a>(block: &'a BlockRecord, receipt: &Receipt) -> Option<&'a TransactionRecord> {
    receipt
        .tx_index
        .and_then(|index| block.tx_by_index(index))
        .or_else(|| block.tx_by_hash(&receipt.tx_hash))
}

/// Body-less record for a receipt whose tx could not be joined.
fn stub_from_receipt(receipt: &Receipt, number: u64) -> TransactionRecord {
    TransactionRecord {
        hash: receipt.tx_hash.clone(),
        from: receipt.from.clone(),
        to: receipt.to.clone(),
        input: "0x".into(),
        value: None,
        block_number: receipt.block_number.or(Some(number)),
        transaction_index: receipt.tx_index,
    }
}
