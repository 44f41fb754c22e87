//! Summary statistics over an output file.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use expresslane_decode::selectors::{function_name, is_auction_selector, is_lifecycle_selector};

/// Selector label used for rows with empty calldata.
const NATIVE: &str = "(native)";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowStats {
    pub total: u64,
    pub priority: u64,
    pub boosted: u64,
    /// Auction resolutions and controller transfers.
    pub auction_actions: u64,
    /// Deposits, withdrawals and transferor changes.
    pub lifecycle_calls: u64,
    pub top_senders: Vec<(String, u64)>,
    pub top_contracts: Vec<(String, u64)>,
    pub top_selectors: Vec<(String, u64)>,
}

impl RowStats {
    /// Aggregate parsed rows, keeping the `top_n` most frequent entries per
    /// ranking. Ties are broken by key so the output is stable.
    pub fn from_rows(rows: &[Value], top_n: usize) -> Self {
        let mut stats = Self::default();
        let mut senders = HashMap::new();
        let mut contracts = HashMap::new();
        let mut selectors = HashMap::new();

        for row in rows {
            stats.total += 1;
            if row["priority_flag"].as_bool() == Some(true) {
                stats.priority += 1;
            }
            if row["timeboosted"].as_bool() == Some(true) {
                stats.boosted += 1;
            }

            let selector = row["selector"].as_str().unwrap_or_default();
            if is_auction_selector(selector) {
                stats.auction_actions += 1;
            }
            if is_lifecycle_selector(selector) {
                stats.lifecycle_calls += 1;
            }
            let label = if selector.is_empty() { NATIVE } else { selector };
            *selectors.entry(label.to_string()).or_insert(0) += 1;

            if let Some(from) = row["from"].as_str().filter(|s| !s.is_empty()) {
                *senders.entry(from.to_ascii_lowercase()).or_insert(0) += 1;
            }
            if let Some(to) = row["to"].as_str().filter(|s| !s.is_empty()) {
                *contracts.entry(to.to_ascii_lowercase()).or_insert(0) += 1;
            }
        }

        stats.top_senders = top(senders, top_n);
        stats.top_contracts = top(contracts, top_n);
        stats.top_selectors = top(selectors, top_n);
        stats
    }
}

fn top(counts: HashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

impl fmt::Display for RowStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rows:            {}", self.total)?;
        writeln!(f, "priority:        {}", self.priority)?;
        writeln!(f, "boosted:         {}", self.boosted)?;
        writeln!(f, "auction actions: {}", self.auction_actions)?;
        writeln!(f, "lifecycle calls: {}", self.lifecycle_calls)?;

        writeln!(f, "\ntop senders:")?;
        for (address, count) in &self.top_senders {
            writeln!(f, "  {count:>8}  {address}")?;
        }
        writeln!(f, "\ntop contracts:")?;
        for (address, count) in &self.top_contracts {
            writeln!(f, "  {count:>8}  {address}")?;
        }
        writeln!(f, "\ntop selectors:")?;
        for (selector, count) in &self.top_selectors {
            let name = if selector == NATIVE { "" } else { function_name(selector).unwrap_or("") };
            writeln!(f, "  {count:>8}  {selector:<12} {name}")?;
        }
        Ok(())
    }
}
