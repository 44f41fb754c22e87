//! Per-scan block cache.
//!
//! Keyed by block number. A block is fetched at most once per scan; a
//! hash-only entry may be upgraded to full transactions once. Blocks the node
//! answered `null` for are remembered as absent.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::types::BlockRecord;

#[derive(Debug, Clone)]
enum Entry {
    Absent,
    Present(Arc<BlockRecord>),
}

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub enum Lookup {
    Hit(Arc<BlockRecord>),
    /// The node already answered `null` for this number.
    Absent,
    /// Never fetched.
    Miss,
    /// Cached without transaction bodies; a full fetch is allowed once.
    Upgrade,
}

#[derive(Debug, Default)]
pub struct BlockCache {
    entries: HashMap<u64, Entry>,
    upgraded: HashSet<u64>,
    hits: u64,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&mut self, number: u64, full_tx: bool) -> Lookup {
        let lookup = match self.entries.get(&number) {
            None => Lookup::Miss,
            Some(Entry::Absent) => Lookup::Absent,
            Some(Entry::Present(block)) => {
                if full_tx && !block.is_full() && !self.upgraded.contains(&number) {
                    Lookup::Upgrade
                } else {
                    Lookup::Hit(Arc::clone(block))
                }
            }
        };
        if matches!(lookup, Lookup::Hit(_) | Lookup::Absent) {
            self.hits += 1;
        }
        lookup
    }

    /// Record the answer for `number`. An upgrade that came back `null` keeps
    /// the hash-only block.
    pub fn store(&mut self, number: u64, block: Option<BlockRecord>) -> Option<Arc<BlockRecord>> {
        let upgrading = matches!(self.entries.get(&number), Some(Entry::Present(_)));
        if upgrading {
            self.upgraded.insert(number);
        }
        match block {
            Some(block) => {
                let block = Arc::new(block);
                self.entries.insert(number, Entry::Present(Arc::clone(&block)));
                Some(block)
            }
            None if upgrading => match self.entries.get(&number) {
                Some(Entry::Present(block)) => Some(Arc::clone(block)),
                _ => None,
            },
            None => {
                self.entries.insert(number, Entry::Absent);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}
