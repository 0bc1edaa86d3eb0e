// Per-piece result cache.
//
// Keys are canonical JSON built from a chain prefix (each step's analyzer
// name, effective settings, and direct inputs, keys sorted) plus the part
// selection. Two calls whose settings only differ by spelling out defaults
// produce the same key. Entries are never evicted; `clear` is the only
// invalidation.

use rustc_hash::FxHashMap;
use serde_json::json;
use std::sync::Arc;
use vizitka_analysis::{ResolvedChain, Table};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for the first `len` steps of `chain` under a part selection.
    pub fn new(chain: &ResolvedChain, len: usize, parts: Option<&[&str]>) -> Self {
        CacheKey(
            json!({
                "chain": chain.prefix_fragments(len),
                "parts": parts,
            })
            .to_string(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: FxHashMap<CacheKey, Arc<Table>>,
    hits: u64,
    computed: u64,
}

impl AnalysisCache {
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Table>> {
        let found = self.entries.get(key).cloned();
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    pub fn insert(&mut self, key: CacheKey, table: Arc<Table>) {
        self.entries.insert(key, table);
    }

    /// Record that an analyzer step was run rather than served from cache.
    pub fn record_computed(&mut self) {
        self.computed += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `(hits, steps computed)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.computed)
    }
}
