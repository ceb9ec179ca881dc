//! Memoized markup parsing.
//!
//! The editor tends to emit the same creation markup repeatedly (undo/redo,
//! duplicated stacks, workspace reloads), so parsed fragments are kept in a
//! small least-recently-used cache keyed by the raw markup text. A hit hands
//! back the same shared tree a miss would have built; results never depend
//! on the cache state.

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::Result;
use crate::markup::parse_fragment;
use crate::node::Node;

/// Number of fragments kept by [`ParseCache::default`].
pub const DEFAULT_CAPACITY: usize = 200;

/// Hit/miss counters since the cache was created or last cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Bounded LRU cache of parsed markup fragments.
///
/// Failed parses are not stored; a capacity of zero disables storage
/// entirely and every lookup parses afresh.
#[derive(Debug)]
pub struct ParseCache {
    capacity: usize,
    entries: FxHashMap<Arc<str>, Arc<[Node]>>,
    /// Keys from least to most recently used.
    recency: VecDeque<Arc<str>>,
    stats: CacheStats,
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ParseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: FxHashMap::default(),
            recency: VecDeque::with_capacity(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Return the parsed fragment for `input`, parsing it on a miss.
    pub fn get_or_parse(&mut self, input: &str) -> Result<Arc<[Node]>> {
        if let Some(nodes) = self.entries.get(input).cloned() {
            self.stats.hits += 1;
            self.touch(input);
            debug!(bytes = input.len(), "markup cache hit");
            return Ok(nodes);
        }

        self.stats.misses += 1;
        debug!(bytes = input.len(), "markup cache miss");
        let nodes: Arc<[Node]> = parse_fragment(input)?.into();

        if self.capacity == 0 {
            return Ok(nodes);
        }

        let key: Arc<str> = Arc::from(input);
        self.entries.insert(Arc::clone(&key), Arc::clone(&nodes));
        self.recency.push_back(key);
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.recency.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!(bytes = oldest.len(), "evicted markup cache entry");
        }

        Ok(nodes)
    }

    fn touch(&mut self, input: &str) {
        if let Some(pos) = self.recency.iter().position(|key| &**key == input) {
            if let Some(key) = self.recency.remove(pos) {
                self.recency.push_back(key);
            }
        }
    }

    pub fn contains(&self, input: &str) -> bool {
        self.entries.contains_key(input)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.stats = CacheStats::default();
    }
}
