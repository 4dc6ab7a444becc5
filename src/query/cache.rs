//! Query Result Cache
//!
//! Memoizes evaluations by a key derived from the card collection's content
//! fingerprint and the canonical form of the query. Supports:
//! - Deterministic keys (SHA-256 over sorted, length-prefixed content)
//! - Bounded capacity with FIFO (oldest-inserted) eviction
//! - Shared-read lookups; writers hold the lock only to insert/evict
//! - Bounded lock waits: a contended cache degrades to a miss, never an error
//!
//! # Key derivation
//!
//! The key is a pure function of content. Two calls with the same card
//! content and the same logical query always produce the same bytes, no
//! matter the input order of cards or of tags inside a step. Nothing random,
//! time-based or address-based is hashed, and no subset of the collection is
//! sampled.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::index::Fingerprint;
use crate::query::ast::Query;
use crate::query::evaluator::EvaluationState;
use crate::query::strategy::Tier;
use crate::types::CardId;

/// Domain separator for cache key digests
const CACHE_KEY_DOMAIN: &[u8] = b"cardsift/query-key/v1";

// ============================================================================
// Cache Configuration
// ============================================================================

/// Configuration for result caching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries (default: 1,024)
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Enable cache (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Longest wait for the cache lock in milliseconds (default: 50)
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_capacity() -> usize {
    1_024
}

fn default_enabled() -> bool {
    true
}

fn default_lock_timeout_ms() -> u64 {
    50
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            enabled: default_enabled(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl CacheConfig {
    /// Set maximum entries
    pub fn with_capacity(mut self, entries: usize) -> Self {
        self.capacity = entries;
        self
    }

    /// Set the lock wait bound
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Disable caching
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the cache stores anything at all
    pub fn is_active(&self) -> bool {
        self.enabled && self.capacity > 0
    }

    fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

// ============================================================================
// Cache Key
// ============================================================================

/// Deterministic key for one (collection, query) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive a key from a collection fingerprint and a query
    pub fn derive(fingerprint: &Fingerprint, query: &Query) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(CACHE_KEY_DOMAIN);
        hasher.update(fingerprint.as_bytes());
        query.write_canonical(&mut hasher);
        CacheKey(hasher.finalize().into())
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

// ============================================================================
// Cached Evaluation
// ============================================================================

/// What the cache stores for one key
///
/// Carries the evaluation metadata as well, so a hit reports the same steps,
/// state and tiers as the miss that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEvaluation {
    /// Surviving card identifiers, ascending
    pub card_ids: Vec<CardId>,
    /// Steps executed
    pub steps_applied: usize,
    /// Terminal state
    pub state: EvaluationState,
    /// Tier per executed step
    pub tiers: Vec<Tier>,
}

// ============================================================================
// Result Cache
// ============================================================================

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, Arc<CachedEvaluation>>,
    /// Insertion order, oldest first
    order: VecDeque<CacheKey>,
}

/// Bounded, thread-safe result cache with FIFO eviction
///
/// Eviction depends only on insertion order, so identical access patterns
/// always leave identical contents.
pub struct ResultCache {
    config: CacheConfig,
    inner: RwLock<CacheInner>,
    stats: CacheStats,
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: AtomicU64,

    /// Total cache misses
    pub misses: AtomicU64,

    /// Total inserts (including replacements)
    pub inserts: AtomicU64,

    /// Total evictions
    pub evictions: AtomicU64,

    /// Lookups or inserts skipped because the lock wait timed out
    pub contention_skips: AtomicU64,
}

impl CacheStats {
    /// Take a snapshot of current statistics
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            contention_skips: self.contention_skips.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of cache statistics (non-atomic copy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    /// Cache hits
    pub hits: u64,
    /// Cache misses
    pub misses: u64,
    /// Inserts
    pub inserts: u64,
    /// Evictions
    pub evictions: u64,
    /// Contention skips
    pub contention_skips: u64,
}

impl CacheStatsSnapshot {
    /// Hits over lookups, 0.0 when nothing was looked up
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl ResultCache {
    /// Create a new result cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(CacheInner::default()),
            stats: CacheStats::default(),
        }
    }

    /// Look up a cached evaluation
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedEvaluation>> {
        if !self.config.is_active() {
            return None;
        }

        let Some(inner) = self.inner.try_read_for(self.config.lock_timeout()) else {
            self.stats.contention_skips.fetch_add(1, Ordering::Relaxed);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            warn!(key = %key, "Result cache read lock timed out; treating as miss");
            return None;
        };

        match inner.entries.get(key) {
            Some(entry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(entry))
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store an evaluation
    ///
    /// Returns false when nothing was stored (cache inactive or contended).
    pub fn put(&self, key: CacheKey, value: CachedEvaluation) -> bool {
        if !self.config.is_active() {
            return false;
        }

        let value = Arc::new(value);
        let Some(mut inner) = self.inner.try_write_for(self.config.lock_timeout()) else {
            self.stats.contention_skips.fetch_add(1, Ordering::Relaxed);
            warn!(key = %key, "Result cache write lock timed out; skipping insert");
            return false;
        };

        self.stats.inserts.fetch_add(1, Ordering::Relaxed);

        // Replacing keeps the original eviction position
        if let Some(slot) = inner.entries.get_mut(&key) {
            *slot = value;
            return true;
        }

        while inner.entries.len() >= self.config.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if inner.entries.remove(&oldest).is_some() {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %oldest, "Evicted cached result");
            }
        }

        inner.order.push_back(key);
        inner.entries.insert(key, value);
        true
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys from oldest to newest
    pub fn keys_in_order(&self) -> Vec<CacheKey> {
        self.inner.read().order.iter().copied().collect()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Configuration in use
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

// ============================================================================
// Tests
// ============================================================================
