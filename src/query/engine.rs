//! Query Engine - orchestration of registry, cache and evaluator
//!
//! The engine is the only component that coordinates the registry build
//! lifecycle, cache access and evaluation:
//!
//! 1. Fingerprint the incoming card collection
//! 2. Reuse the current registry if it indexes the same content, otherwise
//!    build a new one and swap it in (one build per fingerprint; concurrent
//!    callers wait for it)
//! 3. Derive the cache key and consult the cache
//! 4. On a miss, evaluate with per-step tier selection and store the result
//! 5. Return the identifiers with timing, step counts, tiers and hit flag
//!
//! # Example
//!
//! ```rust
//! use cardsift::config::EngineConfig;
//! use cardsift::query::{QueryBuilder, QueryEngine};
//! use cardsift::types::Card;
//!
//! let engine = QueryEngine::new(EngineConfig::default()).unwrap();
//! let cards = vec![
//!     Card::new("A", "Crash", ["urgent", "bug"]),
//!     Card::new("B", "Dark mode", ["urgent", "feature"]),
//! ];
//! let query = QueryBuilder::new().intersection(["urgent", "bug"]).build().unwrap();
//!
//! let first = engine.execute(&cards, &query).unwrap();
//! assert_eq!(first.card_ids.len(), 1);
//! assert!(!first.cache_hit);
//!
//! let second = engine.execute(&cards, &query).unwrap();
//! assert!(second.cache_hit);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Error, RegistryError, Result};
use crate::index::{Fingerprint, Registry, TagBitmap};
use crate::metrics::EngineMetrics;
use crate::query::ast::Query;
use crate::query::cache::{CacheKey, CacheStatsSnapshot, CachedEvaluation, ResultCache};
use crate::query::evaluator::{EvaluationState, Evaluator};
use crate::query::operators::Corpus;
use crate::query::result::QueryOutcome;
use crate::query::strategy::StrategySelector;
use crate::source::{resolve_cards, CardSource, Resolution};
use crate::types::{Card, CardId};

// ============================================================================
// Engine Statistics
// ============================================================================

/// Engine counters
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Queries executed (hits and misses)
    pub queries: AtomicU64,
    /// Queries answered from the cache
    pub cache_hits: AtomicU64,
    /// Queries evaluated
    pub cache_misses: AtomicU64,
    /// Registry builds performed
    pub registry_builds: AtomicU64,
    /// Queries that reused the current registry
    pub registry_reuses: AtomicU64,
    /// Queries rejected before evaluation
    pub rejected: AtomicU64,
}

impl EngineStats {
    /// Take a snapshot of current statistics
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            registry_builds: self.registry_builds.load(Ordering::Relaxed),
            registry_reuses: self.registry_reuses.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of engine statistics (non-atomic copy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStatsSnapshot {
    /// Queries executed
    pub queries: u64,
    /// Cache hits
    pub cache_hits: u64,
    /// Cache misses
    pub cache_misses: u64,
    /// Registry builds
    pub registry_builds: u64,
    /// Registry reuses
    pub registry_reuses: u64,
    /// Rejected queries
    pub rejected: u64,
}

// ============================================================================
// Query Engine
// ============================================================================

/// Orchestrates registry lifecycle, caching and evaluation
pub struct QueryEngine {
    config: EngineConfig,
    evaluator: Evaluator,
    cache: ResultCache,

    /// Current registry; replaced whole, never mutated in place
    registry: RwLock<Option<Arc<Registry>>>,

    /// Serializes builds so one fingerprint is built once
    build_lock: Mutex<()>,

    metrics: EngineMetrics,
    stats: EngineStats,
}

impl QueryEngine {
    /// Create an engine from configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let pool = Arc::new(config.parallel.build_pool()?);
        let selector = StrategySelector::new(config.strategy.clone());

        Ok(Self {
            evaluator: Evaluator::new(selector, pool),
            cache: ResultCache::new(config.cache.clone()),
            registry: RwLock::new(None),
            build_lock: Mutex::new(()),
            metrics: EngineMetrics::new()?,
            stats: EngineStats::default(),
            config,
        })
    }

    /// Filter `cards` through `query`
    ///
    /// Invalid collections (duplicate identifiers) are rejected with
    /// `Error::Rejected`; nothing on this path panics on external input.
    pub fn execute(&self, cards: &[Card], query: &Query) -> Result<QueryOutcome> {
        let start = Instant::now();
        self.stats.queries.fetch_add(1, Ordering::Relaxed);

        let fingerprint = Fingerprint::of(cards);
        let registry = match self.registry_for(cards, &fingerprint) {
            Ok(registry) => registry,
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_rejected();
                warn!(fingerprint = %fingerprint, error = %e, "Rejected query");
                return Err(Error::Rejected(e.to_string()));
            }
        };

        let key = CacheKey::derive(&fingerprint, query);

        let (cached, cache_hit) = match self.cache.get(&key) {
            Some(hit) => {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Result cache hit");
                (hit, true)
            }
            None => {
                self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
                let corpus = Corpus::Indexed(&registry);
                let evaluation = self.evaluator.evaluate(&corpus, query)?;
                debug!(
                    key = %key,
                    steps_applied = evaluation.steps_applied,
                    steps_total = evaluation.steps_total,
                    matched = evaluation.positions.len(),
                    "Result cache miss; evaluated"
                );

                let value = CachedEvaluation {
                    card_ids: evaluation.card_ids(&corpus),
                    steps_applied: evaluation.steps_applied,
                    state: evaluation.state,
                    tiers: evaluation.tiers,
                };
                self.cache.put(key, value.clone());
                (Arc::new(value), false)
            }
        };

        let elapsed = start.elapsed();
        let outcome = QueryOutcome {
            card_ids: cached.card_ids.clone(),
            elapsed,
            steps_applied: cached.steps_applied,
            steps_total: query.len(),
            short_circuited: matches!(cached.state, EvaluationState::ShortCircuited(_)),
            state: cached.state,
            tiers: cached.tiers.clone(),
            cache_hit,
            fingerprint,
        };

        self.metrics
            .record_query(outcome.primary_tier(), cache_hit, elapsed.as_secs_f64());

        Ok(outcome)
    }

    /// Snapshot the collection from a storage collaborator and execute
    pub fn execute_from(&self, source: &dyn CardSource, query: &Query) -> Result<QueryOutcome> {
        let cards = source.snapshot()?;
        self.execute(&cards, query)
    }

    /// Execute under a caller deadline
    ///
    /// Evaluation runs on tokio's blocking pool. When the deadline passes the
    /// caller gets `Error::Timeout`, never a partial result; the evaluation
    /// itself is not interrupted and still finishes (and caches) in the
    /// background.
    pub async fn execute_with_deadline(
        self: &Arc<Self>,
        cards: Arc<[Card]>,
        query: Query,
        deadline: Duration,
    ) -> Result<QueryOutcome> {
        let engine = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || engine.execute(&cards, &query));

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::Rejected(format!(
                "evaluation task failed: {}",
                join_error
            ))),
            Err(_) => {
                warn!(deadline_ms = deadline.as_millis() as u64, "Query exceeded deadline");
                Err(Error::Timeout(deadline))
            }
        }
    }

    /// Resolve identifiers back to cards; missing ids become `NotFound`
    pub fn resolve(&self, source: &dyn CardSource, ids: &[CardId]) -> Result<Vec<Resolution>> {
        resolve_cards(source, ids)
    }

    /// Bitmap of a card in the current registry
    pub fn lookup_bitmap(&self, card_id: &str) -> std::result::Result<TagBitmap, RegistryError> {
        let registry = self.current_registry().ok_or(RegistryError::NotReady)?;
        registry.lookup_bitmap(card_id).cloned()
    }

    /// The registry from the latest build, if any
    pub fn current_registry(&self) -> Option<Arc<Registry>> {
        self.registry.read().clone()
    }

    /// Drop all cached results
    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    /// Engine statistics
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Cache statistics
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    /// Metric handles
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Internal Methods
    // ========================================================================

    /// Current registry if it indexes `fingerprint`
    fn matching_registry(&self, fingerprint: &Fingerprint) -> Option<Arc<Registry>> {
        self.registry
            .read()
            .as_ref()
            .filter(|r| r.matches(fingerprint))
            .cloned()
    }

    /// Reuse or build the registry for a collection
    fn registry_for(
        &self,
        cards: &[Card],
        fingerprint: &Fingerprint,
    ) -> std::result::Result<Arc<Registry>, RegistryError> {
        if let Some(registry) = self.matching_registry(fingerprint) {
            self.stats.registry_reuses.fetch_add(1, Ordering::Relaxed);
            return Ok(registry);
        }

        let _guard = self.build_lock.lock();

        // Another caller may have finished the same build while we waited
        if let Some(registry) = self.matching_registry(fingerprint) {
            self.stats.registry_reuses.fetch_add(1, Ordering::Relaxed);
            return Ok(registry);
        }

        let registry = Arc::new(Registry::build(cards)?);
        debug_assert!(registry.validate(), "registry failed validation after build");

        *self.registry.write() = Some(Arc::clone(&registry));
        self.stats.registry_builds.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_build(registry.card_count());

        Ok(registry)
    }
}

// ============================================================================
// Tests
// ============================================================================
