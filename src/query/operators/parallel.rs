//! Chunked Parallel Operator
//!
//! Splits the candidate positions into contiguous chunks and filters each
//! chunk on a rayon pool using registry bitmaps. Workers share the registry
//! read-only and produce independent vectors that are concatenated in chunk
//! order, so output stays ascending without a sort.
//!
//! # Example
//!
//! ```rust
//! use cardsift::query::operators::ParallelConfig;
//!
//! let config = ParallelConfig::default();
//! assert!(config.num_workers > 0);
//! ```

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, RegistryError, Result};
use crate::query::ast::Step;
use crate::query::operators::{BitmapPredicate, Corpus, StepOperator};
use crate::query::strategy::{StrategySelector, Tier};

// ============================================================================
// Parallel Configuration
// ============================================================================

/// Configuration for the chunked tier's worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of worker threads (default: number of CPUs)
    #[serde(default = "default_workers")]
    pub num_workers: usize,
}

fn default_workers() -> usize {
    num_cpus::get()
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_workers: default_workers(),
        }
    }
}

impl ParallelConfig {
    /// Create config with custom worker count
    pub fn with_workers(mut self, n: usize) -> Self {
        self.num_workers = n.max(1);
        self
    }

    /// Build a dedicated thread pool for chunk workers
    pub fn build_pool(&self) -> Result<ThreadPool> {
        ThreadPoolBuilder::new()
            .num_threads(self.num_workers.max(1))
            .thread_name(|i| format!("cardsift-worker-{}", i))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build worker pool: {}", e)))
    }
}

// ============================================================================
// Chunked Operator
// ============================================================================

/// Operator for the chunked tier
pub struct ChunkedOperator {
    pool: Arc<ThreadPool>,
    selector: StrategySelector,
}

impl ChunkedOperator {
    /// Create an operator running on `pool`, sizing chunks with `selector`
    pub fn new(pool: Arc<ThreadPool>, selector: StrategySelector) -> Self {
        Self { pool, selector }
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl StepOperator for ChunkedOperator {
    fn tier(&self) -> Tier {
        Tier::Chunked
    }

    fn apply(
        &self,
        corpus: &Corpus<'_>,
        candidates: &[usize],
        step: &Step,
    ) -> std::result::Result<Vec<usize>, RegistryError> {
        let registry = corpus.registry().ok_or(RegistryError::NotReady)?;
        let predicate = BitmapPredicate::compile(step, registry);
        if matches!(predicate, BitmapPredicate::Never) || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let bitmaps = registry.bitmaps();
        let chunk_size = self.selector.chunk_size(candidates.len(), self.workers());

        let parts: Vec<Vec<usize>> = self.pool.install(|| {
            candidates
                .par_chunks(chunk_size)
                .map(|chunk| predicate.filter(bitmaps, chunk))
                .collect()
        });

        Ok(parts.concat())
    }
}
