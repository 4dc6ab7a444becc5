//! Execution Strategy Selection
//!
//! Picks how a single step is evaluated from the size of the current
//! candidate set:
//!
//! | candidates                     | tier    | needs registry |
//! |--------------------------------|---------|----------------|
//! | `n <= direct_max`              | Direct  | no             |
//! | `direct_max < n <= parallel_max` | Chunked | yes          |
//! | `n > parallel_max`             | Bitmap  | yes            |
//!
//! Selection is a pure function of the count, the thresholds and whether a
//! registry is available. Without a registry every step runs Direct.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution tier for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Per-card tag set tests
    Direct,
    /// Bitmap tests over contiguous chunks on the worker pool
    Chunked,
    /// Single-threaded bitmap tests
    Bitmap,
}

impl Tier {
    /// Whether this tier reads registry bitmaps
    pub fn requires_registry(self) -> bool {
        !matches!(self, Tier::Direct)
    }

    /// Stable label for logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Direct => "direct",
            Tier::Chunked => "chunked",
            Tier::Bitmap => "bitmap",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Strategy Configuration
// ============================================================================

/// Thresholds for tier selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Largest candidate count evaluated directly (default: 20,000)
    #[serde(default = "default_direct_max")]
    pub direct_max: usize,

    /// Largest candidate count evaluated in chunks (default: 200,000)
    #[serde(default = "default_parallel_max")]
    pub parallel_max: usize,

    /// Smallest chunk handed to a worker (default: 1,024)
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// Force one tier for every step, ignoring thresholds
    #[serde(default)]
    pub force_tier: Option<Tier>,
}

fn default_direct_max() -> usize {
    20_000
}

fn default_parallel_max() -> usize {
    200_000
}

fn default_min_chunk_size() -> usize {
    1_024
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            direct_max: default_direct_max(),
            parallel_max: default_parallel_max(),
            min_chunk_size: default_min_chunk_size(),
            force_tier: None,
        }
    }
}

impl StrategyConfig {
    /// Set the direct tier ceiling
    pub fn with_direct_max(mut self, n: usize) -> Self {
        self.direct_max = n;
        self
    }

    /// Set the chunked tier ceiling
    pub fn with_parallel_max(mut self, n: usize) -> Self {
        self.parallel_max = n;
        self
    }

    /// Set the minimum chunk size
    pub fn with_min_chunk_size(mut self, n: usize) -> Self {
        self.min_chunk_size = n.max(1);
        self
    }

    /// Force a tier for every step
    pub fn with_forced_tier(mut self, tier: Tier) -> Self {
        self.force_tier = Some(tier);
        self
    }
}

// ============================================================================
// Selector
// ============================================================================

/// Pure tier selector
#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    config: StrategyConfig,
}

impl StrategySelector {
    /// Create a selector from thresholds
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Choose the tier for a step over `candidate_count` cards
    pub fn select(&self, candidate_count: usize, registry_available: bool) -> Tier {
        if !registry_available {
            return Tier::Direct;
        }

        if let Some(tier) = self.config.force_tier {
            return tier;
        }

        if candidate_count <= self.config.direct_max {
            Tier::Direct
        } else if candidate_count <= self.config.parallel_max {
            Tier::Chunked
        } else {
            Tier::Bitmap
        }
    }

    /// Chunk length for `candidate_count` items over `workers` threads
    pub fn chunk_size(&self, candidate_count: usize, workers: usize) -> usize {
        candidate_count
            .div_ceil(workers.max(1))
            .max(self.config.min_chunk_size)
            .max(1)
    }

    /// Thresholds in use
    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }
}
