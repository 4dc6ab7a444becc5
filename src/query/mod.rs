//! Query engine for tag-based card filtering
//!
//! A query is an ordered list of steps. Each step narrows the surviving set
//! of cards by one set operation over tags, and each step may run on a
//! different execution tier depending on how many candidates remain.
//!
//! # Architecture
//!
//! ```text
//! Cards + Query
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Fingerprint │  Content hash, order independent
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Registry   │  Reuse or build tag universe + card bitmaps
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Cache     │  Key = fingerprint + canonical query
//! └─────────────┘
//!      │ miss
//!      ▼
//! ┌─────────────┐
//! │  Evaluate   │  Per-step tier: direct, chunked, bitmap
//! └─────────────┘
//!      │
//!      ▼
//!  QueryOutcome
//! ```
//!
//! # Example
//!
//! ```rust
//! use cardsift::query::{Query, QueryBuilder};
//!
//! let built = QueryBuilder::new()
//!     .intersection(["urgent", "bug"])
//!     .exclusion(["feature"])
//!     .build()
//!     .unwrap();
//!
//! let parsed: Query = "intersection:urgent,bug; exclusion:feature".parse().unwrap();
//! assert_eq!(built, parsed);
//! ```

pub mod ast;
pub mod cache;
pub mod engine;
pub mod evaluator;
pub mod operators;
pub mod result;
pub mod strategy;

pub use ast::{Operation, Query, QueryBuilder, Step};
pub use cache::{CacheConfig, CacheKey, CacheStatsSnapshot, CachedEvaluation, ResultCache};
pub use engine::{EngineStatsSnapshot, QueryEngine};
pub use evaluator::{Evaluation, EvaluationState, Evaluator};
pub use operators::{Corpus, ParallelConfig};
pub use result::QueryOutcome;
pub use strategy::{StrategyConfig, StrategySelector, Tier};
