//! Cardsift - deterministic tag filtering for card collections
//!
//! This library filters collections of tagged cards through multi-step
//! queries with:
//! - Content-fingerprinted bitmap registries, rebuilt only on content change
//! - Per-step tier selection (direct scan, chunked parallel, bitmap)
//! - Short-circuit evaluation on empty intermediate results
//! - A bounded result cache keyed by collection content and query
//!
//! Card storage stays outside the engine; see [`source::CardSource`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;
pub mod source;
pub mod types;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Query model, tier selection, evaluation, caching and orchestration
pub mod query;

// Re-export main types
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use query::{Query, QueryBuilder, QueryEngine, QueryOutcome};
pub use types::{Card, CardId};
