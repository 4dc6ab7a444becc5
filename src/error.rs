//! Error types for the filtering engine

use std::time::Duration;

use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    /// Query construction or validation error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Registry build or lookup error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Query rejected before evaluation (invalid collection, broken invariant)
    #[error("Query rejected: {0}")]
    Rejected(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Caller-supplied deadline exceeded
    #[error("Query exceeded deadline of {0:?}")]
    Timeout(Duration),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Query construction errors
///
/// Raised eagerly when a query is built from external input, never
/// mid-evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A query must contain at least one step
    #[error("Query has no steps")]
    EmptyQuery,

    /// Operation name is not one of intersection, union, exclusion
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Step text could not be parsed
    #[error("Malformed step: {0}")]
    MalformedStep(String),
}

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The same card identifier appeared twice in one collection
    #[error("Duplicate card id: {0}")]
    DuplicateCardId(String),

    /// Card identifier is not indexed
    #[error("Card not found: {0}")]
    CardNotFound(String),

    /// No registry has been built yet
    #[error("Registry not ready")]
    NotReady,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
