//! Card Registry and Bitmap Index Module
//!
//! Precomputes one tag bitmap per card so that query steps reduce to
//! integer tests instead of string comparisons.
//!
//! # Components
//!
//! - **bitmap**: Multi-word bitmap over tag bit positions
//! - **fingerprint**: Deterministic content hash of a card collection
//! - **registry**: Tag universe + card index, built once per collection

pub mod bitmap;
pub mod fingerprint;
pub mod registry;

// Re-export main types
pub use bitmap::{BitmapIterator, TagBitmap};
pub use fingerprint::Fingerprint;
pub use registry::{CardIndex, Registry, TagUniverse, TargetBitmap};
