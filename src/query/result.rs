//! Query outcome returned by the engine

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::index::Fingerprint;
use crate::query::evaluator::EvaluationState;
use crate::query::strategy::Tier;
use crate::types::CardId;

/// Surviving identifiers plus execution metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOutcome {
    /// Surviving card identifiers, ascending
    pub card_ids: Vec<CardId>,

    /// Wall time of the whole orchestrated call
    #[serde(rename = "elapsed_us", serialize_with = "duration_micros")]
    pub elapsed: Duration,

    /// Steps actually executed
    pub steps_applied: usize,

    /// Steps in the query
    pub steps_total: usize,

    /// Whether evaluation stopped early on an empty set
    pub short_circuited: bool,

    /// Terminal evaluation state
    pub state: EvaluationState,

    /// Tier used for each executed step
    pub tiers: Vec<Tier>,

    /// Whether the result came from the cache
    pub cache_hit: bool,

    /// Content fingerprint of the filtered collection
    pub fingerprint: Fingerprint,
}

impl QueryOutcome {
    /// Tier of the first executed step, which saw the largest candidate set
    pub fn primary_tier(&self) -> Option<Tier> {
        self.tiers.first().copied()
    }

    /// Number of surviving cards
    pub fn len(&self) -> usize {
        self.card_ids.len()
    }

    /// Check if nothing matched
    pub fn is_empty(&self) -> bool {
        self.card_ids.is_empty()
    }
}

fn duration_micros<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(d.as_micros() as u64)
}
