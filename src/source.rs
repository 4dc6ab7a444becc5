//! Card Source - storage collaborator boundary
//!
//! The engine never performs I/O. A `CardSource` supplies the card
//! collection to filter and resolves result identifiers back to full cards.
//! `InMemoryCardSource` is the reference implementation used by tests and
//! the CLI.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::types::{Card, CardId};

/// Storage layer that owns cards
///
/// This trait abstracts the storage layer so the engine can work with
/// different backends (in-memory, database, remote service).
pub trait CardSource: Send + Sync {
    /// Current card collection
    fn snapshot(&self) -> Result<Vec<Card>>;

    /// Fetch one card by identifier
    fn get(&self, id: &CardId) -> Result<Option<Card>>;
}

/// Outcome of resolving one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// The card exists
    Found {
        /// The resolved card
        card: Card,
    },
    /// No card with this identifier
    NotFound {
        /// The identifier that failed to resolve
        id: CardId,
    },
}

impl Resolution {
    /// The card, if found
    pub fn card(&self) -> Option<&Card> {
        match self {
            Resolution::Found { card } => Some(card),
            Resolution::NotFound { .. } => None,
        }
    }
}

/// Resolve identifiers one by one; a missing id never aborts the batch
pub fn resolve_cards(source: &dyn CardSource, ids: &[CardId]) -> Result<Vec<Resolution>> {
    ids.iter()
        .map(|id| {
            Ok(match source.get(id)? {
                Some(card) => Resolution::Found { card },
                None => Resolution::NotFound { id: id.clone() },
            })
        })
        .collect()
}

/// In-memory card store
#[derive(Debug, Clone, Default)]
pub struct InMemoryCardSource {
    /// Cards keyed by identifier
    cards: BTreeMap<CardId, Card>,
}

impl InMemoryCardSource {
    /// Create a new empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a card
    pub fn insert(&mut self, card: Card) {
        self.cards.insert(card.id().clone(), card);
    }

    /// Remove a card
    pub fn remove(&mut self, id: &CardId) -> Option<Card> {
        self.cards.remove(id)
    }

    /// Number of stored cards
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl FromIterator<Card> for InMemoryCardSource {
    fn from_iter<I: IntoIterator<Item = Card>>(iter: I) -> Self {
        let mut source = Self::new();
        for card in iter {
            source.insert(card);
        }
        source
    }
}

impl CardSource for InMemoryCardSource {
    fn snapshot(&self) -> Result<Vec<Card>> {
        Ok(self.cards.values().cloned().collect())
    }

    fn get(&self, id: &CardId) -> Result<Option<Card>> {
        Ok(self.cards.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> InMemoryCardSource {
        [
            Card::new("A", "Crash", ["bug"]),
            Card::new("B", "Dark mode", ["feature"]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_snapshot() {
        let src = source();
        let cards = src.snapshot().unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].id().as_str(), "A");
    }

    #[test]
    fn test_resolve_with_missing_id() {
        let src = source();
        let ids = vec![CardId::from("B"), CardId::from("Z"), CardId::from("A")];
        let resolved = resolve_cards(&src, &ids).unwrap();

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].card().map(Card::title), Some("Dark mode"));
        assert_eq!(
            resolved[1],
            Resolution::NotFound {
                id: CardId::from("Z")
            }
        );
        assert!(resolved[2].card().is_some());
    }

    #[test]
    fn test_insert_replaces() {
        let mut src = source();
        src.insert(Card::new("A", "Crash v2", ["bug", "urgent"]));
        assert_eq!(src.len(), 2);
        let a = src.get(&CardId::from("A")).unwrap().unwrap();
        assert_eq!(a.title(), "Crash v2");

        assert!(src.remove(&CardId::from("A")).is_some());
        assert_eq!(src.len(), 1);
    }
}
