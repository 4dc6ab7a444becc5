//! Core data types shared across the engine
//!
//! # Key Types
//!
//! - **`CardId`**: Unique string identifier for a card
//! - **`Card`**: An immutable card (identifier, title, tag set)
//!
//! Cards are owned by the storage collaborator. The engine only reads them.
//!
//! # Example
//!
//! ```rust
//! use cardsift::types::Card;
//!
//! let card = Card::new("A", "Fix login", ["urgent", "bug"]);
//! assert!(card.has_tag("bug"));
//! assert_eq!(card.tags().len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

/// Unique identifier for a card
///
/// Ordering is plain byte-wise string ordering; the registry relies on it
/// for its deterministic card positions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Create a card id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for CardId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A card in the organizer
///
/// Tags are stored in a `BTreeSet`, so iteration is always in sorted order
/// and duplicates collapse on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    id: CardId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    tags: BTreeSet<String>,
}

impl Card {
    /// Create a card from an id, a title and any iterable of tags
    pub fn new<I, S>(id: impl Into<CardId>, title: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            title: title.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Card identifier
    pub fn id(&self) -> &CardId {
        &self.id
    }

    /// Display title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Tag labels in sorted order
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Check whether the card carries a tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
