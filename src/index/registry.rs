//! Card Registry - Precomputed Tag Bitmap Index
//!
//! The registry is built once per distinct card collection and is read-only
//! afterwards. It holds:
//!
//! - **Tag universe**: every distinct tag, sorted lexicographically, assigned
//!   a dense bit position `0..T-1`
//! - **Card index**: cards sorted by identifier, one bitmap per card
//!
//! Both orderings are derived from content alone, so two registries built
//! from the same cards in any input order are identical bit for bit.
//!
//! # Example
//!
//! ```rust
//! use cardsift::index::Registry;
//! use cardsift::types::Card;
//!
//! let cards = vec![
//!     Card::new("B", "Ship", ["urgent", "feature"]),
//!     Card::new("A", "Crash", ["urgent", "bug"]),
//! ];
//!
//! let registry = Registry::build(&cards).unwrap();
//! assert_eq!(registry.tag_count(), 3);
//! assert_eq!(registry.bit_of("bug"), Some(0));
//!
//! let bitmap = registry.lookup_bitmap("A").unwrap();
//! assert!(bitmap.contains_all(&registry.tags_to_bitmap(["urgent", "bug"])));
//! assert!(registry.validate());
//! ```

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use tracing::info;

use super::bitmap::TagBitmap;
use super::fingerprint::Fingerprint;
use crate::error::RegistryError;
use crate::types::{Card, CardId};

// ============================================================================
// Tag Universe
// ============================================================================

/// Sorted set of distinct tags with their bit positions
#[derive(Debug, Clone, Default)]
pub struct TagUniverse {
    /// Tags in bit order (lexicographic)
    tags: Vec<String>,

    /// Tag text -> bit position
    positions: HashMap<String, usize>,
}

impl TagUniverse {
    fn from_sorted(tags: Vec<String>) -> Self {
        let positions = tags
            .iter()
            .enumerate()
            .map(|(bit, tag)| (tag.clone(), bit))
            .collect();
        Self { tags, positions }
    }

    /// Number of distinct tags
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Check if the universe has no tags
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Bit position for a tag
    pub fn bit_of(&self, tag: &str) -> Option<usize> {
        self.positions.get(tag).copied()
    }

    /// Tag at a bit position
    pub fn tag_at(&self, bit: usize) -> Option<&str> {
        self.tags.get(bit).map(String::as_str)
    }

    /// Tags in bit order
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

// ============================================================================
// Card Index
// ============================================================================

/// Cards in identifier order with one bitmap per position
#[derive(Debug, Clone, Default)]
pub struct CardIndex {
    cards: Vec<Card>,
    bitmaps: Vec<TagBitmap>,
    positions: HashMap<CardId, usize>,
}

impl CardIndex {
    /// Number of indexed cards
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Check if the index has no cards
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

// ============================================================================
// Query Targets
// ============================================================================

/// A step's tag set resolved against the universe
///
/// Unknown tags contribute no bit. They are counted separately because an
/// intersection that requires a tag nobody carries can never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetBitmap {
    /// Bits for every known tag
    pub bits: TagBitmap,

    /// Number of tags absent from the universe
    pub unknown: usize,
}

impl TargetBitmap {
    /// Check if every requested tag is in the universe
    pub fn fully_known(&self) -> bool {
        self.unknown == 0
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable, precomputed tag index for one card collection
#[derive(Debug, Clone)]
pub struct Registry {
    universe: TagUniverse,
    index: CardIndex,
    fingerprint: Fingerprint,
    build_time: Duration,
}

impl Registry {
    /// Build a registry from a card collection
    ///
    /// The input may be in any order. Duplicate identifiers are rejected
    /// because each identifier must own exactly one position.
    pub fn build(cards: &[Card]) -> Result<Self, RegistryError> {
        let start = Instant::now();

        let mut sorted: Vec<&Card> = cards.iter().collect();
        sorted.sort_by(|a, b| a.id().cmp(b.id()));

        if let Some(pair) = sorted.windows(2).find(|w| w[0].id() == w[1].id()) {
            return Err(RegistryError::DuplicateCardId(pair[0].id().to_string()));
        }

        let fingerprint = Fingerprint::of_sorted(&sorted);

        let distinct: BTreeSet<&str> = sorted
            .iter()
            .flat_map(|card| card.tags().iter().map(String::as_str))
            .collect();
        let universe = TagUniverse::from_sorted(distinct.into_iter().map(str::to_string).collect());
        let width = universe.len();

        let mut bitmaps = Vec::with_capacity(sorted.len());
        let mut positions = HashMap::with_capacity(sorted.len());
        for (position, card) in sorted.iter().enumerate() {
            let mut bitmap = TagBitmap::with_capacity(width);
            for tag in card.tags() {
                if let Some(bit) = universe.bit_of(tag) {
                    bitmap.set(bit);
                }
            }
            bitmaps.push(bitmap);
            positions.insert(card.id().clone(), position);
        }

        let index = CardIndex {
            cards: sorted.into_iter().cloned().collect(),
            bitmaps,
            positions,
        };

        let build_time = start.elapsed();
        info!(
            cards = index.len(),
            tags = universe.len(),
            fingerprint = %fingerprint,
            elapsed_us = build_time.as_micros() as u64,
            "Built card registry"
        );

        Ok(Self {
            universe,
            index,
            fingerprint,
            build_time,
        })
    }

    /// Content fingerprint of the indexed collection
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Check whether this registry already indexes the given content
    pub fn matches(&self, fingerprint: &Fingerprint) -> bool {
        &self.fingerprint == fingerprint
    }

    /// Bitmap for a card identifier, O(1)
    pub fn lookup_bitmap(&self, card_id: &str) -> Result<&TagBitmap, RegistryError> {
        self.index
            .positions
            .get(card_id)
            .map(|&position| &self.index.bitmaps[position])
            .ok_or_else(|| RegistryError::CardNotFound(card_id.to_string()))
    }

    /// Position of a card identifier in the index
    pub fn position_of(&self, card_id: &str) -> Option<usize> {
        self.index.positions.get(card_id).copied()
    }

    /// OR of the bits for every known tag; unknown tags are ignored
    pub fn tags_to_bitmap<I, S>(&self, tags: I) -> TagBitmap
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve_target(tags).bits
    }

    /// Resolve a tag set into a target bitmap plus an unknown-tag count
    pub fn resolve_target<I, S>(&self, tags: I) -> TargetBitmap
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bits = TagBitmap::with_capacity(self.universe.len());
        let mut unknown = 0;
        for tag in tags {
            match self.universe.bit_of(tag.as_ref()) {
                Some(bit) => bits.set(bit),
                None => unknown += 1,
            }
        }
        TargetBitmap { bits, unknown }
    }

    /// Internal consistency check
    ///
    /// Index size matches card count, every identifier maps to its own
    /// position, the tag/bit mapping is a bijection, and each bitmap
    /// encodes exactly its card's tags.
    pub fn validate(&self) -> bool {
        let index = &self.index;
        let universe = &self.universe;

        if index.bitmaps.len() != index.cards.len() || index.positions.len() != index.cards.len()
        {
            return false;
        }

        if universe.positions.len() != universe.tags.len() {
            return false;
        }
        let tags_sorted = universe.tags.windows(2).all(|w| w[0] < w[1]);
        let bijective = universe
            .tags
            .iter()
            .enumerate()
            .all(|(bit, tag)| universe.positions.get(tag) == Some(&bit));
        if !tags_sorted || !bijective {
            return false;
        }

        let ids_sorted = index.cards.windows(2).all(|w| w[0].id() < w[1].id());
        if !ids_sorted {
            return false;
        }

        let width = universe.len().div_ceil(64);
        index
            .cards
            .iter()
            .zip(index.bitmaps.iter())
            .enumerate()
            .all(|(position, (card, bitmap))| {
                index.positions.get(card.id()) == Some(&position)
                    && bitmap.width_words() == width
                    && bitmap.cardinality() == card.tags().len()
                    && bitmap
                        .iter()
                        .all(|bit| universe.tag_at(bit).is_some_and(|t| card.has_tag(t)))
            })
    }

    /// Cards in identifier order
    pub fn cards(&self) -> &[Card] {
        &self.index.cards
    }

    /// Card at a position
    pub fn card_at(&self, position: usize) -> Option<&Card> {
        self.index.cards.get(position)
    }

    /// Bitmap at a position
    pub fn bitmap_at(&self, position: usize) -> Option<&TagBitmap> {
        self.index.bitmaps.get(position)
    }

    /// All card bitmaps in position order
    pub fn bitmaps(&self) -> &[TagBitmap] {
        &self.index.bitmaps
    }

    /// Number of indexed cards
    pub fn card_count(&self) -> usize {
        self.index.len()
    }

    /// Number of distinct tags
    pub fn tag_count(&self) -> usize {
        self.universe.len()
    }

    /// The tag universe
    pub fn tag_universe(&self) -> &TagUniverse {
        &self.universe
    }

    /// Bit position of a tag
    pub fn bit_of(&self, tag: &str) -> Option<usize> {
        self.universe.bit_of(tag)
    }

    /// Tag at a bit position
    pub fn tag_at(&self, bit: usize) -> Option<&str> {
        self.universe.tag_at(bit)
    }

    /// Time spent building
    pub fn build_time(&self) -> Duration {
        self.build_time
    }

    /// Approximate bitmap memory in bytes
    pub fn memory_bytes(&self) -> usize {
        self.index.bitmaps.iter().map(TagBitmap::memory_bytes).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
