//! Content fingerprints for card collections
//!
//! A fingerprint is a SHA-256 digest over a canonical encoding of the
//! collection: cards sorted by identifier, each followed by its tags in
//! sorted order, every string length-prefixed. It depends only on content,
//! never on input order, addresses or time.

use std::fmt;

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::types::Card;

/// Domain separator so collection digests never collide with key digests
const FINGERPRINT_DOMAIN: &[u8] = b"cardsift/collection/v1";

/// Deterministic content hash of a card collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint a card collection in any order
    pub fn of(cards: &[Card]) -> Self {
        let mut sorted: Vec<&Card> = cards.iter().collect();
        sorted.sort_by(|a, b| a.id().cmp(b.id()));
        Self::of_sorted(&sorted)
    }

    /// Fingerprint cards that are already sorted by identifier
    pub(crate) fn of_sorted(sorted: &[&Card]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_DOMAIN);
        hasher.update((sorted.len() as u64).to_le_bytes());

        for card in sorted {
            write_str(&mut hasher, card.id().as_str());
            hasher.update((card.tags().len() as u64).to_le_bytes());
            // BTreeSet iteration is sorted
            for tag in card.tags() {
                write_str(&mut hasher, tag);
            }
        }

        Fingerprint(hasher.finalize().into())
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for logs
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Length-prefixed string write, so ("ab","c") and ("a","bc") differ
pub(crate) fn write_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards() -> Vec<Card> {
        vec![
            Card::new("A", "a", ["urgent", "bug"]),
            Card::new("B", "b", ["urgent", "feature"]),
            Card::new("C", "c", ["bug"]),
        ]
    }

    #[test]
    fn test_fingerprint_order_independent() {
        let forward = cards();
        let mut reversed = cards();
        reversed.reverse();

        assert_eq!(Fingerprint::of(&forward), Fingerprint::of(&reversed));
    }

    #[test]
    fn test_fingerprint_tag_sensitive() {
        let base = cards();
        let mut changed = cards();
        changed[2] = Card::new("C", "c", ["bug", "docs"]);

        assert_ne!(Fingerprint::of(&base), Fingerprint::of(&changed));
    }

    #[test]
    fn test_fingerprint_ignores_title() {
        let base = cards();
        let mut retitled = cards();
        retitled[0] = Card::new("A", "renamed", ["urgent", "bug"]);

        assert_eq!(Fingerprint::of(&base), Fingerprint::of(&retitled));
    }

    #[test]
    fn test_fingerprint_length_prefix() {
        let left = vec![Card::new("ab", "", ["c"])];
        let right = vec![Card::new("a", "", ["bc"])];
        assert_ne!(Fingerprint::of(&left), Fingerprint::of(&right));
    }

    #[test]
    fn test_fingerprint_empty_collection() {
        let a = Fingerprint::of(&[]);
        let b = Fingerprint::of(&[]);
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
        assert_eq!(a.to_string().len(), 16);
    }

    #[test]
    fn test_fingerprint_hex_forms() {
        let fp = Fingerprint::of(&cards());
        let full = fp.to_hex();

        assert_eq!(full, hex::encode(fp.as_bytes()));
        assert!(full.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(full.starts_with(&fp.to_string()));
        assert_eq!(
            serde_json::to_value(fp).unwrap(),
            serde_json::Value::String(full)
        );
    }
}
