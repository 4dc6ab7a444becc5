//! Tag Bitmaps
//!
//! Each card carries a bitmap where bit N is set if the card has the tag
//! assigned to bit position N in the registry's tag universe. Query targets
//! are bitmaps of the same shape, so every step collapses to word-wise
//! integer tests.
//!
//! # Performance
//!
//! - Membership test: O(1)
//! - Subset / overlap test: O(w) where w is the number of 64-bit words
//! - Memory: 1 bit per tag in the universe, per card
//!
//! # Example
//!
//! ```rust
//! use cardsift::index::TagBitmap;
//!
//! let mut card = TagBitmap::with_capacity(70);
//! card.set(3);
//! card.set(65);
//!
//! let mut target = TagBitmap::with_capacity(70);
//! target.set(65);
//!
//! assert!(card.contains_all(&target));
//! assert!(card.intersects(&target));
//! ```

// ============================================================================
// Tag Bitmap
// ============================================================================

/// A multi-word bitmap over tag bit positions
///
/// Uses a vector of u64 words. Bitmaps built by one registry all share the
/// same width, but the comparison helpers treat missing words as zero so
/// bitmaps of different widths still compare correctly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagBitmap {
    /// Bitmap words (64 bits each)
    words: Vec<u64>,

    /// Number of bits set (cached for fast cardinality)
    cardinality: usize,
}

impl TagBitmap {
    /// Create an empty, zero-width bitmap
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            cardinality: 0,
        }
    }

    /// Create an all-zero bitmap wide enough for `num_bits` positions
    pub fn with_capacity(num_bits: usize) -> Self {
        let num_words = num_bits.div_ceil(64);
        Self {
            words: vec![0; num_words],
            cardinality: 0,
        }
    }

    /// Set a bit, growing the bitmap if needed
    pub fn set(&mut self, bit: usize) {
        let word_idx = bit / 64;
        let bit_idx = bit % 64;

        if word_idx >= self.words.len() {
            self.words.resize(word_idx + 1, 0);
        }

        let mask = 1u64 << bit_idx;
        if self.words[word_idx] & mask == 0 {
            self.words[word_idx] |= mask;
            self.cardinality += 1;
        }
    }

    /// Check if a bit is set
    pub fn contains(&self, bit: usize) -> bool {
        let word_idx = bit / 64;
        let bit_idx = bit % 64;

        match self.words.get(word_idx) {
            Some(word) => (word & (1u64 << bit_idx)) != 0,
            None => false,
        }
    }

    /// Number of bits set
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Check if no bit is set
    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    /// Width in 64-bit words
    pub fn width_words(&self) -> usize {
        self.words.len()
    }

    /// Raw words
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Subset test: `(self & target) == target`
    ///
    /// An empty target is a subset of everything.
    #[inline]
    pub fn contains_all(&self, target: &TagBitmap) -> bool {
        target.words.iter().enumerate().all(|(i, &t)| {
            let w = self.words.get(i).copied().unwrap_or(0);
            w & t == t
        })
    }

    /// Overlap test: `(self & target) != 0`
    ///
    /// An empty target overlaps nothing.
    #[inline]
    pub fn intersects(&self, target: &TagBitmap) -> bool {
        self.words
            .iter()
            .zip(target.words.iter())
            .any(|(&w, &t)| w & t != 0)
    }

    /// Disjointness test: `(self & target) == 0`
    #[inline]
    pub fn is_disjoint(&self, target: &TagBitmap) -> bool {
        !self.intersects(target)
    }

    /// Iterate over all set bit positions in ascending order
    pub fn iter(&self) -> BitmapIterator<'_> {
        BitmapIterator {
            bitmap: self,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Memory usage in bytes
    pub fn memory_bytes(&self) -> usize {
        self.words.len() * 8
    }
}

impl Default for TagBitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over set bits in a bitmap
pub struct BitmapIterator<'a> {
    bitmap: &'a TagBitmap,
    word_idx: usize,
    /// Remaining unvisited bits of the current word
    current: u64,
}

impl Iterator for BitmapIterator<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                // Clear lowest set bit
                self.current &= self.current - 1;
                return Some(self.word_idx * 64 + bit);
            }

            self.word_idx += 1;
            if self.word_idx >= self.bitmap.words.len() {
                return None;
            }
            self.current = self.bitmap.words[self.word_idx];
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap_of(bits: &[usize]) -> TagBitmap {
        let mut bitmap = TagBitmap::with_capacity(128);
        for &b in bits {
            bitmap.set(b);
        }
        bitmap
    }

    #[test]
    fn test_bitmap_basic() {
        let bitmap = bitmap_of(&[1, 5, 100]);

        assert!(bitmap.contains(1));
        assert!(bitmap.contains(5));
        assert!(bitmap.contains(100));
        assert!(!bitmap.contains(2));
        assert!(!bitmap.contains(500));

        assert_eq!(bitmap.cardinality(), 3);
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut bitmap = TagBitmap::new();
        bitmap.set(7);
        bitmap.set(7);
        assert_eq!(bitmap.cardinality(), 1);
    }

    #[test]
    fn test_contains_all() {
        let card = bitmap_of(&[1, 2, 70]);

        assert!(card.contains_all(&bitmap_of(&[1, 70])));
        assert!(!card.contains_all(&bitmap_of(&[1, 3])));
        assert!(card.contains_all(&TagBitmap::with_capacity(128)));
        assert!(card.contains_all(&TagBitmap::new()));
    }

    #[test]
    fn test_contains_all_wider_target() {
        let narrow = bitmap_of(&[1]);
        let mut wide = TagBitmap::with_capacity(256);
        wide.set(200);
        assert!(!narrow.contains_all(&wide));
    }

    #[test]
    fn test_intersects_and_disjoint() {
        let card = bitmap_of(&[1, 64]);

        assert!(card.intersects(&bitmap_of(&[64, 99])));
        assert!(!card.intersects(&bitmap_of(&[2, 3])));
        assert!(card.is_disjoint(&bitmap_of(&[2, 3])));

        let empty = TagBitmap::with_capacity(128);
        assert!(!card.intersects(&empty));
        assert!(card.is_disjoint(&empty));
    }

    #[test]
    fn test_bitmap_iterator() {
        let bitmap = bitmap_of(&[1, 5, 64, 100, 127]);
        let bits: Vec<usize> = bitmap.iter().collect();
        assert_eq!(bits, vec![1, 5, 64, 100, 127]);

        assert_eq!(TagBitmap::new().iter().count(), 0);
        assert_eq!(TagBitmap::with_capacity(200).iter().count(), 0);
    }

    #[test]
    fn test_bitmap_memory() {
        let bitmap = TagBitmap::with_capacity(1000);
        assert_eq!(bitmap.width_words(), 16);
        assert_eq!(bitmap.memory_bytes(), 16 * 8);
    }
}
