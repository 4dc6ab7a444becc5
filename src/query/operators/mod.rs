//! Step Operators - Tiered execution primitives
//!
//! Every operator filters a list of candidate positions through one step
//! and returns the survivors in ascending position order:
//!
//! - `DirectOperator`: per-card tag set tests, works without a registry
//! - `ChunkedOperator`: bitmap tests over contiguous chunks on a rayon pool
//! - `BitmapOperator`: single-threaded bitmap tests
//!
//! All three implement the same step semantics, so the tier never changes
//! the result, only the cost.

pub mod bitmap;
pub mod direct;
pub mod parallel;

pub use bitmap::BitmapOperator;
pub use direct::DirectOperator;
pub use parallel::{ChunkedOperator, ParallelConfig};

use crate::error::RegistryError;
use crate::index::{Registry, TagBitmap};
use crate::query::ast::Step;
use crate::query::strategy::Tier;
use crate::types::Card;

// ============================================================================
// Corpus
// ============================================================================

/// The card collection a query runs against
///
/// Positions are indexes into `Plain` slices or registry positions.
#[derive(Debug, Clone, Copy)]
pub enum Corpus<'a> {
    /// Raw cards in caller order, no bitmaps
    Plain(&'a [Card]),
    /// Cards indexed by a built registry
    Indexed(&'a Registry),
}

impl<'a> Corpus<'a> {
    /// Number of cards
    pub fn len(&self) -> usize {
        match self {
            Corpus::Plain(cards) => cards.len(),
            Corpus::Indexed(registry) => registry.card_count(),
        }
    }

    /// Check if the corpus has no cards
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Card at a position
    pub fn card(&self, position: usize) -> Option<&'a Card> {
        match self {
            Corpus::Plain(cards) => cards.get(position),
            Corpus::Indexed(registry) => registry.card_at(position),
        }
    }

    /// Registry, when bitmaps are available
    pub fn registry(&self) -> Option<&'a Registry> {
        match self {
            Corpus::Plain(_) => None,
            Corpus::Indexed(registry) => Some(registry),
        }
    }

    /// Every position, ascending
    pub fn all_positions(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }
}

// ============================================================================
// Operator Trait
// ============================================================================

/// Applies one step to a candidate set
pub trait StepOperator: Send + Sync {
    /// Tier this operator implements
    fn tier(&self) -> Tier;

    /// Filter `candidates` (ascending positions) through `step`
    ///
    /// Returns `RegistryError::NotReady` when the operator needs bitmaps
    /// and the corpus has none.
    fn apply(
        &self,
        corpus: &Corpus<'_>,
        candidates: &[usize],
        step: &Step,
    ) -> Result<Vec<usize>, RegistryError>;
}

// ============================================================================
// Bitmap Predicate
// ============================================================================

/// A step compiled against a registry's tag universe
#[derive(Debug, Clone)]
pub enum BitmapPredicate {
    /// Matches no card (an intersection requiring an unknown tag)
    Never,
    /// `(card & target) == target`
    ContainsAll(TagBitmap),
    /// `(card & target) != 0`
    Intersects(TagBitmap),
    /// `(card & target) == 0`
    Disjoint(TagBitmap),
}

impl BitmapPredicate {
    /// Compile a step into bitmap form
    pub fn compile(step: &Step, registry: &Registry) -> Self {
        let target = registry.resolve_target(step.tags());
        match step {
            Step::Intersection(_) if !target.fully_known() => BitmapPredicate::Never,
            Step::Intersection(_) => BitmapPredicate::ContainsAll(target.bits),
            // Unknown tags cannot overlap any card, so dropping them is exact
            Step::Union(_) => BitmapPredicate::Intersects(target.bits),
            Step::Exclusion(_) => BitmapPredicate::Disjoint(target.bits),
        }
    }

    /// Evaluate against one card bitmap
    #[inline]
    pub fn matches(&self, card: &TagBitmap) -> bool {
        match self {
            BitmapPredicate::Never => false,
            BitmapPredicate::ContainsAll(target) => card.contains_all(target),
            BitmapPredicate::Intersects(target) => card.intersects(target),
            BitmapPredicate::Disjoint(target) => card.is_disjoint(target),
        }
    }

    /// Filter a slice of positions against registry bitmaps
    pub(crate) fn filter(&self, bitmaps: &[TagBitmap], positions: &[usize]) -> Vec<usize> {
        if matches!(self, BitmapPredicate::Never) {
            return Vec::new();
        }
        positions
            .iter()
            .copied()
            .filter(|&p| bitmaps.get(p).is_some_and(|b| self.matches(b)))
            .collect()
    }
}

// ============================================================================
// Tier Executors
// ============================================================================

/// One operator per tier
pub struct TierExecutors {
    direct: DirectOperator,
    chunked: ChunkedOperator,
    bitmap: BitmapOperator,
}

impl TierExecutors {
    /// Bundle the three operators
    pub fn new(chunked: ChunkedOperator) -> Self {
        Self {
            direct: DirectOperator,
            chunked,
            bitmap: BitmapOperator,
        }
    }

    /// Operator for a tier
    pub fn for_tier(&self, tier: Tier) -> &dyn StepOperator {
        match tier {
            Tier::Direct => &self.direct,
            Tier::Chunked => &self.chunked,
            Tier::Bitmap => &self.bitmap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::build(&[
            Card::new("A", "", ["urgent", "bug"]),
            Card::new("B", "", ["urgent", "feature"]),
            Card::new("C", "", ["bug"]),
            Card::new("D", "", Vec::<String>::new()),
        ])
        .unwrap()
    }

    #[test]
    fn test_compile_intersection_with_unknown_tag() {
        let registry = registry();
        let predicate = BitmapPredicate::compile(&Step::intersection(["bug", "missing"]), &registry);
        assert!(matches!(predicate, BitmapPredicate::Never));
        assert!(predicate.filter(registry.bitmaps(), &[0, 1, 2, 3]).is_empty());
    }

    #[test]
    fn test_compile_union_with_unknown_tag() {
        let registry = registry();
        let predicate = BitmapPredicate::compile(&Step::union(["bug", "missing"]), &registry);
        assert_eq!(predicate.filter(registry.bitmaps(), &[0, 1, 2, 3]), vec![0, 2]);
    }

    #[test]
    fn test_empty_targets() {
        let registry = registry();
        let all = [0, 1, 2, 3];
        let none = Vec::<String>::new();

        let p = BitmapPredicate::compile(&Step::intersection(none.clone()), &registry);
        assert_eq!(p.filter(registry.bitmaps(), &all), vec![0, 1, 2, 3]);

        let p = BitmapPredicate::compile(&Step::union(none.clone()), &registry);
        assert!(p.filter(registry.bitmaps(), &all).is_empty());

        let p = BitmapPredicate::compile(&Step::exclusion(none), &registry);
        assert_eq!(p.filter(registry.bitmaps(), &all), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_corpus_accessors() {
        let registry = registry();
        let corpus = Corpus::Indexed(&registry);
        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus.card(2).map(|c| c.id().as_str()), Some("C"));
        assert!(corpus.registry().is_some());

        let cards = vec![Card::new("Z", "", ["x"])];
        let plain = Corpus::Plain(&cards);
        assert!(plain.registry().is_none());
        assert_eq!(plain.all_positions(), vec![0]);
    }

    #[test]
    fn test_executors_dispatch_by_tier() {
        let pool = ParallelConfig::default().with_workers(2).build_pool().unwrap();
        let selector = crate::query::strategy::StrategySelector::new(Default::default());
        let executors = TierExecutors::new(ChunkedOperator::new(std::sync::Arc::new(pool), selector));

        for tier in [Tier::Direct, Tier::Chunked, Tier::Bitmap] {
            assert_eq!(executors.for_tier(tier).tier(), tier);
        }
    }
}
