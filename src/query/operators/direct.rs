//! Direct Operator - per-card tag set evaluation
//!
//! Iterates the candidates and tests each card's `BTreeSet` of tags against
//! the step. Lowest fixed overhead and the only tier that works before a
//! registry exists.

use crate::error::RegistryError;
use crate::query::ast::Step;
use crate::query::operators::{Corpus, StepOperator};
use crate::query::strategy::Tier;

/// Operator for the direct tier
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectOperator;

impl StepOperator for DirectOperator {
    fn tier(&self) -> Tier {
        Tier::Direct
    }

    fn apply(
        &self,
        corpus: &Corpus<'_>,
        candidates: &[usize],
        step: &Step,
    ) -> Result<Vec<usize>, RegistryError> {
        Ok(candidates
            .iter()
            .copied()
            .filter(|&p| corpus.card(p).is_some_and(|card| step.matches_tags(card.tags())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Registry;
    use crate::types::Card;

    fn cards() -> Vec<Card> {
        vec![
            Card::new("D", "", ["urgent", "bug"]),
            Card::new("A", "", ["urgent", "bug"]),
            Card::new("C", "", ["bug"]),
            Card::new("B", "", ["urgent", "feature"]),
        ]
    }

    #[test]
    fn test_direct_on_plain_cards() {
        let cards = cards();
        let corpus = Corpus::Plain(&cards);
        let all = corpus.all_positions();

        let out = DirectOperator
            .apply(&corpus, &all, &Step::intersection(["urgent", "bug"]))
            .unwrap();
        assert_eq!(out, vec![0, 1]);

        let out = DirectOperator
            .apply(&corpus, &all, &Step::exclusion(["urgent"]))
            .unwrap();
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn test_direct_on_registry() {
        let registry = Registry::build(&cards()).unwrap();
        let corpus = Corpus::Indexed(&registry);
        let all = corpus.all_positions();

        let out = DirectOperator
            .apply(&corpus, &all, &Step::union(["feature", "nonexistent"]))
            .unwrap();
        // Registry positions are id-sorted: A, B, C, D
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn test_direct_respects_candidates() {
        let cards = cards();
        let corpus = Corpus::Plain(&cards);

        let out = DirectOperator
            .apply(&corpus, &[2, 3], &Step::union(["bug"]))
            .unwrap();
        assert_eq!(out, vec![2]);
    }
}
