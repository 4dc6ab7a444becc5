//! Set Operation Evaluator
//!
//! Applies a query's steps strictly left to right. The first step sees every
//! card in the corpus; each later step sees only the previous survivors.
//!
//! ```text
//! Pending -> Evaluating(0) -> Evaluating(1) -> ... -> Complete
//!                  |                |
//!                  +----------------+--> ShortCircuited (a step emptied the set)
//! ```
//!
//! Once the candidate set is empty no later step can add members back, so
//! evaluation stops and the remaining steps are skipped. There is no retry
//! state: evaluation is pure.

use std::sync::Arc;

use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::RegistryError;
use crate::query::ast::Query;
use crate::query::operators::{ChunkedOperator, Corpus, TierExecutors};
use crate::query::strategy::{StrategySelector, Tier};
use crate::types::CardId;

// ============================================================================
// Evaluation State
// ============================================================================

/// Lifecycle of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "step")]
pub enum EvaluationState {
    /// Not started
    Pending,
    /// Running the step at this index
    Evaluating(usize),
    /// Stopped after the step at this index produced an empty set
    ShortCircuited(usize),
    /// Every step applied
    Complete,
}

impl EvaluationState {
    /// Whether evaluation has finished
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EvaluationState::Complete | EvaluationState::ShortCircuited(_)
        )
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Result of evaluating one query against one corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Surviving positions, ascending
    pub positions: Vec<usize>,

    /// Steps actually executed
    pub steps_applied: usize,

    /// Steps in the query
    pub steps_total: usize,

    /// Terminal state
    pub state: EvaluationState,

    /// Tier used for each executed step
    pub tiers: Vec<Tier>,
}

impl Evaluation {
    /// Whether evaluation stopped early on an empty set
    pub fn short_circuited(&self) -> bool {
        matches!(self.state, EvaluationState::ShortCircuited(_))
    }

    /// Surviving card identifiers in ascending order
    pub fn card_ids(&self, corpus: &Corpus<'_>) -> Vec<CardId> {
        let mut ids: Vec<CardId> = self
            .positions
            .iter()
            .filter_map(|&p| corpus.card(p).map(|c| c.id().clone()))
            .collect();
        // Registry positions are already id-sorted; plain slices are not
        if matches!(corpus, Corpus::Plain(_)) {
            ids.sort();
        }
        ids
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Runs queries with per-step tier selection
pub struct Evaluator {
    selector: StrategySelector,
    executors: TierExecutors,
}

impl Evaluator {
    /// Create an evaluator whose chunked tier runs on `pool`
    pub fn new(selector: StrategySelector, pool: Arc<ThreadPool>) -> Self {
        let chunked = ChunkedOperator::new(pool, selector.clone());
        Self {
            selector,
            executors: TierExecutors::new(chunked),
        }
    }

    /// Tier selector in use
    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }

    /// Evaluate with the tier picked by the selector for each step
    pub fn evaluate(
        &self,
        corpus: &Corpus<'_>,
        query: &Query,
    ) -> Result<Evaluation, RegistryError> {
        let registry_available = corpus.registry().is_some();
        self.run(corpus, query, |count| {
            self.selector.select(count, registry_available)
        })
    }

    /// Evaluate every step with one fixed tier
    ///
    /// Used to cross-check tiers; bitmap tiers fail with `NotReady` on a
    /// plain corpus.
    pub fn evaluate_with_tier(
        &self,
        corpus: &Corpus<'_>,
        query: &Query,
        tier: Tier,
    ) -> Result<Evaluation, RegistryError> {
        self.run(corpus, query, |_| tier)
    }

    fn run<F>(
        &self,
        corpus: &Corpus<'_>,
        query: &Query,
        choose: F,
    ) -> Result<Evaluation, RegistryError>
    where
        F: Fn(usize) -> Tier,
    {
        let steps_total = query.len();
        let mut state = EvaluationState::Pending;
        let mut candidates = corpus.all_positions();
        let mut tiers = Vec::with_capacity(steps_total);

        for (i, step) in query.steps().iter().enumerate() {
            state = EvaluationState::Evaluating(i);
            let tier = choose(candidates.len());
            let before = candidates.len();

            let operator = self.executors.for_tier(tier);
            debug_assert_eq!(operator.tier(), tier);
            candidates = operator.apply(corpus, &candidates, step)?;
            tiers.push(operator.tier());

            trace!(
                step = i,
                op = %step.operation(),
                tier = %tier,
                before,
                after = candidates.len(),
                "Applied step"
            );

            if candidates.is_empty() {
                state = EvaluationState::ShortCircuited(i);
                break;
            }
        }

        if !state.is_terminal() {
            state = EvaluationState::Complete;
        }

        Ok(Evaluation {
            positions: candidates,
            steps_applied: tiers.len(),
            steps_total,
            state,
            tiers,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Registry;
    use crate::query::ast::{QueryBuilder, Step};
    use crate::query::operators::ParallelConfig;
    use crate::query::strategy::StrategyConfig;
    use crate::types::Card;

    fn evaluator() -> Evaluator {
        let pool = ParallelConfig::default().with_workers(2).build_pool().unwrap();
        Evaluator::new(StrategySelector::default(), Arc::new(pool))
    }

    fn board() -> Vec<Card> {
        vec![
            Card::new("A", "", ["urgent", "bug"]),
            Card::new("B", "", ["urgent", "feature"]),
            Card::new("C", "", ["bug"]),
            Card::new("D", "", ["urgent", "bug"]),
        ]
    }

    fn ids(list: &[CardId]) -> Vec<&str> {
        list.iter().map(CardId::as_str).collect()
    }

    #[test]
    fn test_scenario_intersection() {
        let registry = Registry::build(&board()).unwrap();
        let corpus = Corpus::Indexed(&registry);
        let query = QueryBuilder::new()
            .intersection(["urgent", "bug"])
            .build()
            .unwrap();

        let eval = evaluator().evaluate(&corpus, &query).unwrap();
        assert_eq!(ids(&eval.card_ids(&corpus)), vec!["A", "D"]);
        assert_eq!(eval.state, EvaluationState::Complete);
        assert_eq!(eval.steps_applied, 1);
    }

    #[test]
    fn test_scenario_exclusion_keeps_survivors() {
        let registry = Registry::build(&board()).unwrap();
        let corpus = Corpus::Indexed(&registry);
        let query = QueryBuilder::new()
            .intersection(["urgent", "bug"])
            .exclusion(["feature"])
            .build()
            .unwrap();

        let eval = evaluator().evaluate(&corpus, &query).unwrap();
        assert_eq!(ids(&eval.card_ids(&corpus)), vec!["A", "D"]);
        assert_eq!(eval.steps_applied, 2);
        assert!(!eval.short_circuited());
    }

    #[test]
    fn test_scenario_short_circuit() {
        let registry = Registry::build(&board()).unwrap();
        let corpus = Corpus::Indexed(&registry);
        let query = QueryBuilder::new()
            .intersection(["urgent", "bug"])
            .intersection(["nonexistent"])
            .union(["bug"])
            .exclusion(["feature"])
            .build()
            .unwrap();

        let eval = evaluator().evaluate(&corpus, &query).unwrap();
        assert!(eval.positions.is_empty());
        assert_eq!(eval.state, EvaluationState::ShortCircuited(1));
        assert_eq!(eval.steps_applied, 2);
        assert_eq!(eval.steps_total, 4);
        assert_eq!(eval.tiers.len(), 2);
    }

    #[test]
    fn test_empty_corpus_short_circuits_first_step() {
        let registry = Registry::build(&[]).unwrap();
        let corpus = Corpus::Indexed(&registry);
        let query = QueryBuilder::new().exclusion(["x"]).build().unwrap();

        let eval = evaluator().evaluate(&corpus, &query).unwrap();
        assert_eq!(eval.state, EvaluationState::ShortCircuited(0));
        assert_eq!(eval.steps_applied, 1);
    }

    #[test]
    fn test_plain_corpus_uses_direct() {
        let cards = board();
        let corpus = Corpus::Plain(&cards);
        let query = QueryBuilder::new().union(["feature", "bug"]).build().unwrap();

        let eval = evaluator().evaluate(&corpus, &query).unwrap();
        assert_eq!(eval.tiers, vec![Tier::Direct]);
        assert_eq!(ids(&eval.card_ids(&corpus)), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_plain_corpus_ids_sorted() {
        let mut cards = board();
        cards.reverse();
        let corpus = Corpus::Plain(&cards);
        let query = QueryBuilder::new().union(["urgent"]).build().unwrap();

        let eval = evaluator().evaluate(&corpus, &query).unwrap();
        assert_eq!(ids(&eval.card_ids(&corpus)), vec!["A", "B", "D"]);
    }

    #[test]
    fn test_forced_tiers_agree() {
        let registry = Registry::build(&board()).unwrap();
        let corpus = Corpus::Indexed(&registry);
        let query = QueryBuilder::new()
            .union(["urgent", "bug"])
            .exclusion(["feature"])
            .build()
            .unwrap();

        let ev = evaluator();
        let direct = ev.evaluate_with_tier(&corpus, &query, Tier::Direct).unwrap();
        let chunked = ev.evaluate_with_tier(&corpus, &query, Tier::Chunked).unwrap();
        let bitmap = ev.evaluate_with_tier(&corpus, &query, Tier::Bitmap).unwrap();

        assert_eq!(direct.positions, chunked.positions);
        assert_eq!(direct.positions, bitmap.positions);
        assert_eq!(bitmap.tiers, vec![Tier::Bitmap, Tier::Bitmap]);
    }

    #[test]
    fn test_selector_thresholds_pick_tiers() {
        let cards: Vec<Card> = (0..50)
            .map(|i| Card::new(format!("c{:02}", i), "", [if i < 10 { "hot" } else { "cold" }]))
            .collect();
        let registry = Registry::build(&cards).unwrap();
        let corpus = Corpus::Indexed(&registry);

        let selector = StrategySelector::new(
            StrategyConfig::default()
                .with_direct_max(5)
                .with_parallel_max(20),
        );
        let pool = ParallelConfig::default().with_workers(2).build_pool().unwrap();
        let ev = Evaluator::new(selector, Arc::new(pool));

        let query = QueryBuilder::new()
            .union(["hot", "cold"])
            .union(["hot"])
            .intersection(["hot"])
            .build()
            .unwrap();
        let eval = ev.evaluate(&corpus, &query).unwrap();

        // 50 candidates -> bitmap, 50 -> bitmap, 10 -> chunked
        assert_eq!(eval.tiers, vec![Tier::Bitmap, Tier::Bitmap, Tier::Chunked]);
        assert_eq!(eval.positions.len(), 10);
    }

    #[test]
    fn test_exclusion_is_complement_of_union() {
        let registry = Registry::build(&board()).unwrap();
        let corpus = Corpus::Indexed(&registry);
        let ev = evaluator();

        for tags in [vec!["feature"], vec!["bug", "feature"], vec![], vec!["missing"]] {
            let union = Query::new(vec![Step::union(tags.clone())]).unwrap();
            let exclusion = Query::new(vec![Step::exclusion(tags)]).unwrap();

            let u = ev.evaluate(&corpus, &union).unwrap().positions;
            let e = ev.evaluate(&corpus, &exclusion).unwrap().positions;

            let complement: Vec<usize> = corpus
                .all_positions()
                .into_iter()
                .filter(|p| !u.contains(p))
                .collect();
            assert_eq!(e, complement);
        }
    }
}
