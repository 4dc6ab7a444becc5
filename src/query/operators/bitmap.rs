//! Bitmap Operator - single-threaded bitmap arithmetic
//!
//! Compiles the step into a target bitmap once, then runs one word-wise
//! AND / OR / AND-NOT test per candidate. No string comparison happens on
//! this path.

use crate::error::RegistryError;
use crate::query::ast::Step;
use crate::query::operators::{BitmapPredicate, Corpus, StepOperator};
use crate::query::strategy::Tier;

/// Operator for the bitmap tier
#[derive(Debug, Clone, Copy, Default)]
pub struct BitmapOperator;

impl StepOperator for BitmapOperator {
    fn tier(&self) -> Tier {
        Tier::Bitmap
    }

    fn apply(
        &self,
        corpus: &Corpus<'_>,
        candidates: &[usize],
        step: &Step,
    ) -> Result<Vec<usize>, RegistryError> {
        let registry = corpus.registry().ok_or(RegistryError::NotReady)?;
        let predicate = BitmapPredicate::compile(step, registry);
        Ok(predicate.filter(registry.bitmaps(), candidates))
    }
}
