//! Query Abstract Syntax Tree
//!
//! A query is an ordered, non-empty list of steps. Each step filters the
//! survivors of the previous one:
//!
//! - **Intersection(T)**: card has every tag in T
//! - **Union(T)**: card has at least one tag in T
//! - **Exclusion(T)**: card has none of the tags in T
//!
//! Step variants form a closed enum, so an unknown operation can only come
//! from external text or JSON, where it is rejected at parse time.
//!
//! # Example
//!
//! ```rust
//! use cardsift::query::{Query, QueryBuilder, Step};
//!
//! let query = QueryBuilder::new()
//!     .intersection(["urgent", "bug"])
//!     .exclusion(["feature"])
//!     .build()
//!     .unwrap();
//! assert_eq!(query.len(), 2);
//!
//! let parsed: Query = "intersection:urgent,bug; exclusion:feature".parse().unwrap();
//! assert_eq!(parsed, query);
//!
//! assert!("difference:bug".parse::<Step>().is_err());
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::QueryError;
use crate::index::fingerprint::write_str;

// ============================================================================
// Operation
// ============================================================================

/// The three set operations a step can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Must have all tags
    Intersection,
    /// Has any tag
    Union,
    /// Has none of the tags
    Exclusion,
}

impl Operation {
    /// Stable name used in text form
    pub fn name(self) -> &'static str {
        match self {
            Operation::Intersection => "intersection",
            Operation::Union => "union",
            Operation::Exclusion => "exclusion",
        }
    }

    /// Stable byte used in cache key encoding. Never renumber.
    fn code(self) -> u8 {
        match self {
            Operation::Intersection => 1,
            Operation::Union => 2,
            Operation::Exclusion => 3,
        }
    }
}

impl FromStr for Operation {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intersection" | "all" => Ok(Operation::Intersection),
            "union" | "any" => Ok(Operation::Union),
            "exclusion" | "none" => Ok(Operation::Exclusion),
            other => Err(QueryError::UnknownOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Step
// ============================================================================

/// One operation applied to the current candidate set
///
/// The text form is `op:tag,tag`, steps separated by `;`. Tags are trimmed
/// and split on `,`, so a tag containing `,` or `;`, or with leading or
/// trailing whitespace, does not survive `to_string().parse()`. Build such
/// steps with the constructors or through serde instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", content = "tags", rename_all = "snake_case")]
pub enum Step {
    /// Keep cards carrying every tag
    Intersection(BTreeSet<String>),
    /// Keep cards carrying at least one tag
    Union(BTreeSet<String>),
    /// Keep cards carrying none of the tags
    Exclusion(BTreeSet<String>),
}

impl Step {
    /// Build a step from an operation and tags
    pub fn new<I, S>(operation: Operation, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        match operation {
            Operation::Intersection => Step::Intersection(tags),
            Operation::Union => Step::Union(tags),
            Operation::Exclusion => Step::Exclusion(tags),
        }
    }

    /// Intersection step
    pub fn intersection<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Operation::Intersection, tags)
    }

    /// Union step
    pub fn union<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Operation::Union, tags)
    }

    /// Exclusion step
    pub fn exclusion<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Operation::Exclusion, tags)
    }

    /// The step's operation
    pub fn operation(&self) -> Operation {
        match self {
            Step::Intersection(_) => Operation::Intersection,
            Step::Union(_) => Operation::Union,
            Step::Exclusion(_) => Operation::Exclusion,
        }
    }

    /// The step's tags in sorted order
    pub fn tags(&self) -> &BTreeSet<String> {
        match self {
            Step::Intersection(tags) | Step::Union(tags) | Step::Exclusion(tags) => tags,
        }
    }

    /// Per-card predicate on a plain tag set
    ///
    /// This is the reference semantics every execution tier must agree with.
    pub fn matches_tags(&self, card_tags: &BTreeSet<String>) -> bool {
        match self {
            Step::Intersection(tags) => tags.is_subset(card_tags),
            Step::Union(tags) => !tags.is_disjoint(card_tags),
            Step::Exclusion(tags) => tags.is_disjoint(card_tags),
        }
    }
}

impl FromStr for Step {
    type Err = QueryError;

    /// Parse `op:tag,tag,...`; an empty tag list (`union:`) is allowed
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (op, tags) = s
            .split_once(':')
            .ok_or_else(|| QueryError::MalformedStep(format!("missing ':' in {:?}", s.trim())))?;

        let operation: Operation = op.parse()?;
        let tags = tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty());

        Ok(Step::new(operation, tags))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.tags().iter().map(String::as_str).collect();
        write!(f, "{}:{}", self.operation(), tags.join(","))
    }
}

// ============================================================================
// Query
// ============================================================================

/// An ordered, non-empty sequence of steps
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Step>", into = "Vec<Step>")]
pub struct Query {
    steps: Vec<Step>,
}

impl Query {
    /// Create a query, rejecting an empty step list
    pub fn new(steps: Vec<Step>) -> Result<Self, QueryError> {
        if steps.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        Ok(Self { steps })
    }

    /// Steps in evaluation order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Feed the canonical encoding into a hasher
    ///
    /// Step order is preserved; tags within a step are written in sorted
    /// order, every string length-prefixed.
    pub(crate) fn write_canonical(&self, hasher: &mut Sha256) {
        use sha2::Digest;

        hasher.update((self.steps.len() as u64).to_le_bytes());
        for step in &self.steps {
            hasher.update([step.operation().code()]);
            hasher.update((step.tags().len() as u64).to_le_bytes());
            for tag in step.tags() {
                write_str(hasher, tag);
            }
        }
    }
}

impl TryFrom<Vec<Step>> for Query {
    type Error = QueryError;

    fn try_from(steps: Vec<Step>) -> Result<Self, Self::Error> {
        Query::new(steps)
    }
}

impl From<Query> for Vec<Step> {
    fn from(query: Query) -> Self {
        query.steps
    }
}

impl FromStr for Query {
    type Err = QueryError;

    /// Parse steps separated by `;`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let steps = s
            .split(';')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Step>, _>>()?;
        Query::new(steps)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.steps.iter().map(Step::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

// ============================================================================
// Query Builder
// ============================================================================

/// Fluent builder for queries
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    steps: Vec<Step>,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append an intersection step
    pub fn intersection<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.step(Step::intersection(tags))
    }

    /// Append a union step
    pub fn union<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.step(Step::union(tags))
    }

    /// Append an exclusion step
    pub fn exclusion<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.step(Step::exclusion(tags))
    }

    /// Build the query
    pub fn build(self) -> Result<Query, QueryError> {
        Query::new(self.steps)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_query_rejected() {
        assert_eq!(Query::new(vec![]), Err(QueryError::EmptyQuery));
        assert_eq!(QueryBuilder::new().build(), Err(QueryError::EmptyQuery));
        assert_eq!("".parse::<Query>(), Err(QueryError::EmptyQuery));
    }

    #[test]
    fn test_step_semantics() {
        let card = tags(&["bug", "urgent"]);

        assert!(Step::intersection(["bug", "urgent"]).matches_tags(&card));
        assert!(!Step::intersection(["bug", "feature"]).matches_tags(&card));

        assert!(Step::union(["feature", "bug"]).matches_tags(&card));
        assert!(!Step::union(["feature"]).matches_tags(&card));

        assert!(Step::exclusion(["feature"]).matches_tags(&card));
        assert!(!Step::exclusion(["feature", "bug"]).matches_tags(&card));
    }

    #[test]
    fn test_empty_tag_set_semantics() {
        let card = tags(&["bug"]);
        let none = Vec::<String>::new();

        assert!(Step::intersection(none.clone()).matches_tags(&card));
        assert!(!Step::union(none.clone()).matches_tags(&card));
        assert!(Step::exclusion(none).matches_tags(&card));
    }

    #[test]
    fn test_parse_step() {
        let step: Step = " intersection : urgent , bug ".parse().unwrap();
        assert_eq!(step, Step::intersection(["bug", "urgent"]));

        let step: Step = "any:docs".parse().unwrap();
        assert_eq!(step, Step::union(["docs"]));

        let step: Step = "union:".parse().unwrap();
        assert!(step.tags().is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_operation() {
        assert_eq!(
            "difference:bug".parse::<Step>(),
            Err(QueryError::UnknownOperation("difference".to_string()))
        );
        assert!(matches!(
            "bug".parse::<Step>(),
            Err(QueryError::MalformedStep(_))
        ));
    }

    #[test]
    fn test_display_round_trip() {
        let query = QueryBuilder::new()
            .intersection(["urgent", "bug"])
            .union(Vec::<String>::new())
            .build()
            .unwrap();
        assert_eq!(query.to_string(), "intersection:bug,urgent; union:");
        assert_eq!(query.to_string().parse::<Query>().unwrap(), query);
    }

    #[test]
    fn test_json_form() {
        let json = r#"[{"op":"intersection","tags":["urgent","bug"]},{"op":"exclusion","tags":["feature"]}]"#;
        let query: Query = serde_json::from_str(json).unwrap();
        assert_eq!(query.len(), 2);
        assert_eq!(query.steps()[1], Step::exclusion(["feature"]));

        assert!(serde_json::from_str::<Query>("[]").is_err());
        assert!(serde_json::from_str::<Query>(r#"[{"op":"difference","tags":[]}]"#).is_err());
    }

    #[test]
    fn test_tag_order_is_canonical() {
        assert_eq!(
            Step::intersection(["bug", "urgent"]),
            Step::intersection(["urgent", "bug", "bug"])
        );
    }

    #[test]
    fn test_text_form_trims_and_splits_tags() {
        let step: Step = "union: urgent , bug ,".parse().unwrap();
        assert_eq!(step, Step::union(["urgent", "bug"]));

        // Only plain tags round-trip through text
        let plain = Step::exclusion(["needs-review", "p1"]);
        assert_eq!(plain.to_string().parse::<Step>().unwrap(), plain);

        let awkward = Step::union(["a,b", " padded "]);
        let reparsed: Step = awkward.to_string().parse().unwrap();
        assert_ne!(reparsed, awkward);
        assert_eq!(reparsed, Step::union(["a", "b", "padded"]));

        // serde keeps any tag intact
        let json = serde_json::to_string(&awkward).unwrap();
        assert_eq!(serde_json::from_str::<Step>(&json).unwrap(), awkward);
    }
}
