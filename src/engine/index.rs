//! Per-key rule index.
//!
//! This module holds the *static* side of the engine: the structure derived
//! from the full rule list that makes firing a key a linear walk over a short,
//! pre-sorted bucket.
//!
//! Building the index is a two-step process:
//!
//! 1. **Group** rules by key, keeping declaration order within a key.
//! 2. **Order** each group: insert every rule after existing rules of equal
//!    priority (ascending, stable), then reverse the group.
//!
//! ## Invariants
//!
//! - Every bucket is sorted by descending priority.
//! - Among rules of equal priority, later-declared rules come first (a side
//!   effect of the stable ascending insert followed by the reversal).
//! - The index is immutable once built. Models swap in a freshly built index
//!   instead of mutating one in place.

use std::collections::HashMap;

use crate::engine::rule::Rule;

#[derive(Default, Debug, Clone)]
pub struct RuleIndex {
    buckets: HashMap<String, Vec<Rule>>,
}

impl RuleIndex {
    pub fn build<I: IntoIterator<Item = Rule>>(rules: I) -> Self {
        let mut grouped: HashMap<String, Vec<Rule>> = HashMap::new();
        for rule in rules {
            grouped.entry(rule.key().to_string()).or_default().push(rule);
        }

        let buckets = grouped
            .into_iter()
            .map(|(key, group)| {
                let mut bucket: Vec<Rule> = Vec::with_capacity(group.len());
                for rule in group {
                    let at = bucket.partition_point(|existing| existing.priority() <= rule.priority());
                    bucket.insert(at, rule);
                }
                bucket.reverse();
                (key, bucket)
            })
            .collect();

        RuleIndex { buckets }
    }

    /// Rules for `key`, highest priority first.
    pub fn candidates(&self, key: &str) -> Option<&[Rule]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;
    use crate::predicate::{ComparisonOperator, Predicate};

    fn rule(specifier: Predicate, key: &str, value: &str, weight: i64) -> Rule {
        Rule::with_weight(specifier, key, Expression::constant(value), weight).unwrap()
    }

    fn comparison() -> Predicate {
        Predicate::comparison(Expression::key_path("a"), ComparisonOperator::EqualTo, Expression::constant(1))
    }

    fn values(index: &RuleIndex, key: &str) -> Vec<String> {
        index.candidates(key).unwrap_or_default().iter().map(|r| r.value().to_string()).collect()
    }

    #[test]
    fn buckets_descend_by_priority() {
        let index = RuleIndex::build([
            rule(Predicate::Value(true), "k", "low", 0),
            rule(comparison(), "k", "mid", 0),
            rule(Predicate::Value(true), "k", "high", 1),
        ]);
        assert_eq!(values(&index, "k"), ["\"high\"", "\"mid\"", "\"low\""]);
    }

    #[test]
    fn equal_priorities_put_later_rules_first() {
        let index = RuleIndex::build([
            rule(Predicate::Value(true), "k", "first", 0),
            rule(Predicate::Value(false), "k", "second", 0),
            rule(Predicate::Value(true), "k", "third", 0),
        ]);
        assert_eq!(values(&index, "k"), ["\"third\"", "\"second\"", "\"first\""]);
    }

    #[test]
    fn keys_are_bucketed_separately() {
        let index = RuleIndex::build([
            rule(Predicate::Value(true), "a", "1", 0),
            rule(Predicate::Value(true), "b", "2", 0),
            rule(Predicate::Value(true), "a", "3", 0),
        ]);
        assert_eq!(index.len(), 3);
        assert_eq!(values(&index, "a").len(), 2);
        assert_eq!(values(&index, "b"), ["\"2\""]);
        assert!(index.candidates("c").is_none());
    }
}
