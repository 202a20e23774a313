use std::collections::HashMap;
use std::fmt;

use crate::error::{EvalResult, RuleError};
use crate::expr::Expression;
use crate::predicate::Predicate;
use crate::value::Value;

/// Each unit of weight outranks any difference in specificity.
pub const WEIGHT_SCALE: i64 = 1000;

/// `when <specifier>, <key> is <value>`.
///
/// Priority is fixed at construction: the structural specificity of the
/// specifier plus `weight * 1000`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    specifier: Predicate,
    key: String,
    value: Expression,
    weight: i64,
    priority: i64,
}

impl Rule {
    pub fn new(specifier: Predicate, key: impl Into<String>, value: Expression) -> Result<Self, RuleError> {
        Self::with_weight(specifier, key, value, 0)
    }

    pub fn with_weight(
        specifier: Predicate,
        key: impl Into<String>,
        value: Expression,
        weight: i64,
    ) -> Result<Self, RuleError> {
        let key = key.into();
        if key.is_empty() {
            return Err(RuleError::EmptyKey);
        }
        let priority = specificity(&specifier) + weight * WEIGHT_SCALE;
        Ok(Rule { specifier, key, value, weight, priority })
    }

    pub fn specifier(&self) -> &Predicate {
        &self.specifier
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Expression {
        &self.value
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Does the specifier hold for `context`?
    pub fn can_fire(&self, context: &Value) -> EvalResult<bool> {
        self.specifier.evaluate(context)
    }

    /// Evaluate the value expression against `context`.
    pub fn fire(&self, context: &Value) -> EvalResult<Value> {
        self.value.evaluate(context)
    }

    /// Copy with substitution variables applied to specifier and value.
    /// Substitution never changes tree shape, so the priority carries over.
    pub(crate) fn with_substitutions(&self, variables: &HashMap<String, Value>) -> Rule {
        Rule {
            specifier: self.specifier.with_substitutions(variables),
            key: self.key.clone(),
            value: self.value.with_substitutions(variables),
            weight: self.weight,
            priority: self.priority,
        }
    }
}

/// Leaves count 2 for comparisons and 1 for constants; a compound adds 1 to
/// the sum of its children.
pub fn specificity(predicate: &Predicate) -> i64 {
    match predicate {
        Predicate::Value(_) => 1,
        Predicate::Comparison(_) => 2,
        Predicate::Compound { subpredicates, .. } => 1 + subpredicates.iter().map(specificity).sum::<i64>(),
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {} [{}]", self.specifier, self.key, self.value, self.weight)
    }
}
