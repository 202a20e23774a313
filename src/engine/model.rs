use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::debug;

use crate::engine::context::Context;
use crate::engine::index::RuleIndex;
use crate::engine::rule::Rule;
use crate::error::EvalResult;
use crate::value::Value;

/// A rule set plus the substitution variables applied to it.
///
/// The index is derived state: it is rebuilt whenever the rules or the
/// variables change, and swapped in as a whole. Readers holding a
/// [`Model::snapshot`] keep seeing the index they took.
#[derive(Debug, Clone, Default)]
pub struct Model {
    rules: Vec<Rule>,
    variables: HashMap<String, Value>,
    index: Arc<RuleIndex>,
}

impl Model {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self::with_substitution_variables(rules, HashMap::new())
    }

    pub fn with_substitution_variables(rules: Vec<Rule>, variables: HashMap<String, Value>) -> Self {
        let mut model = Model { rules, variables, index: Arc::default() };
        model.rebuild();
        model
    }

    /// Rules as given, before substitution.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn substitution_variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    pub fn set_rules(&mut self, rules: Vec<Rule>) {
        self.rules = rules;
        self.rebuild();
    }

    pub fn set_substitution_variables(&mut self, variables: HashMap<String, Value>) {
        self.variables = variables;
        self.rebuild();
    }

    /// The current index. Later rebuilds don't affect it.
    pub fn snapshot(&self) -> Arc<RuleIndex> {
        Arc::clone(&self.index)
    }

    pub fn candidates(&self, key: &str) -> Option<&[Rule]> {
        self.index.candidates(key)
    }

    /// Every key some rule can infer.
    pub fn inferrable_keys(&self) -> BTreeSet<&str> {
        self.index.keys().collect()
    }

    /// Value of the highest-priority rule for `key` whose specifier holds.
    pub fn fire_first(&self, key: &str, context: &Context) -> EvalResult<Option<Value>> {
        let Some(candidates) = self.candidates(key) else {
            debug!("no rules for key '{key}'");
            return Ok(None);
        };

        let subject = context.as_value();
        for rule in candidates {
            if rule.can_fire(&subject)? {
                debug!("firing {rule}");
                return rule.fire(&subject).map(Some);
            }
        }
        debug!("no rule for key '{key}' matched ({} candidate(s))", candidates.len());
        Ok(None)
    }

    /// Values of every rule for `key` whose specifier holds, in priority order.
    pub fn fire_all(&self, key: &str, context: &Context) -> EvalResult<Vec<Value>> {
        let subject = context.as_value();
        let mut fired = Vec::new();
        for rule in self.candidates(key).unwrap_or_default() {
            if rule.can_fire(&subject)? {
                debug!("firing {rule}");
                fired.push(rule.fire(&subject)?);
            }
        }
        Ok(fired)
    }

    fn rebuild(&mut self) {
        let index = if self.variables.is_empty() {
            RuleIndex::build(self.rules.iter().cloned())
        } else {
            RuleIndex::build(self.rules.iter().map(|rule| rule.with_substitutions(&self.variables)))
        };
        debug!("indexed {} rule(s) under {} key(s)", index.len(), index.keys().count());
        self.index = Arc::new(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;
    use crate::predicate::{ComparisonOperator, Predicate};

    fn rule(specifier: Predicate, key: &str, value: Expression) -> Rule {
        Rule::new(specifier, key, value).unwrap()
    }

    fn context(model: Model) -> Context {
        Context::new(Arc::new(model))
    }

    #[test]
    fn fire_first_walks_the_bucket_in_order() {
        let model = Model::new(vec![
            rule(Predicate::Value(true), "answer", Expression::constant(1)),
            rule(Predicate::Value(false), "answer", Expression::constant(2)),
        ]);
        let ctx = context(model.clone());
        assert_eq!(model.fire_first("answer", &ctx).unwrap(), Some(Value::Int(1)));
        assert_eq!(model.fire_first("question", &ctx).unwrap(), None);
    }

    #[test]
    fn fire_all_collects_every_match() {
        let model = Model::new(vec![
            rule(Predicate::Value(true), "k", Expression::constant("a")),
            rule(Predicate::Value(false), "k", Expression::constant("b")),
            rule(Predicate::Value(true), "k", Expression::constant("c")),
        ]);
        let ctx = context(model.clone());
        assert_eq!(model.fire_all("k", &ctx).unwrap(), vec![Value::from("c"), Value::from("a")]);
        assert!(model.fire_all("missing", &ctx).unwrap().is_empty());
    }

    #[test]
    fn substitution_variables_rebuild_the_index() {
        let specifier = Predicate::comparison(
            Expression::variable("limit"),
            ComparisonOperator::GreaterThan,
            Expression::constant(10),
        );
        let mut model = Model::new(vec![rule(specifier, "big", Expression::constant(true))]);
        let before = model.snapshot();

        model.set_substitution_variables(HashMap::from([("limit".to_string(), Value::Int(11))]));
        let ctx = context(model.clone());
        assert_eq!(model.fire_first("big", &ctx).unwrap(), Some(Value::Bool(true)));

        // The old snapshot still holds the unsubstituted rule.
        let Some([old]) = before.candidates("big") else {
            panic!("expected one rule");
        };
        assert!(matches!(old.specifier(), Predicate::Comparison(c) if c.left == Expression::variable("limit")));
        // The rules as given are never rewritten.
        assert_eq!(model.rules()[0], *old);
    }

    #[test]
    fn inferrable_keys_are_sorted() {
        let model = Model::new(vec![
            rule(Predicate::Value(true), "zeta", Expression::constant(1)),
            rule(Predicate::Value(true), "alpha", Expression::constant(1)),
        ]);
        assert_eq!(model.inferrable_keys().into_iter().collect::<Vec<_>>(), ["alpha", "zeta"]);
    }

    #[test]
    fn set_rules_replaces_everything() {
        let mut model = Model::new(vec![rule(Predicate::Value(true), "a", Expression::constant(1))]);
        model.set_rules(vec![rule(Predicate::Value(true), "b", Expression::constant(2))]);
        assert!(model.candidates("a").is_none());
        assert_eq!(model.candidates("b").map(<[Rule]>::len), Some(1));
    }
}
