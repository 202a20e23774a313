//! Inference context.
//!
//! A context is the object rules are evaluated against. Reading a key goes:
//!
//! ```text
//! own values ─> parent's values ─> ... ─> infer from the model
//! ```
//!
//! Inference fires the first matching rule for the key with the context
//! itself as `SELF`, so rule specifiers and values can read other keys, which
//! may in turn be inferred. A per-context stack of keys under inference turns
//! cycles into [`EvalError::InferenceCycle`] and bounds the chain length by
//! [`Options::max_inference_depth`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::trace;
use parking_lot::{Mutex, RwLock};

use crate::api::Options;
use crate::engine::model::Model;
use crate::error::{EvalError, EvalResult};
use crate::kvc::KeyValueCoding;
use crate::value::Value;

/// Cheap to clone; clones share the same scope.
#[derive(Clone)]
pub struct Context {
    scope: Arc<Scope>,
}

struct Scope {
    model: Arc<Model>,
    parent: Option<Context>,
    options: Options,
    values: RwLock<HashMap<String, Value>>,
    inferring: Mutex<Vec<String>>,
}

impl Context {
    pub fn new(model: Arc<Model>) -> Self {
        Self::with_options(model, Options::default())
    }

    pub fn with_options(model: Arc<Model>, options: Options) -> Self {
        Self::from_scope(model, None, options)
    }

    fn from_scope(model: Arc<Model>, parent: Option<Context>, options: Options) -> Self {
        Context {
            scope: Arc::new(Scope {
                model,
                parent,
                options,
                values: RwLock::new(HashMap::new()),
                inferring: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A nested context over the same model. Values set on the child shadow
    /// the parent's; the parent never sees them.
    pub fn child(&self) -> Context {
        Self::from_scope(Arc::clone(&self.scope.model), Some(self.clone()), self.scope.options.clone())
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.scope.model
    }

    pub fn options(&self) -> &Options {
        &self.scope.options
    }

    pub fn set_value(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.scope.values.write().insert(key.into(), value.into());
    }

    pub fn remove_value(&self, key: &str) -> Option<Value> {
        self.scope.values.write().remove(key)
    }

    /// A stored value for `key`, here or in an ancestor. Never infers.
    pub fn value(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.scope.values.read().get(key) {
            return Some(value.clone());
        }
        self.scope.parent.as_ref().and_then(|parent| parent.value(key))
    }

    /// Fire the model for `key` against this context.
    pub fn infer(&self, key: &str) -> EvalResult<Option<Value>> {
        let _guard = InferenceGuard::enter(self, key)?;
        self.scope.model.fire_first(key, self)
    }

    /// Every value the model's rules for `key` produce against this context.
    pub fn infer_all(&self, key: &str) -> EvalResult<Vec<Value>> {
        let _guard = InferenceGuard::enter(self, key)?;
        self.scope.model.fire_all(key, self)
    }

    /// This context as a host object for evaluation.
    pub fn as_value(&self) -> Value {
        Value::Object(Arc::new(self.clone()))
    }
}

impl KeyValueCoding for Context {
    fn value_for_key(&self, key: &str) -> EvalResult<Value> {
        if let Some(value) = self.value(key) {
            return Ok(value);
        }
        Ok(self.infer(key)?.unwrap_or_default())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.scope.values.read();
        let mut keys: Vec<&str> = values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Context")
            .field("keys", &keys)
            .field("rules", &self.scope.model.rules().len())
            .field("nested", &self.scope.parent.is_some())
            .finish()
    }
}

/// Marks `key` as under inference for as long as it lives.
struct InferenceGuard<'a> {
    context: &'a Context,
}

impl<'a> InferenceGuard<'a> {
    fn enter(context: &'a Context, key: &str) -> EvalResult<Self> {
        let mut stack = context.scope.inferring.lock();
        if stack.iter().any(|k| k == key) {
            return Err(EvalError::InferenceCycle { key: key.to_string() });
        }
        let limit = context.scope.options.max_inference_depth;
        if stack.len() >= limit {
            return Err(EvalError::InferenceDepthExceeded { key: key.to_string(), limit });
        }
        trace!("inferring '{key}' (depth {})", stack.len());
        stack.push(key.to_string());
        Ok(InferenceGuard { context })
    }
}

impl Drop for InferenceGuard<'_> {
    fn drop(&mut self) {
        self.context.scope.inferring.lock().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rule::Rule;
    use crate::expr::Expression;
    use crate::predicate::{ComparisonOperator, Predicate};

    fn always(key: &str, value: Expression) -> Rule {
        Rule::new(Predicate::Value(true), key, value).unwrap()
    }

    #[test]
    fn stored_values_shadow_inference() {
        let ctx = Context::new(Arc::new(Model::new(vec![always("color", Expression::constant("red"))])));
        assert_eq!(ctx.value_for_key("color").unwrap(), Value::from("red"));
        ctx.set_value("color", "blue");
        assert_eq!(ctx.value_for_key("color").unwrap(), Value::from("blue"));
        assert_eq!(ctx.remove_value("color"), Some(Value::from("blue")));
        assert_eq!(ctx.value_for_key("color").unwrap(), Value::from("red"));
    }

    #[test]
    fn children_see_parent_values() {
        let parent = Context::new(Arc::new(Model::default()));
        parent.set_value("user", "ada");
        let child = parent.child();
        child.set_value("page", 2);
        assert_eq!(child.value("user"), Some(Value::from("ada")));
        assert_eq!(parent.value("page"), None);
    }

    #[test]
    fn rules_can_read_inferred_keys() {
        let specifier = Predicate::comparison(
            Expression::key_path("size"),
            ComparisonOperator::GreaterThan,
            Expression::constant(10),
        );
        let model = Model::new(vec![
            always("size", Expression::key_path("count")),
            Rule::new(specifier, "label", Expression::constant("big")).unwrap(),
            always("label", Expression::constant("small")),
        ]);
        let ctx = Context::new(Arc::new(model));
        ctx.set_value("count", 12);
        assert_eq!(ctx.infer("label").unwrap(), Some(Value::from("big")));
        ctx.set_value("count", 3);
        assert_eq!(ctx.infer("label").unwrap(), Some(Value::from("small")));
    }

    #[test]
    fn cycles_are_reported() {
        let model = Model::new(vec![always("a", Expression::key_path("b")), always("b", Expression::key_path("a"))]);
        let ctx = Context::new(Arc::new(model));
        assert_eq!(ctx.infer("a").unwrap_err(), EvalError::InferenceCycle { key: "a".to_string() });
        // The stack unwinds after a failure.
        ctx.set_value("b", 1);
        assert_eq!(ctx.infer("a").unwrap(), Some(Value::Int(1)));
    }

    #[test]
    fn depth_is_bounded() {
        let rules = (0..5).map(|i| always(&format!("k{i}"), Expression::key_path(format!("k{}", i + 1)))).collect();
        let options = Options { max_inference_depth: 3, ..Options::default() };
        let ctx = Context::with_options(Arc::new(Model::new(rules)), options);
        assert_eq!(ctx.infer("k0").unwrap_err(), EvalError::InferenceDepthExceeded { key: "k3".to_string(), limit: 3 });
    }

    #[test]
    fn infer_all_returns_every_match() {
        let model =
            Model::new(vec![always("tag", Expression::constant("a")), always("tag", Expression::constant("b"))]);
        let ctx = Context::new(Arc::new(model));
        assert_eq!(ctx.infer_all("tag").unwrap(), vec![Value::from("b"), Value::from("a")]);
    }
}
