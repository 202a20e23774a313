use log::trace;

use crate::error::{EvalError, EvalResult};
use crate::expr::{Expression, FunctionCall, SetOperation};
use crate::value::{Value, ValueSet};

impl Expression {
    /// Evaluate against `object`, the value `SELF` and keypaths resolve on.
    pub fn evaluate(&self, object: &Value) -> EvalResult<Value> {
        match self {
            Expression::Constant(value) => Ok(value.clone()),
            Expression::SelfReference => Ok(object.clone()),
            // Unsubstituted variables are undefined.
            Expression::Variable(_) => Ok(Value::Null),
            Expression::KeyPath(call) | Expression::Function(call) => call.evaluate(object),
            Expression::Aggregate(items) => {
                items.iter().map(|item| item.evaluate(object)).collect::<EvalResult<Vec<_>>>().map(Value::List)
            }
            Expression::Set { operation, left, right } => {
                let Value::Set(left) = left.evaluate(object)? else {
                    return Ok(Value::Null);
                };
                let right = match right.evaluate(object)? {
                    Value::Set(set) => set,
                    Value::List(items) => items.into_iter().collect::<ValueSet>(),
                    other => {
                        return Err(EvalError::TypeMismatch {
                            function: operation.keyword().to_string(),
                            expected: "set or list",
                            found: other.type_name(),
                        });
                    }
                };
                Ok(Value::Set(match operation {
                    SetOperation::Union => left.union(&right),
                    SetOperation::Intersect => left.intersection(&right),
                    SetOperation::Minus => left.difference(&right),
                }))
            }
        }
    }
}

impl FunctionCall {
    fn evaluate(&self, object: &Value) -> EvalResult<Value> {
        let target = self.operand.evaluate(object)?;
        let arguments = self.arguments.iter().map(|arg| arg.evaluate(object)).collect::<EvalResult<Vec<_>>>()?;
        trace!("{} on {}", self.function, target.type_name());

        match &target {
            Value::Object(host) => host.perform(&self.function, &arguments),
            Value::Map(map) => match map.get(&self.function) {
                Some(Value::Function(f)) => f.call(&arguments),
                _ => Err(EvalError::NotCallable { name: self.function.clone(), target: "map" }),
            },
            other => Err(EvalError::NotCallable { name: self.function.clone(), target: other.type_name() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::value::Callable;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn key_path_reads_from_self() {
        let object = Value::from(json!({"names": {"total": 6}}));
        assert_eq!(Expression::key_path("names.total").evaluate(&object).unwrap(), Value::Int(6));
    }

    #[test]
    fn constants_and_self_evaluate_the_same_every_time() {
        let object = Value::from(json!({"name": "Ada", "tags": ["a", "b"]}));
        for expr in [Expression::constant(42), Expression::constant("x"), Expression::SelfReference] {
            let first = expr.evaluate(&object).unwrap();
            let second = expr.evaluate(&object).unwrap();
            assert_eq!(first, second, "{expr}");
        }
        assert_eq!(Expression::SelfReference.evaluate(&object).unwrap(), object);
    }

    #[test]
    fn variables_are_undefined_until_substituted() {
        assert_eq!(Expression::variable("x").evaluate(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn set_operation_soft_fails_on_non_set_left() {
        let expr = Expression::set_operation(
            SetOperation::Union,
            Expression::aggregate(vec![Expression::constant("a")]),
            Expression::constant(Value::set([Value::from("b")])),
        );
        assert_eq!(expr.evaluate(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn set_operation_accepts_list_on_the_right() {
        let left = Expression::constant(Value::set([Value::from("a"), Value::from("b")]));
        let right = Expression::aggregate(vec![Expression::constant("b"), Expression::constant("c")]);
        let expr = Expression::set_operation(SetOperation::Minus, left, right);
        assert_eq!(expr.evaluate(&Value::Null).unwrap(), Value::set([Value::from("a")]));
    }

    #[test]
    fn custom_function_calls_into_a_map() {
        let mut host = BTreeMap::new();
        host.insert(
            "greet:".to_string(),
            Value::Function(Callable::new(|args| Ok(Value::String(format!("hello {}", args[0]))))),
        );
        let object = Value::Map(host);
        let expr = Expression::custom_function(Expression::SelfReference, "greet:", vec![Expression::constant(1)]);
        assert_eq!(expr.evaluate(&object).unwrap(), Value::from("hello 1"));

        let missing = Expression::custom_function(Expression::SelfReference, "wave:", vec![]);
        assert_eq!(
            missing.evaluate(&object).unwrap_err(),
            EvalError::NotCallable { name: "wave:".to_string(), target: "map" }
        );
    }

    #[test]
    fn calls_on_plain_values_are_rejected() {
        let expr = Expression::custom_function(Expression::constant(3), "frob", vec![]);
        assert_eq!(
            expr.evaluate(&Value::Null).unwrap_err(),
            EvalError::NotCallable { name: "frob".to_string(), target: "int" }
        );
    }
}
