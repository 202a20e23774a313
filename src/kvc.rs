//! Key resolution over host data.
//!
//! Keypaths (`a.b.c`) are resolved one component at a time:
//!
//! ```text
//! value ──┬─ List / Set -> resolve the rest on every element, collect a List
//!         ├─ Map        -> key lookup (absent key -> Null)
//!         ├─ Object     -> KeyValueCoding::value_for_key, calling Function results
//!         └─ otherwise  -> Null
//! ```
//!
//! Setting values through a keypath is not supported; the language is read-only
//! over host data.

use std::fmt;

use crate::error::{EvalError, EvalResult};
use crate::value::Value;

/// A host object that the evaluator can read keys from and call capabilities on.
pub trait KeyValueCoding: fmt::Debug + Send + Sync {
    /// Value stored under `key`, or `Value::Null` if there is none.
    fn value_for_key(&self, key: &str) -> EvalResult<Value>;

    /// Invoke the capability named `selector` with positional `arguments`.
    ///
    /// The default looks `selector` up as a key and calls it if it is a
    /// [`Value::Function`].
    fn perform(&self, selector: &str, arguments: &[Value]) -> EvalResult<Value> {
        match self.value_for_key(selector)? {
            Value::Function(f) => f.call(arguments),
            _ => Err(EvalError::NotCallable { name: selector.to_string(), target: "object" }),
        }
    }
}

/// Resolve a single key against `object`.
pub fn value_for_key(object: &Value, key: &str) -> EvalResult<Value> {
    if key.is_empty() {
        return Ok(Value::Null);
    }

    match object {
        Value::List(_) | Value::Set(_) => {
            let items = object.as_slice().unwrap_or_default();
            items.iter().map(|item| value_for_key(item, key)).collect::<EvalResult<Vec<_>>>().map(Value::List)
        }
        Value::Map(map) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        Value::Object(host) => match host.value_for_key(key)? {
            Value::Function(f) => f.call(&[]),
            value => Ok(value),
        },
        _ => Ok(Value::Null),
    }
}

/// Resolve a dotted keypath against `object`.
pub fn value_for_key_path(object: &Value, key_path: &str) -> EvalResult<Value> {
    match key_path.split_once('.') {
        None => value_for_key(object, key_path),
        Some((first, rest)) => {
            let intermediate = value_for_key(object, first)?;
            value_for_key_path(&intermediate, rest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Callable;
    use serde_json::json;

    fn library() -> Value {
        Value::from(json!({
            "title": "The Hitchhiker's Guide to the Galaxy",
            "numbers": [1, 2, 3, 4, 5],
            "places": [
                {"name": "Calgary", "pop": 988195},
                {"name": "Edmonton", "pop": 730375},
            ],
            "names": {"short": ["Ada", "Bob", "Jim"], "total": 6},
        }))
    }

    #[derive(Debug)]
    struct Counter {
        count: i64,
    }

    impl KeyValueCoding for Counter {
        fn value_for_key(&self, key: &str) -> EvalResult<Value> {
            let count = self.count;
            Ok(match key {
                "count" => Value::Int(count),
                "doubled" => Value::Function(Callable::new(move |_| Ok(Value::Int(count * 2)))),
                _ => Value::Null,
            })
        }
    }

    #[test]
    fn resolves_single_key() {
        assert_eq!(value_for_key(&library(), "title").unwrap(), Value::from("The Hitchhiker's Guide to the Galaxy"));
    }

    #[test]
    fn resolves_nested_key_path() {
        assert_eq!(value_for_key_path(&library(), "names.total").unwrap(), Value::Int(6));
    }

    #[test]
    fn distributes_over_sequences() {
        let doc = Value::from(json!({"a": [{"b": 1}, {"b": 2}]}));
        assert_eq!(value_for_key_path(&doc, "a.b").unwrap(), Value::List(vec![Value::Int(1), Value::Int(2)]));

        let names = value_for_key_path(&library(), "places.name").unwrap();
        assert_eq!(names, Value::List(vec![Value::from("Calgary"), Value::from("Edmonton")]));
    }

    #[test]
    fn absent_keys_are_null() {
        assert_eq!(value_for_key_path(&library(), "names.missing.deeper").unwrap(), Value::Null);
        assert_eq!(value_for_key(&library(), "").unwrap(), Value::Null);
        assert_eq!(value_for_key(&Value::Int(3), "anything").unwrap(), Value::Null);
    }

    #[test]
    fn host_objects_resolve_and_invoke_capabilities() {
        let counter = Value::object(Counter { count: 21 });
        assert_eq!(value_for_key(&counter, "count").unwrap(), Value::Int(21));
        assert_eq!(value_for_key(&counter, "doubled").unwrap(), Value::Int(42));
    }

    #[test]
    fn perform_rejects_non_callables() {
        let counter = Counter { count: 1 };
        let err = counter.perform("count", &[]).unwrap_err();
        assert_eq!(err, EvalError::NotCallable { name: "count".to_string(), target: "object" });
    }
}
