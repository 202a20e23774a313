use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::EvalResult;
use crate::kvc::KeyValueCoding;

/// A dynamically typed value produced by evaluation.
///
/// `Null` doubles as "undefined": absent keys, unsubstituted variables and
/// soft-failing set operations all evaluate to it.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
    List(Vec<Value>),
    Set(ValueSet),
    Map(BTreeMap<String, Value>),
    /// A host object resolved through [`KeyValueCoding`].
    Object(Arc<dyn KeyValueCoding>),
    /// A host callable, looked up by name on mappings and objects.
    Function(Callable),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn object(object: impl KeyValueCoding + 'static) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn set<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::Set(items.into_iter().collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Falsy: null, `false`, zero, the empty string and empty collections.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::DateTime(_) => true,
            Value::List(items) => !items.is_empty(),
            Value::Set(set) => !set.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of a list or set, in order.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            Value::Set(set) => Some(set.as_slice()),
            _ => None,
        }
    }

    /// Membership test used by `IN` and `CONTAINS`.
    ///
    /// Strings contain substrings, collections contain elements and maps
    /// contain keys. Anything else has no notion of membership.
    pub fn contains(&self, needle: &Value) -> Option<bool> {
        match (self, needle) {
            (Value::String(haystack), Value::String(n)) => Some(haystack.contains(n.as_str())),
            (Value::List(items), _) => Some(items.contains(needle)),
            (Value::Set(set), _) => Some(set.contains(needle)),
            (Value::Map(map), Value::String(key)) => Some(map.contains_key(key)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => self.as_f64() == other.as_f64(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Formats the value as literal text the expression grammar reads back.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(true) => f.write_str("TRUE"),
            Value::Bool(false) => f.write_str("FALSE"),
            // There are no signed literals; a bare `-` would negate everything after it.
            Value::Int(n) if *n < 0 => write!(f, "(-{})", n.unsigned_abs()),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) if *x < 0.0 => write!(f, "(-{})", -x),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write_quoted(f, s),
            Value::DateTime(dt) => write_quoted(f, &dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            Value::List(items) => write_collection(f, items),
            Value::Set(set) => write_collection(f, set.as_slice()),
            Value::Map(map) => {
                f.write_str("{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Object(object) => write!(f, "<{object:?}>"),
            Value::Function(_) => f.write_str("<function>"),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    // The grammar has no escapes; pick the quote the string doesn't use.
    if s.contains('"') { write!(f, "'{s}'") } else { write!(f, "\"{s}\"") }
}

fn write_collection(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    f.write_str("{")?;
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("}")
}

// --- Sets --------------------------------------------------------------------

/// An insertion-ordered collection of unique values.
///
/// `Value` holds floats and host objects, so it can't be hashed or totally
/// ordered; membership is a linear scan over `PartialEq`. Equality ignores
/// order.
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    items: Vec<Value>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.contains(value)
    }

    /// Insert `value` unless an equal value is present. Returns whether it was added.
    pub fn insert(&mut self, value: Value) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }

    pub fn union(&self, other: &ValueSet) -> ValueSet {
        let mut out = self.clone();
        for item in &other.items {
            out.insert(item.clone());
        }
        out
    }

    pub fn intersection(&self, other: &ValueSet) -> ValueSet {
        self.items.iter().filter(|item| other.contains(item)).cloned().collect()
    }

    pub fn difference(&self, other: &ValueSet) -> ValueSet {
        self.items.iter().filter(|item| !other.contains(item)).cloned().collect()
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.items.iter().all(|item| other.contains(item))
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl IntoIterator for ValueSet {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

// --- Callables ---------------------------------------------------------------

type CallableFn = dyn Fn(&[Value]) -> EvalResult<Value> + Send + Sync;

/// A host-supplied function value.
///
/// Mappings and host objects expose named capabilities as `Value::Function`;
/// `FunctionCall` nodes look them up by selector and invoke them with the
/// evaluated arguments.
#[derive(Clone)]
pub struct Callable(Arc<CallableFn>);

impl Callable {
    pub fn new(f: impl Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static) -> Self {
        Callable(Arc::new(f))
    }

    pub fn call(&self, arguments: &[Value]) -> EvalResult<Value> {
        (self.0)(arguments)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(<function>)")
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// --- Conversions -------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ValueSet> for Value {
    fn from(set: ValueSet) -> Self {
        Value::Set(set)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ints_and_floats_compare_numerically() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert!(Value::Int(1) < Value::Float(1.5));
        assert_eq!(Value::from("a").partial_cmp(&Value::Int(1)), None);
    }

    #[test]
    fn set_equality_ignores_order() {
        let a = Value::set([Value::Int(1), Value::Int(2)]);
        let b = Value::set([Value::Int(2), Value::Int(1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn set_algebra() {
        let left: ValueSet = (1..=5).map(Value::Int).collect();
        let right: ValueSet = [1, 3, 5].into_iter().map(Value::Int).collect();
        assert_eq!(left.union(&right), left);
        assert_eq!(left.intersection(&right), right);
        assert_eq!(left.difference(&right), [2, 4].into_iter().map(Value::Int).collect::<ValueSet>());
    }

    #[test]
    fn truthiness_follows_falsy_values() {
        for falsy in [Value::Null, Value::Bool(false), Value::Int(0), Value::from(""), Value::List(vec![])] {
            assert!(!falsy.is_truthy(), "{falsy:?} should be falsy");
        }
        assert!(Value::from("x").is_truthy());
    }

    #[test]
    fn json_documents_convert() {
        let value = Value::from(json!({"names": {"total": 6}, "ratio": 0.5, "tags": ["a"]}));
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map["ratio"], Value::Float(0.5));
        assert_eq!(map["tags"], Value::List(vec![Value::from("a")]));
    }

    #[test]
    fn display_quotes_strings_with_the_unused_quote() {
        assert_eq!(Value::from("plain").to_string(), "\"plain\"");
        assert_eq!(Value::from("say \"hi\"").to_string(), "'say \"hi\"'");
        assert_eq!(Value::List(vec![Value::Int(1), Value::Bool(true)]).to_string(), "{1, TRUE}");
    }

    #[test]
    fn display_parenthesizes_negative_numbers() {
        assert_eq!(Value::Int(-5).to_string(), "(-5)");
        assert_eq!(Value::Float(-2.5).to_string(), "(-2.5)");
        assert_eq!(Value::List(vec![Value::Int(-1), Value::Int(1)]).to_string(), "{(-1), 1}");
    }
}
