//! Builtin function table.
//!
//! Every function call the grammar produces (including desugared operators
//! and keypaths) targets one process-wide table object. The table is a
//! [`KeyValueCoding`] host like any other: evaluation asks it to `perform` the
//! selector, and it dispatches to the matching [`Builtin`].
//!
//! Selector names follow the colon convention: one colon per argument, so
//! `add:to:` takes two and `now` takes none. A few internal helpers that back
//! subscript syntax (`_index`, `_first`, `_last`) have no colon form.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use once_cell::sync::Lazy;
use rand::Rng;

use crate::error::{EvalError, EvalResult};
use crate::kvc::{self, KeyValueCoding};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Sum,
    Count,
    Min,
    Max,
    Average,
    First,
    Last,
    FromObjectIndex,
    Index,
    IndexFirst,
    IndexLast,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Sqrt,
    Ln,
    Exp,
    RaiseToPower,
    Abs,
    Ceiling,
    ChangeSign,
    Random,
    Now,
    Replace,
    ValueForKeyPath,
}

const ALL: [Builtin; 27] = [
    Builtin::Sum,
    Builtin::Count,
    Builtin::Min,
    Builtin::Max,
    Builtin::Average,
    Builtin::First,
    Builtin::Last,
    Builtin::FromObjectIndex,
    Builtin::Index,
    Builtin::IndexFirst,
    Builtin::IndexLast,
    Builtin::Add,
    Builtin::Subtract,
    Builtin::Multiply,
    Builtin::Divide,
    Builtin::Modulus,
    Builtin::Sqrt,
    Builtin::Ln,
    Builtin::Exp,
    Builtin::RaiseToPower,
    Builtin::Abs,
    Builtin::Ceiling,
    Builtin::ChangeSign,
    Builtin::Random,
    Builtin::Now,
    Builtin::Replace,
    Builtin::ValueForKeyPath,
];

static BY_SELECTOR: Lazy<HashMap<&'static str, Builtin>> =
    Lazy::new(|| ALL.iter().map(|builtin| (builtin.selector(), *builtin)).collect());

static TABLE: Lazy<Arc<dyn KeyValueCoding>> = Lazy::new(|| Arc::new(BuiltinTable));

/// The builtin with this selector, if any.
pub fn lookup(selector: &str) -> Option<Builtin> {
    BY_SELECTOR.get(selector).copied()
}

/// The shared table object, as a value usable as a call target.
pub fn table() -> Value {
    Value::Object(TABLE.clone())
}

pub fn is_table(value: &Value) -> bool {
    match value {
        Value::Object(object) => Arc::ptr_eq(object, &*TABLE),
        _ => false,
    }
}

#[derive(Debug)]
struct BuiltinTable;

impl KeyValueCoding for BuiltinTable {
    fn value_for_key(&self, _key: &str) -> EvalResult<Value> {
        Ok(Value::Null)
    }

    fn perform(&self, selector: &str, arguments: &[Value]) -> EvalResult<Value> {
        let builtin = lookup(selector).ok_or_else(|| EvalError::UnknownFunction { name: selector.to_string() })?;
        builtin.call(arguments)
    }
}

impl Builtin {
    pub fn selector(self) -> &'static str {
        match self {
            Builtin::Sum => "sum:",
            Builtin::Count => "count:",
            Builtin::Min => "min:",
            Builtin::Max => "max:",
            Builtin::Average => "average:",
            Builtin::First => "first:",
            Builtin::Last => "last:",
            Builtin::FromObjectIndex => "fromObject:index:",
            Builtin::Index => "_index",
            Builtin::IndexFirst => "_first",
            Builtin::IndexLast => "_last",
            Builtin::Add => "add:to:",
            Builtin::Subtract => "from:subtract:",
            Builtin::Multiply => "multiply:by:",
            Builtin::Divide => "divide:by:",
            Builtin::Modulus => "modulus:by:",
            Builtin::Sqrt => "sqrt:",
            Builtin::Ln => "ln:",
            Builtin::Exp => "exp:",
            Builtin::RaiseToPower => "raise:toPower:",
            Builtin::Abs => "abs:",
            Builtin::Ceiling => "ceiling:",
            Builtin::ChangeSign => "chs",
            Builtin::Random => "random:",
            Builtin::Now => "now",
            Builtin::Replace => "replace:from:to:",
            Builtin::ValueForKeyPath => "valueForKeyPath:",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Now => 0,
            Builtin::Sum
            | Builtin::Count
            | Builtin::Min
            | Builtin::Max
            | Builtin::Average
            | Builtin::First
            | Builtin::Last
            | Builtin::IndexFirst
            | Builtin::IndexLast
            | Builtin::Sqrt
            | Builtin::Ln
            | Builtin::Exp
            | Builtin::Abs
            | Builtin::Ceiling
            | Builtin::ChangeSign
            | Builtin::Random => 1,
            Builtin::FromObjectIndex
            | Builtin::Index
            | Builtin::Add
            | Builtin::Subtract
            | Builtin::Multiply
            | Builtin::Divide
            | Builtin::Modulus
            | Builtin::RaiseToPower
            | Builtin::ValueForKeyPath => 2,
            Builtin::Replace => 3,
        }
    }

    pub fn call(self, arguments: &[Value]) -> EvalResult<Value> {
        if arguments.len() != self.arity() {
            return Err(EvalError::Arity {
                function: self.selector().to_string(),
                expected: self.arity(),
                found: arguments.len(),
            });
        }

        match (self, arguments) {
            (Builtin::Now, []) => Ok(Value::DateTime(Local::now().naive_local())),

            (Builtin::Sum, [items]) => self.items(items)?.iter().try_fold(Value::Int(0), |acc, v| self.add(&acc, v)),
            (Builtin::Count, [items]) => self.count(items),
            (Builtin::Min, [items]) => self.extreme(items, std::cmp::Ordering::Less),
            (Builtin::Max, [items]) => self.extreme(items, std::cmp::Ordering::Greater),
            (Builtin::Average, [items]) => {
                let items = self.items(items)?;
                if items.is_empty() {
                    return Err(EvalError::DivisionByZero { function: self.selector().to_string() });
                }
                let total = items.iter().try_fold(Value::Int(0), |acc, v| self.add(&acc, v))?;
                Ok(Value::Float(self.number(&total)? / items.len() as f64))
            }
            (Builtin::First | Builtin::IndexFirst, [items]) => self.at(items, 0),
            (Builtin::Last | Builtin::IndexLast, [items]) => self.at(items, -1),
            (Builtin::FromObjectIndex | Builtin::Index, [target, index]) => self.subscript(target, index),

            (Builtin::Add, [l, r]) => self.add(l, r),
            (Builtin::Subtract, [l, r]) => self.arithmetic(l, r, i64::checked_sub, |a, b| a - b),
            (Builtin::Multiply, [l, r]) => self.arithmetic(l, r, i64::checked_mul, |a, b| a * b),
            (Builtin::Divide, [l, r]) => {
                let divisor = self.number(r)?;
                if divisor == 0.0 {
                    return Err(EvalError::DivisionByZero { function: self.selector().to_string() });
                }
                Ok(Value::Float(self.number(l)? / divisor))
            }
            (Builtin::Modulus, [l, r]) => self.modulus(l, r),
            (Builtin::RaiseToPower, [l, r]) => Ok(Value::Float(self.number(l)?.powf(self.number(r)?))),

            (Builtin::Sqrt, [x]) => Ok(Value::Float(self.number(x)?.sqrt())),
            (Builtin::Ln, [x]) => Ok(Value::Float(self.number(x)?.ln())),
            (Builtin::Exp, [x]) => Ok(Value::Float(self.number(x)?.exp())),
            (Builtin::Abs, [Value::Int(n)]) => Ok(Value::Int(n.saturating_abs())),
            (Builtin::Abs, [x]) => Ok(Value::Float(self.number(x)?.abs())),
            (Builtin::Ceiling, [Value::Int(n)]) => Ok(Value::Int(*n)),
            (Builtin::Ceiling, [x]) => Ok(Value::Int(self.number(x)?.ceil() as i64)),
            (Builtin::ChangeSign, [Value::Int(n)]) => {
                Ok(n.checked_neg().map_or(Value::Float(-(*n as f64)), Value::Int))
            }
            (Builtin::ChangeSign, [x]) => Ok(Value::Float(-self.number(x)?)),
            (Builtin::Random, [upper]) => {
                let upper = self.number(upper)? as i64;
                if upper < 0 {
                    return Err(self.mismatch("non-negative number", "negative number"));
                }
                Ok(Value::Int(rand::thread_rng().gen_range(0..=upper)))
            }

            (Builtin::Replace, [subject, from, to]) => match (subject, from, to) {
                (Value::String(s), Value::String(from), Value::String(to)) => Ok(Value::String(s.replace(from, to))),
                _ => Err(self.mismatch("strings", subject.type_name())),
            },
            (Builtin::ValueForKeyPath, [object, path]) => match path {
                Value::String(path) => kvc::value_for_key_path(object, path),
                other => Err(self.mismatch("string keypath", other.type_name())),
            },

            _ => Err(EvalError::Arity {
                function: self.selector().to_string(),
                expected: self.arity(),
                found: arguments.len(),
            }),
        }
    }

    fn mismatch(self, expected: &'static str, found: &'static str) -> EvalError {
        EvalError::TypeMismatch { function: self.selector().to_string(), expected, found }
    }

    fn number(self, value: &Value) -> EvalResult<f64> {
        value.as_f64().ok_or_else(|| self.mismatch("number", value.type_name()))
    }

    fn items(self, value: &Value) -> EvalResult<&[Value]> {
        value.as_slice().ok_or_else(|| self.mismatch("collection", value.type_name()))
    }

    fn count(self, value: &Value) -> EvalResult<Value> {
        let len = match value {
            Value::List(items) => items.len(),
            Value::Set(set) => set.len(),
            Value::Map(map) => map.len(),
            Value::String(s) => s.chars().count(),
            other => return Err(self.mismatch("collection", other.type_name())),
        };
        Ok(Value::Int(len as i64))
    }

    fn extreme(self, value: &Value, wanted: std::cmp::Ordering) -> EvalResult<Value> {
        let mut items = self.items(value)?.iter();
        let mut best = items.next().ok_or_else(|| self.mismatch("non-empty collection", "empty collection"))?;
        for item in items {
            match item.partial_cmp(best) {
                Some(ordering) if ordering == wanted => best = item,
                Some(_) => {}
                None => return Err(self.mismatch("comparable values", item.type_name())),
            }
        }
        Ok(best.clone())
    }

    /// Element at `index`, counting from the end when negative.
    fn at(self, value: &Value, index: i64) -> EvalResult<Value> {
        let items = self.items(value)?;
        let size = items.len();
        let resolved = if index < 0 { size as i64 + index } else { index };
        usize::try_from(resolved)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or(EvalError::IndexOutOfBounds { index, size })
    }

    fn subscript(self, target: &Value, index: &Value) -> EvalResult<Value> {
        match (target, index) {
            (Value::Map(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
            (Value::Object(object), Value::String(key)) => object.value_for_key(key),
            (_, Value::Int(i)) => self.at(target, *i),
            (_, Value::Float(f)) if f.fract() == 0.0 => self.at(target, *f as i64),
            (_, other) => Err(self.mismatch("integer index", other.type_name())),
        }
    }

    fn add(self, l: &Value, r: &Value) -> EvalResult<Value> {
        match (l, r) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => Ok(Value::List(a.iter().chain(b).cloned().collect())),
            _ => self.arithmetic(l, r, i64::checked_add, |a, b| a + b),
        }
    }

    /// Integer arithmetic while both sides are integers and the result fits,
    /// floating point otherwise.
    fn arithmetic(
        self,
        l: &Value,
        r: &Value,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> EvalResult<Value> {
        if let (Value::Int(a), Value::Int(b)) = (l, r) {
            if let Some(n) = int_op(*a, *b) {
                return Ok(Value::Int(n));
            }
        }
        Ok(Value::Float(float_op(self.number(l)?, self.number(r)?)))
    }

    /// Remainder with the sign of the divisor.
    fn modulus(self, l: &Value, r: &Value) -> EvalResult<Value> {
        match (l, r) {
            (_, Value::Int(0)) => Err(EvalError::DivisionByZero { function: self.selector().to_string() }),
            (Value::Int(a), Value::Int(b)) => {
                let (a, b) = (i128::from(*a), i128::from(*b));
                Ok(Value::Int((((a % b) + b) % b) as i64))
            }
            _ => {
                let (a, b) = (self.number(l)?, self.number(r)?);
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero { function: self.selector().to_string() });
                }
                Ok(Value::Float(((a % b) + b) % b))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn ints(items: &[i64]) -> Value {
        Value::List(items.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn every_builtin_is_reachable_by_selector() {
        for builtin in ALL {
            assert_eq!(lookup(builtin.selector()), Some(builtin));
        }
        assert_eq!(lookup("log:"), None);
    }

    #[test]
    fn table_identity() {
        assert!(is_table(&table()));
        assert!(!is_table(&Value::Null));
    }

    #[rstest]
    #[case(Builtin::Sum, vec![ints(&[1, 2, 3])], Value::Int(6))]
    #[case(Builtin::Count, vec![ints(&[1, 2, 3])], Value::Int(3))]
    #[case(Builtin::Min, vec![ints(&[4, 2, 9])], Value::Int(2))]
    #[case(Builtin::Max, vec![ints(&[4, 2, 9])], Value::Int(9))]
    #[case(Builtin::Average, vec![ints(&[1, 2, 3, 4])], Value::Float(2.5))]
    #[case(Builtin::First, vec![ints(&[7, 8])], Value::Int(7))]
    #[case(Builtin::Last, vec![ints(&[7, 8])], Value::Int(8))]
    #[case(Builtin::Index, vec![ints(&[7, 8, 9]), Value::Int(1)], Value::Int(8))]
    #[case(Builtin::Add, vec![Value::Int(2), Value::Float(0.5)], Value::Float(2.5))]
    #[case(Builtin::Add, vec![Value::from("ab"), Value::from("cd")], Value::from("abcd"))]
    #[case(Builtin::Subtract, vec![Value::Int(2), Value::Int(5)], Value::Int(-3))]
    #[case(Builtin::Multiply, vec![Value::Int(6), Value::Int(7)], Value::Int(42))]
    #[case(Builtin::Divide, vec![Value::Int(7), Value::Int(2)], Value::Float(3.5))]
    #[case(Builtin::Modulus, vec![Value::Int(-7), Value::Int(3)], Value::Int(2))]
    #[case(Builtin::Sqrt, vec![Value::Int(16)], Value::Float(4.0))]
    #[case(Builtin::RaiseToPower, vec![Value::Int(2), Value::Int(10)], Value::Float(1024.0))]
    #[case(Builtin::Abs, vec![Value::Int(-3)], Value::Int(3))]
    #[case(Builtin::Ceiling, vec![Value::Float(1.2)], Value::Int(2))]
    #[case(Builtin::ChangeSign, vec![Value::Int(5)], Value::Int(-5))]
    #[case(Builtin::Ln, vec![Value::Float(1.0)], Value::Float(0.0))]
    #[case(Builtin::Exp, vec![Value::Int(0)], Value::Float(1.0))]
    #[case(Builtin::Replace, vec![Value::from("a-b-c"), Value::from("-"), Value::from("+")], Value::from("a+b+c"))]
    fn evaluates(#[case] builtin: Builtin, #[case] arguments: Vec<Value>, #[case] expected: Value) {
        assert_eq!(builtin.call(&arguments).unwrap(), expected);
    }

    #[test]
    fn ln_is_the_natural_log() {
        let Value::Float(x) = Builtin::Ln.call(&[Value::Float(std::f64::consts::E)]).unwrap() else {
            panic!("expected a float");
        };
        assert!((x - 1.0).abs() < 1e-12);
        let Value::Float(hundred) = Builtin::Ln.call(&[Value::Int(100)]).unwrap() else {
            panic!("expected a float");
        };
        assert!((hundred - 2.0).abs() > 1.0);
    }

    #[test]
    fn integer_overflow_falls_back_to_float() {
        let result = Builtin::Multiply.call(&[Value::Int(i64::MAX), Value::Int(2)]).unwrap();
        assert!(matches!(result, Value::Float(_)));
    }

    #[test]
    fn arity_is_checked() {
        let err = Builtin::Add.call(&[Value::Int(1)]).unwrap_err();
        assert_eq!(err, EvalError::Arity { function: "add:to:".to_string(), expected: 2, found: 1 });
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = Builtin::Divide.call(&[Value::Int(1), Value::Int(0)]).unwrap_err();
        assert_eq!(err, EvalError::DivisionByZero { function: "divide:by:".to_string() });
    }

    #[test]
    fn index_out_of_bounds() {
        let err = Builtin::Index.call(&[ints(&[1]), Value::Int(3)]).unwrap_err();
        assert_eq!(err, EvalError::IndexOutOfBounds { index: 3, size: 1 });
    }

    #[test]
    fn random_stays_in_range() {
        for _ in 0..32 {
            let Value::Int(n) = Builtin::Random.call(&[Value::Int(3)]).unwrap() else {
                panic!("random: should produce an int");
            };
            assert!((0..=3).contains(&n));
        }
    }

    #[test]
    fn table_performs_by_selector() {
        let Value::Object(table) = table() else {
            panic!("table should be an object");
        };
        assert_eq!(table.perform("count:", &[ints(&[1, 2])]).unwrap(), Value::Int(2));
        assert_eq!(
            table.perform("nope:", &[]).unwrap_err(),
            EvalError::UnknownFunction { name: "nope:".to_string() }
        );
    }
}
