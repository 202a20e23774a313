//! Predicate evaluation.
//!
//! A comparison evaluates both sides against the same object, folds strings
//! according to its options, then applies the operator. `ANY`/`ALL` apply the
//! operator to each element of a collection on the left; a non-collection left
//! side is treated as a single element.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::error::{EvalError, EvalResult};
use crate::predicate::{Comparison, ComparisonModifier, ComparisonOperator, ComparisonOptions, CompoundKind, Predicate};
use crate::value::Value;

/// Compiled `MATCHES` patterns, keyed by pattern text and case folding.
static PATTERNS: Lazy<Mutex<HashMap<(String, bool), Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

const PATTERN_CACHE_LIMIT: usize = 256;

impl Predicate {
    pub fn evaluate(&self, object: &Value) -> EvalResult<bool> {
        match self {
            Predicate::Value(b) => Ok(*b),
            Predicate::Comparison(comparison) => comparison.evaluate(object),
            Predicate::Compound { kind: CompoundKind::Not, subpredicates } => match subpredicates.first() {
                Some(p) => Ok(!p.evaluate(object)?),
                None => Ok(false),
            },
            Predicate::Compound { kind: CompoundKind::And, subpredicates } => {
                for p in subpredicates {
                    if !p.evaluate(object)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Compound { kind: CompoundKind::Or, subpredicates } => {
                for p in subpredicates {
                    if p.evaluate(object)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

impl Comparison {
    pub fn evaluate(&self, object: &Value) -> EvalResult<bool> {
        let left = fold(self.left.evaluate(object)?, self.options);
        let right = self.right.evaluate(object)?;
        // Patterns keep their escapes; MATCHES folds case through the regex flag.
        let right = if self.operator == ComparisonOperator::Matches { right } else { fold(right, self.options) };

        let elements = match (&self.modifier, left.as_slice()) {
            (ComparisonModifier::Direct, _) | (_, None) => return apply(self.operator, &left, &right, self.options),
            (_, Some(elements)) => elements,
        };

        match self.modifier {
            ComparisonModifier::Any => {
                for element in elements {
                    if apply(self.operator, element, &right, self.options)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => {
                for element in elements {
                    if !apply(self.operator, element, &right, self.options)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

/// Apply `operator` to already-folded operands.
fn apply(operator: ComparisonOperator, left: &Value, right: &Value, options: ComparisonOptions) -> EvalResult<bool> {
    use ComparisonOperator as Op;

    match operator {
        Op::LessThan => order(operator, left, right).map(|o| o.is_lt()),
        Op::LessThanOrEqual => order(operator, left, right).map(|o| o.is_le()),
        Op::GreaterThan => order(operator, left, right).map(|o| o.is_gt()),
        Op::GreaterThanOrEqual => order(operator, left, right).map(|o| o.is_ge()),
        Op::EqualTo => Ok(left == right),
        Op::NotEqualTo => Ok(left != right),
        Op::Matches => {
            let (Value::String(text), Value::String(pattern)) = (left, right) else {
                return Err(mismatch(operator, "strings", non_string(left, right)));
            };
            let case_insensitive = options.contains(ComparisonOptions::CASE_INSENSITIVE);
            with_pattern(pattern, case_insensitive, |re| re.is_match(text))
        }
        Op::BeginsWith | Op::EndsWith => {
            if !left.is_truthy() {
                return Ok(false);
            }
            let (Value::String(text), Value::String(affix)) = (left, right) else {
                return Err(mismatch(operator, "strings", non_string(left, right)));
            };
            let affix = affix.as_str();
            Ok(if operator == Op::BeginsWith { text.starts_with(affix) } else { text.ends_with(affix) })
        }
        Op::In => {
            if !right.is_truthy() {
                return Ok(false);
            }
            right.contains(left).ok_or_else(|| mismatch(operator, "collection or string", right))
        }
        Op::Contains => {
            if !left.is_truthy() {
                return Ok(false);
            }
            left.contains(right).ok_or_else(|| mismatch(operator, "collection or string", left))
        }
        Op::Between => match right.as_slice() {
            Some([low, high]) => {
                let above = order(operator, low, left)?.is_lt();
                let below = order(operator, left, high)?.is_lt();
                Ok(above && below)
            }
            _ => Err(mismatch(operator, "two-element bounds", right)),
        },
        Op::Like | Op::CustomSelector => Err(EvalError::UnsupportedOperator { operator: operator.symbol() }),
    }
}

fn order(operator: ComparisonOperator, left: &Value, right: &Value) -> EvalResult<std::cmp::Ordering> {
    left.partial_cmp(right).ok_or_else(|| {
        let found = if left.is_null() { left } else { right };
        mismatch(operator, "comparable values", found)
    })
}

fn mismatch(operator: ComparisonOperator, expected: &'static str, found: &Value) -> EvalError {
    EvalError::TypeMismatch { function: operator.symbol().to_string(), expected, found: found.type_name() }
}

/// Whichever operand is not a string.
fn non_string<'v>(left: &'v Value, right: &'v Value) -> &'v Value {
    if left.as_str().is_some() { right } else { left }
}

/// Anchored at the start of the text, not the end.
fn with_pattern<T>(pattern: &str, case_insensitive: bool, f: impl FnOnce(&Regex) -> T) -> EvalResult<T> {
    let key = (pattern.to_string(), case_insensitive);
    let mut cache = PATTERNS.lock();
    if cache.len() >= PATTERN_CACHE_LIMIT && !cache.contains_key(&key) {
        cache.clear();
    }
    let re = match cache.entry(key) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => {
            let flags = if case_insensitive { "(?i)" } else { "" };
            let re = Regex::new(&format!("{flags}^(?:{pattern})"))
                .map_err(|err| EvalError::InvalidPattern { pattern: pattern.to_string(), message: err.to_string() })?;
            entry.insert(re)
        }
    };
    Ok(f(re))
}

/// Apply `[c]`/`[d]` folding to strings, including strings inside collections.
fn fold(value: Value, options: ComparisonOptions) -> Value {
    let case = options.contains(ComparisonOptions::CASE_INSENSITIVE);
    let diacritics = options.contains(ComparisonOptions::DIACRITIC_INSENSITIVE);
    if !case && !diacritics {
        return value;
    }
    fold_with(value, case, diacritics)
}

fn fold_with(value: Value, case: bool, diacritics: bool) -> Value {
    match value {
        Value::String(s) => {
            let s = if diacritics { strip_diacritics(&s) } else { s };
            Value::String(if case { s.to_lowercase() } else { s })
        }
        Value::List(items) => Value::List(items.into_iter().map(|v| fold_with(v, case, diacritics)).collect()),
        Value::Set(set) => Value::Set(set.into_iter().map(|v| fold_with(v, case, diacritics)).collect()),
        other => other,
    }
}

/// Decompose to NFD and drop combining marks, so `é` and `e\u{301}` both fold to `e`.
fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).map(strip_stroke).collect()
}

/// Letters whose accent is part of the glyph and has no canonical decomposition.
fn strip_stroke(c: char) -> char {
    match c {
        'Ø' => 'O',
        'ø' => 'o',
        'Đ' => 'D',
        'đ' => 'd',
        'Ł' => 'L',
        'ł' => 'l',
        'Ħ' => 'H',
        'ħ' => 'h',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;
    use rstest::rstest;

    fn list(items: &[i64]) -> Value {
        Value::List(items.iter().copied().map(Value::Int).collect())
    }

    #[rstest]
    #[case(ComparisonOperator::LessThan, Value::Int(1), Value::Int(2), true)]
    #[case(ComparisonOperator::LessThanOrEqual, Value::Int(2), Value::Float(2.0), true)]
    #[case(ComparisonOperator::GreaterThan, Value::from("b"), Value::from("a"), true)]
    #[case(ComparisonOperator::GreaterThanOrEqual, Value::Int(1), Value::Int(2), false)]
    #[case(ComparisonOperator::EqualTo, Value::Int(1), Value::Float(1.0), true)]
    #[case(ComparisonOperator::NotEqualTo, Value::from("a"), Value::Int(1), true)]
    #[case(ComparisonOperator::Matches, Value::from("abc123"), Value::from("[a-c]+\\d"), true)]
    #[case(ComparisonOperator::Matches, Value::from("xabc"), Value::from("abc"), false)]
    #[case(ComparisonOperator::BeginsWith, Value::from("hello"), Value::from("he"), true)]
    #[case(ComparisonOperator::BeginsWith, Value::from(""), Value::from("he"), false)]
    #[case(ComparisonOperator::EndsWith, Value::from("hello"), Value::from("lo"), true)]
    #[case(ComparisonOperator::In, Value::Int(2), list(&[1, 2, 3]), true)]
    #[case(ComparisonOperator::In, Value::Int(2), list(&[]), false)]
    #[case(ComparisonOperator::In, Value::from("ell"), Value::from("hello"), true)]
    #[case(ComparisonOperator::Contains, list(&[1, 2, 3]), Value::Int(4), false)]
    #[case(ComparisonOperator::Contains, Value::Null, Value::Int(4), false)]
    #[case(ComparisonOperator::Between, Value::Int(5), list(&[1, 10]), true)]
    #[case(ComparisonOperator::Between, Value::Int(10), list(&[1, 10]), false)]
    fn operator_semantics(
        #[case] operator: ComparisonOperator,
        #[case] left: Value,
        #[case] right: Value,
        #[case] expected: bool,
    ) {
        assert_eq!(apply(operator, &left, &right, ComparisonOptions::empty()).unwrap(), expected);
    }

    #[test]
    fn unsupported_operators_error() {
        let err = apply(ComparisonOperator::Like, &Value::from("a"), &Value::from("a"), ComparisonOptions::empty());
        assert_eq!(err.unwrap_err(), EvalError::UnsupportedOperator { operator: "LIKE" });
    }

    #[test]
    fn ordering_mismatch_is_an_error() {
        let err = apply(ComparisonOperator::LessThan, &Value::from("a"), &Value::Int(1), ComparisonOptions::empty());
        assert!(matches!(err, Err(EvalError::TypeMismatch { .. })));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = apply(ComparisonOperator::Matches, &Value::from("a"), &Value::from("("), ComparisonOptions::empty());
        assert!(matches!(err, Err(EvalError::InvalidPattern { .. })));
    }

    fn compare(left: Value, operator: ComparisonOperator, right: Value) -> Comparison {
        Comparison {
            left: Expression::constant(left),
            right: Expression::constant(right),
            modifier: ComparisonModifier::Direct,
            operator,
            options: ComparisonOptions::empty(),
        }
    }

    #[test]
    fn options_fold_case_and_diacritics() {
        let mut c = compare(Value::from("Crème Brûlée"), ComparisonOperator::EqualTo, Value::from("creme brulee"));
        assert!(!c.evaluate(&Value::Null).unwrap());
        c.options = ComparisonOptions::CASE_INSENSITIVE;
        assert!(!c.evaluate(&Value::Null).unwrap());
        c.options |= ComparisonOptions::DIACRITIC_INSENSITIVE;
        assert!(c.evaluate(&Value::Null).unwrap());
    }

    #[rstest]
    #[case("Cafe\u{301}", "Cafe")]
    #[case("Caf\u{e9}", "Cafe\u{301}")]
    #[case("Ca\u{1ebf}", "Cae")]
    #[case("\u{1ef3}en", "yen")]
    #[case("S\u{f8}ren \u{141}\u{f3}d\u{17a}", "Soren Lodz")]
    fn diacritic_folding_handles_decomposed_and_extended_letters(#[case] left: &str, #[case] right: &str) {
        let mut c = compare(Value::from(left), ComparisonOperator::EqualTo, Value::from(right));
        assert!(!c.evaluate(&Value::Null).unwrap());
        c.options = ComparisonOptions::DIACRITIC_INSENSITIVE;
        assert!(c.evaluate(&Value::Null).unwrap(), "{left:?} vs {right:?}");
    }

    #[test]
    fn any_and_all_quantify_over_the_left_side() {
        let mut c = compare(list(&[1, 5, 9]), ComparisonOperator::GreaterThan, Value::Int(4));
        c.modifier = ComparisonModifier::Any;
        assert!(c.evaluate(&Value::Null).unwrap());
        c.modifier = ComparisonModifier::All;
        assert!(!c.evaluate(&Value::Null).unwrap());

        let mut scalar = compare(Value::Int(7), ComparisonOperator::GreaterThan, Value::Int(4));
        scalar.modifier = ComparisonModifier::All;
        assert!(scalar.evaluate(&Value::Null).unwrap());
    }

    #[test]
    fn compounds_short_circuit() {
        // The second operand would fail with a type mismatch if evaluated.
        let failing = Predicate::Comparison(compare(Value::from("a"), ComparisonOperator::LessThan, Value::Int(1)));
        assert!(!Predicate::and(vec![Predicate::Value(false), failing.clone()]).evaluate(&Value::Null).unwrap());
        assert!(Predicate::or(vec![Predicate::Value(true), failing]).evaluate(&Value::Null).unwrap());
        assert!(Predicate::not(Predicate::Value(false)).evaluate(&Value::Null).unwrap());
    }
}
