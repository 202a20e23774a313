//! A small predicate and expression language with a forward-inference rule
//! engine on top.
//!
//! Text goes through three stages:
//!
//! ```text
//! format text ── syntax ──> Expression / Predicate / Vec<Rule>
//!                                │
//!                  eval ─────────┤  evaluate against any host value
//!                                │
//!                  engine ───────┘  Model + Context: infer keys from rules
//! ```
//!
//! ```
//! use std::sync::Arc;
//!
//! let model = kevi::model(
//!     r#"
//!     TRUEPREDICATE { tier: 'basic' }
//!     spend > 1000 { tier: 'gold' }
//!     "#,
//! )
//! .unwrap();
//!
//! let context = kevi::Context::new(Arc::new(model));
//! context.set_value("spend", 1500);
//! assert_eq!(context.infer("tier").unwrap(), Some(kevi::Value::from("gold")));
//! ```
//!
//! Host data is read through [`KeyValueCoding`]: maps, lists and JSON
//! documents work out of the box, and any type can implement the trait to
//! expose keys and callable capabilities.

extern crate self as kevi;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;
mod eval;
mod expr;
mod kvc;
mod predicate;
mod syntax;
mod value;

pub use api::{Options, expression, expression_with, model, model_with, predicate, predicate_with};
pub use engine::{Context, Model, Rule, RuleIndex, WEIGHT_SCALE, specificity};
pub use error::{Error, EvalError, EvalResult, Location, ParseError, ParseResult, RuleError};
pub use eval::Builtin;
pub use expr::{Expression, FunctionCall, SetOperation};
pub use kvc::{KeyValueCoding, value_for_key, value_for_key_path};
pub use predicate::{Comparison, ComparisonModifier, ComparisonOperator, ComparisonOptions, CompoundKind, Predicate};
pub use syntax::{CharClass, Number, NumberKind, Parser, Scanner};
pub use value::{Callable, Value, ValueSet};
