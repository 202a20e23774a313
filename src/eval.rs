//! Tree evaluation.
//!
//! - `builtins.rs`: the builtin function table every parsed call targets.
//! - `expression.rs`: `Expression::evaluate`.
//! - `operators.rs`: `Predicate::evaluate`, comparison operators and options.
//!
//! Evaluation is a pure function of the tree and the object it runs against.
//! Trees are never mutated, so one parsed tree can be evaluated from many
//! threads at once.

#[path = "eval/builtins.rs"]
pub(crate) mod builtins;
#[path = "eval/expression.rs"]
mod expression;
#[path = "eval/operators.rs"]
mod operators;

pub use builtins::Builtin;
