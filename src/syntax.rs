//! Text to trees.
//!
//! Three grammars share one scanner and one parser state:
//!
//! ```text
//!                    Scanner (scanner.rs)
//!                       skip set, case policy, line count
//!                              │
//!          ┌───────────────────┼────────────────────┐
//!          v                   v                    v
//!   expression.rs  <───  predicate.rs  <───     model.rs
//!   Expression AST       Predicate AST        Vec<Rule>
//! ```
//!
//! Each layer calls the one to its left: a comparison is two expressions
//! around an operator; a ruleset is specifier predicates around declarations
//! whose values are expressions.
//!
//! ## Backtracking
//!
//! Scan primitives never fail loudly. A grammar alternative saves
//! `Scanner::location`, tries to match, and restores the location if it does
//! not. Parse errors are only raised when no alternative matched required
//! input.
//!
//! ## Responsibilities by module
//!
//! - `charset.rs`: character classes (skip set, identifiers, property keys).
//! - `scanner.rs`: the cursor and its scan primitives.
//! - `expression.rs`: `Parser` and the arithmetic/keypath/function grammar.
//! - `predicate.rs`: comparisons, modifiers, options and compound folding.
//! - `model.rs`: rulesets, declarations and nested specifier inheritance.

#[path = "syntax/charset.rs"]
mod charset;
#[path = "syntax/expression.rs"]
mod expression;
#[path = "syntax/model.rs"]
mod model;
#[path = "syntax/predicate.rs"]
mod predicate;
#[path = "syntax/scanner.rs"]
mod scanner;


pub use charset::CharClass;
pub use expression::Parser;
pub use scanner::{Number, NumberKind, Scanner};
