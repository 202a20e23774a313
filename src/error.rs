//! Error taxonomy.
//!
//! Scan primitives never fail: they return `None` and the grammars use that
//! for backtracking. Everything that escapes to a caller is one of:
//!
//! - [`ParseError`]: no grammar alternative matched required input.
//! - [`EvalError`]: evaluation of a well-formed tree failed.
//! - [`RuleError`]: a `Rule` was constructed with invalid parts.
//!
//! [`Error`] wraps all three for callers that go text -> model -> inference in
//! one pass.

use thiserror::Error;

/// Result alias for the grammars.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result alias for the evaluator, the builtins and key resolution.
pub type EvalResult<T> = Result<T, EvalError>;

/// Where in the input a parse error happened.
///
/// `residual` is the unparsed remainder of the input at the point of failure.
/// `line` is only known when the model grammar is scanning (it tracks newlines
/// crossed by skipped whitespace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub residual: String,
    pub line: Option<usize>,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: '{}'", self.residual),
            None => write!(f, "'{}'", self.residual),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing '{delimiter}' in {construct} at {at}")]
    MissingDelimiter { delimiter: &'static str, construct: &'static str, at: Location },

    #[error("missing identifier at {at}")]
    MissingIdentifier { at: Location },

    #[error("function '{name}' not found at {at}")]
    UnknownFunction { name: String, at: Location },

    #[error("invalid function identifier at {at}")]
    InvalidFunction { at: Location },

    #[error("invalid keypath at {at}")]
    InvalidKeyPath { at: Location },

    #[error("invalid comparison predicate at {at}")]
    InvalidOperator { at: Location },

    #[error("invalid {kind} literal at {at}")]
    InvalidLiteral { kind: &'static str, at: Location },

    #[error("no argument left for placeholder '%{placeholder}' at {at}")]
    MissingArgument { placeholder: String, at: Location },

    #[error("argument for '%K' must be a string keypath at {at}")]
    InvalidArgument { at: Location },

    #[error("expected specifier at {at}")]
    ExpectedSpecifier { at: Location },

    #[error("expected property key at {at}")]
    ExpectedPropertyKey { at: Location },

    #[error("unexpected input after expression at {at}")]
    TrailingInput { at: Location },

    #[error("failed to parse past line {line}")]
    Unparsed { line: usize },

    #[error(transparent)]
    Rule(#[from] RuleError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("function '{name}' not found")]
    UnknownFunction { name: String },

    #[error("'{name}' is not callable on {target}")]
    NotCallable { name: String, target: &'static str },

    #[error("operator {operator} not supported")]
    UnsupportedOperator { operator: &'static str },

    #[error("{function}: expected {expected}, got {found}")]
    TypeMismatch { function: String, expected: &'static str, found: &'static str },

    #[error("{function}: expected {expected} argument(s), got {found}")]
    Arity { function: String, expected: usize, found: usize },

    #[error("{function}: division by zero")]
    DivisionByZero { function: String },

    #[error("index {index} out of bounds for collection of size {size}")]
    IndexOutOfBounds { index: i64, size: usize },

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("inference of '{key}' requires itself")]
    InferenceCycle { key: String },

    #[error("inference of '{key}' nested deeper than {limit} levels")]
    InferenceDepthExceeded { key: String, limit: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule key cannot be empty")]
    EmptyKey,
}

/// Any error the crate can produce.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Rule(#[from] RuleError),
}
