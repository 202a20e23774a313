use std::str::FromStr;

use crate::engine::Model;
use crate::error::ParseResult;
use crate::expr::Expression;
use crate::predicate::Predicate;
use crate::syntax::Parser;
use crate::value::Value;

/// Options that affect parsing and inference.
#[derive(Debug, Clone)]
pub struct Options {
    /// Match keywords, operators and literals case-sensitively.
    pub case_sensitive: bool,
    /// Longest chain of keys a context will infer through before giving up.
    pub max_inference_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self { case_sensitive: false, max_inference_depth: 32 }
    }
}

/// Parse an expression, binding `%@`/`%K` placeholders to `arguments` in order.
///
/// ```
/// let expr = kevi::expression("count:(items) * %@", &[kevi::Value::Int(2)]).unwrap();
/// let object = kevi::Value::from(serde_json::json!({"items": [1, 2, 3]}));
/// assert_eq!(expr.evaluate(&object).unwrap(), kevi::Value::Int(6));
/// ```
pub fn expression(format: &str, arguments: &[Value]) -> ParseResult<Expression> {
    expression_with(format, arguments, &Options::default())
}

pub fn expression_with(format: &str, arguments: &[Value], options: &Options) -> ParseResult<Expression> {
    let mut parser = Parser::new(format, arguments, options);
    let expression = parser.parse_expression()?;
    parser.expect_end()?;
    Ok(expression)
}

/// Parse a predicate, binding placeholders to `arguments` in order.
///
/// ```
/// let p = kevi::predicate("name BEGINSWITH[c] %@", &["ad".into()]).unwrap();
/// let object = kevi::Value::from(serde_json::json!({"name": "Ada"}));
/// assert!(p.evaluate(&object).unwrap());
/// ```
pub fn predicate(format: &str, arguments: &[Value]) -> ParseResult<Predicate> {
    predicate_with(format, arguments, &Options::default())
}

pub fn predicate_with(format: &str, arguments: &[Value], options: &Options) -> ParseResult<Predicate> {
    let mut parser = Parser::new(format, arguments, options);
    let predicate = parser.parse_predicate()?;
    parser.expect_end()?;
    Ok(predicate)
}

/// Parse model text into an indexed rule set.
///
/// ```
/// use std::sync::Arc;
///
/// let model = kevi::model("TRUEPREDICATE { greeting: 'hello' }").unwrap();
/// let context = kevi::Context::new(Arc::new(model));
/// assert_eq!(context.infer("greeting").unwrap(), Some(kevi::Value::from("hello")));
/// ```
pub fn model(text: &str) -> ParseResult<Model> {
    model_with(text, &Options::default())
}

pub fn model_with(text: &str, options: &Options) -> ParseResult<Model> {
    let mut parser = Parser::new(text, &[], options);
    let rules = parser.parse_model()?;
    Ok(Model::new(rules))
}

impl FromStr for Expression {
    type Err = crate::error::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        expression(s, &[])
    }
}

impl FromStr for Predicate {
    type Err = crate::error::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        predicate(s, &[])
    }
}

impl FromStr for Model {
    type Err = crate::error::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        model(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    #[test]
    fn default_options() {
        let options = Options::default();
        assert!(!options.case_sensitive);
        assert_eq!(options.max_inference_depth, 32);
    }

    #[test]
    fn trailing_input_is_rejected() {
        let err = expression("1 2", &[]).unwrap_err();
        let ParseError::TrailingInput { at } = err else {
            panic!("expected trailing input error, got {err:?}");
        };
        assert_eq!(at.residual, "2");
    }

    #[test]
    fn case_sensitive_keywords() {
        let options = Options { case_sensitive: true, ..Options::default() };
        assert!(predicate_with("truepredicate", &[], &Options::default()).is_ok());
        assert!(predicate_with("truepredicate", &[], &options).is_err());
        assert!(predicate_with("TRUEPREDICATE", &[], &options).is_ok());
    }

    #[test]
    fn parses_through_from_str() {
        let p: Predicate = "a == 1".parse().unwrap();
        assert!(matches!(p, Predicate::Comparison(_)));
        let model: Model = "TRUEPREDICATE { k: 1 }".parse().unwrap();
        assert_eq!(model.rules().len(), 1);
    }
}
