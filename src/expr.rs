use std::collections::HashMap;
use std::fmt;

use crate::error::{EvalError, EvalResult};
use crate::eval::builtins::{self, Builtin};
use crate::value::Value;

/// Selector of the builtin every keypath expression calls.
pub(crate) const KEY_PATH_SELECTOR: &str = "valueForKeyPath:";

/// Selector that introduces a custom function call: `FUNCTION(operand, 'selector', args...)`.
pub(crate) const CUSTOM_FUNCTION: &str = "FUNCTION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperation {
    Union,
    Intersect,
    Minus,
}

impl SetOperation {
    pub fn keyword(self) -> &'static str {
        match self {
            SetOperation::Union => "UNION",
            SetOperation::Intersect => "INTERSECT",
            SetOperation::Minus => "MINUS",
        }
    }
}

/// `operand.selector(arguments...)`.
///
/// The operand evaluates to the call target: the builtin table for parsed
/// functions and keypaths, or any host value for `FUNCTION(...)` calls.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub operand: Box<Expression>,
    pub function: String,
    pub arguments: Vec<Expression>,
}

impl FunctionCall {
    /// True when the target is the process-wide builtin table.
    pub fn is_builtin(&self) -> bool {
        matches!(self.operand.as_ref(), Expression::Constant(value) if builtins::is_table(value))
    }
}

/// Expression tree. Immutable once built; evaluation lives in `eval`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(Value),
    /// `SELF`: the object under evaluation.
    SelfReference,
    /// `$name`. Evaluates to `Null` until substituted.
    Variable(String),
    /// Always `valueForKeyPath:(SELF, 'path')` on the builtin table.
    KeyPath(FunctionCall),
    Function(FunctionCall),
    Aggregate(Vec<Expression>),
    Set {
        operation: SetOperation,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn key_path(path: impl Into<String>) -> Self {
        Expression::KeyPath(FunctionCall {
            operand: Box::new(Expression::Constant(builtins::table())),
            function: KEY_PATH_SELECTOR.to_string(),
            arguments: vec![Expression::SelfReference, Expression::Constant(Value::String(path.into()))],
        })
    }

    /// Call the builtin named `selector`.
    pub fn function(selector: &str, arguments: Vec<Expression>) -> EvalResult<Self> {
        let builtin =
            builtins::lookup(selector).ok_or_else(|| EvalError::UnknownFunction { name: selector.to_string() })?;
        Ok(Self::builtin(builtin, arguments))
    }

    pub(crate) fn builtin(builtin: Builtin, arguments: Vec<Expression>) -> Self {
        Expression::Function(FunctionCall {
            operand: Box::new(Expression::Constant(builtins::table())),
            function: builtin.selector().to_string(),
            arguments,
        })
    }

    /// Call `selector` on whatever `operand` evaluates to.
    pub fn custom_function(operand: Expression, selector: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Expression::Function(FunctionCall { operand: Box::new(operand), function: selector.into(), arguments })
    }

    pub fn aggregate(items: Vec<Expression>) -> Self {
        Expression::Aggregate(items)
    }

    pub fn set_operation(operation: SetOperation, left: Expression, right: Expression) -> Self {
        Expression::Set { operation, left: Box::new(left), right: Box::new(right) }
    }

    /// The keypath text of a keypath expression.
    pub fn key_path_text(&self) -> Option<&str> {
        match self {
            Expression::KeyPath(call) => match call.arguments.get(1) {
                Some(Expression::Constant(Value::String(path))) => Some(path),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn constant_value(&self) -> Option<&Value> {
        match self {
            Expression::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Copy of this tree with every `$name` found in `variables` replaced by
    /// its constant value. Unknown variables are left in place.
    pub fn with_substitutions(&self, variables: &HashMap<String, Value>) -> Expression {
        match self {
            Expression::Variable(name) => match variables.get(name) {
                Some(value) => Expression::Constant(value.clone()),
                None => self.clone(),
            },
            Expression::Constant(_) | Expression::SelfReference => self.clone(),
            Expression::KeyPath(call) => Expression::KeyPath(call.with_substitutions(variables)),
            Expression::Function(call) => Expression::Function(call.with_substitutions(variables)),
            Expression::Aggregate(items) => {
                Expression::Aggregate(items.iter().map(|item| item.with_substitutions(variables)).collect())
            }
            Expression::Set { operation, left, right } => Expression::Set {
                operation: *operation,
                left: Box::new(left.with_substitutions(variables)),
                right: Box::new(right.with_substitutions(variables)),
            },
        }
    }
}

impl FunctionCall {
    fn with_substitutions(&self, variables: &HashMap<String, Value>) -> FunctionCall {
        FunctionCall {
            operand: Box::new(self.operand.with_substitutions(variables)),
            function: self.function.clone(),
            arguments: self.arguments.iter().map(|arg| arg.with_substitutions(variables)).collect(),
        }
    }
}

/// Keypath components the grammar would read as a keyword, number or variable need a `#` escape.
fn needs_escape(component: &str) -> bool {
    component.starts_with(|c: char| c.is_ascii_digit() || c == '$')
        || regex!(r"(?i)^(NULL|NIL|TRUE|YES|FALSE|NO|SELF|ANY|ALL|NONE|SOME|NOT|TRUEPREDICATE|FALSEPREDICATE)(\W|$)")
            .is_match(component)
}

impl fmt::Display for Expression {
    /// Formats the tree as format text that parses back to an equivalent tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(value) => write!(f, "{value}"),
            Expression::SelfReference => f.write_str("SELF"),
            Expression::Variable(name) => write!(f, "${name}"),
            Expression::KeyPath(_) => {
                let path = self.key_path_text().unwrap_or_default();
                for (idx, component) in path.split('.').enumerate() {
                    if idx > 0 {
                        f.write_str(".")?;
                    }
                    if needs_escape(component) {
                        f.write_str("#")?;
                    }
                    f.write_str(component)?;
                }
                Ok(())
            }
            Expression::Function(call) => fmt_call(f, call),
            Expression::Aggregate(items) => {
                f.write_str("{")?;
                write_list(f, items)?;
                f.write_str("}")
            }
            Expression::Set { operation, left, right } => write!(f, "({left} {} {right})", operation.keyword()),
        }
    }
}

fn fmt_call(f: &mut fmt::Formatter<'_>, call: &FunctionCall) -> fmt::Result {
    if !call.is_builtin() {
        write!(f, "{CUSTOM_FUNCTION}({}, \"{}\"", call.operand, call.function)?;
        for arg in &call.arguments {
            write!(f, ", {arg}")?;
        }
        return f.write_str(")");
    }

    let args = &call.arguments;
    match (builtins::lookup(&call.function), args.as_slice()) {
        (Some(Builtin::Add), [l, r]) => write!(f, "({l} + {r})"),
        (Some(Builtin::Subtract), [l, r]) => write!(f, "({l} - {r})"),
        (Some(Builtin::Multiply), [l, r]) => write!(f, "({l} * {r})"),
        (Some(Builtin::Divide), [l, r]) => write!(f, "({l} / {r})"),
        (Some(Builtin::RaiseToPower), [l, r]) => write!(f, "({l} ** {r})"),
        (Some(Builtin::ChangeSign), [operand]) => write!(f, "(-{operand})"),
        (Some(Builtin::Index), [target, index]) => write!(f, "{target}[{index}]"),
        (Some(Builtin::IndexFirst), [target]) => write!(f, "{target}[FIRST]"),
        (Some(Builtin::IndexLast), [target]) => write!(f, "{target}[LAST]"),
        _ => {
            write!(f, "{}(", call.function)?;
            write_list(f, args)?;
            f.write_str(")")
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_path_is_a_call_to_the_resolver() {
        let expr = Expression::key_path("a.b");
        let Expression::KeyPath(call) = &expr else {
            panic!("expected keypath");
        };
        assert!(call.is_builtin());
        assert_eq!(call.function, KEY_PATH_SELECTOR);
        assert_eq!(call.arguments[0], Expression::SelfReference);
        assert_eq!(expr.key_path_text(), Some("a.b"));
    }

    #[test]
    fn unknown_builtin_is_rejected() {
        let err = Expression::function("frobnicate:", vec![]).unwrap_err();
        assert_eq!(err, EvalError::UnknownFunction { name: "frobnicate:".to_string() });
    }

    #[test]
    fn substitution_rewrites_only_known_variables() {
        let expr = Expression::aggregate(vec![Expression::variable("limit"), Expression::variable("other")]);
        let vars = HashMap::from([("limit".to_string(), Value::Int(3))]);
        let rewritten = expr.with_substitutions(&vars);
        assert_eq!(rewritten, Expression::aggregate(vec![Expression::constant(3), Expression::variable("other")]));
        // Source tree is untouched.
        assert_eq!(expr, Expression::aggregate(vec![Expression::variable("limit"), Expression::variable("other")]));
    }

    #[test]
    fn display_escapes_reserved_keypaths() {
        assert_eq!(Expression::key_path("self").to_string(), "#self");
        assert_eq!(Expression::key_path("selfie").to_string(), "selfie");
        assert_eq!(Expression::key_path("no.way").to_string(), "#no.way");
        assert_eq!(Expression::key_path("a.self").to_string(), "a.#self");
        assert_eq!(Expression::key_path("rows.2.true_value").to_string(), "rows.#2.true_value");
        assert_eq!(Expression::key_path("any.nil").to_string(), "#any.#nil");
    }

    #[test]
    fn display_uses_operator_syntax_for_arithmetic() {
        let sum = Expression::function("add:to:", vec![Expression::constant(1), Expression::key_path("x")]).unwrap();
        assert_eq!(sum.to_string(), "(1 + x)");
        let count = Expression::function("count:", vec![Expression::key_path("items")]).unwrap();
        assert_eq!(count.to_string(), "count:(items)");
    }
}
