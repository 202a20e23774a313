//! Expression grammar.
//!
//! ```text
//! expression     := binary
//! binary         := addition ( (':=' | UNION | INTERSECT | MINUS) addition )*
//! addition       := multiplication ( ('+' | '-') multiplication )*
//! multiplication := power ( ('*' | '/') power )*
//! power          := functional ( '**' functional )*
//! functional     := simple ( selector-colon | '(' args ')' | '[' index ']' | '.' simple )*
//! simple         := number | '-' expression | '(' expression ')' | '{' args '}'
//!                 | NULL | NIL | TRUE | YES | FALSE | NO | SELF
//!                 | '$' identifier | '%' placeholder | quoted string
//!                 | '@' identifier | '#'? identifier
//! ```
//!
//! Operators desugar to builtin calls (`a + b` is `add:to:(a, b)`), so the
//! tree only ever contains the node kinds of [`Expression`].
//!
//! The parser state (`Parser`) is shared with the predicate and model
//! grammars, which extend it with their own `impl` blocks.

use log::{debug, trace};

use super::charset::{self, is_skipped};
use super::scanner::{Number, NumberKind, Scanner};
use crate::api::Options;
use crate::error::{Location, ParseError, ParseResult};
use crate::eval::builtins::Builtin;
use crate::expr::{CUSTOM_FUNCTION, Expression, SetOperation};
use crate::value::Value;

/// Recursive-descent parser over one input text.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    pub(super) scanner: Scanner<'a>,
    arguments: &'a [Value],
    next_argument: usize,
    /// Report line numbers in errors (model text spans many lines).
    pub(super) track_lines: bool,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str, arguments: &'a [Value], options: &Options) -> Self {
        let mut scanner = Scanner::new(text);
        scanner.set_case_sensitive(options.case_sensitive);
        Parser { scanner, arguments, next_argument: 0, track_lines: false }
    }

    pub fn scanner(&self) -> &Scanner<'a> {
        &self.scanner
    }

    pub(super) fn options(&self) -> Options {
        Options { case_sensitive: self.scanner.case_sensitive(), ..Options::default() }
    }

    /// Fail unless only skip characters remain.
    pub fn expect_end(&mut self) -> ParseResult<()> {
        if self.scanner.at_end() { Ok(()) } else { Err(ParseError::TrailingInput { at: self.at() }) }
    }

    pub(super) fn at(&self) -> Location {
        Location {
            residual: self.scanner.remaining().trim_start_matches(is_skipped).to_string(),
            line: self.track_lines.then(|| self.scanner.line()),
        }
    }

    pub(super) fn expect(&mut self, delimiter: &'static str, construct: &'static str) -> ParseResult<()> {
        if self.scanner.scan_literal(delimiter) {
            Ok(())
        } else {
            Err(ParseError::MissingDelimiter { delimiter, construct, at: self.at() })
        }
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_binary()
    }

    fn parse_binary(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_addition()?;
        loop {
            if self.scanner.scan_literal(":=") {
                // Assignment has no evaluation semantics; the right side is
                // parsed for validity and dropped.
                let discarded = self.parse_addition()?;
                debug!("ignoring assignment of {discarded} to {left}");
                continue;
            }
            let operation = if self.scanner.scan_keyword("UNION") {
                SetOperation::Union
            } else if self.scanner.scan_keyword("INTERSECT") {
                SetOperation::Intersect
            } else if self.scanner.scan_keyword("MINUS") {
                SetOperation::Minus
            } else {
                return Ok(left);
            };
            let right = self.parse_addition()?;
            left = Expression::set_operation(operation, left, right);
        }
    }

    fn parse_addition(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplication()?;
        loop {
            let builtin = if self.scanner.scan_literal("+") {
                Builtin::Add
            } else if self.scanner.scan_literal("-") {
                Builtin::Subtract
            } else {
                return Ok(left);
            };
            let right = self.parse_multiplication()?;
            left = Expression::builtin(builtin, vec![left, right]);
        }
    }

    fn parse_multiplication(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_power()?;
        loop {
            let builtin = if self.scanner.scan_literal("*") {
                Builtin::Multiply
            } else if self.scanner.scan_literal("/") {
                Builtin::Divide
            } else {
                return Ok(left);
            };
            let right = self.parse_power()?;
            left = Expression::builtin(builtin, vec![left, right]);
        }
    }

    fn parse_power(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_functional()?;
        while self.scanner.scan_literal("**") {
            let right = self.parse_functional()?;
            left = Expression::builtin(Builtin::RaiseToPower, vec![left, right]);
        }
        Ok(left)
    }

    fn parse_functional(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_simple()?;
        loop {
            let path = left.key_path_text().map(str::to_owned);

            if let Some(path) = &path {
                if self.scan_selector_colon() {
                    let mut selector = format!("{path}:");
                    while let Some(part) = self.scan_selector_part() {
                        selector.push_str(&part);
                        selector.push(':');
                    }
                    left = Expression::key_path(selector);
                    continue;
                }
            }

            if self.scanner.scan_literal("(") {
                let Some(name) = path else {
                    return Err(ParseError::InvalidFunction { at: self.at() });
                };
                let arguments = self.parse_list(")", "function call")?;
                left = self.call(name, arguments)?;
            } else if self.scanner.scan_literal("[") {
                left = if self.scanner.scan_keyword("FIRST") {
                    Expression::builtin(Builtin::IndexFirst, vec![left])
                } else if self.scanner.scan_keyword("LAST") {
                    Expression::builtin(Builtin::IndexLast, vec![left])
                } else if self.scanner.scan_keyword("SIZE") {
                    Expression::builtin(Builtin::Count, vec![left])
                } else {
                    let index = self.parse_expression()?;
                    Expression::builtin(Builtin::Index, vec![left, index])
                };
                self.expect("]", "index")?;
            } else if self.scanner.scan_literal(".") {
                let Some(path) = path else {
                    return Err(ParseError::InvalidKeyPath { at: self.at() });
                };
                let right = self.parse_simple()?;
                let Some(rest) = right.key_path_text() else {
                    return Err(ParseError::InvalidKeyPath { at: self.at() });
                };
                left = Expression::key_path(format!("{path}.{rest}"));
            } else {
                return Ok(left);
            }
        }
    }

    /// A `:` that ends a selector part (not the start of `:=`).
    fn scan_selector_colon(&mut self) -> bool {
        let mark = self.scanner.location();
        if !self.scanner.scan_literal(":") {
            return false;
        }
        if self.scanner.peek() == Some('=') {
            self.scanner.set_location(mark);
            return false;
        }
        true
    }

    /// Further parts of a multi-part selector, as in `raise:toPower:`.
    fn scan_selector_part(&mut self) -> Option<String> {
        let mark = self.scanner.location();
        if let Some(part) = self.scanner.scan_characters(charset::is_identifier) {
            if self.scan_selector_colon() {
                return Some(part);
            }
        }
        self.scanner.set_location(mark);
        None
    }

    fn call(&self, name: String, arguments: Vec<Expression>) -> ParseResult<Expression> {
        let custom = if self.scanner.case_sensitive() {
            name == CUSTOM_FUNCTION
        } else {
            name.eq_ignore_ascii_case(CUSTOM_FUNCTION)
        };
        if !custom {
            trace!("call {name} with {} argument(s)", arguments.len());
            return Expression::function(&name, arguments)
                .map_err(|_| ParseError::UnknownFunction { name, at: self.at() });
        }

        // FUNCTION(operand, 'selector', arguments...)
        let mut parts = arguments.into_iter();
        let (Some(operand), Some(Expression::Constant(Value::String(selector)))) = (parts.next(), parts.next()) else {
            return Err(ParseError::InvalidFunction { at: self.at() });
        };
        Ok(Expression::custom_function(operand, selector, parts.collect()))
    }

    /// Comma-separated expressions up to `close`; the opener is already consumed.
    fn parse_list(&mut self, close: &'static str, construct: &'static str) -> ParseResult<Vec<Expression>> {
        let mut items = Vec::new();
        if self.scanner.scan_literal(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression()?);
            if !self.scanner.scan_literal(",") {
                self.expect(close, construct)?;
                return Ok(items);
            }
        }
    }

    fn parse_simple(&mut self) -> ParseResult<Expression> {
        if let Some(number) = self.scan_numeric_literal() {
            return Ok(Expression::Constant(number));
        }
        if self.scanner.scan_literal("-") {
            let operand = self.parse_expression()?;
            return Ok(match operand {
                Expression::Constant(Value::Int(n)) if n != i64::MIN => Expression::Constant(Value::Int(-n)),
                Expression::Constant(Value::Float(x)) => Expression::Constant(Value::Float(-x)),
                operand => Expression::builtin(Builtin::ChangeSign, vec![operand]),
            });
        }
        if self.scanner.scan_literal("(") {
            let inner = self.parse_expression()?;
            self.expect(")", "expression")?;
            return Ok(inner);
        }
        if self.scanner.scan_literal("{") {
            let items = self.parse_list("}", "aggregate")?;
            return Ok(Expression::aggregate(items));
        }
        if let Some(constant) = self.scan_reserved_constant() {
            return Ok(constant);
        }
        if self.scanner.scan_literal("$") {
            let name = self.scan_identifier()?;
            return Ok(Expression::Variable(name));
        }
        if let Some(argument) = self.parse_placeholder()? {
            return Ok(argument);
        }
        if let Some(string) = self.parse_quoted()? {
            return Ok(string);
        }
        if self.scanner.scan_literal("@") {
            let name = self.scan_identifier()?;
            return Ok(Expression::key_path(format!("@{name}")));
        }

        // `#` escapes identifiers that would otherwise read as keywords.
        self.scanner.scan_literal("#");
        let name = self.scan_identifier()?;
        Ok(Expression::key_path(name))
    }

    fn scan_identifier(&mut self) -> ParseResult<String> {
        self.scanner
            .scan_characters(charset::is_identifier)
            .ok_or_else(|| ParseError::MissingIdentifier { at: self.at() })
    }

    /// Integral text becomes `Int`, anything else `Float`.
    fn scan_numeric_literal(&mut self) -> Option<Value> {
        self.scanner.skip_ignored();
        let start = self.scanner.location();
        let Number::Float(x) = self.scanner.scan_number(NumberKind::Float)? else {
            return None;
        };
        let text = self.scanner.slice(start, self.scanner.location());
        Some(text.parse::<i64>().map(Value::Int).unwrap_or(Value::Float(x)))
    }

    fn scan_reserved_constant(&mut self) -> Option<Expression> {
        let scanner = &mut self.scanner;
        if scanner.scan_keyword("NULL") || scanner.scan_keyword("NIL") {
            Some(Expression::Constant(Value::Null))
        } else if scanner.scan_keyword("TRUE") || scanner.scan_keyword("YES") {
            Some(Expression::Constant(Value::Bool(true)))
        } else if scanner.scan_keyword("FALSE") || scanner.scan_keyword("NO") {
            Some(Expression::Constant(Value::Bool(false)))
        } else if scanner.scan_keyword("SELF") {
            Some(Expression::SelfReference)
        } else {
            None
        }
    }

    /// `%@`, `%K` and the other printf-style placeholders, bound positionally
    /// to the caller's argument list.
    fn parse_placeholder(&mut self) -> ParseResult<Option<Expression>> {
        let mark = self.scanner.location();
        if !self.scanner.scan_literal("%") {
            return Ok(None);
        }

        let placeholder = match self.scanner.peek() {
            Some('K') => {
                self.scanner.advance();
                return match self.next_argument("K")? {
                    Value::String(path) => Ok(Some(Expression::key_path(path))),
                    _ => Err(ParseError::InvalidArgument { at: self.at() }),
                };
            }
            Some(
                c @ ('@' | 'c' | 'C' | 'd' | 'D' | 'i' | 'o' | 'O' | 'u' | 'U' | 'x' | 'X' | 'e' | 'E' | 'f' | 'g'
                | 'G'),
            ) => {
                self.scanner.advance();
                c.to_string()
            }
            Some(c @ ('h' | 'q')) => {
                let lengths = if c == 'h' { "iu" } else { "iuxX" };
                self.scanner.advance();
                match self.scanner.peek() {
                    Some(n) if lengths.contains(n) => {
                        self.scanner.advance();
                        format!("{c}{n}")
                    }
                    _ => {
                        self.scanner.set_location(mark);
                        return Ok(None);
                    }
                }
            }
            _ => {
                self.scanner.set_location(mark);
                return Ok(None);
            }
        };

        let value = self.next_argument(&placeholder)?;
        Ok(Some(Expression::Constant(value)))
    }

    fn next_argument(&mut self, placeholder: &str) -> ParseResult<Value> {
        let value = self
            .arguments
            .get(self.next_argument)
            .cloned()
            .ok_or_else(|| ParseError::MissingArgument { placeholder: placeholder.to_string(), at: self.at() })?;
        self.next_argument += 1;
        Ok(value)
    }

    fn parse_quoted(&mut self) -> ParseResult<Option<Expression>> {
        for (quote, kind) in [("\"", "double-quoted string"), ("'", "single-quoted string")] {
            if !self.scanner.scan_literal(quote) {
                continue;
            }
            let skip = self.scanner.set_skip(None);
            let body = self.scanner.scan_up_to_literal(quote).unwrap_or_default();
            let closed = self.scanner.scan_literal(quote);
            self.scanner.set_skip(skip);
            if !closed {
                return Err(ParseError::InvalidLiteral { kind, at: self.at() });
            }
            return Ok(Some(Expression::constant(body)));
        }
        Ok(None)
    }
}
