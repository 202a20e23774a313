//! Predicate grammar, layered on the expression grammar.
//!
//! ```text
//! predicate   := conjunction
//! conjunction := not ( (AND | && | OR | ||) not )*
//! not         := '(' predicate ')' | (NOT | '!') not
//!              | TRUEPREDICATE | FALSEPREDICATE | comparison
//! comparison  := modifier? expression operator options? expression
//! ```

use log::trace;

use super::expression::Parser;
use crate::error::{ParseError, ParseResult};
use crate::predicate::{Comparison, ComparisonModifier, ComparisonOperator, ComparisonOptions, CompoundKind, Predicate};

/// Scanned in order; longer spellings come before their prefixes.
const OPERATORS: [(&str, ComparisonOperator); 17] = [
    ("<=", ComparisonOperator::LessThanOrEqual),
    ("=<", ComparisonOperator::LessThanOrEqual),
    (">=", ComparisonOperator::GreaterThanOrEqual),
    ("=>", ComparisonOperator::GreaterThanOrEqual),
    ("==", ComparisonOperator::EqualTo),
    ("!=", ComparisonOperator::NotEqualTo),
    ("<>", ComparisonOperator::NotEqualTo),
    ("<", ComparisonOperator::LessThan),
    (">", ComparisonOperator::GreaterThan),
    ("=", ComparisonOperator::EqualTo),
    ("MATCHES", ComparisonOperator::Matches),
    ("LIKE", ComparisonOperator::Like),
    ("BEGINSWITH", ComparisonOperator::BeginsWith),
    ("ENDSWITH", ComparisonOperator::EndsWith),
    ("IN", ComparisonOperator::In),
    ("CONTAINS", ComparisonOperator::Contains),
    ("BETWEEN", ComparisonOperator::Between),
];

impl<'a> Parser<'a> {
    pub fn parse_predicate(&mut self) -> ParseResult<Predicate> {
        let mut left = self.parse_not()?;
        while let Some(kind) = self.scan_conjunction() {
            let right = self.parse_not()?;
            left = Predicate::fold(kind, left, right);
        }
        Ok(left)
    }

    fn scan_conjunction(&mut self) -> Option<CompoundKind> {
        let scanner = &mut self.scanner;
        if scanner.scan_keyword("AND") || scanner.scan_keyword("&&") {
            Some(CompoundKind::And)
        } else if scanner.scan_keyword("OR") || scanner.scan_keyword("||") {
            Some(CompoundKind::Or)
        } else {
            None
        }
    }

    fn parse_not(&mut self) -> ParseResult<Predicate> {
        let mark = self.scanner.location();
        if self.scanner.scan_literal("(") {
            match self.parse_predicate().and_then(|p| self.expect(")", "predicate").map(|()| p)) {
                Ok(predicate) => return Ok(predicate),
                Err(err) => {
                    // `(a + b) > 1` opens with a parenthesized expression, not a predicate.
                    trace!("not a parenthesized predicate: {err}");
                    self.scanner.set_location(mark);
                    return self.parse_comparison().map_err(|_| err);
                }
            }
        }
        if self.scanner.scan_keyword("NOT") || self.scanner.scan_keyword("!") {
            return Ok(Predicate::not(self.parse_not()?));
        }
        if self.scanner.scan_keyword("TRUEPREDICATE") {
            return Ok(Predicate::Value(true));
        }
        if self.scanner.scan_keyword("FALSEPREDICATE") {
            return Ok(Predicate::Value(false));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Predicate> {
        let (modifier, negate) = self.scan_modifier();
        let left = self.parse_expression()?;
        let operator = self.scan_operator().ok_or_else(|| ParseError::InvalidOperator { at: self.at() })?;
        let options = self.scan_options();
        let right = self.parse_expression()?;

        let comparison = Predicate::Comparison(Comparison { left, right, modifier, operator, options });
        Ok(if negate { Predicate::not(comparison) } else { comparison })
    }

    /// `NONE` and `SOME` are the negated forms of `ANY` and `ALL`.
    fn scan_modifier(&mut self) -> (ComparisonModifier, bool) {
        if self.scanner.scan_keyword("ANY") {
            (ComparisonModifier::Any, false)
        } else if self.scanner.scan_keyword("ALL") {
            (ComparisonModifier::All, false)
        } else if self.scanner.scan_keyword("NONE") {
            (ComparisonModifier::Any, true)
        } else if self.scanner.scan_keyword("SOME") {
            (ComparisonModifier::All, true)
        } else {
            (ComparisonModifier::Direct, false)
        }
    }

    fn scan_operator(&mut self) -> Option<ComparisonOperator> {
        OPERATORS.iter().find(|(text, _)| self.scanner.scan_keyword(text)).map(|(_, operator)| *operator)
    }

    fn scan_options(&mut self) -> ComparisonOptions {
        if self.scanner.scan_literal("[cd]") {
            ComparisonOptions::CASE_INSENSITIVE | ComparisonOptions::DIACRITIC_INSENSITIVE
        } else if self.scanner.scan_literal("[c]") {
            ComparisonOptions::CASE_INSENSITIVE
        } else if self.scanner.scan_literal("[d]") {
            ComparisonOptions::DIACRITIC_INSENSITIVE
        } else {
            ComparisonOptions::empty()
        }
    }
}
