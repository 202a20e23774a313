//! Model grammar: CSS-like rulesets of specifier predicates and declarations.
//!
//! ```text
//! model       := ruleset*
//! ruleset     := specifier (',' specifier)* '{' body '}'
//! body        := ( declaration (';' ...)? | ruleset )*
//! declaration := property-key ':' expression
//! ```
//!
//! Every specifier of a ruleset is paired with every declaration of its body,
//! specifier-major. A nested ruleset inherits its parent's specifiers: each
//! parent and child specifier pair is joined as `parent AND child`.

use log::{debug, trace};

use super::charset::{self, is_skipped};
use super::expression::Parser;
use crate::engine::Rule;
use crate::error::{ParseError, ParseResult};
use crate::expr::Expression;
use crate::predicate::Predicate;

impl<'a> Parser<'a> {
    /// Parse every ruleset in the text. Anything left over is an error that
    /// names the line the parser got to.
    pub fn parse_model(&mut self) -> ParseResult<Vec<Rule>> {
        self.track_lines = true;
        let mut rules = Vec::new();
        loop {
            let mark = self.scanner.location();
            match self.parse_ruleset(&[]) {
                Ok(found) => rules.extend(found),
                Err(err) => {
                    trace!("no further ruleset: {err}");
                    self.scanner.set_location(mark);
                    break;
                }
            }
        }

        if !self.scanner.at_end() {
            return Err(ParseError::Unparsed { line: self.scanner.line() });
        }
        debug!("parsed {} rule(s)", rules.len());
        Ok(rules)
    }

    fn parse_ruleset(&mut self, parents: &[String]) -> ParseResult<Vec<Rule>> {
        let own = self.parse_specifier_formats().ok_or_else(|| ParseError::ExpectedSpecifier { at: self.at() })?;
        let specifiers: Vec<String> = if parents.is_empty() {
            own
        } else {
            parents.iter().flat_map(|parent| own.iter().map(move |child| format!("{parent} AND {child}"))).collect()
        };

        self.expect("{", "ruleset")?;

        let mut declarations = Vec::new();
        let mut nested = Vec::new();
        loop {
            let mark = self.scanner.location();
            match self.parse_declaration() {
                Ok(declaration) => {
                    declarations.push(declaration);
                    if !self.scanner.scan_literal(";") {
                        break;
                    }
                }
                Err(_) => {
                    self.scanner.set_location(mark);
                    match self.parse_ruleset(&specifiers) {
                        Ok(rules) => nested.extend(rules),
                        Err(err) => {
                            trace!("end of ruleset body: {err}");
                            self.scanner.set_location(mark);
                            break;
                        }
                    }
                }
            }
        }

        self.expect("}", "ruleset")?;

        let mut rules = Vec::with_capacity(specifiers.len() * declarations.len() + nested.len());
        for specifier in &specifiers {
            let predicate = self.reparse_specifier(specifier)?;
            for (key, value) in &declarations {
                rules.push(Rule::new(predicate.clone(), key.clone(), value.clone())?);
            }
        }
        rules.extend(nested);
        Ok(rules)
    }

    /// Source text of each comma-separated specifier predicate.
    ///
    /// All-or-nothing: if any specifier fails to parse the cursor goes back
    /// to where it started.
    fn parse_specifier_formats(&mut self) -> Option<Vec<String>> {
        let start = self.scanner.location();
        let mut formats = Vec::new();
        loop {
            let mark = self.scanner.location();
            if let Err(err) = self.parse_predicate() {
                trace!("not a specifier: {err}");
                self.scanner.set_location(start);
                return None;
            }
            let text = self.scanner.slice(mark, self.scanner.location());
            formats.push(text.trim_matches(is_skipped).to_string());
            if !self.scanner.scan_literal(",") {
                return Some(formats);
            }
        }
    }

    fn parse_declaration(&mut self) -> ParseResult<(String, Expression)> {
        let key = self
            .scanner
            .scan_characters(charset::is_property_key)
            .ok_or_else(|| ParseError::ExpectedPropertyKey { at: self.at() })?;
        self.expect(":", "declaration")?;
        let value = self.parse_expression()?;
        Ok((key, value))
    }

    fn reparse_specifier(&self, specifier: &str) -> ParseResult<Predicate> {
        let mut parser = Parser::new(specifier, &[], &self.options());
        let predicate = parser.parse_predicate()?;
        parser.expect_end()?;
        Ok(predicate)
    }
}
