//! Cursor over format text.
//!
//! The scanner knows nothing about the language. It offers a handful of
//! primitives that either consume input and return what they consumed, or
//! return `None`/`false` and leave the cursor where it was. Grammars build
//! backtracking on top of that by saving [`Scanner::location`] and restoring it
//! with [`Scanner::set_location`].
//!
//! ## Skipping
//!
//! Most primitives first move past characters in the skip set (whitespace by
//! default). Skip characters are never part of a scanned result.
//! [`Scanner::scan_up_to_literal`] is the exception: it starts capturing right
//! at the cursor, which is what quoted strings need.
//!
//! ## Lines
//!
//! The scanner counts the newlines it moves over. The count uses a high-water
//! mark so backtracking and re-scanning the same text never counts a newline
//! twice and the line number never decreases.

use log::trace;

use super::charset::{self, CharClass};

/// Numeric flavor requested from [`Scanner::scan_number`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Int,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    text: &'a str,
    /// Byte offset; always on a char boundary.
    location: usize,
    skip: Option<CharClass>,
    case_sensitive: bool,
    line: usize,
    high_water: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Scanner { text, location: 0, skip: Some(charset::is_skipped), case_sensitive: false, line: 1, high_water: 0 }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn location(&self) -> usize {
        self.location
    }

    /// Move the cursor. Out-of-range offsets clamp to the end of the text.
    pub fn set_location(&mut self, location: usize) {
        let mut location = location.min(self.text.len());
        while !self.text.is_char_boundary(location) {
            location -= 1;
        }
        self.move_to(location);
    }

    /// Unscanned remainder of the text.
    pub fn remaining(&self) -> &'a str {
        &self.text[self.location..]
    }

    /// Text between two earlier cursor positions.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        self.text.get(start..end).unwrap_or_default()
    }

    /// 1-based line of the furthest position scanned so far.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        self.case_sensitive = case_sensitive;
    }

    /// Replace the skip set, returning the previous one.
    pub fn set_skip(&mut self, skip: Option<CharClass>) -> Option<CharClass> {
        std::mem::replace(&mut self.skip, skip)
    }

    /// Next character, without skipping or consuming anything.
    pub fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Consume exactly one character.
    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.move_to(self.location + c.len_utf8());
        Some(c)
    }

    /// Move past any characters in the skip set.
    pub fn skip_ignored(&mut self) {
        let Some(skip) = self.skip else {
            return;
        };
        let rest = self.remaining();
        let skipped = rest.find(|c: char| !skip(c)).unwrap_or(rest.len());
        if skipped > 0 {
            self.move_to(self.location + skipped);
        }
    }

    /// True if nothing but skip characters remain. The cursor is not moved.
    pub fn at_end(&mut self) -> bool {
        let saved = self.location;
        self.skip_ignored();
        let at_end = self.location >= self.text.len();
        self.location = saved;
        at_end
    }

    /// Longest run of characters in `set`.
    pub fn scan_characters(&mut self, set: CharClass) -> Option<String> {
        self.scan_with_set(set, false)
    }

    /// Longest run of characters not in `set`.
    pub fn scan_up_to_characters(&mut self, set: CharClass) -> Option<String> {
        self.scan_with_set(set, true)
    }

    fn scan_with_set(&mut self, set: CharClass, stop_when: bool) -> Option<String> {
        if self.at_end() {
            return None;
        }
        self.skip_ignored();

        let skip = self.skip;
        let mut end = self.location;
        let mut result = String::new();
        for (idx, c) in self.remaining().char_indices() {
            if set(c) == stop_when {
                break;
            }
            if !skip.is_some_and(|skip| skip(c)) {
                result.push(c);
            }
            end = self.location + idx + c.len_utf8();
        }

        if result.is_empty() {
            return None;
        }
        self.move_to(end);
        Some(result)
    }

    /// Consume `literal` if the input continues with it.
    ///
    /// Comparison is case-insensitive unless the scanner is case-sensitive.
    pub fn scan_literal(&mut self, literal: &str) -> bool {
        self.skip_ignored();
        if self.location >= self.text.len() {
            return false;
        }
        match self.match_at(self.location, literal) {
            Some(len) => {
                trace!("scanned {literal:?} at {}", self.location);
                self.move_to(self.location + len);
                true
            }
            None => false,
        }
    }

    /// Consume `keyword` only if it is not the prefix of a longer word.
    ///
    /// Keywords that end in punctuation (`&&`, `<=`) have no boundary.
    pub fn scan_keyword(&mut self, keyword: &str) -> bool {
        let saved = self.location;
        if !self.scan_literal(keyword) {
            return false;
        }
        let needs_boundary = keyword.chars().last().is_some_and(charset::continues_keyword);
        if needs_boundary && self.peek().is_some_and(charset::continues_keyword) {
            self.location = saved;
            return false;
        }
        true
    }

    /// Everything from the cursor up to (not including) the next `literal`, or
    /// to the end of the text. Skip characters are not skipped here.
    pub fn scan_up_to_literal(&mut self, literal: &str) -> Option<&'a str> {
        let start = self.location;
        let mut end = self.text.len();
        for (idx, _) in self.remaining().char_indices() {
            if self.match_at(start + idx, literal).is_some() {
                end = start + idx;
                break;
            }
        }

        if end == start {
            return None;
        }
        self.move_to(end);
        Some(&self.text[start..end])
    }

    /// Longest prefix that parses as a number of the requested kind.
    ///
    /// Only digits, `.`, exponents and exponent signs are considered, and the
    /// first character must be a digit or `.`: signs are left to the grammar.
    /// `12abc` yields `12` and `1e3x` yields `1000`.
    pub fn scan_number(&mut self, kind: NumberKind) -> Option<Number> {
        self.skip_ignored();
        let rest = self.remaining();
        if !rest.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return None;
        }
        let mut best = None;
        for (idx, c) in rest.char_indices() {
            if !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
                break;
            }
            let candidate = &rest[..=idx];
            let parsed = match kind {
                NumberKind::Int => candidate.parse::<i64>().ok().map(Number::Int),
                NumberKind::Float => candidate.parse::<f64>().ok().map(Number::Float),
            };
            if let Some(number) = parsed {
                best = Some((idx + 1, number));
            }
        }

        let (len, number) = best?;
        self.move_to(self.location + len);
        Some(number)
    }

    fn match_at(&self, at: usize, literal: &str) -> Option<usize> {
        let mut chars = self.text[at..].char_indices();
        let mut len = 0;
        for expected in literal.chars() {
            let (idx, c) = chars.next()?;
            if !self.same_char(c, expected) {
                return None;
            }
            len = idx + c.len_utf8();
        }
        Some(len)
    }

    fn same_char(&self, a: char, b: char) -> bool {
        a == b || (!self.case_sensitive && a.to_lowercase().eq(b.to_lowercase()))
    }

    fn move_to(&mut self, location: usize) {
        let from = self.location.max(self.high_water);
        let to = location.max(self.high_water);
        if to > from {
            self.line += self.text[from..to].matches('\n').count();
            self.high_water = to;
        }
        self.location = location;
    }
}
