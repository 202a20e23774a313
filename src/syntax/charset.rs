//! Character classes the scanner and grammars work with.

/// A character predicate, used both as a scan set and as the skip set.
pub type CharClass = fn(char) -> bool;

/// Whitespace the grammars skip between tokens.
pub fn is_skipped(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' | ' ' | '\u{85}' | '\u{A0}')
}

/// Keypath components, variable names and function selectors.
pub fn is_identifier(c: char) -> bool {
    c == '_' || c == '$' || c.is_ascii_alphanumeric()
}

/// Declaration keys inside a model ruleset.
pub fn is_property_key(c: char) -> bool {
    c == '_' || c == '-' || c.is_ascii_alphanumeric()
}

/// A keyword followed by one of these is a prefix of a longer word.
pub fn continues_keyword(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_set_covers_unicode_spaces() {
        for c in ['\t', '\n', '\u{0B}', '\u{0C}', '\r', ' ', '\u{85}', '\u{A0}'] {
            assert!(is_skipped(c), "{c:?}");
        }
        assert!(!is_skipped('x'));
        assert!(!is_skipped('\u{2003}'));
    }

    #[test]
    fn identifiers_and_property_keys_differ_on_dollar_and_dash() {
        assert!(is_identifier('$'));
        assert!(!is_property_key('$'));
        assert!(is_property_key('-'));
        assert!(!is_identifier('-'));
        assert!(!is_identifier('é'));
    }
}
