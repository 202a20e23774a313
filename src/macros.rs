#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build a [`Rule`](crate::Rule) from format text.
///
/// ```
/// let rule = kevi::rule! {
///     when: "user.age >= 18",
///     key: "audience",
///     value: "'adult'",
///     weight: 1,
/// }
/// .unwrap();
/// assert_eq!(rule.priority(), 1002);
/// ```
#[macro_export]
macro_rules! rule {
    (
        when: $specifier:expr,
        key: $key:expr,
        value: $value:expr
        $(, weight: $weight:expr)?
        $(,)?
    ) => {{
        (|| -> ::std::result::Result<$crate::Rule, $crate::Error> {
            let specifier = $crate::predicate($specifier, &[])?;
            let value = $crate::expression($value, &[])?;
            Ok($crate::Rule::with_weight(specifier, $key, value, { 0 $(+ $weight)? })?)
        })()
    }};
}
