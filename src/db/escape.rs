//! String escaping for generated SQL and AGQL literals.

/// Remove AGQL backslash escapes from the body of a quoted literal.
///
/// `\'`, `\"`, `\\` and `\/` become the bare character; `\n`, `\r` and
/// `\t` become control characters. Unknown escapes keep the backslash.
pub fn unescape_literal(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some(q @ ('\'' | '"' | '\\' | '/')) => result.push(q),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

/// Quote a string as an SQL literal: single quotes, embedded quotes doubled.
pub fn quote_sql_literal(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('\'');
    for c in s.chars() {
        if c == '\'' {
            result.push('\'');
        }
        result.push(c);
    }
    result.push('\'');
    result
}

/// Escape regex metacharacters so `s` matches literally.
#[inline]
pub fn escape_regex(s: &str) -> String {
    regex::escape(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "plain")]
    #[case(r"it\'s", "it's")]
    #[case(r#"say \"hi\""#, r#"say "hi""#)]
    #[case(r"a\\b", r"a\b")]
    #[case(r"a\/b", "a/b")]
    #[case(r"tab\there", "tab\there")]
    #[case(r"\d+", r"\d+")]
    #[case("trailing\\", "trailing\\")]
    fn test_unescape_literal(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(unescape_literal(input), expected);
    }

    #[rstest]
    #[case("abc", "'abc'")]
    #[case("it's", "'it''s'")]
    #[case("", "''")]
    #[case(r"back\slash", r"'back\slash'")]
    fn test_quote_sql_literal(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(quote_sql_literal(input), expected);
    }

    #[rstest]
    fn test_escape_regex() {
        assert_eq!(escape_regex("a.trs"), r"a\.trs");
    }
}
