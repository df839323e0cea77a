//! Wildcard pattern compiler
//!
//! Match patterns use a deliberately small syntax: `*` matches any run of
//! characters (including none) and every other character is literal. The
//! compiled form is anchored at the start of the URL only, so a pattern
//! without `*` behaves as a prefix test.

use regex::{Regex, RegexBuilder};

/// Error for patterns that cannot be turned into a matcher.
#[derive(Debug, thiserror::Error)]
#[error("Invalid pattern {pattern:?}: {source}")]
pub struct PatternCompileError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Compiled, repeatedly testable form of a wildcard pattern.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    /// Test a full URL against the pattern.
    #[inline]
    pub fn test(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// The generated expression (for diagnostics).
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Translate a wildcard pattern into an anchored regular expression source.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for (i, literal) in pattern.split('*').enumerate() {
        if i > 0 {
            out.push_str(".*");
        }
        out.push_str(&regex::escape(literal));
    }
    out
}

/// Compile a wildcard pattern.
pub fn compile(pattern: &str) -> Result<Matcher, PatternCompileError> {
    let regex = RegexBuilder::new(&wildcard_to_regex(pattern))
        .dot_matches_new_line(true)
        .build()
        .map_err(|source| PatternCompileError {
            pattern: pattern.to_string(),
            source,
        })?;
    Ok(Matcher { regex })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wildcard_to_regex() {
        assert_eq!(wildcard_to_regex("abc"), "^abc");
        assert_eq!(wildcard_to_regex("*.medium.*"), r"^.*\.medium\..*");
        assert_eq!(wildcard_to_regex("a?b+(c)"), r"^a\?b\+\(c\)");
        assert_eq!(wildcard_to_regex(""), "^");
    }

    #[test]
    fn test_prefix_pattern() {
        let m = compile("https://example.com/").unwrap();
        assert!(m.test("https://example.com/"));
        assert!(m.test("https://example.com/path?q=1"));
        assert!(!m.test("http://example.com/"));
        assert!(!m.test("xhttps://example.com/"));
    }

    #[test]
    fn test_leading_wildcard() {
        let m = compile("*.medium.*").unwrap();
        assert!(m.test("https://foo.medium.com/article"));
        assert!(m.test("https://www.medium.com/"));
        assert!(!m.test("https://medium.com/article"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let m = compile("https://a.b/?x=[1]|(2)$").unwrap();
        assert!(m.test("https://a.b/?x=[1]|(2)$"));
        assert!(!m.test("https://aXb/?x=[1]|(2)$"));

        let q = compile("https://x/a?b").unwrap();
        assert!(q.test("https://x/a?b"));
        assert!(!q.test("https://x/b"));
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let m = compile("").unwrap();
        assert!(m.test(""));
        assert!(m.test("https://anything/"));
    }

    proptest! {
        #[test]
        fn literal_pattern_is_prefix_test(p in "[a-z:/.?+()\\[\\]$^|{}\\\\]{0,12}", url in "[a-z:/.?+()\\[\\]$^|{}\\\\]{0,16}") {
            let m = compile(&p).unwrap();
            prop_assert_eq!(m.test(&url), url.starts_with(&p));
            let joined = format!("{p}{url}");
            prop_assert!(m.test(&joined));
        }

        #[test]
        fn single_wildcard_law(s1 in "[a-c.?]{0,4}", s2 in "[a-c.?]{0,4}", url in "[a-c.?]{0,12}") {
            let m = compile(&format!("{s1}*{s2}")).unwrap();
            let expected = url.starts_with(&s1) && url[s1.len()..].contains(&s2);
            prop_assert_eq!(m.test(&url), expected);
        }
    }
}
