//! Path pattern compilation and matching.
//!
//! A pattern such as `/users/:id/posts/:postId` is made of literal text and named parameters.
//! A parameter starts with `:` followed by an identifier (`[A-Za-z_][A-Za-z0-9_]*`) and matches
//! one or more characters other than `/`. Everything else is literal, including characters that
//! carry meaning in regular expressions. Matching is anchored at both ends of the path.
//!
//! Captured values are returned exactly as they appear in the path, they are **not** percent
//! decoded. Decoding is left to the caller.

use crate::error::RouteError;
use crate::request::PathParams;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    param_names: Vec<Arc<str>>,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// patterns without parameters are compared verbatim
    Static,
    Regex(Regex),
}

impl PathPattern {
    /// Compiles `pattern` into a matcher.
    ///
    /// Fails with [`RouteError::InvalidPattern`] if the pattern does not start with `/`, declares
    /// the same parameter twice, or cannot be turned into a recognizer.
    pub fn compile(pattern: impl Into<String>) -> Result<Self, RouteError> {
        let raw = pattern.into();
        if !raw.starts_with('/') {
            return Err(RouteError::invalid_pattern(&raw, "pattern must start with '/'"));
        }

        let bytes = raw.as_bytes();
        let mut expr = String::with_capacity(raw.len() + 16);
        let mut param_names: Vec<Arc<str>> = Vec::new();
        let mut literal_start = 0;
        let mut i = 0;

        expr.push('^');
        while i < bytes.len() {
            if bytes[i] != b':' || !bytes.get(i + 1).is_some_and(|b| is_ident_start(*b)) {
                i += 1;
                continue;
            }

            let name_start = i + 1;
            let mut name_end = name_start + 1;
            while name_end < bytes.len() && is_ident_continue(bytes[name_end]) {
                name_end += 1;
            }

            let name = &raw[name_start..name_end];
            if param_names.iter().any(|existing| existing.as_ref() == name) {
                return Err(RouteError::invalid_pattern(&raw, format!("duplicate parameter ':{name}'")));
            }

            expr.push_str(&regex::escape(&raw[literal_start..i]));
            expr.push_str("([^/]+)");
            param_names.push(Arc::from(name));

            i = name_end;
            literal_start = name_end;
        }
        expr.push_str(&regex::escape(&raw[literal_start..]));
        expr.push('$');

        let matcher = if param_names.is_empty() {
            Matcher::Static
        } else {
            Matcher::Regex(Regex::new(&expr).map_err(|e| RouteError::invalid_pattern(&raw, e))?)
        };

        Ok(Self { raw, param_names, matcher })
    }

    /// Matches a concrete request path, returning the captured parameters on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        match &self.matcher {
            Matcher::Static => (self.raw == path).then(PathParams::empty),
            Matcher::Regex(regex) => {
                let captures = regex.captures(path)?;
                let params = self
                    .param_names
                    .iter()
                    .zip(captures.iter().skip(1))
                    .filter_map(|(name, value)| value.map(|value| (Arc::clone(name), value.as_str().to_owned())))
                    .collect();
                Some(PathParams::new(params))
            }
        }
    }

    /// The pattern text this matcher was compiled from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parameter names in pattern order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.param_names.iter().map(AsRef::as_ref)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[inline]
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

#[inline]
fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::PathPattern;
    use crate::error::RouteError;

    fn compile(pattern: &str) -> PathPattern {
        PathPattern::compile(pattern).unwrap()
    }

    #[test]
    fn test_extract_params() {
        let pattern = compile("/users/:id/posts/:postId");
        let params = pattern.matches("/users/42/posts/7").unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("postId"), Some("7"));
        assert_eq!(params.get("post"), None);
        assert_eq!(pattern.param_names().collect::<Vec<_>>(), vec!["id", "postId"]);
    }

    #[test]
    fn test_structural_mismatch() {
        let pattern = compile("/users/:id/posts/:postId");

        assert!(pattern.matches("/users/42/posts").is_none());
        assert!(pattern.matches("/users/42/posts/7/comments").is_none());
        assert!(pattern.matches("/users/42/post/7").is_none());
        assert!(pattern.matches("/prefix/users/42/posts/7").is_none());
        assert!(pattern.matches("/users/42/posts/7/").is_none());
        assert!(pattern.matches("/users/4/2/posts/7").is_none());
    }

    #[test]
    fn test_empty_param_value() {
        let pattern = compile("/users/:id/posts/:postId");
        assert!(pattern.matches("/users//posts/7").is_none());
        assert!(pattern.matches("/users/42/posts/").is_none());
    }

    #[test]
    fn test_static_pattern() {
        let pattern = compile("/health");

        let params = pattern.matches("/health").unwrap();
        assert!(params.is_empty());

        assert!(pattern.matches("/health/").is_none());
        assert!(pattern.matches("/healthz").is_none());
        assert!(pattern.matches("/").is_none());
    }

    #[test]
    fn test_literal_metacharacters_are_escaped() {
        let pattern = compile("/files/:name.txt");
        assert_eq!(pattern.matches("/files/report.txt").unwrap().get("name"), Some("report"));
        assert!(pattern.matches("/files/reportxtxt").is_none());

        let pattern = compile("/a.b/(c)+/:id");
        assert_eq!(pattern.matches("/a.b/(c)+/1").unwrap().get("id"), Some("1"));
        assert!(pattern.matches("/axb/(c)+/1").is_none());
        assert!(pattern.matches("/a.b/cc/1").is_none());
    }

    #[test]
    fn test_param_inside_segment() {
        let pattern = compile("/v:version/items");
        assert_eq!(pattern.matches("/v2/items").unwrap().get("version"), Some("2"));
        assert!(pattern.matches("/v/items").is_none());
    }

    #[test]
    fn test_colon_without_identifier_is_literal() {
        let pattern = compile("/time/12:30/:zone");
        let params = pattern.matches("/time/12:30/utc").unwrap();

        assert_eq!(params.len(), 1);
        assert_eq!(params.get("zone"), Some("utc"));
        assert!(pattern.matches("/time/12:31/utc").is_none());

        let pattern = compile("/a/:/b");
        assert!(pattern.matches("/a/:/b").is_some());
    }

    #[test]
    fn test_values_are_not_decoded() {
        let pattern = compile("/search/:term");
        assert_eq!(pattern.matches("/search/hello%20world").unwrap().get("term"), Some("hello%20world"));
        assert_eq!(pattern.matches("/search/caf%C3%A9").unwrap().get("term"), Some("caf%C3%A9"));
    }

    #[test]
    fn test_generated_values_round_trip() {
        let pattern = compile("/:a/x/:b_1/:_c");
        let values = ["1", "abc", "with space", "ünïcode", "a.b-c~", "%2F", "::"];

        for a in values {
            for b in values {
                for c in values {
                    let path = format!("/{a}/x/{b}/{c}");
                    let params = pattern.matches(&path).unwrap();
                    assert_eq!(params.len(), 3);
                    assert_eq!(params.get("a"), Some(a));
                    assert_eq!(params.get("b_1"), Some(b));
                    assert_eq!(params.get("_c"), Some(c));
                }
            }
        }
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(PathPattern::compile("users/:id"), Err(RouteError::InvalidPattern { .. })));
        assert!(matches!(PathPattern::compile(""), Err(RouteError::InvalidPattern { .. })));

        let error = PathPattern::compile("/users/:id/friends/:id").unwrap_err();
        assert!(error.to_string().contains("duplicate parameter ':id'"));
    }

    #[test]
    fn test_matching_is_repeatable() {
        let pattern = compile("/users/:id");
        let first = pattern.matches("/users/9").unwrap();
        for _ in 0..10 {
            assert_eq!(pattern.matches("/users/9").unwrap(), first);
        }
    }
}
