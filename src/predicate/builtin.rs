//! Built-in leaf predicates over individual request attributes.
//!
//! Each predicate is constructed from already-parsed configuration values;
//! pattern compilation happens once at route-construction time, never on the
//! match path.

use super::Predicate;
use crate::error::PredicateError;
use crate::exchange::Exchange;
use chrono::{DateTime, Utc};
use http::header::HeaderName;
use http::Method;
use regex::Regex;

/// Matches the request path against a segment pattern.
///
/// Pattern segments are literals, `{name}` variables matching any single
/// non-empty segment, or a trailing `/**` matching any remainder (including
/// none). Trailing slashes are not significant.
#[derive(Debug, Clone)]
pub struct PathPredicate {
    pattern: String,
    segments: Vec<PatternSegment>,
    catch_all: bool,
}

#[derive(Debug, Clone)]
enum PatternSegment {
    Literal(String),
    Variable,
}

impl PathPredicate {
    pub fn new(pattern: &str) -> Result<Self, PredicateError> {
        if !pattern.starts_with('/') {
            return Err(PredicateError::MalformedInput(format!(
                "path pattern must start with '/': {pattern}"
            )));
        }
        let raw: Vec<&str> = split_segments(pattern);
        let mut segments = Vec::with_capacity(raw.len());
        let mut catch_all = false;
        for (position, segment) in raw.iter().enumerate() {
            if *segment == "**" {
                if position + 1 != raw.len() {
                    return Err(PredicateError::MalformedInput(format!(
                        "'**' is only allowed as the final segment: {pattern}"
                    )));
                }
                catch_all = true;
            } else if segment.starts_with('{') && segment.ends_with('}') {
                segments.push(PatternSegment::Variable);
            } else {
                segments.push(PatternSegment::Literal((*segment).to_string()));
            }
        }
        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            catch_all,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Predicate for PathPredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        let path_segments = split_segments(exchange.path());
        if self.catch_all {
            if path_segments.len() < self.segments.len() {
                return Ok(false);
            }
        } else if path_segments.len() != self.segments.len() {
            return Ok(false);
        }
        let matched = self
            .segments
            .iter()
            .zip(path_segments.iter())
            .all(|(pattern, segment)| match pattern {
                PatternSegment::Literal(literal) => literal == segment,
                PatternSegment::Variable => !segment.is_empty(),
            });
        Ok(matched)
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Matches the request host, case-insensitively. A leading `*.` matches any
/// subdomain but not the apex itself.
#[derive(Debug, Clone)]
pub struct HostPredicate {
    pattern: String,
    wildcard: bool,
}

impl HostPredicate {
    pub fn new(pattern: &str) -> Self {
        let lowered = pattern.to_ascii_lowercase();
        match lowered.strip_prefix("*.") {
            Some(suffix) => Self {
                pattern: suffix.to_string(),
                wildcard: true,
            },
            None => Self {
                pattern: lowered,
                wildcard: false,
            },
        }
    }
}

impl Predicate for HostPredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        let Some(host) = exchange.host() else {
            return Ok(false);
        };
        if self.wildcard {
            Ok(host
                .strip_suffix(&self.pattern)
                .is_some_and(|prefix| prefix.ends_with('.') && prefix.len() > 1))
        } else {
            Ok(host == self.pattern)
        }
    }
}

/// Matches when the request method is one of the configured methods.
#[derive(Debug, Clone)]
pub struct MethodPredicate {
    methods: Vec<Method>,
}

impl MethodPredicate {
    pub fn new(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
        }
    }
}

impl Predicate for MethodPredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        Ok(self.methods.contains(exchange.method()))
    }
}

/// Matches when a header is present and, if a pattern is configured, any of
/// its values matches the pattern.
#[derive(Debug, Clone)]
pub struct HeaderPredicate {
    name: HeaderName,
    pattern: Option<Regex>,
}

impl HeaderPredicate {
    pub fn new(name: &str, pattern: Option<&str>) -> Result<Self, PredicateError> {
        let name = HeaderName::try_from(name)
            .map_err(|_| PredicateError::MalformedInput(format!("invalid header name: {name}")))?;
        let pattern = pattern.map(Regex::new).transpose()?;
        Ok(Self { name, pattern })
    }
}

impl Predicate for HeaderPredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        for value in exchange.request_headers().get_all(&self.name) {
            let value = value.to_str().map_err(|_| {
                PredicateError::MalformedInput(format!(
                    "header `{}` is not valid UTF-8",
                    self.name
                ))
            })?;
            match &self.pattern {
                Some(pattern) => {
                    if pattern.is_match(value) {
                        return Ok(true);
                    }
                }
                None => return Ok(true),
            }
        }
        Ok(false)
    }
}

/// Matches when a query parameter is present and, if a pattern is
/// configured, its decoded value matches the pattern.
#[derive(Debug, Clone)]
pub struct QueryPredicate {
    name: String,
    pattern: Option<Regex>,
}

impl QueryPredicate {
    pub fn new(name: &str, pattern: Option<&str>) -> Result<Self, PredicateError> {
        Ok(Self {
            name: name.to_string(),
            pattern: pattern.map(Regex::new).transpose()?,
        })
    }
}

impl Predicate for QueryPredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        match exchange.query_param(&self.name) {
            Some(value) => match &self.pattern {
                Some(pattern) => Ok(pattern.is_match(&value)),
                None => Ok(true),
            },
            None => Ok(false),
        }
    }
}

/// Matches when a cookie is present and its value matches the pattern.
#[derive(Debug, Clone)]
pub struct CookiePredicate {
    name: String,
    pattern: Regex,
}

impl CookiePredicate {
    pub fn new(name: &str, pattern: &str) -> Result<Self, PredicateError> {
        Ok(Self {
            name: name.to_string(),
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Predicate for CookiePredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        Ok(exchange
            .cookie(&self.name)
            .is_some_and(|value| self.pattern.is_match(&value)))
    }
}

/// Matches requests received strictly after the configured instant.
#[derive(Debug, Clone)]
pub struct AfterPredicate {
    instant: DateTime<Utc>,
}

impl AfterPredicate {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Predicate for AfterPredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        Ok(exchange.received_at() > self.instant)
    }
}

/// Matches requests received strictly before the configured instant.
#[derive(Debug, Clone)]
pub struct BeforePredicate {
    instant: DateTime<Utc>,
}

impl BeforePredicate {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Predicate for BeforePredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        Ok(exchange.received_at() < self.instant)
    }
}

/// Matches requests received strictly between two instants.
#[derive(Debug, Clone)]
pub struct BetweenPredicate {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl BetweenPredicate {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

impl Predicate for BetweenPredicate {
    fn apply(&self, exchange: &Exchange) -> Result<bool, PredicateError> {
        let received = exchange.received_at();
        Ok(received > self.start && received < self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use http::{header, HeaderMap};
    use rstest::rstest;

    fn exchange_for(uri: &str) -> Exchange {
        Exchange::new(Method::GET, uri.parse().expect("valid uri"), HeaderMap::new())
    }

    #[rstest]
    #[case("/api/**", "/api/v1/users", true)]
    #[case("/api/**", "/api", true)]
    #[case("/api/**", "/admin", false)]
    #[case("/users/{id}", "/users/42", true)]
    #[case("/users/{id}", "/users", false)]
    #[case("/users/{id}", "/users/42/posts", false)]
    #[case("/health", "/health", true)]
    #[case("/health", "/health/", true)]
    #[case("/health", "/healthz", false)]
    fn path_patterns(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
        let predicate = PathPredicate::new(pattern).expect("valid pattern");
        let exchange = exchange_for(path);
        assert_eq!(predicate.apply(&exchange).expect("no error"), expected);
    }

    #[test]
    fn path_pattern_rejects_interior_catch_all() {
        assert!(PathPredicate::new("/api/**/users").is_err());
        assert!(PathPredicate::new("no-slash").is_err());
    }

    #[rstest]
    #[case("*.example.org", "api.example.org", true)]
    #[case("*.example.org", "a.b.example.org", true)]
    #[case("*.example.org", "example.org", false)]
    #[case("example.org", "example.org", true)]
    #[case("example.org", "EXAMPLE.ORG", true)]
    #[case("example.org", "other.org", false)]
    fn host_patterns(#[case] pattern: &str, #[case] host: &str, #[case] expected: bool) {
        let predicate = HostPredicate::new(pattern);
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, host.parse().expect("valid header"));
        let exchange = Exchange::new(Method::GET, "/".parse().expect("valid uri"), headers);
        assert_eq!(predicate.apply(&exchange).expect("no error"), expected);
    }

    #[test]
    fn method_predicate_matches_configured_methods() {
        let predicate = MethodPredicate::new([Method::GET, Method::HEAD]);
        assert!(predicate.apply(&exchange_for("/")).expect("no error"));

        let post = Exchange::new(Method::POST, "/".parse().expect("valid uri"), HeaderMap::new());
        assert!(!predicate.apply(&post).expect("no error"));
    }

    #[test]
    fn header_predicate_matches_value_against_regex() {
        let predicate =
            HeaderPredicate::new("x-env", Some("^(staging|prod)$")).expect("valid pattern");

        let mut headers = HeaderMap::new();
        headers.insert("x-env", "prod".parse().expect("valid header"));
        let exchange = Exchange::new(Method::GET, "/".parse().expect("valid uri"), headers);
        assert!(predicate.apply(&exchange).expect("no error"));

        let mut headers = HeaderMap::new();
        headers.insert("x-env", "dev".parse().expect("valid header"));
        let exchange = Exchange::new(Method::GET, "/".parse().expect("valid uri"), headers);
        assert!(!predicate.apply(&exchange).expect("no error"));
    }

    #[test]
    fn header_predicate_without_pattern_checks_presence() {
        let predicate = HeaderPredicate::new("authorization", None).expect("valid name");
        assert!(!predicate.apply(&exchange_for("/")).expect("no error"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer x".parse().expect("valid header"));
        let exchange = Exchange::new(Method::GET, "/".parse().expect("valid uri"), headers);
        assert!(predicate.apply(&exchange).expect("no error"));
    }

    #[test]
    fn header_predicate_surfaces_malformed_values_as_errors() {
        let predicate = HeaderPredicate::new("x-blob", Some(".*")).expect("valid pattern");
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-blob",
            http::HeaderValue::from_bytes(&[0xff, 0xfe]).expect("opaque bytes are legal"),
        );
        let exchange = Exchange::new(Method::GET, "/".parse().expect("valid uri"), headers);
        assert!(matches!(
            predicate.apply(&exchange),
            Err(PredicateError::MalformedInput(_))
        ));
    }

    #[test]
    fn query_predicate_matches_decoded_values() {
        let predicate = QueryPredicate::new("tier", Some("^gold$")).expect("valid pattern");
        assert!(predicate
            .apply(&exchange_for("/plans?tier=gold"))
            .expect("no error"));
        assert!(!predicate
            .apply(&exchange_for("/plans?tier=silver"))
            .expect("no error"));
        assert!(!predicate.apply(&exchange_for("/plans")).expect("no error"));
    }

    #[test]
    fn cookie_predicate_matches_named_cookie() {
        let predicate = CookiePredicate::new("session", "^[a-f0-9]+$").expect("valid pattern");
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "session=abc123".parse().expect("valid header"));
        let exchange = Exchange::new(Method::GET, "/".parse().expect("valid uri"), headers);
        assert!(predicate.apply(&exchange).expect("no error"));
    }

    #[test]
    fn datetime_predicates_compare_against_received_at() {
        let exchange = exchange_for("/");
        let past = exchange.received_at() - Duration::hours(1);
        let future = exchange.received_at() + Duration::hours(1);

        assert!(AfterPredicate::new(past).apply(&exchange).expect("no error"));
        assert!(!AfterPredicate::new(future).apply(&exchange).expect("no error"));
        assert!(BeforePredicate::new(future).apply(&exchange).expect("no error"));
        assert!(BetweenPredicate::new(past, future).apply(&exchange).expect("no error"));
        assert!(!BetweenPredicate::new(future, future + Duration::hours(1))
            .apply(&exchange)
            .expect("no error"));
    }

    #[test]
    fn invalid_regex_is_rejected_at_construction() {
        assert!(HeaderPredicate::new("x-env", Some("(")).is_err());
        assert!(QueryPredicate::new("tier", Some("[")).is_err());
        assert!(CookiePredicate::new("session", "(").is_err());
    }
}
