//! Error taxonomy for the gateway core.
//!
//! Matching and pipeline defects are kept distinct from upstream failures so
//! a host can answer "gateway misconfigured" vs "upstream is down" from the
//! error alone.

use thiserror::Error;

/// Boxed error type used at collaborator boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single predicate evaluation.
///
/// The route matcher recovers from these locally: the route is treated as a
/// non-match, the failure is reported to the observer, and scanning
/// continues with the next route.
#[derive(Error, Debug)]
pub enum PredicateError {
    #[error("invalid match pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("malformed request attribute: {0}")]
    MalformedInput(String),

    #[error("predicate lookup failed: {0}")]
    LookupFailed(String),
}

/// Failure while caching, replaying, or transforming a body.
#[derive(Error, Debug)]
pub enum BodyError {
    /// The cached body was read before anything was written to the sink.
    #[error("the body is not set: did handling complete with success, or is a custom write handler configured?")]
    NotSet,

    #[error("cached body too large: buffered {buffered} bytes exceeds capacity of {capacity} bytes")]
    CapacityExceeded { buffered: usize, capacity: usize },

    #[error("body caching cancelled before the stream completed")]
    Cancelled,

    #[error("body stream failed: {0}")]
    Stream(String),

    #[error("body transform failed: {0}")]
    Transform(String),
}

/// Failure of a matching or filter-chain pass.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration defect: the chain ran out of filters without a terminal
    /// dispatch or a short-circuit response.
    #[error("filter chain exhausted at index {index} without an upstream dispatch")]
    ChainExhausted { index: usize },

    #[error(transparent)]
    Body(#[from] BodyError),

    #[error("upstream dispatch failed: {0}")]
    Upstream(String),

    #[error("exchange cancelled")]
    Cancelled,

    #[error("invalid route definition `{id}`: {detail}")]
    InvalidRouteDefinition { id: String, detail: String },

    #[error("gateway misconfigured: {0}")]
    Misconfigured(String),

    #[error("invalid value for header `{name}`")]
    InvalidHeaderValue { name: String },

    #[error("path rewrite produced an invalid uri: {0}")]
    InvalidRewrittenUri(String),
}

impl GatewayError {
    /// Wrap an upstream collaborator failure.
    pub fn upstream(err: impl Into<BoxError>) -> Self {
        Self::Upstream(err.into().to_string())
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
