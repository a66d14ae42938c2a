//! Built-in request/response transformers.
//!
//! Header and path filters mutate the exchange in their pre-phase; response
//! filters do their work in the post-phase, after the chain's completion
//! signal returns. The body-rewriting filters route the single-use body
//! through [`CachedBodyOutputMessage`] so the transformed body is replayable
//! by whatever consumes it next.

use super::chain::FilterChain;
use super::GatewayFilter;
use crate::body::{aggregate, CachedBodyOutputMessage};
use crate::error::{BodyError, BoxError, GatewayError, GatewayResult};
use crate::exchange::Exchange;
use crate::types::BodyCapacity;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use http::uri::{PathAndQuery, Uri};
use http::StatusCode;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

fn parse_header(name: &str, value: &str) -> GatewayResult<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::try_from(name).map_err(|_| GatewayError::InvalidHeaderValue {
        name: name.to_string(),
    })?;
    let header_value = HeaderValue::try_from(value).map_err(|_| GatewayError::InvalidHeaderValue {
        name: name.to_string(),
    })?;
    Ok((header_name, header_value))
}

fn replace_path(uri: &Uri, new_path: &str) -> GatewayResult<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{new_path}?{query}"),
        None => new_path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query.as_str())
            .map_err(|_| GatewayError::InvalidRewrittenUri(path_and_query.clone()))?,
    );
    Uri::from_parts(parts).map_err(|err| GatewayError::InvalidRewrittenUri(err.to_string()))
}

/// Appends a request header before delegating.
#[derive(Debug, Clone)]
pub struct AddRequestHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl AddRequestHeader {
    pub fn new(name: &str, value: &str) -> GatewayResult<Self> {
        let (name, value) = parse_header(name, value)?;
        Ok(Self { name, value })
    }
}

#[async_trait]
impl GatewayFilter for AddRequestHeader {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        exchange
            .request_headers_mut()
            .append(self.name.clone(), self.value.clone());
        chain.next(exchange).await
    }
}

/// Replaces a request header before delegating.
#[derive(Debug, Clone)]
pub struct SetRequestHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl SetRequestHeader {
    pub fn new(name: &str, value: &str) -> GatewayResult<Self> {
        let (name, value) = parse_header(name, value)?;
        Ok(Self { name, value })
    }
}

#[async_trait]
impl GatewayFilter for SetRequestHeader {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        exchange
            .request_headers_mut()
            .insert(self.name.clone(), self.value.clone());
        chain.next(exchange).await
    }
}

/// Removes a request header before delegating.
#[derive(Debug, Clone)]
pub struct RemoveRequestHeader {
    name: HeaderName,
}

impl RemoveRequestHeader {
    pub fn new(name: &str) -> GatewayResult<Self> {
        let name = HeaderName::try_from(name).map_err(|_| GatewayError::InvalidHeaderValue {
            name: name.to_string(),
        })?;
        Ok(Self { name })
    }
}

#[async_trait]
impl GatewayFilter for RemoveRequestHeader {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        exchange.request_headers_mut().remove(&self.name);
        chain.next(exchange).await
    }
}

/// Appends a response header once the chain returns.
#[derive(Debug, Clone)]
pub struct AddResponseHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl AddResponseHeader {
    pub fn new(name: &str, value: &str) -> GatewayResult<Self> {
        let (name, value) = parse_header(name, value)?;
        Ok(Self { name, value })
    }
}

#[async_trait]
impl GatewayFilter for AddResponseHeader {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        chain.next(exchange).await?;
        exchange
            .response_headers_mut()
            .append(self.name.clone(), self.value.clone());
        Ok(())
    }
}

/// Replaces a response header once the chain returns.
#[derive(Debug, Clone)]
pub struct SetResponseHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl SetResponseHeader {
    pub fn new(name: &str, value: &str) -> GatewayResult<Self> {
        let (name, value) = parse_header(name, value)?;
        Ok(Self { name, value })
    }
}

#[async_trait]
impl GatewayFilter for SetResponseHeader {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        chain.next(exchange).await?;
        exchange
            .response_headers_mut()
            .insert(self.name.clone(), self.value.clone());
        Ok(())
    }
}

/// Removes a response header once the chain returns.
#[derive(Debug, Clone)]
pub struct RemoveResponseHeader {
    name: HeaderName,
}

impl RemoveResponseHeader {
    pub fn new(name: &str) -> GatewayResult<Self> {
        let name = HeaderName::try_from(name).map_err(|_| GatewayError::InvalidHeaderValue {
            name: name.to_string(),
        })?;
        Ok(Self { name })
    }
}

#[async_trait]
impl GatewayFilter for RemoveResponseHeader {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        chain.next(exchange).await?;
        exchange.response_headers_mut().remove(&self.name);
        Ok(())
    }
}

/// Drops the first `parts` path segments before delegating.
#[derive(Debug, Clone)]
pub struct StripPrefix {
    parts: usize,
}

impl StripPrefix {
    pub fn new(parts: usize) -> Self {
        Self { parts }
    }
}

#[async_trait]
impl GatewayFilter for StripPrefix {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        let remaining: Vec<&str> = exchange
            .path()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .skip(self.parts)
            .collect();
        let new_path = format!("/{}", remaining.join("/"));
        let uri = replace_path(exchange.uri(), &new_path)?;
        exchange.set_uri(uri);
        chain.next(exchange).await
    }
}

/// Rewrites the request path with a regex find/replace before delegating.
#[derive(Debug, Clone)]
pub struct RewritePath {
    pattern: Regex,
    replacement: String,
}

impl RewritePath {
    pub fn new(pattern: &str, replacement: &str) -> GatewayResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|err| GatewayError::Misconfigured(format!("invalid rewrite pattern: {err}")))?;
        Ok(Self {
            pattern,
            replacement: replacement.to_string(),
        })
    }
}

#[async_trait]
impl GatewayFilter for RewritePath {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        let rewritten = self
            .pattern
            .replace_all(exchange.path(), self.replacement.as_str())
            .into_owned();
        let uri = replace_path(exchange.uri(), &rewritten)?;
        exchange.set_uri(uri);
        chain.next(exchange).await
    }
}

/// Forces the response status once the chain returns.
#[derive(Debug, Clone)]
pub struct SetStatus {
    status: StatusCode,
}

impl SetStatus {
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }
}

#[async_trait]
impl GatewayFilter for SetStatus {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        chain.next(exchange).await?;
        exchange.set_response_status(self.status);
        Ok(())
    }
}

/// Transform applied to a fully materialized body.
pub type BodyTransform = Arc<dyn Fn(Bytes) -> Result<Bytes, BoxError> + Send + Sync>;

/// Reads the whole request body, transforms it, and re-emits the result as
/// the new request body via the caching sink.
pub struct ModifyRequestBody {
    transform: BodyTransform,
    capacity: BodyCapacity,
}

impl ModifyRequestBody {
    pub fn new(
        transform: impl Fn(Bytes) -> Result<Bytes, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            transform: Arc::new(transform),
            capacity: BodyCapacity::default(),
        }
    }

    pub fn with_capacity(mut self, capacity: BodyCapacity) -> Self {
        self.capacity = capacity;
        self
    }
}

impl fmt::Debug for ModifyRequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifyRequestBody")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GatewayFilter for ModifyRequestBody {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        let original = exchange.take_request_body();
        let transform = Arc::clone(&self.transform);
        let capacity = self.capacity;
        let cancellation = exchange.cancellation_token().clone();
        let transformed = async move {
            let full = match original {
                Some(body) => aggregate(body, capacity, &cancellation).await?,
                None => Bytes::new(),
            };
            transform(full).map_err(|err| BodyError::Transform(err.to_string()))
        };

        let mut cache = CachedBodyOutputMessage::new(exchange, exchange.request_headers().clone())
            .with_capacity(capacity);
        cache.write_with(stream::once(transformed)).await?;

        let length = cache.cached_len().unwrap_or(0);
        exchange
            .request_headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(length));
        exchange.set_request_body(cache.body()?);
        chain.next(exchange).await
    }
}

/// Reads the whole response body once the chain returns, transforms it, and
/// re-emits the result as the new response body.
pub struct ModifyResponseBody {
    transform: BodyTransform,
    capacity: BodyCapacity,
}

impl ModifyResponseBody {
    pub fn new(
        transform: impl Fn(Bytes) -> Result<Bytes, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            transform: Arc::new(transform),
            capacity: BodyCapacity::default(),
        }
    }

    pub fn with_capacity(mut self, capacity: BodyCapacity) -> Self {
        self.capacity = capacity;
        self
    }
}

impl fmt::Debug for ModifyResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifyResponseBody")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GatewayFilter for ModifyResponseBody {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        chain.next(exchange).await?;

        // Nothing to rewrite when the upstream produced no body.
        let Some(original) = exchange.take_response_body() else {
            return Ok(());
        };
        let transform = Arc::clone(&self.transform);
        let capacity = self.capacity;
        let cancellation = exchange.cancellation_token().clone();
        let transformed = async move {
            let full = aggregate(original, capacity, &cancellation).await?;
            transform(full).map_err(|err| BodyError::Transform(err.to_string()))
        };

        let mut cache = CachedBodyOutputMessage::new(exchange, exchange.response_headers().clone())
            .with_capacity(capacity);
        cache.write_with(stream::once(transformed)).await?;

        let length = cache.cached_len().unwrap_or(0);
        exchange
            .response_headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(length));
        exchange.set_response_body(cache.body()?);
        Ok(())
    }
}
