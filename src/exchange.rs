//! Per-request exchange context.
//!
//! An [`Exchange`] carries everything the pipeline knows about one in-flight
//! request: the request head, a mutable response head, the body streams, the
//! attribute map filters use to talk to each other, and the cancellation
//! token that stops processing when the client goes away.
//!
//! An exchange is exclusively owned by one request's processing. Route
//! objects stay read-only and shared; all mutation happens here.
//!
//! Bodies are push-based streams consumable exactly once: `take_*_body()`
//! moves the stream out, so a second consumer simply finds it gone. Filters
//! that need to read a body and still forward it go through
//! [`crate::body::CachedBodyOutputMessage`].

use crate::error::{BodyError, BoxError};
use crate::types::RequestId;
use bytes::{Buf, Bytes};
use chrono::{DateTime, Utc};
use futures_core::Stream;
use futures_util::StreamExt;
use http::{header, HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// A push-based stream of body chunks, consumable exactly once.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BodyError>> + Send + Sync>>;

/// Mutable context for one in-flight request.
#[derive(derive_more::Debug)]
pub struct Exchange {
    id: RequestId,
    received_at: DateTime<Utc>,
    method: Method,
    uri: Uri,
    request_headers: HeaderMap,
    #[debug(skip)]
    request_body: Option<BodyStream>,
    response_status: Option<StatusCode>,
    response_headers: HeaderMap,
    #[debug(skip)]
    response_body: Option<BodyStream>,
    attributes: HashMap<String, Value>,
    #[debug(skip)]
    cancellation: CancellationToken,
    committed: bool,
    dispatched: bool,
}

impl Exchange {
    /// Create an exchange from a request head. Bodies are attached
    /// separately via [`Exchange::set_request_body`].
    pub fn new(method: Method, uri: Uri, request_headers: HeaderMap) -> Self {
        Self {
            id: RequestId::new(),
            received_at: Utc::now(),
            method,
            uri,
            request_headers,
            request_body: None,
            response_status: None,
            response_headers: HeaderMap::new(),
            response_body: None,
            attributes: HashMap::new(),
            cancellation: CancellationToken::new(),
            committed: false,
            dispatched: false,
        }
    }

    /// Adapt an `http::Request` with any [`http_body::Body`] into an
    /// exchange, converting the body into a chunk stream.
    pub fn from_http_request<B>(request: http::Request<B>) -> Self
    where
        B: http_body::Body + Send + Sync + 'static,
        B::Data: Send + Sync,
        B::Error: Into<BoxError> + Send + Sync,
    {
        let (parts, body) = request.into_parts();
        let stream = http_body_util::BodyStream::new(body).filter_map(|frame| async move {
            match frame {
                Ok(frame) => frame
                    .into_data()
                    .ok()
                    .map(|mut data| Ok(data.copy_to_bytes(data.remaining()))),
                Err(err) => Some(Err(BodyError::Stream(err.into().to_string()))),
            }
        });
        let mut exchange = Self::new(parts.method, parts.uri, parts.headers);
        exchange.set_request_body(Box::pin(stream));
        exchange
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Instant the exchange was created, used by the datetime predicates.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Replace the request URI (path rewrites).
    pub fn set_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    pub fn request_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.request_headers
    }

    /// Request host, from the URI authority or the `Host` header, lowercased
    /// and stripped of any port.
    pub fn host(&self) -> Option<String> {
        let raw = match self.uri.host() {
            Some(host) => host.to_string(),
            None => self
                .request_headers
                .get(header::HOST)
                .and_then(|value| value.to_str().ok())?
                .to_string(),
        };
        let without_port = raw.split(':').next().unwrap_or(&raw);
        Some(without_port.to_ascii_lowercase())
    }

    /// Look up a query parameter by name, percent-decoded. A parameter
    /// without a value yields an empty string.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        for pair in query.split('&') {
            let (raw_name, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let Ok(decoded_name) = urlencoding::decode(raw_name) else {
                continue;
            };
            if decoded_name == name {
                return Some(
                    urlencoding::decode(raw_value)
                        .map(|value| value.into_owned())
                        .unwrap_or_else(|_| raw_value.to_string()),
                );
            }
        }
        None
    }

    /// Look up a cookie value from the `Cookie` request header(s).
    pub fn cookie(&self, name: &str) -> Option<String> {
        for header_value in self.request_headers.get_all(header::COOKIE) {
            let Ok(raw) = header_value.to_str() else {
                continue;
            };
            for pair in raw.split(';') {
                if let Some((cookie_name, cookie_value)) = pair.trim().split_once('=') {
                    if cookie_name == name {
                        return Some(cookie_value.to_string());
                    }
                }
            }
        }
        None
    }

    pub fn set_request_body(&mut self, body: BodyStream) {
        self.request_body = Some(body);
    }

    /// Take the request body stream, leaving the slot empty. The stream can
    /// only be consumed once; a second take returns `None`.
    pub fn take_request_body(&mut self) -> Option<BodyStream> {
        self.request_body.take()
    }

    pub fn response_status(&self) -> Option<StatusCode> {
        self.response_status
    }

    /// Set the response status without committing the response. Used by
    /// post-phase filters adjusting an upstream response.
    pub fn set_response_status(&mut self, status: StatusCode) {
        self.response_status = Some(status);
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    pub fn set_response_body(&mut self, body: BodyStream) {
        self.response_body = Some(body);
    }

    /// Take the response body stream, leaving the slot empty.
    pub fn take_response_body(&mut self) -> Option<BodyStream> {
        self.response_body.take()
    }

    /// Write a short-circuit response: sets the status and marks the
    /// exchange committed so the terminal filter skips upstream dispatch.
    pub fn commit_response(&mut self, status: StatusCode) {
        self.response_status = Some(status);
        self.committed = true;
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Record that the terminal filter handed the exchange to the upstream
    /// collaborator.
    pub fn mark_dispatched(&mut self) {
        self.dispatched = true;
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Abort processing of this exchange. Chain execution stops before the
    /// next filter and in-progress body caching discards its partial buffer.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }
}
