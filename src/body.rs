//! Caching body sink for filters that rewrite request or response bodies.
//!
//! A body is a push-based stream that can be consumed exactly once. A filter
//! that wants to inspect or transform a body and still forward it writes the
//! stream into a [`CachedBodyOutputMessage`]: the default write handler
//! materializes every chunk into a replayable sequence before signaling
//! completion, after which [`CachedBodyOutputMessage::body`] can be read any
//! number of times.
//!
//! Materialization is bounded: the default handler buffers at most
//! [`crate::types::BodyCapacity`] bytes and fails with
//! [`BodyError::CapacityExceeded`] beyond that. For conceptually unbounded
//! bodies, install a custom write handler with
//! [`CachedBodyOutputMessage::set_write_handler`]; the caller then decides
//! how (or whether) data is retained, and reading the cached body fails with
//! [`BodyError::NotSet`].

use crate::error::BodyError;
use crate::exchange::{BodyStream, Exchange};
use crate::types::BodyCapacity;
use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::future::BoxFuture;
use futures_util::{stream, StreamExt};
use http::HeaderMap;
use http_body::{Frame, SizeHint};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;

/// Custom handler for "writing" a body stream, replacing the default
/// materializing handler.
pub type WriteHandler =
    Box<dyn FnMut(BodyStream) -> BoxFuture<'static, Result<(), BodyError>> + Send>;

/// A body sink that caches whatever is written to it so the body can be read
/// again after being consumed.
#[derive(derive_more::Debug)]
pub struct CachedBodyOutputMessage {
    headers: HeaderMap,
    capacity: BodyCapacity,
    #[debug(skip)]
    cancellation: CancellationToken,
    #[debug(skip)]
    write_handler: Option<WriteHandler>,
    cached: Option<Vec<Bytes>>,
}

impl CachedBodyOutputMessage {
    /// Create a sink for one exchange. The sink shares the exchange's
    /// cancellation token so an aborted request also aborts materialization.
    pub fn new(exchange: &Exchange, headers: HeaderMap) -> Self {
        Self {
            headers,
            capacity: BodyCapacity::default(),
            cancellation: exchange.cancellation_token().clone(),
            write_handler: None,
            cached: None,
        }
    }

    /// Override the materialization cap.
    pub fn with_capacity(mut self, capacity: BodyCapacity) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Install a custom write handler, bypassing materialization. Required
    /// when the body is an unbounded stream.
    pub fn set_write_handler(&mut self, handler: WriteHandler) {
        self.write_handler = Some(handler);
    }

    /// Write a stream of chunks into the sink.
    ///
    /// With the default handler the entire stream is materialized (in
    /// emission order) before this returns; on failure or cancellation the
    /// partial buffer is discarded and the cache stays unset.
    pub async fn write_with<S>(&mut self, body: S) -> Result<(), BodyError>
    where
        S: Stream<Item = Result<Bytes, BodyError>> + Send + Sync + 'static,
    {
        if let Some(handler) = self.write_handler.as_mut() {
            return handler(Box::pin(body)).await;
        }
        let chunks = materialize(body, self.capacity, &self.cancellation).await?;
        self.cached = Some(chunks);
        Ok(())
    }

    /// Complete without a body: equivalent to writing an empty stream, so a
    /// subsequent read yields a valid empty body rather than `NotSet`.
    pub async fn set_complete(&mut self) -> Result<(), BodyError> {
        self.write_with(stream::empty()).await
    }

    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Total bytes currently cached, if a body has been written.
    pub fn cached_len(&self) -> Option<usize> {
        self.cached
            .as_ref()
            .map(|chunks| chunks.iter().map(Bytes::len).sum())
    }

    /// Replay the cached body as a fresh chunk stream. Reads are idempotent:
    /// every call replays the same chunks in the original emission order.
    pub fn body(&self) -> Result<BodyStream, BodyError> {
        let chunks = self.cached.clone().ok_or(BodyError::NotSet)?;
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    /// The cached body as one contiguous buffer.
    pub fn aggregated(&self) -> Result<Bytes, BodyError> {
        let chunks = self.cached.as_ref().ok_or(BodyError::NotSet)?;
        if chunks.len() == 1 {
            return Ok(chunks[0].clone());
        }
        let mut buffer = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            buffer.extend_from_slice(chunk);
        }
        Ok(buffer.freeze())
    }

    /// The cached body as an [`http_body::Body`] for handing to an HTTP
    /// client.
    pub fn replay(&self) -> Result<ReplayBody, BodyError> {
        let chunks = self.cached.clone().ok_or(BodyError::NotSet)?;
        Ok(ReplayBody::new(chunks))
    }
}

/// Drain a chunk stream into one contiguous buffer, subject to the same
/// capacity and cancellation rules as the default write handler.
pub async fn aggregate<S>(
    body: S,
    capacity: BodyCapacity,
    cancellation: &CancellationToken,
) -> Result<Bytes, BodyError>
where
    S: Stream<Item = Result<Bytes, BodyError>> + Send,
{
    let chunks = materialize(body, capacity, cancellation).await?;
    let mut buffer = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
    for chunk in &chunks {
        buffer.extend_from_slice(chunk);
    }
    Ok(buffer.freeze())
}

async fn materialize<S>(
    body: S,
    capacity: BodyCapacity,
    cancellation: &CancellationToken,
) -> Result<Vec<Bytes>, BodyError>
where
    S: Stream<Item = Result<Bytes, BodyError>> + Send,
{
    let mut body = std::pin::pin!(body);
    let mut chunks = Vec::new();
    let mut buffered = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            () = cancellation.cancelled() => return Err(BodyError::Cancelled),
            next = body.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                buffered += chunk.len();
                if buffered > *capacity.as_ref() {
                    return Err(BodyError::CapacityExceeded {
                        buffered,
                        capacity: *capacity.as_ref(),
                    });
                }
                chunks.push(chunk);
            }
            Some(Err(err)) => return Err(err),
            None => return Ok(chunks),
        }
    }
}

/// Replayable body backed by cached chunks.
#[derive(Clone, Debug)]
pub struct ReplayBody {
    chunks: VecDeque<Bytes>,
    remaining: u64,
}

impl ReplayBody {
    fn new(chunks: Vec<Bytes>) -> Self {
        let remaining = chunks.iter().map(|chunk| chunk.len() as u64).sum();
        Self {
            chunks: chunks.into(),
            remaining,
        }
    }
}

impl http_body::Body for ReplayBody {
    type Data = Bytes;
    type Error = BodyError;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this.chunks.pop_front() {
            Some(chunk) => {
                this.remaining -= chunk.len() as u64;
                Poll::Ready(Some(Ok(Frame::data(chunk))))
            }
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.chunks.is_empty()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }
}
