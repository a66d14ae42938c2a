//! Observability collaborator.
//!
//! The pipeline reports failures (predicate evaluations that errored, body
//! cache defects, exhausted chains) to a [`GatewayObserver`]. Delivery is
//! fire-and-forget: an observer must never block or fail the request path.

use crate::types::{RequestId, RouteId};
use parking_lot::Mutex;
use tracing::warn;

/// A failure event emitted by the matching or filtering pipeline.
#[derive(Clone, Debug, derive_more::Display)]
pub enum GatewayEvent {
    #[display("predicate evaluation failed for route {route_id}: {detail}")]
    PredicateFailed { route_id: RouteId, detail: String },

    #[display("body cache failure on request {request_id}: {detail}")]
    BodyCacheFailed {
        request_id: RequestId,
        detail: String,
    },

    #[display("filter chain exhausted on request {request_id} at index {index}")]
    ChainExhausted { request_id: RequestId, index: usize },
}

/// Sink for pipeline failure events.
pub trait GatewayObserver: Send + Sync {
    fn notify(&self, event: GatewayEvent);
}

/// Default observer: structured warn-level logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl GatewayObserver for TracingObserver {
    fn notify(&self, event: GatewayEvent) {
        match &event {
            GatewayEvent::PredicateFailed { route_id, detail } => {
                warn!(route = %route_id, %detail, "predicate evaluation failed");
            }
            GatewayEvent::BodyCacheFailed { request_id, detail } => {
                warn!(request = %request_id, %detail, "body cache failure");
            }
            GatewayEvent::ChainExhausted { request_id, index } => {
                warn!(request = %request_id, index, "filter chain exhausted without dispatch");
            }
        }
    }
}

/// Observer that retains events for assertions and diagnostics.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<GatewayEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GatewayEvent> {
        self.events.lock().clone()
    }
}

impl GatewayObserver for CollectingObserver {
    fn notify(&self, event: GatewayEvent) {
        self.events.lock().push(event);
    }
}
