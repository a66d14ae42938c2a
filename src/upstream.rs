//! Upstream dispatch boundary.
//!
//! The actual HTTP client transport lives outside this crate. The pipeline
//! only needs the narrow contract below: hand the exchange over, get a
//! completion signal back. The terminal [`ForwardFilter`] is appended to
//! every composed chain and is the single place that crosses this boundary.

use crate::error::{BoxError, GatewayError, GatewayResult};
use crate::exchange::Exchange;
use crate::filter::chain::FilterChain;
use crate::filter::GatewayFilter;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Collaborator that forwards an exchange to the selected upstream and
/// populates its response.
#[async_trait]
pub trait UpstreamDispatch: Send + Sync {
    async fn dispatch(&self, exchange: &mut Exchange) -> Result<(), BoxError>;
}

/// Terminal filter: forwards the exchange to the upstream collaborator
/// instead of delegating to a further chain link.
pub struct ForwardFilter {
    upstream: Arc<dyn UpstreamDispatch>,
}

impl ForwardFilter {
    pub fn new(upstream: Arc<dyn UpstreamDispatch>) -> Self {
        Self { upstream }
    }
}

impl fmt::Debug for ForwardFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardFilter").finish_non_exhaustive()
    }
}

#[async_trait]
impl GatewayFilter for ForwardFilter {
    async fn filter(&self, exchange: &mut Exchange, _chain: FilterChain<'_>) -> GatewayResult<()> {
        if exchange.is_committed() {
            // A pre-phase filter already produced the response.
            debug!(request = %exchange.id(), "exchange committed, skipping upstream dispatch");
            return Ok(());
        }
        self.upstream
            .dispatch(exchange)
            .await
            .map_err(GatewayError::upstream)?;
        exchange.mark_dispatched();
        Ok(())
    }
}
