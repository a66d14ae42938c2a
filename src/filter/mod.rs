//! Filter units and their deterministic ordering.
//!
//! A [`GatewayFilter`] is one unit of pre/post request processing in the
//! onion model: it does its pre-work, delegates to the rest of the chain,
//! and does its post-work once the chain's completion signal returns. An
//! [`OrderedGatewayFilter`] decorates a filter with the integer sort key
//! that interleaves filters contributed from different sources (global and
//! route-specific) into one predictable sequence.

pub mod builtin;
pub mod chain;

use crate::error::GatewayResult;
use crate::exchange::Exchange;
use crate::types::FilterOrder;
use async_trait::async_trait;
use self::chain::FilterChain;
use std::fmt;

/// A composable unit of request/response processing.
#[async_trait]
pub trait GatewayFilter: fmt::Debug + Send + Sync {
    /// Process the exchange and delegate to the rest of the chain.
    ///
    /// Pre-work runs before `chain.next(exchange).await`, post-work after it
    /// returns. Completing the exchange directly and *not* invoking the
    /// chain short-circuits every filter past this one; filters before it
    /// still see their post-phase.
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()>;
}

/// A filter decorated with an explicit order.
///
/// The order value exists purely for sorting; it plays no role during
/// execution. Ties keep their original discovery order (the sort is stable).
#[derive(Debug)]
pub struct OrderedGatewayFilter {
    delegate: Box<dyn GatewayFilter>,
    order: FilterOrder,
}

impl OrderedGatewayFilter {
    pub fn new(order: i32, delegate: impl GatewayFilter + 'static) -> Self {
        Self {
            delegate: Box::new(delegate),
            order: FilterOrder::from(order),
        }
    }

    /// Wrap an already-boxed filter.
    pub fn from_boxed(order: i32, delegate: Box<dyn GatewayFilter>) -> Self {
        Self {
            delegate,
            order: FilterOrder::from(order),
        }
    }

    pub fn order(&self) -> FilterOrder {
        self.order
    }

    pub fn delegate(&self) -> &dyn GatewayFilter {
        self.delegate.as_ref()
    }
}

#[async_trait]
impl GatewayFilter for OrderedGatewayFilter {
    async fn filter(&self, exchange: &mut Exchange, chain: FilterChain<'_>) -> GatewayResult<()> {
        self.delegate.filter(exchange, chain).await
    }
}
