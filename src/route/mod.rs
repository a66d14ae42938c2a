//! Route model: an id, a match predicate, and an ordered list of filters.
//!
//! Routes are immutable once built. Reconfiguration replaces whole `Route`
//! values (and whole table snapshots, see [`table`]); nothing mutates a
//! route while a matching pass or filter chain is using it, which is what
//! makes sharing them across concurrent requests safe without locks.

pub mod matcher;
pub mod table;

use crate::error::{GatewayError, GatewayResult};
use crate::filter::{GatewayFilter, OrderedGatewayFilter};
use crate::predicate::AsyncPredicate;
use crate::types::{RouteId, RouteOrder};

/// A named binding of a match condition to an ordered list of filters.
#[derive(Debug)]
pub struct Route {
    id: RouteId,
    order: RouteOrder,
    predicate: AsyncPredicate,
    filters: Vec<OrderedGatewayFilter>,
}

impl Route {
    pub fn builder(id: RouteId) -> RouteBuilder {
        RouteBuilder {
            id,
            order: RouteOrder::from(0),
            predicate: None,
            filters: Vec::new(),
        }
    }

    pub fn id(&self) -> &RouteId {
        &self.id
    }

    pub fn order(&self) -> RouteOrder {
        self.order
    }

    pub fn predicate(&self) -> &AsyncPredicate {
        &self.predicate
    }

    pub fn filters(&self) -> &[OrderedGatewayFilter] {
        &self.filters
    }
}

/// Builder for [`Route`] values.
#[derive(Debug)]
pub struct RouteBuilder {
    id: RouteId,
    order: RouteOrder,
    predicate: Option<AsyncPredicate>,
    filters: Vec<OrderedGatewayFilter>,
}

impl RouteBuilder {
    /// Table priority for this route; lower orders are scanned first.
    pub fn order(mut self, order: i32) -> Self {
        self.order = RouteOrder::from(order);
        self
    }

    /// The route's match condition. Synchronous predicates lift via `Into`.
    pub fn predicate(mut self, predicate: impl Into<AsyncPredicate>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Add a route-specific filter with an explicit order.
    pub fn filter(mut self, order: i32, filter: impl GatewayFilter + 'static) -> Self {
        self.filters.push(OrderedGatewayFilter::new(order, filter));
        self
    }

    /// Add an already-wrapped filter.
    pub fn ordered_filter(mut self, filter: OrderedGatewayFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn build(self) -> GatewayResult<Route> {
        let predicate = self
            .predicate
            .ok_or_else(|| GatewayError::InvalidRouteDefinition {
                id: self.id.to_string(),
                detail: "a route requires a predicate".to_string(),
            })?;
        Ok(Route {
            id: self.id,
            order: self.order,
            predicate,
            filters: self.filters,
        })
    }
}
