//! First-match-wins route selection.

use super::table::RouteLocator;
use super::Route;
use crate::events::{GatewayEvent, GatewayObserver};
use crate::exchange::Exchange;
use std::sync::Arc;
use tracing::debug;

/// Scans the ordered route table and selects the first matching route.
pub struct RouteMatcher {
    locator: Arc<dyn RouteLocator>,
    observer: Arc<dyn GatewayObserver>,
}

impl RouteMatcher {
    pub fn new(locator: Arc<dyn RouteLocator>, observer: Arc<dyn GatewayObserver>) -> Self {
        Self { locator, observer }
    }

    /// Return the first route whose predicate resolves true, scanning the
    /// snapshot in table order. Predicates of later routes are never started
    /// once a match is found. A failed predicate counts as a non-match for
    /// that route: it is reported to the observer and scanning continues.
    /// `None` is the distinguished no-route outcome, not an error.
    pub async fn match_route(&self, exchange: &Exchange) -> Option<Arc<Route>> {
        let snapshot = self.locator.routes();
        for route in snapshot.iter() {
            match route.predicate().apply(exchange).await {
                Ok(true) => {
                    debug!(route = %route.id(), request = %exchange.id(), "route matched");
                    return Some(Arc::clone(route));
                }
                Ok(false) => {}
                Err(error) => {
                    self.observer.notify(GatewayEvent::PredicateFailed {
                        route_id: route.id().clone(),
                        detail: error.to_string(),
                    });
                }
            }
        }
        debug!(request = %exchange.id(), "no route matched");
        None
    }
}
