//! Gateway facade: match, compose, execute.
//!
//! One [`Gateway`] serves many concurrent exchanges. Per request it runs the
//! route matcher, merges the route's filters with the global filters into a
//! sorted chain, appends the terminal dispatch filter, and drives the chain
//! to completion. Everything the gateway holds is read-only at request time;
//! the per-request state lives on the exchange and the ephemeral chain.

use crate::error::{GatewayError, GatewayResult};
use crate::events::{GatewayEvent, GatewayObserver, TracingObserver};
use crate::exchange::Exchange;
use crate::filter::chain::{compose, FilterChain};
use crate::filter::{GatewayFilter, OrderedGatewayFilter};
use crate::route::matcher::RouteMatcher;
use crate::route::table::RouteLocator;
use crate::route::Route;
use crate::upstream::{ForwardFilter, UpstreamDispatch};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Exchange attribute holding the matched route's id.
pub const MATCHED_ROUTE_ATTR: &str = "grand_central.matched_route";

/// How an exchange left the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Forwarded upstream; the response flowed back through the post-phases.
    Dispatched,
    /// A filter completed the exchange directly; upstream was never called.
    ShortCircuited,
    /// No route's predicate resolved true. Not an error.
    NoRouteMatched,
}

/// Executes the composed filter chain for a matched route.
#[derive(Debug)]
pub struct FilteringHandler {
    global: Vec<OrderedGatewayFilter>,
    terminal: OrderedGatewayFilter,
}

impl FilteringHandler {
    pub fn new(global: Vec<OrderedGatewayFilter>, upstream: Arc<dyn UpstreamDispatch>) -> Self {
        Self {
            global,
            terminal: OrderedGatewayFilter::new(i32::MAX, ForwardFilter::new(upstream)),
        }
    }

    /// Compose the per-request chain and run it to completion.
    pub async fn handle(&self, route: &Route, exchange: &mut Exchange) -> GatewayResult<()> {
        let composed = compose(&self.global, route.filters(), &self.terminal);
        debug!(
            route = %route.id(),
            request = %exchange.id(),
            filters = composed.len(),
            "executing filter chain"
        );
        FilterChain::new(&composed).next(exchange).await
    }
}

/// The routing and request-pipeline core.
pub struct Gateway {
    matcher: RouteMatcher,
    handler: FilteringHandler,
    observer: Arc<dyn GatewayObserver>,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder {
            locator: None,
            global_filters: Vec::new(),
            upstream: None,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Match the exchange against the route table and run the selected
    /// route's filter chain around the upstream dispatch.
    #[instrument(skip_all, fields(request = %exchange.id(), path = %exchange.path()))]
    pub async fn handle(&self, exchange: &mut Exchange) -> GatewayResult<HandleOutcome> {
        let Some(route) = self.matcher.match_route(exchange).await else {
            return Ok(HandleOutcome::NoRouteMatched);
        };
        exchange.set_attribute(MATCHED_ROUTE_ATTR, route.id().to_string());

        match self.handler.handle(route.as_ref(), exchange).await {
            Ok(()) => Ok(if exchange.is_dispatched() {
                HandleOutcome::Dispatched
            } else {
                HandleOutcome::ShortCircuited
            }),
            Err(error) => {
                match &error {
                    GatewayError::ChainExhausted { index } => {
                        self.observer.notify(GatewayEvent::ChainExhausted {
                            request_id: exchange.id(),
                            index: *index,
                        });
                    }
                    GatewayError::Body(body_error) => {
                        self.observer.notify(GatewayEvent::BodyCacheFailed {
                            request_id: exchange.id(),
                            detail: body_error.to_string(),
                        });
                    }
                    _ => {}
                }
                Err(error)
            }
        }
    }
}

/// Builder for [`Gateway`].
pub struct GatewayBuilder {
    locator: Option<Arc<dyn RouteLocator>>,
    global_filters: Vec<OrderedGatewayFilter>,
    upstream: Option<Arc<dyn UpstreamDispatch>>,
    observer: Arc<dyn GatewayObserver>,
}

impl GatewayBuilder {
    pub fn routes(mut self, locator: Arc<dyn RouteLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Register a filter that applies to every route.
    pub fn global_filter(mut self, order: i32, filter: impl GatewayFilter + 'static) -> Self {
        self.global_filters
            .push(OrderedGatewayFilter::new(order, filter));
        self
    }

    pub fn upstream(mut self, upstream: Arc<dyn UpstreamDispatch>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn GatewayObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> GatewayResult<Gateway> {
        let locator = self
            .locator
            .ok_or_else(|| GatewayError::Misconfigured("a route locator is required".to_string()))?;
        let upstream = self.upstream.ok_or_else(|| {
            GatewayError::Misconfigured("an upstream dispatch is required".to_string())
        })?;
        Ok(Gateway {
            matcher: RouteMatcher::new(locator, Arc::clone(&self.observer)),
            handler: FilteringHandler::new(self.global_filters, upstream),
            observer: self.observer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::events::CollectingObserver;
    use crate::predicate::RoutePredicate;
    use crate::route::table::RouteTable;
    use crate::types::RouteId;
    use async_trait::async_trait;
    use http::{HeaderMap, Method, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct RecordingUpstream {
        dispatches: AtomicUsize,
    }

    #[async_trait]
    impl UpstreamDispatch for RecordingUpstream {
        async fn dispatch(&self, exchange: &mut Exchange) -> Result<(), BoxError> {
            self.dispatches.fetch_add(1, Ordering::SeqCst);
            exchange.set_response_status(StatusCode::OK);
            Ok(())
        }
    }

    fn exchange_for(path: &str) -> Exchange {
        Exchange::new(Method::GET, path.parse().expect("valid uri"), HeaderMap::new())
    }

    fn route_matching(id: &str, prefix: &'static str) -> Route {
        Route::builder(RouteId::try_new(id.to_string()).expect("non-empty id"))
            .predicate(RoutePredicate::from_fn("prefix", move |exchange| {
                Ok(exchange.path().starts_with(prefix))
            }))
            .build()
            .expect("valid route")
    }

    #[tokio::test]
    async fn matched_route_dispatches_upstream() {
        let upstream = Arc::new(RecordingUpstream::default());
        let gateway = Gateway::builder()
            .routes(Arc::new(RouteTable::new(vec![route_matching("api", "/api")])))
            .upstream(upstream.clone())
            .build()
            .expect("valid gateway");

        let mut exchange = exchange_for("/api/users");
        let outcome = gateway.handle(&mut exchange).await.expect("handles");

        assert_eq!(outcome, HandleOutcome::Dispatched);
        assert_eq!(upstream.dispatches.load(Ordering::SeqCst), 1);
        assert_eq!(
            exchange
                .attribute(MATCHED_ROUTE_ATTR)
                .and_then(|value| value.as_str()),
            Some("api"),
        );
    }

    #[tokio::test]
    async fn unmatched_request_yields_no_route_outcome() {
        let upstream = Arc::new(RecordingUpstream::default());
        let gateway = Gateway::builder()
            .routes(Arc::new(RouteTable::new(vec![route_matching("api", "/api")])))
            .upstream(upstream.clone())
            .build()
            .expect("valid gateway");

        let mut exchange = exchange_for("/other");
        let outcome = gateway.handle(&mut exchange).await.expect("handles");

        assert_eq!(outcome, HandleOutcome::NoRouteMatched);
        assert_eq!(upstream.dispatches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn builder_rejects_missing_collaborators() {
        let result = Gateway::builder().build();
        assert!(matches!(result, Err(GatewayError::Misconfigured(_))));
    }

    #[tokio::test]
    async fn body_failures_are_reported_to_the_observer() {
        use crate::filter::builtin::ModifyRequestBody;

        let observer = Arc::new(CollectingObserver::new());
        let route = Route::builder(RouteId::try_new("ingest".to_string()).expect("non-empty id"))
            .predicate(RoutePredicate::from_fn("always", |_| Ok(true)))
            .filter(
                1,
                ModifyRequestBody::new(|_body| Err("unparseable payload".into())),
            )
            .build()
            .expect("valid route");

        let gateway = Gateway::builder()
            .routes(Arc::new(RouteTable::new(vec![route])))
            .upstream(Arc::new(RecordingUpstream::default()))
            .observer(observer.clone())
            .build()
            .expect("valid gateway");

        let mut exchange = exchange_for("/ingest");
        let result = gateway.handle(&mut exchange).await;

        assert!(matches!(result, Err(GatewayError::Body(_))));
        let events = observer.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], GatewayEvent::BodyCacheFailed { .. }));
    }
}
