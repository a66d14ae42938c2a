//! Grand Central - routing and request-pipeline core for an HTTP API gateway
//!
//! Decides which declared route an inbound exchange matches, then runs that
//! route's ordered chain of filters around the upstream dispatch: predicate
//! trees that never block the event loop, deterministically ordered
//! middleware, and a replayable body cache for filters that must read a
//! single-consumption body and still forward it.

pub mod body;
pub mod config;
pub mod error;
pub mod events;
pub mod exchange;
pub mod filter;
pub mod gateway;
pub mod predicate;
pub mod response;
pub mod route;
pub mod types;
pub mod upstream;

pub use body::CachedBodyOutputMessage;
pub use error::{BodyError, GatewayError, GatewayResult, PredicateError};
pub use exchange::{BodyStream, Exchange};
pub use filter::chain::FilterChain;
pub use filter::{GatewayFilter, OrderedGatewayFilter};
pub use gateway::{Gateway, HandleOutcome};
pub use predicate::{AsyncPredicate, Predicate, RoutePredicate};
pub use route::matcher::RouteMatcher;
pub use route::table::{RouteLocator, RouteTable};
pub use route::Route;
pub use types::{BodyCapacity, FilterOrder, RequestId, RouteId, RouteOrder};
pub use upstream::UpstreamDispatch;
