//! Already-parsed route definitions and their compilation into routes.
//!
//! Loading and watching configuration sources is a host concern; route
//! definitions arrive here as data (typically deserialized by the host from
//! whatever format it favors) and are compiled once into immutable
//! [`Route`] values. Pattern and regex compilation happens at build time so
//! nothing is parsed on the match path.

use crate::error::{GatewayError, GatewayResult, PredicateError};
use crate::filter::builtin::{
    AddRequestHeader, AddResponseHeader, RemoveRequestHeader, RemoveResponseHeader, RewritePath,
    SetRequestHeader, SetResponseHeader, SetStatus, StripPrefix,
};
use crate::filter::OrderedGatewayFilter;
use crate::predicate::builtin::{
    AfterPredicate, BeforePredicate, BetweenPredicate, CookiePredicate, HeaderPredicate,
    HostPredicate, MethodPredicate, PathPredicate, QueryPredicate,
};
use crate::predicate::{AsyncPredicate, RoutePredicate};
use crate::route::Route;
use crate::types::RouteId;
use chrono::{DateTime, Utc};
use http::Method;
use serde::{Deserialize, Serialize};

/// One declared route, as parsed data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteDefinition {
    pub id: String,
    /// Table priority; lower orders are scanned first.
    #[serde(default)]
    pub order: i32,
    /// Match conditions, AND-composed left to right.
    pub predicates: Vec<PredicateDef>,
    /// Filters, ordered by declaration position.
    #[serde(default)]
    pub filters: Vec<FilterDef>,
}

/// A single predicate declaration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateDef {
    Path {
        pattern: String,
    },
    Host {
        pattern: String,
    },
    Method {
        methods: Vec<String>,
    },
    Header {
        name: String,
        #[serde(default)]
        pattern: Option<String>,
    },
    Query {
        name: String,
        #[serde(default)]
        pattern: Option<String>,
    },
    Cookie {
        name: String,
        pattern: String,
    },
    After {
        instant: DateTime<Utc>,
    },
    Before {
        instant: DateTime<Utc>,
    },
    Between {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// A single filter declaration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterDef {
    AddRequestHeader { name: String, value: String },
    SetRequestHeader { name: String, value: String },
    RemoveRequestHeader { name: String },
    AddResponseHeader { name: String, value: String },
    SetResponseHeader { name: String, value: String },
    RemoveResponseHeader { name: String },
    StripPrefix { parts: usize },
    RewritePath { pattern: String, replacement: String },
    SetStatus { status: u16 },
}

impl RouteDefinition {
    /// Compile this definition into an immutable route.
    pub fn build(&self) -> GatewayResult<Route> {
        let id = RouteId::try_new(self.id.clone()).map_err(|err| self.invalid(err.to_string()))?;

        let mut predicates = self.predicates.iter();
        let first = predicates
            .next()
            .ok_or_else(|| self.invalid("at least one predicate is required".to_string()))?;
        let mut combined = AsyncPredicate::from_sync(
            build_predicate(first).map_err(|err| self.invalid(err.to_string()))?,
        );
        for def in predicates {
            let next = AsyncPredicate::from_sync(
                build_predicate(def).map_err(|err| self.invalid(err.to_string()))?,
            );
            combined = combined.and(&next);
        }

        let mut builder = Route::builder(id).order(self.order).predicate(combined);
        for (position, def) in self.filters.iter().enumerate() {
            let order = i32::try_from(position).unwrap_or(i32::MAX - 1) + 1;
            builder =
                builder.ordered_filter(OrderedGatewayFilter::from_boxed(order, build_filter(def)?));
        }
        builder.build()
    }

    fn invalid(&self, detail: String) -> GatewayError {
        GatewayError::InvalidRouteDefinition {
            id: self.id.clone(),
            detail,
        }
    }
}

fn build_predicate(def: &PredicateDef) -> Result<RoutePredicate, PredicateError> {
    Ok(match def {
        PredicateDef::Path { pattern } => RoutePredicate::new(PathPredicate::new(pattern)?),
        PredicateDef::Host { pattern } => RoutePredicate::new(HostPredicate::new(pattern)),
        PredicateDef::Method { methods } => {
            let methods = methods
                .iter()
                .map(|method| {
                    Method::try_from(method.as_str()).map_err(|_| {
                        PredicateError::MalformedInput(format!("invalid method: {method}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            RoutePredicate::new(MethodPredicate::new(methods))
        }
        PredicateDef::Header { name, pattern } => {
            RoutePredicate::new(HeaderPredicate::new(name, pattern.as_deref())?)
        }
        PredicateDef::Query { name, pattern } => {
            RoutePredicate::new(QueryPredicate::new(name, pattern.as_deref())?)
        }
        PredicateDef::Cookie { name, pattern } => {
            RoutePredicate::new(CookiePredicate::new(name, pattern)?)
        }
        PredicateDef::After { instant } => RoutePredicate::new(AfterPredicate::new(*instant)),
        PredicateDef::Before { instant } => RoutePredicate::new(BeforePredicate::new(*instant)),
        PredicateDef::Between { start, end } => {
            RoutePredicate::new(BetweenPredicate::new(*start, *end))
        }
    })
}

fn build_filter(def: &FilterDef) -> GatewayResult<Box<dyn crate::filter::GatewayFilter>> {
    Ok(match def {
        FilterDef::AddRequestHeader { name, value } => Box::new(AddRequestHeader::new(name, value)?),
        FilterDef::SetRequestHeader { name, value } => Box::new(SetRequestHeader::new(name, value)?),
        FilterDef::RemoveRequestHeader { name } => Box::new(RemoveRequestHeader::new(name)?),
        FilterDef::AddResponseHeader { name, value } => {
            Box::new(AddResponseHeader::new(name, value)?)
        }
        FilterDef::SetResponseHeader { name, value } => {
            Box::new(SetResponseHeader::new(name, value)?)
        }
        FilterDef::RemoveResponseHeader { name } => Box::new(RemoveResponseHeader::new(name)?),
        FilterDef::StripPrefix { parts } => Box::new(StripPrefix::new(*parts)),
        FilterDef::RewritePath {
            pattern,
            replacement,
        } => Box::new(RewritePath::new(pattern, replacement)?),
        FilterDef::SetStatus { status } => {
            let status = http::StatusCode::from_u16(*status)
                .map_err(|_| GatewayError::Misconfigured(format!("invalid status code: {status}")))?;
            Box::new(SetStatus::new(status))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Exchange;
    use http::{HeaderMap, Method};

    fn definition_json(json: serde_json::Value) -> RouteDefinition {
        serde_json::from_value(json).expect("valid definition")
    }

    #[tokio::test]
    async fn definition_compiles_and_predicates_and_compose() {
        let definition = definition_json(serde_json::json!({
            "id": "users-api",
            "order": 5,
            "predicates": [
                { "kind": "path", "pattern": "/api/users/**" },
                { "kind": "method", "methods": ["GET", "POST"] },
            ],
            "filters": [
                { "kind": "strip_prefix", "parts": 1 },
                { "kind": "add_request_header", "name": "x-gw", "value": "1" },
            ],
        }));

        let route = definition.build().expect("compiles");
        assert_eq!(route.id().to_string(), "users-api");
        assert_eq!(route.filters().len(), 2);
        // Declaration position drives filter order.
        assert!(route.filters()[0].order() < route.filters()[1].order());

        let exchange = Exchange::new(
            Method::GET,
            "/api/users/42".parse().expect("valid uri"),
            HeaderMap::new(),
        );
        assert!(route.predicate().apply(&exchange).await.expect("no error"));

        let miss = Exchange::new(
            Method::DELETE,
            "/api/users/42".parse().expect("valid uri"),
            HeaderMap::new(),
        );
        assert!(!route.predicate().apply(&miss).await.expect("no error"));
    }

    #[test]
    fn empty_predicates_are_rejected() {
        let definition = definition_json(serde_json::json!({
            "id": "no-predicates",
            "predicates": [],
        }));
        assert!(matches!(
            definition.build(),
            Err(GatewayError::InvalidRouteDefinition { .. })
        ));
    }

    #[test]
    fn bad_patterns_fail_at_build_time() {
        let definition = definition_json(serde_json::json!({
            "id": "bad-regex",
            "predicates": [ { "kind": "header", "name": "x-env", "pattern": "(" } ],
        }));
        assert!(matches!(
            definition.build(),
            Err(GatewayError::InvalidRouteDefinition { .. })
        ));

        let definition = definition_json(serde_json::json!({
            "id": "bad-method",
            "predicates": [ { "kind": "method", "methods": ["GE T"] } ],
        }));
        assert!(definition.build().is_err());
    }

    #[test]
    fn definitions_round_trip_through_serde() {
        let definition = definition_json(serde_json::json!({
            "id": "round-trip",
            "predicates": [ { "kind": "host", "pattern": "*.example.org" } ],
            "filters": [ { "kind": "set_status", "status": 418 } ],
        }));
        let serialized = serde_json::to_value(&definition).expect("serializes");
        assert_eq!(serialized["id"], "round-trip");
        assert_eq!(serialized["predicates"][0]["kind"], "host");
    }
}
