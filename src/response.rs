//! Gateway-level failure responses.
//!
//! Maps pipeline outcomes and errors to HTTP responses with stable error
//! codes, so operators can tell "gateway misconfigured" from "upstream is
//! down" without reading logs. The JSON body format and the request-id
//! correlation header are shared by every failure path.

use crate::error::{BodyError, GatewayError};
use crate::types::RequestId;
use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};

/// Header carrying the request id on responses.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Standard error response body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error code for programmatic handling.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error code and status mapping for gateway errors.
pub trait ErrorResponseExt {
    fn error_code(&self) -> &'static str;
    fn status_code(&self) -> StatusCode;
}

impl ErrorResponseExt for GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            GatewayError::ChainExhausted { .. } | GatewayError::Misconfigured(_) => {
                "GATEWAY_MISCONFIGURED"
            }
            GatewayError::Body(BodyError::CapacityExceeded { .. }) => "BODY_TOO_LARGE",
            GatewayError::Body(BodyError::NotSet) => "BODY_NOT_SET",
            GatewayError::Body(BodyError::Cancelled) | GatewayError::Cancelled => {
                "REQUEST_CANCELLED"
            }
            GatewayError::Body(BodyError::Stream(_)) => "BODY_STREAM_FAILED",
            GatewayError::Body(BodyError::Transform(_)) => "BODY_TRANSFORM_FAILED",
            GatewayError::Upstream(_) => "UPSTREAM_FAILURE",
            GatewayError::InvalidRouteDefinition { .. } => "INVALID_ROUTE_DEFINITION",
            GatewayError::InvalidHeaderValue { .. } => "INVALID_HEADER_VALUE",
            GatewayError::InvalidRewrittenUri(_) => "INVALID_REWRITE",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ChainExhausted { .. }
            | GatewayError::Misconfigured(_)
            | GatewayError::InvalidRouteDefinition { .. }
            | GatewayError::InvalidHeaderValue { .. }
            | GatewayError::InvalidRewrittenUri(_)
            | GatewayError::Body(BodyError::NotSet)
            | GatewayError::Body(BodyError::Transform(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Body(BodyError::CapacityExceeded { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            // The client went away; the status is moot but well-defined.
            GatewayError::Body(BodyError::Cancelled) | GatewayError::Cancelled => {
                StatusCode::REQUEST_TIMEOUT
            }
            GatewayError::Body(BodyError::Stream(_)) | GatewayError::Upstream(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

/// Response for the distinguished no-route outcome.
pub fn no_route_response(request_id: RequestId) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        ErrorBody {
            code: "NO_ROUTE_MATCHED".to_string(),
            message: "no route matched the request".to_string(),
            request_id: Some(request_id.to_string()),
        },
    )
}

/// Response for a pipeline error.
pub fn error_response(error: &GatewayError, request_id: RequestId) -> Response<Full<Bytes>> {
    json_response(
        error.status_code(),
        ErrorBody {
            code: error.error_code().to_string(),
            message: error.to_string(),
            request_id: Some(request_id.to_string()),
        },
    )
}

fn json_response(status: StatusCode, body: ErrorBody) -> Response<Full<Bytes>> {
    let request_id = body.request_id.clone();
    let payload = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(id) = request_id {
        if let Ok(value) = HeaderValue::from_str(&id) {
            builder = builder.header(X_REQUEST_ID, value);
        }
    }
    builder
        .body(Full::new(Bytes::from(payload)))
        .expect("status and headers are valid by construction")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misconfiguration_maps_to_internal_error_code() {
        let error = GatewayError::ChainExhausted { index: 4 };
        assert_eq!(error.error_code(), "GATEWAY_MISCONFIGURED");
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_failure_maps_to_bad_gateway() {
        let error = GatewayError::upstream("connection refused");
        assert_eq!(error.error_code(), "UPSTREAM_FAILURE");
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn capacity_exhaustion_is_a_distinct_code() {
        let error = GatewayError::Body(BodyError::CapacityExceeded {
            buffered: 11,
            capacity: 10,
        });
        assert_eq!(error.error_code(), "BODY_TOO_LARGE");
        assert_eq!(error.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn responses_carry_request_id_and_json_body() {
        let request_id = RequestId::new();
        let response = no_route_response(request_id);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"application/json"[..]),
        );
    }
}
