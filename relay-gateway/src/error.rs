//! Error types for the gateway crate.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors that can occur while starting the gateway or handling a request.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// An error propagated from the broker layer.
    #[error("broker error: {0}")]
    Broker(#[from] relay_broker::BrokerError),

    /// A required query parameter was absent.
    #[error("missing query parameter '{0}'")]
    MissingParameter(&'static str),

    /// No response has arrived for the request id (yet).
    #[error("no response for request {0}")]
    ResponseNotFound(String),

    /// The request body is malformed or contains invalid values.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Broker(_) | GatewayError::MissingParameter(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::ResponseNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}
