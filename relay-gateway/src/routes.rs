//! Axum route handlers for the relay gateway API.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use relay_core::{text_options, GatewayState, WorkResponse};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{error::GatewayError, gateway::Gateway};

// ── Shared state ─────────────────────────────────────────────────────────────

type SharedGateway = Arc<Gateway>;

// ── Request types ────────────────────────────────────────────────────────────

/// Body of `POST /api/send-request`. Missing flags default to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendRequestBody {
    pub text: String,
    #[serde(default)]
    pub uppercase: bool,
    #[serde(default)]
    pub reverse: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveResponseQuery {
    pub request: Option<String>,
}

/// Parse a send-request body, whatever content type it was sent with.
///
/// # Errors
/// Returns [`GatewayError::InvalidRequest`] if the bytes are not a JSON
/// object with a string `text` field.
pub fn parse_send_request(body: &[u8]) -> Result<SendRequestBody, GatewayError> {
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("unreadable request body: {e}")))
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router around `gateway`.
pub fn create_router(gateway: SharedGateway) -> Router {
    Router::new()
        .route("/api/send-request", post(send_request))
        .route("/api/receive-response", get(receive_response))
        .route("/api/data", get(data))
        .route("/health", get(health))
        .with_state(gateway)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /health`: liveness probe.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// `POST /api/send-request`: queue a text for processing and return its id.
///
/// Answers `202 Accepted` with the request id as plain text; the request
/// may not have reached the broker yet.
///
/// # Errors
/// Returns [`GatewayError::InvalidRequest`] if the body cannot be parsed.
pub async fn send_request(
    State(gateway): State<SharedGateway>,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let body = parse_send_request(&body)?;
    let id = gateway.submit(body.text, text_options(body.uppercase, body.reverse));
    Ok((StatusCode::ACCEPTED, String::from(id)))
}

/// `GET /api/receive-response?request=<id>`: fetch the response for a request.
///
/// # Errors
/// Returns [`GatewayError::MissingParameter`] without a `request` parameter
/// and [`GatewayError::ResponseNotFound`] while no response has arrived.
pub async fn receive_response(
    State(gateway): State<SharedGateway>,
    Query(query): Query<ReceiveResponseQuery>,
) -> Result<Json<WorkResponse>, GatewayError> {
    let request_id = query.request.ok_or(GatewayError::MissingParameter("request"))?;
    gateway.poll(&request_id).map(Json).ok_or(GatewayError::ResponseNotFound(request_id))
}

/// `GET /api/data`: snapshot of requests, responses and live workers.
pub async fn data(State(gateway): State<SharedGateway>) -> Json<GatewayState> {
    Json(gateway.snapshot())
}
