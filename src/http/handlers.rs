//! Axum HTTP handlers for the web server
//!
//! `POST /mcp` and `DELETE /mcp` both hand the raw exchange to the protocol
//! router; the router alone decides status, headers and body.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method},
    Json,
};
use serde::Serialize;

use crate::mcp::rpc::McpResponse;
use crate::mcp::server::{handle_request, McpRequest, PROTOCOL_VERSION};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub mcp_endpoint: &'static str,
    pub protocol_version: &'static str,
    pub session_required: bool,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        mcp_endpoint: "/mcp",
        protocol_version: PROTOCOL_VERSION,
        session_required: !state.session_store.is_noop(),
    })
}

pub async fn mcp_endpoint(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> McpResponse {
    handle_request(
        &state,
        McpRequest {
            method,
            headers,
            body,
        },
    )
    .await
}
