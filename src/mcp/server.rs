//! The MCP protocol router
//!
//! Every exchange runs inside a fresh [`context::scope`] and yields exactly one
//! [`McpResponse`].

use std::panic::AssertUnwindSafe;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode},
};
use axum_extra::headers::{ContentType, HeaderMapExt};
use futures::FutureExt;
use rust_mcp_sdk::schema::{CallToolResult, ListToolsResult};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::mcp::context;
use crate::mcp::rpc::{
    app_error_to_response, text_content, ErrorCode, JsonRpcRequest, McpResponse,
    SESSION_ID_HEADER,
};
use crate::tools::{panic_message, ToolCallOutcome, ToolContext};
use crate::AppState;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone)]
pub struct McpRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

pub async fn handle_request(state: &AppState, request: McpRequest) -> McpResponse {
    context::scope(async {
        let mut response = match AssertUnwindSafe(route_request(state, request))
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(panic) => app_error_to_response(
                Value::Null,
                AppError::internal(panic_message(panic.as_ref())),
            ),
        };
        if response.session_id.is_none() {
            response.session_id = context::current_session_id();
        }
        response
    })
    .await
}

pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .typed_get::<ContentType>()
        .map(mime::Mime::from)
        .is_some_and(|content_type| {
            content_type.essence_str() == mime::APPLICATION_JSON.essence_str()
        })
}

async fn route_request(state: &AppState, request: McpRequest) -> McpResponse {
    let session_id = session_id_from_headers(&request.headers);

    if request.method == Method::DELETE {
        return match session_id {
            Some(session_id) => delete_session(state, &session_id).await,
            None => McpResponse::error(Value::Null, ErrorCode::ServerError, "Session required")
                .with_status(StatusCode::BAD_REQUEST),
        };
    }

    if !is_json_content(&request.headers) {
        return McpResponse::error(Value::Null, ErrorCode::ParseError, "Parse error");
    }

    let payload: Value = match serde_json::from_slice(&request.body) {
        Ok(value) => value,
        Err(_) => return McpResponse::error(Value::Null, ErrorCode::ParseError, "Parse error"),
    };

    let Some(envelope) = payload
        .as_object()
        .filter(|object| object.contains_key("jsonrpc") && object.contains_key("method"))
    else {
        return McpResponse::error(Value::Null, ErrorCode::ParseError, "Parse error");
    };

    if !envelope.contains_key("id") {
        return McpResponse::no_content();
    }

    let raw_id = envelope.get("id").cloned().unwrap_or(Value::Null);
    let rpc_request: JsonRpcRequest = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(_) => return McpResponse::error(raw_id, ErrorCode::ParseError, "Parse error"),
    };

    let id = rpc_request.id.clone().unwrap_or(Value::Null);
    let dispatched = AssertUnwindSafe(dispatch(state, id.clone(), rpc_request, session_id))
        .catch_unwind()
        .await;
    match dispatched {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => app_error_to_response(id, err),
        Err(panic) => app_error_to_response(id, AppError::internal(panic_message(panic.as_ref()))),
    }
}

async fn delete_session(state: &AppState, session_id: &str) -> McpResponse {
    match state.session_store.delete(session_id).await {
        Ok(true) => {
            info!(session_id, "session deleted");
            McpResponse::no_content()
        }
        Ok(false) => {
            warn!(session_id, "delete requested for unknown session");
            McpResponse::empty(StatusCode::NOT_FOUND)
        }
        Err(err) => app_error_to_response(Value::Null, err.into()),
    }
}

async fn dispatch(
    state: &AppState,
    id: Value,
    request: JsonRpcRequest,
    session_id: Option<String>,
) -> Result<McpResponse, AppError> {
    if request.method == "initialize" {
        return initialize(state, id).await;
    }

    match session_id {
        Some(session_id) => {
            if state.session_store.get(&session_id).await?.is_none() {
                warn!(session_id = %session_id, method = %request.method, "invalid or expired session");
                return Ok(McpResponse::error(
                    id,
                    ErrorCode::ServerError,
                    "Invalid or expired session",
                )
                .with_status(StatusCode::NOT_FOUND));
            }
            context::set_current_session_id(session_id);
        }
        None if !state.session_store.is_noop() => {
            warn!(method = %request.method, "request without session rejected");
            return Ok(
                McpResponse::error(id, ErrorCode::ServerError, "Session required")
                    .with_status(StatusCode::BAD_REQUEST),
            );
        }
        None => {}
    }

    let audit_params = redact_audit_params(request.params.as_ref());
    let response = match request.method.as_str() {
        "tools/list" => {
            let result = ListToolsResult {
                meta: None,
                next_cursor: None,
                tools: state.registry.list(),
            };
            McpResponse::result(id, serde_json::to_value(result)?)
        }
        "tools/call" => call_tool(state, id, request.params).await?,
        "ping" => McpResponse::result(id, json!({})),
        method => McpResponse::error(
            id,
            ErrorCode::MethodNotFound,
            format!("Method not found: {method}"),
        ),
    };

    info!(
        method = %request.method,
        params = %audit_params,
        outcome = if response.is_error() { "failure" } else { "success" },
        "mcp action audited"
    );

    Ok(response)
}

async fn initialize(state: &AppState, id: Value) -> Result<McpResponse, AppError> {
    let session_id = state.session_store.create().await?;
    info!(session_id = %session_id, "session created");
    context::set_current_session_id(session_id);

    Ok(McpResponse::result(id, initialize_result()))
}

pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {
            "tools": {
                "list": true,
                "call": true
            }
        }
    })
}

async fn call_tool(
    state: &AppState,
    id: Value,
    params: Option<Map<String, Value>>,
) -> Result<McpResponse, AppError> {
    let Some(call) = params
        .map(Value::Object)
        .and_then(|params| serde_json::from_value::<ToolCallParams>(params).ok())
    else {
        return Ok(McpResponse::error(id, ErrorCode::InvalidParams, "Invalid params"));
    };

    let Some(tool) = state.registry.get(&call.name) else {
        return Ok(McpResponse::error(
            id,
            ErrorCode::MethodNotFound,
            format!("Tool not found: {}", call.name),
        ));
    };

    let arguments = match tool.bind_arguments(call.arguments.unwrap_or_default()) {
        Ok(arguments) => arguments,
        Err(err) => {
            return Ok(McpResponse::error(
                id,
                ErrorCode::InvalidParams,
                format!("Invalid params: {err}"),
            ))
        }
    };

    let tool_context = ToolContext::new(context::current_session_id(), state.session_store.clone());
    match tool.invoke(arguments, tool_context).await {
        ToolCallOutcome::Completed(text) => {
            let result = CallToolResult {
                content: vec![text_content(text)],
                is_error: None,
                meta: None,
                structured_content: None,
            };
            Ok(McpResponse::result(id, serde_json::to_value(result)?))
        }
        ToolCallOutcome::Failed(err) => {
            error!(tool = %call.name, error = %err, "tool invocation failed");
            Ok(
                McpResponse::error(id, ErrorCode::InternalError, "Internal error")
                    .with_error_content(vec![text_content(err.to_string())]),
            )
        }
    }
}

// Argument values may be session data, so only argument names are logged.
pub fn redact_audit_params(params: Option<&Map<String, Value>>) -> Value {
    let Some(params) = params else {
        return Value::Null;
    };
    let mut redacted = redact_audit_value(&Value::Object(params.clone()));
    if let Some(Value::Object(arguments)) = redacted.get_mut("arguments") {
        for value in arguments.values_mut() {
            *value = Value::String("[REDACTED]".to_string());
        }
    }
    redacted
}

fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    let item = if is_sensitive_key(key) {
                        Value::String("[REDACTED]".to_string())
                    } else {
                        redact_audit_value(item)
                    };
                    (key.clone(), item)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    ["token", "secret", "password", "credential", "api_key", "apikey", "authorization"]
        .iter()
        .any(|marker| normalized.contains(marker))
}
