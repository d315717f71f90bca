//! JSON-RPC envelope types and their mapping onto HTTP responses
//!
//! Every exchange produces one [`McpResponse`]: an HTTP status, an optional
//! JSON-RPC envelope body and the MCP headers.

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rust_mcp_sdk::schema::{ContentBlock, TextContent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use crate::errors::AppError;

pub const JSONRPC_VERSION: &str = "2.0";
pub const MCP_VERSION: &str = "0.6";
pub const MCP_VERSION_HEADER: HeaderName = HeaderName::from_static("mcp-version");
pub const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("mcp-session-id");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Session and otherwise unclassified application failures.
    ServerError,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
        }
    }

    pub fn default_status(self) -> StatusCode {
        match self {
            Self::ParseError | Self::InvalidParams => StatusCode::BAD_REQUEST,
            Self::MethodNotFound => StatusCode::NOT_FOUND,
            Self::InternalError | Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    #[serde(rename = "errorContent", skip_serializing_if = "Option::is_none")]
    pub error_content: Option<Vec<ContentBlock>>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
            error_content: None,
        }
    }

    pub fn error(id: Value, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(RpcError {
                code: code.as_i32(),
                message: message.into(),
            }),
            error_content: None,
        }
    }
}

pub fn text_content(text: impl Into<String>) -> ContentBlock {
    ContentBlock::from(TextContent::new(text.into(), None, None))
}

#[derive(Debug, Clone)]
pub struct McpResponse {
    pub status: StatusCode,
    pub session_id: Option<String>,
    pub body: Option<JsonRpcResponse>,
}

impl McpResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            status: StatusCode::OK,
            session_id: None,
            body: Some(JsonRpcResponse::success(id, result)),
        }
    }

    pub fn error(id: Value, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.default_status(),
            session_id: None,
            body: Some(JsonRpcResponse::error(id, code, message)),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            session_id: None,
            body: None,
        }
    }

    pub fn no_content() -> Self {
        Self::empty(StatusCode::NO_CONTENT)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_error_content(mut self, content: Vec<ContentBlock>) -> Self {
        if let Some(body) = self.body.as_mut() {
            body.error_content = Some(content);
        }
        self
    }

    pub fn is_error(&self) -> bool {
        self.body
            .as_ref()
            .is_some_and(|body| body.error.is_some())
    }

    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if self.body.is_some() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        headers.insert(MCP_VERSION_HEADER, HeaderValue::from_static(MCP_VERSION));
        if let Some(value) = self
            .session_id
            .as_deref()
            .and_then(|id| HeaderValue::from_str(id).ok())
        {
            headers.insert(SESSION_ID_HEADER, value);
        }
        headers
    }
}

impl IntoResponse for McpResponse {
    fn into_response(self) -> Response {
        let headers = self.headers();
        match self.body {
            Some(body) => (self.status, headers, Json(body)).into_response(),
            None => (self.status, headers).into_response(),
        }
    }
}

pub fn app_error_to_response(id: Value, err: AppError) -> McpResponse {
    error!(error = %err, "mcp request failed with internal error");
    let message = match err {
        AppError::SessionStore(_) => "Session store unavailable",
        AppError::Serialization(_) | AppError::Internal(_) => "Internal server error",
    };
    McpResponse::error(id, ErrorCode::ServerError, message)
}
