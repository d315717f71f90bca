use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod session;
pub mod tools;

use session::SessionStore;
use tools::ToolRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub session_store: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(registry: ToolRegistry, session_store: Arc<dyn SessionStore>) -> Self {
        Self {
            registry: Arc::new(registry),
            session_store,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .route(
            "/mcp",
            post(http::handlers::mcp_endpoint).delete(http::handlers::mcp_endpoint),
        )
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, Response, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::domain::tools::register_builtin_tools;
    use crate::mcp::rpc::{MCP_VERSION, MCP_VERSION_HEADER, SESSION_ID_HEADER};
    use crate::session::{MemorySessionStore, NoopSessionStore};
    use crate::tools::{ToolBuilder, ToolError, WireEnum};

    use super::*;

    crate::wire_enum! {
        enum Level {
            Low => "low",
            High => "high",
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry).expect("register builtin tools");
        registry
            .register(
                ToolBuilder::new("rate_alert")
                    .doc("Rate an alert.\n\nArgs:\n    level: Alert level\n")
                    .enum_param::<Level>("level")
                    .handler(|args, _ctx| async move {
                        let level: Level = args.enum_value("level")?;
                        Ok(Value::String(format!("rated {}", level.wire_value())))
                    }),
            )
            .expect("register rate_alert");
        registry
            .register(
                ToolBuilder::new("validate_input")
                    .handler(|_args, _ctx| async { Err(ToolError::failed("bad input")) }),
            )
            .expect("register validate_input");
        registry
    }

    fn app() -> Router {
        build_app(AppState::new(
            registry(),
            Arc::new(MemorySessionStore::default()),
        ))
    }

    fn sessionless_app() -> Router {
        build_app(AppState::new(registry(), Arc::new(NoopSessionStore::new())))
    }

    fn rpc_request(body: &str, session_id: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .uri("/mcp")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(session_id) = session_id {
            builder = builder.header(SESSION_ID_HEADER.as_str(), session_id);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request build")
    }

    fn delete_request(session_id: &str) -> Request<Body> {
        Request::builder()
            .uri("/mcp")
            .method("DELETE")
            .header(SESSION_ID_HEADER.as_str(), session_id)
            .body(Body::empty())
            .expect("request build")
    }

    async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone()
            .oneshot(request)
            .await
            .expect("request execution")
    }

    async fn body_bytes(response: Response<Body>) -> axum::body::Bytes {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
    }

    async fn body_json(response: Response<Body>) -> Value {
        serde_json::from_slice(&body_bytes(response).await).expect("valid json response")
    }

    fn session_header(response: &Response<Body>) -> Option<String> {
        response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    async fn initialize(app: &Router) -> String {
        let response = send(
            app,
            rpc_request(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#, None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        session_header(&response).expect("session id header")
    }

    fn tool_call(id: u32, name: &str, arguments: Value) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
        .to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = send(
            &app(),
            Request::builder()
                .uri("/health")
                .method("GET")
                .body(Body::empty())
                .expect("request build"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, "{\"status\":\"ok\"}");
    }

    #[tokio::test]
    async fn discovery_reports_endpoint_and_session_mode() {
        let request = || {
            Request::builder()
                .uri("/.well-known/mcp")
                .method("GET")
                .body(Body::empty())
                .expect("request build")
        };

        let body = body_json(send(&app(), request()).await).await;
        assert_eq!(body["mcp_endpoint"], "/mcp");
        assert_eq!(body["session_required"], true);

        let body = body_json(send(&sessionless_app(), request()).await).await;
        assert_eq!(body["session_required"], false);
    }

    #[tokio::test]
    async fn initialize_creates_session_and_returns_capabilities() {
        let response = send(
            &app(),
            rpc_request(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#, None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[MCP_VERSION_HEADER], MCP_VERSION);
        assert!(session_header(&response).is_some());

        let body = body_json(response).await;
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], 1);
        assert!(body["result"]["protocolVersion"].is_string());
        assert_eq!(body["result"]["serverInfo"]["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(
            body["result"]["capabilities"]["tools"],
            json!({"list": true, "call": true})
        );
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn consecutive_initialize_calls_mint_distinct_sessions() {
        let app = app();
        let first = initialize(&app).await;
        let second = initialize(&app).await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn initialize_ignores_stale_session_header() {
        let response = send(
            &app(),
            rpc_request(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
                Some("expired-session"),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let session_id = session_header(&response).expect("session id header");
        assert_ne!(session_id, "expired-session");
    }

    #[tokio::test]
    async fn unknown_tool_returns_not_found() {
        let app = app();
        let session_id = initialize(&app).await;

        let response = send(
            &app,
            rpc_request(&tool_call(2, "doSomething", json!({})), Some(&session_id)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(session_header(&response).as_deref(), Some(session_id.as_str()));
        let body = body_json(response).await;
        assert_eq!(body["id"], 2);
        assert_eq!(body["error"]["code"], -32601);
        assert!(body["error"]["message"]
            .as_str()
            .expect("message")
            .contains("doSomething"));
    }

    #[tokio::test]
    async fn failing_tool_returns_internal_error_with_content() {
        let app = app();
        let session_id = initialize(&app).await;

        let response = send(
            &app,
            rpc_request(&tool_call(2, "validateInput", json!({})), Some(&session_id)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32603);
        assert!(body["errorContent"][0]["text"]
            .as_str()
            .expect("error content text")
            .contains("bad input"));
        assert!(body.get("result").is_none());
    }

    #[tokio::test]
    async fn notification_returns_no_content() {
        for method in ["ping", "notifications/initialized", "tools/call", "made/up"] {
            let body = json!({"jsonrpc": "2.0", "method": method}).to_string();
            let response = send(&app(), rpc_request(&body, None)).await;

            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert!(body_bytes(response).await.is_empty());
        }
    }

    #[tokio::test]
    async fn expired_session_is_rejected_before_dispatch() {
        let response = send(
            &app(),
            rpc_request(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#,
                Some("no-such-session"),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["id"], 3);
        assert_eq!(body["error"]["code"], -32000);
        assert_eq!(body["error"]["message"], "Invalid or expired session");
    }

    #[tokio::test]
    async fn missing_session_is_rejected_when_store_is_real() {
        let response = send(
            &app(),
            rpc_request(r#"{"jsonrpc":"2.0","id":4,"method":"ping"}"#, None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32000);
        assert_eq!(body["error"]["message"], "Session required");
    }

    #[tokio::test]
    async fn noop_store_permits_sessionless_requests() {
        let response = send(
            &sessionless_app(),
            rpc_request(r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#, None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_header(&response).is_none());
        let body = body_json(response).await;
        assert_eq!(body["id"], "p");
        assert_eq!(body["result"], json!({}));
    }

    #[tokio::test]
    async fn delete_session_then_repeat_returns_not_found() {
        let app = app();
        let session_id = initialize(&app).await;

        let response = send(&app, delete_request(&session_id)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(body_bytes(response).await.is_empty());

        let response = send(&app, delete_request(&session_id)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_bytes(response).await.is_empty());

        let response = send(
            &app,
            rpc_request(r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#, Some(&session_id)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_without_session_is_bad_request() {
        let response = send(
            &app(),
            Request::builder()
                .uri("/mcp")
                .method("DELETE")
                .body(Body::empty())
                .expect("request build"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], -32000);
    }

    #[tokio::test]
    async fn non_json_content_type_is_parse_error() {
        let response = send(
            &app(),
            Request::builder()
                .uri("/mcp")
                .method("POST")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#))
                .expect("request build"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
        assert!(body["id"].is_null());
    }

    #[tokio::test]
    async fn malformed_json_is_parse_error() {
        let response = send(&app(), rpc_request("{not json", None)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn unknown_method_returns_not_found() {
        let app = app();
        let session_id = initialize(&app).await;

        let response = send(
            &app,
            rpc_request(
                r#"{"jsonrpc":"2.0","id":6,"method":"resources/list"}"#,
                Some(&session_id),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32601);
        assert_eq!(body["error"]["message"], "Method not found: resources/list");
    }

    #[tokio::test]
    async fn tools_list_is_stable_across_reads() {
        let app = app();
        let session_id = initialize(&app).await;
        let list = r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#;

        let first = body_json(send(&app, rpc_request(list, Some(&session_id))).await).await;
        let second = body_json(send(&app, rpc_request(list, Some(&session_id))).await).await;

        assert_eq!(first["result"], second["result"]);
        let names: Vec<&str> = first["result"]["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert_eq!(
            names,
            vec!["echoText", "rememberValue", "recallValue", "rateAlert", "validateInput"]
        );
        let rate_alert = &first["result"]["tools"][3];
        assert_eq!(rate_alert["description"], "Rate an alert.");
        assert_eq!(rate_alert["inputSchema"]["type"], "object");
        assert_eq!(rate_alert["inputSchema"]["required"], json!(["level"]));
        assert_eq!(
            rate_alert["inputSchema"]["properties"]["level"],
            json!({"type": "string", "description": "Alert level", "enum": ["low", "high"]})
        );
        assert!(first["result"].get("nextCursor").is_none());
    }

    #[tokio::test]
    async fn enum_argument_is_converted_or_rejected() {
        let app = app();
        let session_id = initialize(&app).await;

        let response = send(
            &app,
            rpc_request(
                &tool_call(8, "rateAlert", json!({"level": "high"})),
                Some(&session_id),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["result"]["content"][0]["type"], "text");
        assert_eq!(body["result"]["content"][0]["text"], "rated high");

        let response = send(
            &app,
            rpc_request(
                &tool_call(9, "rateAlert", json!({"level": "medium"})),
                Some(&session_id),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32602);
        assert!(body.get("result").is_none());
    }

    #[tokio::test]
    async fn tools_call_without_name_is_invalid_params() {
        let app = app();
        let session_id = initialize(&app).await;

        let response = send(
            &app,
            rpc_request(
                r#"{"jsonrpc":"2.0","id":10,"method":"tools/call","params":{"arguments":{}}}"#,
                Some(&session_id),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn session_data_is_isolated_between_sessions() {
        let app = app();
        let alice = initialize(&app).await;
        let bob = initialize(&app).await;

        let response = send(
            &app,
            rpc_request(
                &tool_call(11, "rememberValue", json!({"key": "color", "value": "blue"})),
                Some(&alice),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            rpc_request(&tool_call(12, "recallValue", json!({"key": "color"})), Some(&alice)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["result"]["content"][0]["text"], "blue");

        let response = send(
            &app,
            rpc_request(&tool_call(13, "recallValue", json!({"key": "color"})), Some(&bob)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32603);
        assert!(!body.to_string().contains("blue"));
    }

    #[tokio::test]
    async fn get_on_mcp_is_not_allowed() {
        let response = send(
            &app(),
            Request::builder()
                .uri("/mcp")
                .method("GET")
                .body(Body::empty())
                .expect("request build"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
