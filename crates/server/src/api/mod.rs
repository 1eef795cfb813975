use crate::config::{AppState, ServerConfig};
use crate::middleware::auth;
use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Start the API server
pub async fn serve(addr: &str, config: ServerConfig) -> Result<()> {
    let state = AppState::new(&config)?;

    let app = create_router(state, &config.server.path);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);
    tracing::info!("MCP endpoint at http://{}{}", addr, config.server.path);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
pub fn create_router(state: AppState, mcp_path: &str) -> Router {
    let mcp = toolgate_mcp::transport::router(state.mcp.clone(), mcp_path).layer(
        axum::middleware::from_fn_with_state(state, auth::resolve_actor),
    );

    Router::new()
        .route("/health", get(health_check))
        .merge(mcp)
        // Middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "toolgate",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::SAMPLE;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let config = ServerConfig::parse(SAMPLE).unwrap();
        let state = AppState::new(&config).unwrap();
        create_router(state, &config.server.path)
    }

    fn rpc(method: &str, params: Value) -> String {
        json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}).to_string()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["service"], "toolgate");
    }

    #[tokio::test]
    async fn test_authenticated_actor_sees_permitted_tools() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::AUTHORIZATION, "Bearer secret")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(rpc("tools/list", json!({}))))
            .unwrap();
        let body = json_body(app().oneshot(request).await.unwrap()).await;
        assert_eq!(body["result"]["tools"][0]["name"], "list_artists");
    }

    #[tokio::test]
    async fn test_anonymous_actor_sees_nothing() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(rpc("tools/list", json!({}))))
            .unwrap();
        let body = json_body(app().oneshot(request).await.unwrap()).await;
        assert_eq!(body["result"]["tools"], json!([]));
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::from(rpc("tools/list", json!({}))))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_tool_call_and_resource_read() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::AUTHORIZATION, "Bearer secret")
            .body(Body::from(
                json!([
                    {"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                     "params": {"name": "list_artists", "arguments": {"sort": [{"field": "name"}]}}},
                    {"jsonrpc": "2.0", "id": 2, "method": "resources/read",
                     "params": {"uri": "file://artists/summary"}}
                ])
                .to_string(),
            ))
            .unwrap();
        let body = json_body(app().oneshot(request).await.unwrap()).await;

        let text = body[0]["result"]["content"][0]["text"].as_str().unwrap();
        let records: Value = serde_json::from_str(text).unwrap();
        assert_eq!(records[0]["name"], "Bjork");
        assert_eq!(body[1]["result"]["contents"][0]["text"], "artist has 2 records");
    }
}
