// Streamable HTTP transport: POST for messages, GET for SSE, DELETE to end a session

use crate::options::RequestOverrides;
use crate::server::McpServer;
use crate::session::SESSION_HEADER;
use axum::{
    extract::{OriginalUri, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use url::Url;

/// Upper bound on a POST body
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

const EVENT_STREAM: &str = "text/event-stream";

/// Mount the MCP endpoint at `path`.
///
/// Middleware may insert a [`RequestOverrides`] extension to carry the
/// resolved actor, tenant and filters into each request.
pub fn router(server: Arc<McpServer>, path: &str) -> Router {
    Router::new()
        .route(
            path,
            get(open_stream).post(handle_post).delete(terminate_session),
        )
        .with_state(server)
}

async fn handle_post(State(server): State<Arc<McpServer>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let overrides = request_overrides(&parts);

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read MCP request body: {}", e);
            return (StatusCode::BAD_REQUEST, "Unreadable request body").into_response();
        }
    };

    let outcome = server.handle_payload(&bytes, overrides).await;
    let Some(body) = outcome.body else {
        return StatusCode::ACCEPTED.into_response();
    };

    let mut response = Json(body).into_response();
    if let Some(session_id) = outcome.session_id {
        match HeaderValue::from_str(&session_id) {
            Ok(value) => {
                response.headers_mut().insert(SESSION_HEADER, value);
            }
            Err(e) => tracing::warn!("Session id {} is not a valid header: {}", session_id, e),
        }
    }
    response
}

async fn open_stream(State(server): State<Arc<McpServer>>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();

    let accepts_sse = parts
        .headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(EVENT_STREAM));
    if !accepts_sse {
        return (
            StatusCode::BAD_REQUEST,
            "GET requires Accept: text/event-stream",
        )
            .into_response();
    }

    let overrides = request_overrides(&parts);
    let url = overrides.server_url.unwrap_or_default();
    let guard = StreamGuard {
        session_id: overrides.session_id,
    };
    tracing::info!(
        "SSE client connected (session {})",
        guard.session_id.as_deref().unwrap_or("none")
    );

    let endpoint = Event::default()
        .event("endpoint")
        .data(json!({ "url": url }).to_string());
    let events = stream::once(async move { Ok::<_, Infallible>(endpoint) })
        .chain(stream::pending())
        .map(move |event| {
            let _connected = &guard;
            event
        });

    Sse::new(events)
        .keep_alive(
            KeepAlive::new()
                .interval(server.options().keep_alive)
                .text("ping"),
        )
        .into_response()
}

async fn terminate_session(State(server): State<Arc<McpServer>>, headers: HeaderMap) -> StatusCode {
    let session_id = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok());
    if server.sessions().terminate(session_id) {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

/// Logs the disconnect when the SSE stream is dropped
struct StreamGuard {
    session_id: Option<String>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        tracing::info!(
            "SSE client disconnected (session {})",
            self.session_id.as_deref().unwrap_or("none")
        );
    }
}

/// Overrides from middleware, completed with the session header and the
/// externally visible URL of this endpoint
fn request_overrides(parts: &Parts) -> RequestOverrides {
    let mut overrides = parts
        .extensions
        .get::<RequestOverrides>()
        .cloned()
        .unwrap_or_default();

    if overrides.session_id.is_none() {
        overrides.session_id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
    }
    if overrides.server_url.is_none() {
        overrides.server_url = Some(server_url(parts));
    }
    overrides
}

/// `scheme://host/path`, preferring `x-forwarded-proto` for the scheme
fn server_url(parts: &Parts) -> String {
    let scheme = parts
        .headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .or_else(|| parts.uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string());

    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string());

    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    match Url::parse(&format!("{}://{}", scheme, host)) {
        Ok(mut url) => {
            url.set_path(&path);
            url.to_string()
        }
        Err(e) => {
            tracing::debug!("Unparseable server URL {}://{}: {}", scheme, host, e);
            format!("{}://{}{}", scheme, host, path)
        }
    }
}
