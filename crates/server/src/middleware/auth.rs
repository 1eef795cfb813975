use crate::api::ErrorResponse;
use crate::config::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use toolgate_core::context::TenantId;
use toolgate_mcp::RequestOverrides;

/// Header overriding the tenant of the authenticated actor
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Extract the bearer token from the authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Resolve the caller into request overrides for the MCP endpoint.
///
/// Requests without a token run anonymously; unknown tokens are rejected.
pub async fn resolve_actor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut overrides = RequestOverrides::default();

    if let Some(token) = bearer_token(request.headers()) {
        match state.authenticate(&token) {
            Some((actor, tenant)) => {
                tracing::debug!("Authenticated actor {}", actor.id);
                overrides.actor = Some(actor);
                overrides.tenant = tenant;
            }
            None => {
                tracing::warn!("Rejected request with unknown bearer token");
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new("Unknown bearer token")),
                )
                    .into_response();
            }
        }
    }

    if let Some(tenant) = request
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        overrides.tenant = Some(TenantId::new(tenant));
    }

    request.extensions_mut().insert(overrides);
    next.run(request).await
}
