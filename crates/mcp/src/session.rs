// Session identifiers for the streamable HTTP transport

/// Header carrying the session id in both directions
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Mints and accepts session ids.
///
/// Sessions are not stored: a client-provided id is accepted as-is and
/// termination only checks that one was supplied.
#[derive(Debug, Clone, Default)]
pub struct SessionManager;

impl SessionManager {
    pub fn new() -> Self {
        Self
    }

    /// Reuse the client's session id, or mint a fresh one
    pub fn ensure(&self, existing: Option<&str>) -> String {
        match existing.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                tracing::info!("Started MCP session {}", id);
                id
            }
        }
    }

    /// Returns false when there is no session to terminate
    pub fn terminate(&self, session_id: Option<&str>) -> bool {
        match session_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => {
                tracing::info!("Terminated MCP session {}", id);
                true
            }
            None => false,
        }
    }
}
