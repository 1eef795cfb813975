// Failures of the MCP layer that sit outside the domain error payloads

use std::path::PathBuf;
use toolgate_core::error::ActionError;

/// A tool call that could not run to completion
#[derive(Debug, thiserror::Error)]
pub enum ExecutionFault {
    #[error("on_tool_start callback failed: {0}")]
    StartCallback(String),

    #[error("on_tool_end callback failed: {0}")]
    EndCallback(String),
}

/// Failure to produce the content of a resource
#[derive(Debug, thiserror::Error)]
pub enum ResourceReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Action(#[from] ActionError),

    #[error("unknown action {entity}.{action}")]
    UnknownAction { entity: String, action: String },
}
