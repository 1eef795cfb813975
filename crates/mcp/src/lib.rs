// Model Context Protocol surface for Toolgate
// Exposes catalog actions as MCP tools and resources over JSON-RPC

pub mod error;
pub mod executor;
pub mod options;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod server;
pub mod session;
pub mod toolkit;
pub mod transport;

#[cfg(test)]
mod fixtures;

pub use error::{ExecutionFault, ResourceReadError};
pub use executor::{Executor, ToolOutcome};
pub use options::{
    ActionRef, ActionScope, InvocationContext, McpOptions, NameFilter, RequestOverrides,
};
pub use registry::{Registry, ResolvedTool};
pub use server::{Collaborators, DispatchOutcome, McpServer};
pub use session::{SessionManager, SESSION_HEADER};
pub use toolkit::{FunctionSpec, ToolCallResult, Toolkit};
