// Core types and collaborators for the Toolgate MCP gateway

pub mod types;
pub mod context;
pub mod tool;
pub mod error;
pub mod events;
pub mod runner;
pub mod catalog;
pub mod policy;
pub mod rbac;
pub mod serializer;
pub mod memory;

pub use types::*;
