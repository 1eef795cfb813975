use crate::context::{Actor, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Emitted before a tool call is dispatched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStartEvent {
    pub id: String,
    pub tool_name: String,
    pub action: String,
    pub entity: String,
    pub arguments: Value,
    pub actor: Option<Actor>,
    pub tenant: Option<TenantId>,
    pub timestamp: DateTime<Utc>,
}

impl ToolStartEvent {
    pub fn new(
        tool_name: impl Into<String>,
        entity: impl Into<String>,
        action: impl Into<String>,
        arguments: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            action: action.into(),
            entity: entity.into(),
            arguments,
            actor: None,
            tenant: None,
            timestamp: Utc::now(),
        }
    }
}

/// Result of a finished tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcomeSummary {
    Ok { result: String },
    Error { error: String },
}

/// Emitted after a tool call completes, successfully or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEndEvent {
    /// Matches the id of the corresponding start event
    pub id: String,
    pub tool_name: String,
    pub outcome: ToolOutcomeSummary,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ToolEndEvent {
    pub fn new(start: &ToolStartEvent, outcome: ToolOutcomeSummary) -> Self {
        let now = Utc::now();
        let duration_ms = (now - start.timestamp).num_milliseconds().max(0) as u64;
        Self {
            id: start.id.clone(),
            tool_name: start.tool_name.clone(),
            outcome,
            duration_ms,
            timestamp: now,
        }
    }
}
