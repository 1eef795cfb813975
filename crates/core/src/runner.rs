// Action runner collaborator: executes entity actions with typed inputs

use crate::context::{Actor, TenantId};
use crate::error::ActionError;
use crate::types::ActionType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Aggregate function over a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl AggregateKind {
    pub const ALL: [&'static str; 5] = ["min", "max", "sum", "avg", "count"];

    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "count" => Some(Self::Count),
            _ => None,
        }
    }
}

/// What a read should produce
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReadResult {
    #[default]
    Records,
    Count,
    Exists,
    Aggregate { kind: AggregateKind, field: String },
}

/// Query parameters of a read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadQuery {
    /// Field name to operator object, e.g. `{"name": {"eq": "Nina"}}`
    pub filter: Map<String, Value>,
    /// Comma-joined sort specifier, `-` prefix for descending
    pub sort: Option<String>,
    /// Arguments for sortable calculations, keyed by field
    pub sort_input: Map<String, Value>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub result: ReadResult,
}

/// Options accompanying every invocation
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub domain: String,
    pub actor: Option<Actor>,
    pub tenant: Option<TenantId>,
    pub context: Map<String, Value>,
    /// Relationships and fields to eagerly include
    pub load: Vec<String>,
    pub query: Option<ReadQuery>,
    /// Key/value equality filter locating the target of a bulk update or destroy
    pub target: Option<Vec<(String, Value)>>,
    /// Upper bound on records touched by a bulk update or destroy
    pub target_limit: Option<u64>,
}

/// A single action invocation
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub entity: String,
    pub action: String,
    pub action_type: ActionType,
    pub input: Map<String, Value>,
    pub options: InvokeOptions,
}

/// Typed result of an invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutput {
    Records(Vec<Value>),
    Count(u64),
    Exists(bool),
    Aggregate(Value),
    /// A single created record
    Record(Value),
    /// Records touched by a bulk update or destroy
    Affected(Vec<Value>),
    /// Return value of a generic action
    Value(Value),
}

impl ActionOutput {
    /// Raw JSON view of the output, before serialization
    pub fn to_value(&self) -> Value {
        match self {
            Self::Records(records) | Self::Affected(records) => Value::Array(records.clone()),
            Self::Count(count) => Value::from(*count),
            Self::Exists(exists) => Value::Bool(*exists),
            Self::Aggregate(value) | Self::Record(value) | Self::Value(value) => value.clone(),
        }
    }
}

/// Executes actions on behalf of the MCP layer
#[async_trait::async_trait]
pub trait ActionRunner: Send + Sync {
    async fn invoke(&self, request: ActionRequest) -> Result<ActionOutput, ActionError>;
}
