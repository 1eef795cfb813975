// Exposed tools and MCP content resources

use crate::types::Argument;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Relations and fields to eagerly include in a tool's result
#[derive(Clone, Default)]
pub enum LoadSpec {
    #[default]
    None,
    Static(Vec<String>),
    /// Computed from the raw call arguments
    Dynamic(Arc<dyn Fn(&Map<String, Value>) -> Vec<String> + Send + Sync>),
}

impl LoadSpec {
    pub fn resolve(&self, arguments: &Map<String, Value>) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::Static(load) => load.clone(),
            Self::Dynamic(f) => f(arguments),
        }
    }
}

impl fmt::Debug for LoadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Static(load) => f.debug_tuple("Static").field(load).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Uniqueness key used to find the target record of an update or destroy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdentityTarget {
    /// Match on the entity's primary key
    #[default]
    PrimaryKey,
    /// Match on a named identity's keys
    Named(String),
    /// Never build an identity filter
    Disabled,
}

/// A callable action exposed to agents
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    pub entity: String,
    pub action: String,
    pub description: Option<String>,
    pub load: LoadSpec,
    pub identity: IdentityTarget,
    /// Extra arguments not declared on the underlying action
    pub arguments: Vec<Argument>,
    /// Passed through to clients as `_meta`
    pub metadata: Map<String, Value>,
    pub ui_resource: Option<String>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        entity: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            action: action.into(),
            description: None,
            load: LoadSpec::None,
            identity: IdentityTarget::PrimaryKey,
            arguments: Vec::new(),
            metadata: Map::new(),
            ui_resource: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_load(mut self, load: LoadSpec) -> Self {
        self.load = load;
        self
    }

    pub fn with_identity(mut self, identity: IdentityTarget) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_ui_resource(mut self, uri: impl Into<String>) -> Self {
        self.ui_resource = Some(uri.into());
        self
    }
}

/// Resource whose content is produced by a string-returning action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResource {
    pub name: String,
    pub uri: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_text_mime_type")]
    pub mime_type: String,
    pub entity: String,
    pub action: String,
}

/// How the sandbox domain of a UI resource is advertised
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainMode {
    /// Derived from the origin of the serving URL
    Auto,
    Explicit(String),
    #[default]
    Omitted,
}

/// Content-security-policy directives requested by a UI resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct CspDirectives {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connect_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frame_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub base_uri_domains: Vec<String>,
}

impl CspDirectives {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Static HTML widget served from a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiResource {
    pub name: String,
    pub uri: String,
    pub html_path: PathBuf,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub csp: CspDirectives,
    /// Sandbox permissions, e.g. `camera` or `clipboard_write`
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub domain: DomainMode,
    #[serde(default)]
    pub prefers_border: Option<bool>,
}

pub const UI_RESOURCE_SCHEME: &str = "ui://";
pub const UI_RESOURCE_MIME_TYPE: &str = "text/html;profile=mcp-app";

/// Either kind of MCP content resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum McpResource {
    Action(ActionResource),
    Ui(UiResource),
}

impl McpResource {
    pub fn name(&self) -> &str {
        match self {
            Self::Action(r) => &r.name,
            Self::Ui(r) => &r.name,
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Self::Action(r) => &r.uri,
            Self::Ui(r) => &r.uri,
        }
    }
}

fn default_text_mime_type() -> String {
    "text/plain".to_string()
}
