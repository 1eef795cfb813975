// Exposure options, per-request overrides, and the merged invocation context

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use toolgate_core::catalog::ActionCatalog;
use toolgate_core::context::{Actor, TenantId};
use toolgate_core::error::ConfigError;
use toolgate_core::events::{ToolEndEvent, ToolStartEvent};
use toolgate_core::rbac::WILDCARD;

/// Context key under which the MCP session id reaches the runner
pub const SESSION_CONTEXT_KEY: &str = "mcp_session_id";

pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Name allow-list for tools or resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    All,
    Only(Vec<String>),
}

impl NameFilter {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Accepts `"*"`, `["*"]`, or a list of names
impl<'de> Deserialize<'de> for NameFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::One(s) if s == WILDCARD => Ok(Self::All),
            Raw::One(s) => Err(serde::de::Error::custom(format!(
                "expected \"*\" or a list of names, got \"{}\"",
                s
            ))),
            Raw::Many(names) if names.len() == 1 && names[0] == WILDCARD => Ok(Self::All),
            Raw::Many(names) => Ok(Self::Only(names)),
        }
    }
}

/// `None` allows everything
pub fn name_allowed(filter: Option<&NameFilter>, name: &str) -> bool {
    filter.map_or(true, |f| f.allows(name))
}

/// Allow-list entry: the listed actions of one entity, `"*"` for all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionScope {
    pub entity: String,
    pub actions: Vec<String>,
}

impl ActionScope {
    pub fn new<I, S>(entity: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity: entity.into(),
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn covers(&self, entity: &str, action: &str) -> bool {
        self.entity == entity && self.actions.iter().any(|a| a == WILDCARD || a == action)
    }
}

/// Deny-list entry, `"*"` matching every action of the entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    pub entity: String,
    pub action: String,
}

impl ActionRef {
    pub fn new(entity: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            action: action.into(),
        }
    }

    pub fn matches(&self, entity: &str, action: &str) -> bool {
        self.entity == entity && (self.action == WILDCARD || self.action == action)
    }
}

pub type ToolStartCallback = Arc<dyn Fn(&ToolStartEvent) -> anyhow::Result<()> + Send + Sync>;
pub type ToolEndCallback = Arc<dyn Fn(&ToolEndEvent) -> anyhow::Result<()> + Send + Sync>;

/// Static options of a server or toolkit
#[derive(Clone)]
pub struct McpOptions {
    /// Domains to expose; `None` means the set was not supplied
    pub domains: Option<Vec<String>>,
    pub actions: Option<Vec<ActionScope>>,
    pub exclude_actions: Vec<ActionRef>,
    pub tools: Option<NameFilter>,
    pub resources: Option<NameFilter>,
    pub actor: Option<Actor>,
    pub tenant: Option<TenantId>,
    pub context: Map<String, Value>,
    /// Generate strict schemas: every property required, optional ones nullable
    pub strict: bool,
    pub system_prompt: Option<String>,
    pub on_tool_start: Option<ToolStartCallback>,
    pub on_tool_end: Option<ToolEndCallback>,
    /// SSE keep-alive period
    pub keep_alive: Duration,
    pub server_name: String,
    pub server_version: String,
}

impl Default for McpOptions {
    fn default() -> Self {
        Self {
            domains: None,
            actions: None,
            exclude_actions: Vec::new(),
            tools: None,
            resources: None,
            actor: None,
            tenant: None,
            context: Map::new(),
            strict: false,
            system_prompt: None,
            on_tool_start: None,
            on_tool_end: None,
            keep_alive: DEFAULT_KEEP_ALIVE,
            server_name: "toolgate".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl fmt::Debug for McpOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpOptions")
            .field("domains", &self.domains)
            .field("actions", &self.actions)
            .field("exclude_actions", &self.exclude_actions)
            .field("tools", &self.tools)
            .field("resources", &self.resources)
            .field("actor", &self.actor)
            .field("tenant", &self.tenant)
            .field("strict", &self.strict)
            .field("on_tool_start", &self.on_tool_start.is_some())
            .field("on_tool_end", &self.on_tool_end.is_some())
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}

impl McpOptions {
    pub fn for_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: Some(domains.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Check the exposure options against the catalog
    pub fn validate(&self, catalog: &dyn ActionCatalog) -> Result<(), ConfigError> {
        if self.domains.is_none() && self.actions.is_none() {
            return Err(ConfigError::MissingDomains);
        }

        for scope in self.actions.iter().flatten() {
            let entity = catalog
                .entity(&scope.entity)
                .ok_or_else(|| ConfigError::UnknownEntity(scope.entity.clone()))?;
            let tools = catalog.list_tools_for_domain(&entity.domain);
            let resources = catalog.list_action_resources_for_domain(&entity.domain);

            for action in scope.actions.iter().filter(|a| a.as_str() != WILDCARD) {
                let exposed = tools
                    .iter()
                    .any(|t| t.entity == scope.entity && &t.action == action)
                    || resources
                        .iter()
                        .any(|r| r.entity == scope.entity && &r.action == action);
                if !exposed {
                    return Err(ConfigError::ActionNotExposed {
                        entity: scope.entity.clone(),
                        action: action.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Values supplied by the transport for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    pub actor: Option<Actor>,
    pub tenant: Option<TenantId>,
    pub context: Map<String, Value>,
    pub session_id: Option<String>,
    /// URL this server was reached at
    pub server_url: Option<String>,
    pub tools: Option<NameFilter>,
    pub resources: Option<NameFilter>,
}

/// Request-scoped merge of static options and overrides
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    pub domains: Vec<String>,
    pub actions: Option<Vec<ActionScope>>,
    pub exclude_actions: Vec<ActionRef>,
    pub tools: Option<NameFilter>,
    pub resources: Option<NameFilter>,
    pub actor: Option<Actor>,
    pub tenant: Option<TenantId>,
    pub context: Map<String, Value>,
    pub session_id: Option<String>,
    pub server_url: Option<String>,
    pub strict: bool,
}

impl InvocationContext {
    pub fn new(options: &McpOptions, catalog: &dyn ActionCatalog, overrides: RequestOverrides) -> Self {
        let domains = match (&options.domains, &options.actions) {
            (Some(domains), _) => domains.clone(),
            (None, Some(scopes)) => {
                let mut domains: Vec<String> = Vec::new();
                for scope in scopes {
                    if let Some(entity) = catalog.entity(&scope.entity) {
                        if !domains.contains(&entity.domain) {
                            domains.push(entity.domain);
                        }
                    }
                }
                domains
            }
            (None, None) => Vec::new(),
        };

        let mut context = options.context.clone();
        context.extend(overrides.context);

        let mut ctx = Self {
            domains,
            actions: options.actions.clone(),
            exclude_actions: options.exclude_actions.clone(),
            tools: overrides.tools.or_else(|| options.tools.clone()),
            resources: overrides.resources.or_else(|| options.resources.clone()),
            actor: overrides.actor.or_else(|| options.actor.clone()),
            tenant: overrides.tenant.or_else(|| options.tenant.clone()),
            context,
            session_id: None,
            server_url: overrides.server_url,
            strict: options.strict,
        };
        if let Some(session_id) = overrides.session_id {
            ctx.set_session(session_id);
        }
        ctx
    }

    pub fn set_session(&mut self, session_id: String) {
        self.context
            .insert(SESSION_CONTEXT_KEY.to_string(), Value::String(session_id.clone()));
        self.session_id = Some(session_id);
    }

    /// Allow-list step: whether `entity.action` is in scope
    pub fn in_scope(&self, entity: &str, action: &str) -> bool {
        self.actions
            .as_ref()
            .map_or(true, |scopes| scopes.iter().any(|s| s.covers(entity, action)))
    }

    /// Deny-list step
    pub fn is_excluded(&self, entity: &str, action: &str) -> bool {
        self.exclude_actions.iter().any(|r| r.matches(entity, action))
    }
}
