use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use toolgate_core::catalog::{ActionCatalog, StaticCatalog};
use toolgate_core::context::{Actor, TenantId};
use toolgate_core::error::ActionError;
use toolgate_core::memory::{ActionHandler, InMemoryRunner};
use toolgate_core::rbac::{RbacAuthorizer, RbacRole};
use toolgate_core::runner::ActionRequest;
use toolgate_core::tool::{ActionResource, IdentityTarget, LoadSpec, Tool, UiResource};
use toolgate_core::types::{Argument, Entity};
use toolgate_mcp::{ActionRef, ActionScope, Collaborators, McpOptions, McpServer, NameFilter};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,

    #[serde(default)]
    pub mcp: ExposureConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub roles: Vec<RbacRole>,

    #[serde(default)]
    pub entities: Vec<Entity>,

    #[serde(default)]
    pub tools: Vec<ToolConfig>,

    #[serde(default)]
    pub resources: Vec<ActionResource>,

    #[serde(default)]
    pub ui_resources: Vec<UiResourceConfig>,

    /// Built-in handlers bound to generic actions
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,

    /// Initial records per entity
    #[serde(default)]
    pub seeds: BTreeMap<String, Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_name")]
    pub name: String,
}

fn default_path() -> String {
    "/mcp".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_name() -> String {
    "toolgate".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            keep_alive_secs: default_keep_alive_secs(),
            name: default_name(),
        }
    }
}

/// What the MCP endpoint exposes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExposureConfig {
    #[serde(default)]
    pub domains: Option<Vec<String>>,

    #[serde(default)]
    pub actions: Option<Vec<ActionScope>>,

    #[serde(default)]
    pub exclude_actions: Vec<ActionRef>,

    #[serde(default)]
    pub tools: Option<NameFilter>,

    #[serde(default)]
    pub resources: Option<NameFilter>,

    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

/// Bearer token mapped to the actor it authenticates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub actor: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub tenant: Option<String>,
}

impl TokenConfig {
    pub fn to_actor(&self) -> Actor {
        self.roles
            .iter()
            .fold(Actor::new(&self.actor), |actor, role| actor.with_role(role))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    pub entity: String,
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Relationships always loaded into the result
    #[serde(default)]
    pub load: Vec<String>,
    /// `primary_key` (default), `none`, or the name of an identity
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub ui_resource: Option<String>,
}

impl ToolConfig {
    fn to_tool(&self) -> Tool {
        let identity = match self.identity.as_deref() {
            None | Some("primary_key") => IdentityTarget::PrimaryKey,
            Some("none") => IdentityTarget::Disabled,
            Some(name) => IdentityTarget::Named(name.to_string()),
        };
        let mut tool = Tool::new(&self.name, &self.entity, &self.action).with_identity(identity);
        tool.description = self.description.clone();
        tool.arguments = self.arguments.clone();
        tool.metadata = self.metadata.clone();
        tool.ui_resource = self.ui_resource.clone();
        if !self.load.is_empty() {
            tool.load = LoadSpec::Static(self.load.clone());
        }
        tool
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiResourceConfig {
    pub domain: String,
    #[serde(flatten)]
    pub resource: UiResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinHandler {
    /// Returns the action input as JSON text
    Echo,
    /// Summarizes the entity's stored records
    Describe,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HandlerConfig {
    pub entity: String,
    pub action: String,
    pub handler: BuiltinHandler,
}

fn echo(request: &ActionRequest, _records: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::String(Value::Object(request.input.clone()).to_string()))
}

fn describe(request: &ActionRequest, records: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::String(format!(
        "{} has {} records",
        request.entity,
        records.len()
    )))
}

impl BuiltinHandler {
    fn handler(self) -> ActionHandler {
        match self {
            Self::Echo => Arc::new(echo),
            Self::Describe => Arc::new(describe),
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            Self::parse(&content)
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration file")
    }

    /// Validate the declarations into an immutable catalog
    pub fn catalog(&self) -> Result<StaticCatalog> {
        let mut builder = StaticCatalog::builder();
        for entity in &self.entities {
            builder = builder.entity(entity.clone());
        }
        for tool in &self.tools {
            builder = builder.tool(tool.to_tool());
        }
        for resource in &self.resources {
            builder = builder.action_resource(resource.clone());
        }
        for ui in &self.ui_resources {
            builder = builder.ui_resource(&ui.domain, ui.resource.clone());
        }
        builder.build().context("Invalid catalog configuration")
    }

    pub fn authorizer(&self) -> Result<RbacAuthorizer> {
        let authorizer = RbacAuthorizer::new();
        for role in &self.roles {
            authorizer.register_role(role.clone())?;
        }
        Ok(authorizer)
    }

    /// Exposure options; with neither domains nor actions configured, every
    /// catalog domain is exposed
    pub fn mcp_options(&self, catalog: &dyn ActionCatalog) -> McpOptions {
        let exposure = &self.mcp;
        let domains = match (&exposure.domains, &exposure.actions) {
            (None, None) => Some(catalog.domains()),
            (domains, _) => domains.clone(),
        };
        McpOptions {
            domains,
            actions: exposure.actions.clone(),
            exclude_actions: exposure.exclude_actions.clone(),
            tools: exposure.tools.clone(),
            resources: exposure.resources.clone(),
            context: exposure.context.clone(),
            strict: exposure.strict,
            system_prompt: exposure.system_prompt.clone(),
            keep_alive: Duration::from_secs(self.server.keep_alive_secs),
            server_name: self.server.name.clone(),
            ..Default::default()
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub mcp: Arc<McpServer>,
    pub tokens: Arc<HashMap<String, TokenConfig>>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let catalog = Arc::new(config.catalog()?);

        let mut runner = InMemoryRunner::new(catalog.clone());
        for binding in &config.handlers {
            runner = runner.with_handler(&binding.entity, &binding.action, binding.handler.handler());
        }
        for (entity, records) in &config.seeds {
            runner
                .seed(entity, records.clone())
                .with_context(|| format!("Failed to seed {}", entity))?;
        }

        let collaborators = Collaborators::new(catalog.clone(), Arc::new(runner))
            .with_authorizer(Arc::new(config.authorizer()?));
        let mcp = McpServer::new(config.mcp_options(catalog.as_ref()), collaborators)
            .context("Invalid MCP configuration")?;

        tracing::info!(
            "Loaded {} tools and {} resources",
            catalog.tool_count(),
            catalog.resource_count()
        );

        let tokens = config
            .auth
            .tokens
            .iter()
            .map(|t| (t.token.clone(), t.clone()))
            .collect();

        Ok(Self {
            mcp: Arc::new(mcp),
            tokens: Arc::new(tokens),
        })
    }

    /// Actor and tenant authenticated by a bearer token
    pub fn authenticate(&self, token: &str) -> Option<(Actor, Option<TenantId>)> {
        self.tokens
            .get(token)
            .map(|t| (t.to_actor(), t.tenant.clone().map(TenantId::new)))
    }
}
