// MCP server: JSON-RPC dispatch over the registry and execution engine

use crate::error::ResourceReadError;
use crate::executor::Executor;
use crate::options::{InvocationContext, McpOptions, RequestOverrides};
use crate::protocol::*;
use crate::registry::{Registry, ResolvedTool};
use crate::schema;
use crate::session::SessionManager;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use toolgate_core::catalog::ActionCatalog;
use toolgate_core::error::ConfigError;
use toolgate_core::policy::{AllowAll, Authorizer};
use toolgate_core::runner::ActionRunner;
use toolgate_core::serializer::{JsonSerializer, Serializer};
use toolgate_core::tool::{DomainMode, McpResource, UiResource, UI_RESOURCE_MIME_TYPE};
use url::Url;

/// External collaborators the server is wired to
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn ActionCatalog>,
    pub runner: Arc<dyn ActionRunner>,
    pub authorizer: Arc<dyn Authorizer>,
    pub serializer: Arc<dyn Serializer>,
}

impl Collaborators {
    /// Allow-all authorization and JSON serialization by default
    pub fn new(catalog: Arc<dyn ActionCatalog>, runner: Arc<dyn ActionRunner>) -> Self {
        Self {
            serializer: Arc::new(JsonSerializer::new(catalog.clone())),
            authorizer: Arc::new(AllowAll),
            catalog,
            runner,
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }
}

/// Result of dispatching one POST body
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// `None` when only notifications were received
    pub body: Option<Value>,
    /// Set when an `initialize` established a session
    pub session_id: Option<String>,
}

pub struct McpServer {
    options: McpOptions,
    registry: Registry,
    executor: Executor,
    sessions: SessionManager,
}

impl McpServer {
    pub fn new(options: McpOptions, collaborators: Collaborators) -> Result<Self, ConfigError> {
        options.validate(collaborators.catalog.as_ref())?;

        let executor = Executor::new(collaborators.runner, collaborators.serializer)
            .with_callbacks(options.on_tool_start.clone(), options.on_tool_end.clone());
        let registry = Registry::new(collaborators.catalog, collaborators.authorizer);

        tracing::info!(
            "MCP server {} {} configured for domains {:?}",
            options.server_name,
            options.server_version,
            options.domains.as_deref().unwrap_or_default()
        );

        Ok(Self {
            options,
            registry,
            executor,
            sessions: SessionManager::new(),
        })
    }

    pub fn options(&self) -> &McpOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Merge per-request overrides with the static options
    pub fn context(&self, overrides: RequestOverrides) -> InvocationContext {
        InvocationContext::new(&self.options, self.registry.catalog().as_ref(), overrides)
    }

    /// Dispatch a raw POST body: a single message or a batch
    pub async fn handle_payload(&self, body: &[u8], overrides: RequestOverrides) -> DispatchOutcome {
        let payload: Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("Rejecting unparseable JSON-RPC payload: {}", e);
                return DispatchOutcome {
                    body: Some(response_value(JsonRpcResponse::error(
                        Value::Null,
                        JsonRpcError::parse_error(),
                    ))),
                    session_id: None,
                };
            }
        };

        let mut ctx = self.context(overrides);
        let mut session = None;

        let body = match payload {
            Value::Array(messages) if messages.is_empty() => Some(response_value(
                JsonRpcResponse::error(Value::Null, JsonRpcError::invalid_request()),
            )),
            Value::Array(messages) => {
                let mut responses = Vec::new();
                for message in messages {
                    if let Some(response) = self.handle_message(message, &mut ctx, &mut session).await {
                        responses.push(response_value(response));
                    }
                }
                if responses.is_empty() {
                    None
                } else {
                    Some(Value::Array(responses))
                }
            }
            message => self
                .handle_message(message, &mut ctx, &mut session)
                .await
                .map(response_value),
        };

        DispatchOutcome {
            body,
            session_id: session,
        }
    }

    /// Handle one JSON-RPC message; notifications produce no response
    pub async fn handle_message(
        &self,
        message: Value,
        ctx: &mut InvocationContext,
        session: &mut Option<String>,
    ) -> Option<JsonRpcResponse> {
        let request = match serde_json::from_value::<JsonRpcRequest>(message.clone()) {
            Ok(request) if request.jsonrpc == JSONRPC_VERSION && request.has_valid_id() => {
                request
            }
            _ => {
                let id = message.get("id").cloned().unwrap_or(Value::Null);
                return Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
            }
        };

        if request.is_notification() {
            // $/cancelRequest and notifications/* land here; none of them act
            tracing::debug!("Ignoring notification {}", request.method);
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        tracing::debug!("Handling MCP request {}", request.method);
        let result = match request.method.as_str() {
            "initialize" => self.initialize(ctx, session).await,
            "shutdown" => Ok(Value::Null),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(ctx).await,
            "tools/call" => self.call_tool(&request, ctx).await,
            "resources/list" => self.list_resources(ctx),
            "resources/read" => self.read_resource(&request, ctx).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    async fn initialize(
        &self,
        ctx: &mut InvocationContext,
        session: &mut Option<String>,
    ) -> Result<Value, JsonRpcError> {
        let session_id = self.sessions.ensure(ctx.session_id.as_deref());
        ctx.set_session(session_id.clone());
        *session = Some(session_id);

        let has_resources = !self.registry.resources(ctx).is_empty();
        to_result(&InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
                resources: has_resources.then(ResourcesCapability::default),
            },
            server_info: ServerInfo {
                name: self.options.server_name.clone(),
                version: self.options.server_version.clone(),
            },
        })
    }

    async fn list_tools(&self, ctx: &InvocationContext) -> Result<Value, JsonRpcError> {
        let tools = self
            .registry
            .tools(ctx)
            .await
            .iter()
            .map(|resolved| ToolSchema {
                name: resolved.tool.name.clone(),
                description: resolved.description(),
                input_schema: schema::tool_schema(resolved, ctx.strict),
                meta: tool_meta(resolved),
            })
            .collect();
        to_result(&ListToolsResult { tools })
    }

    async fn call_tool(
        &self,
        request: &JsonRpcRequest,
        ctx: &InvocationContext,
    ) -> Result<Value, JsonRpcError> {
        let params: CallToolParams =
            serde_json::from_value(request.params.clone().unwrap_or(Value::Null))
                .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)))?;

        let resolved = self
            .registry
            .tool(ctx, &params.name)
            .await
            .ok_or_else(|| JsonRpcError::invalid_params(format!("Tool not found: {}", params.name)))?;

        let arguments = match params.arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments,
            Some(_) => return Err(JsonRpcError::invalid_params("arguments must be an object")),
        };

        let outcome = self
            .executor
            .run_tool(&resolved, arguments, ctx)
            .await
            .map_err(|fault| {
                tracing::error!("Tool {} aborted: {}", resolved.tool.name, fault);
                JsonRpcError::custom(TOOL_EXECUTION_FAILED, "Tool execution failed")
                    .with_data(json!({ "error": fault.to_string() }))
            })?;

        to_result(&CallToolResult {
            is_error: outcome.is_error,
            content: vec![ToolContent::text(outcome.text)],
            meta: tool_meta(&resolved),
        })
    }

    fn list_resources(&self, ctx: &InvocationContext) -> Result<Value, JsonRpcError> {
        let resources = self
            .registry
            .resources(ctx)
            .into_iter()
            .map(|resource| match resource {
                McpResource::Action(r) => ResourceDescriptor {
                    name: r.name,
                    uri: r.uri,
                    title: r.title,
                    description: r.description,
                    mime_type: r.mime_type,
                    meta: None,
                },
                McpResource::Ui(r) => ResourceDescriptor {
                    meta: ui_meta(&r, ctx.server_url.as_deref()),
                    name: r.name,
                    uri: r.uri,
                    title: r.title,
                    description: r.description,
                    mime_type: UI_RESOURCE_MIME_TYPE.to_string(),
                },
            })
            .collect();
        to_result(&ListResourcesResult { resources })
    }

    async fn read_resource(
        &self,
        request: &JsonRpcRequest,
        ctx: &InvocationContext,
    ) -> Result<Value, JsonRpcError> {
        let params: ReadResourceParams =
            serde_json::from_value(request.params.clone().unwrap_or(Value::Null)).map_err(|e| {
                JsonRpcError::invalid_params(format!("Invalid resources/read params: {}", e))
            })?;

        let resource = self
            .registry
            .resource_by_uri(ctx, &params.uri)
            .ok_or_else(|| JsonRpcError::resource_not_found(&params.uri))?;

        let (mime_type, meta) = match &resource {
            McpResource::Action(r) => (r.mime_type.clone(), None),
            McpResource::Ui(r) => (
                UI_RESOURCE_MIME_TYPE.to_string(),
                ui_meta(r, ctx.server_url.as_deref()),
            ),
        };

        let text = self
            .read_content(&resource, params.arguments.unwrap_or_default(), ctx)
            .await
            .map_err(|e| {
                tracing::warn!("Failed to read resource {}: {}", params.uri, e);
                JsonRpcError::custom(INTERNAL_ERROR, format!("Resource read failed: {}", e))
                    .with_data(json!({ "uri": params.uri, "error": e.to_string() }))
            })?;

        to_result(&ReadResourceResult {
            contents: vec![ResourceContents {
                uri: params.uri,
                mime_type,
                text,
                meta,
            }],
        })
    }

    async fn read_content(
        &self,
        resource: &McpResource,
        arguments: Map<String, Value>,
        ctx: &InvocationContext,
    ) -> Result<String, ResourceReadError> {
        match resource {
            McpResource::Action(r) => {
                let (domain, action) = self
                    .registry
                    .catalog()
                    .entity(&r.entity)
                    .and_then(|entity| {
                        let action = entity.action(&r.action).cloned()?;
                        Some((entity.domain, action))
                    })
                    .ok_or_else(|| ResourceReadError::UnknownAction {
                        entity: r.entity.clone(),
                        action: r.action.clone(),
                    })?;
                self.executor
                    .read_action_resource(r, &domain, &action, arguments, ctx)
                    .await
            }
            McpResource::Ui(r) => self.executor.read_ui_resource(r).await,
        }
    }
}

fn response_value(response: JsonRpcResponse) -> Value {
    serde_json::to_value(&response).unwrap_or_else(|e| {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": Value::Null,
            "error": {"code": INTERNAL_ERROR, "message": e.to_string()}
        })
    })
}

fn tool_meta(resolved: &ResolvedTool) -> Option<Map<String, Value>> {
    if resolved.tool.metadata.is_empty() {
        None
    } else {
        Some(resolved.tool.metadata.clone())
    }
}

/// `_meta.ui` of a UI resource, or `None` when it sets nothing
pub fn ui_meta(resource: &UiResource, server_url: Option<&str>) -> Option<Value> {
    let mut ui = Map::new();

    if !resource.csp.is_empty() {
        if let Ok(csp) = serde_json::to_value(&resource.csp) {
            ui.insert("csp".into(), csp);
        }
    }

    if !resource.permissions.is_empty() {
        let permissions: Map<String, Value> = resource
            .permissions
            .iter()
            .map(|p| (camel_case(p), json!({})))
            .collect();
        ui.insert("permissions".into(), Value::Object(permissions));
    }

    match &resource.domain {
        DomainMode::Explicit(domain) => {
            ui.insert("domain".into(), Value::String(domain.clone()));
        }
        DomainMode::Auto => {
            if let Some(origin) = server_url.and_then(origin) {
                ui.insert("domain".into(), Value::String(origin));
            }
        }
        DomainMode::Omitted => {}
    }

    if let Some(prefers_border) = resource.prefers_border {
        ui.insert("prefersBorder".into(), Value::Bool(prefers_border));
    }

    if ui.is_empty() {
        None
    } else {
        Some(json!({ "ui": ui }))
    }
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' || c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `scheme://host[:port]` of a URL; opaque origins yield `None`
fn origin(server_url: &str) -> Option<String> {
    let origin = Url::parse(server_url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::options::NameFilter;
    use std::path::PathBuf;
    use toolgate_core::events::ToolStartEvent;

    fn server_with(options: McpOptions, html_path: PathBuf) -> McpServer {
        let catalog = fixtures::catalog_with_card(html_path);
        let runner = fixtures::runner(catalog.clone());
        McpServer::new(options, Collaborators::new(catalog, runner)).unwrap()
    }

    fn server() -> McpServer {
        server_with(
            McpOptions::for_domains(["music"]),
            PathBuf::from("/nonexistent/toolgate/card.html"),
        )
    }

    async fn post(server: &McpServer, message: Value) -> DispatchOutcome {
        server
            .handle_payload(message.to_string().as_bytes(), RequestOverrides::default())
            .await
    }

    async fn request(server: &McpServer, method: &str, params: Value) -> Value {
        post(server, json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}))
            .await
            .body
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_mints_session() {
        let server = server();
        let outcome = post(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"})).await;

        let body = outcome.body.unwrap();
        assert!(outcome.session_id.is_some());
        assert_eq!(body["result"]["capabilities"]["tools"]["listChanged"], false);
        assert_eq!(body["result"]["capabilities"]["resources"], json!({}));
        assert_eq!(body["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(body["result"]["serverInfo"]["name"], "toolgate");
    }

    #[tokio::test]
    async fn test_initialize_reuses_session() {
        let server = server();
        let outcome = server
            .handle_payload(
                br#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
                RequestOverrides {
                    session_id: Some("existing".into()),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(outcome.session_id.as_deref(), Some("existing"));
    }

    #[tokio::test]
    async fn test_resources_capability_tracks_exposure() {
        let server = server_with(
            McpOptions {
                resources: Some(NameFilter::only(Vec::<String>::new())),
                ..McpOptions::for_domains(["music"])
            },
            PathBuf::from("/nonexistent"),
        );
        let body = request(&server, "initialize", json!({})).await;
        assert!(body["result"]["capabilities"].get("resources").is_none());

        let body = request(&server, "resources/list", json!({})).await;
        assert_eq!(body["result"]["resources"], json!([]));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = server();

        let outcome = server.handle_payload(b"{not json", RequestOverrides::default()).await;
        let body = outcome.body.unwrap();
        assert_eq!(body["error"]["code"], PARSE_ERROR);
        assert_eq!(body["id"], Value::Null);

        let body = post(&server, json!({"jsonrpc": "2.0", "id": 7})).await.body.unwrap();
        assert_eq!(body["error"]["code"], INVALID_REQUEST);
        assert_eq!(body["id"], 7);

        let body = post(&server, json!([])).await.body.unwrap();
        assert_eq!(body["error"]["code"], INVALID_REQUEST);

        let body = request(&server, "prompts/list", json!({})).await;
        assert_eq!(body["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_null_or_structured_id_is_invalid_request() {
        let server = server();

        let body = post(&server, json!({"jsonrpc": "2.0", "id": null, "method": "tools/list"}))
            .await
            .body
            .unwrap();
        assert_eq!(body["error"]["code"], INVALID_REQUEST);
        assert_eq!(body["id"], Value::Null);

        let body = post(&server, json!({"jsonrpc": "2.0", "id": {"n": 1}, "method": "ping"}))
            .await
            .body
            .unwrap();
        assert_eq!(body["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_notifications_have_no_response() {
        let server = server();
        let outcome = post(
            &server,
            json!({"jsonrpc": "2.0", "method": "$/cancelRequest", "params": {"id": 1}}),
        )
        .await;
        assert!(outcome.body.is_none());

        let outcome = post(
            &server,
            json!([
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "method": "whatever"}
            ]),
        )
        .await;
        assert!(outcome.body.is_none());
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let server = server();
        let body = post(
            &server,
            json!([
                {"jsonrpc": "2.0", "id": "a", "method": "ping"},
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "id": "b", "method": "shutdown"},
                {"jsonrpc": "2.0", "id": "c", "method": "nope"}
            ]),
        )
        .await
        .body
        .unwrap();

        let responses = body.as_array().unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["id"], "a");
        assert_eq!(responses[0]["result"], json!({}));
        assert_eq!(responses[1]["id"], "b");
        assert_eq!(responses[1]["result"], Value::Null);
        assert!(responses[1].get("result").is_some());
        assert_eq!(responses[2]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let body = request(&server(), "tools/list", json!({})).await;
        let tools = body["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 7);
        assert_eq!(tools[0]["name"], "list_artists");
        assert_eq!(tools[0]["description"], "List artists");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
        assert_eq!(tools[0]["_meta"]["ui"]["resourceUri"], fixtures::CARD_URI);
        assert!(tools[1].get("_meta").is_none());
    }

    #[tokio::test]
    async fn test_tools_call() {
        let server = server();
        let body = request(
            &server,
            "tools/call",
            json!({"name": "list_artists", "arguments": {}}),
        )
        .await;
        assert_eq!(body["result"]["isError"], false);
        assert_eq!(body["result"]["content"][0]["type"], "text");

        let text = body["result"]["content"][0]["text"].as_str().unwrap();
        let records: Value = serde_json::from_str(text).unwrap();
        assert_eq!(records.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_tools_call_domain_error_stays_in_result() {
        let body = request(
            &server(),
            "tools/call",
            json!({"name": "create_artist", "arguments": {"input": {"name": "Prince", "label": "NPG"}}}),
        )
        .await;
        assert!(body.get("error").is_none());
        assert_eq!(body["result"]["isError"], true);

        let text = body["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("label"));
    }

    #[tokio::test]
    async fn test_tools_call_unknown_tool() {
        let body = request(&server(), "tools/call", json!({"name": "drop_tables"})).await;
        assert_eq!(body["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_tools_call_callback_fault() {
        let options = McpOptions {
            on_tool_start: Some(Arc::new(|_: &ToolStartEvent| -> anyhow::Result<()> {
                Err(anyhow::anyhow!("quota exceeded"))
            })),
            ..McpOptions::for_domains(["music"])
        };
        let server = server_with(options, PathBuf::from("/nonexistent"));
        let body = request(&server, "tools/call", json!({"name": "list_artists"})).await;
        assert_eq!(body["error"]["code"], TOOL_EXECUTION_FAILED);
        assert!(body["error"]["data"]["error"]
            .as_str()
            .unwrap()
            .contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_resources_list_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.html");
        std::fs::write(&path, "<div>card</div>").unwrap();
        let server = server_with(McpOptions::for_domains(["music"]), path);

        let body = request(&server, "resources/list", json!({})).await;
        let resources = body["result"]["resources"].as_array().unwrap().clone();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0]["uri"], fixtures::BIO_URI);
        assert_eq!(resources[1]["mimeType"], UI_RESOURCE_MIME_TYPE);

        for resource in resources {
            let body = request(&server, "resources/read", json!({"uri": resource["uri"]})).await;
            let contents = &body["result"]["contents"][0];
            assert_eq!(contents["uri"], resource["uri"]);
            assert_eq!(contents["mimeType"], resource["mimeType"]);
        }

        let body = request(
            &server,
            "resources/read",
            json!({"uri": fixtures::CARD_URI}),
        )
        .await;
        assert_eq!(body["result"]["contents"][0]["text"], "<div>card</div>");
    }

    #[tokio::test]
    async fn test_action_resource_read_with_arguments() {
        let body = request(
            &server(),
            "resources/read",
            json!({"uri": fixtures::BIO_URI, "arguments": {"style": "long", "unused": 1}}),
        )
        .await;
        assert_eq!(body["result"]["contents"][0]["text"], "3 artists (long)");
        assert_eq!(body["result"]["contents"][0]["mimeType"], "text/plain");
    }

    #[tokio::test]
    async fn test_action_resource_runs_under_its_entity_domain() {
        let catalog = fixtures::two_domain_catalog();
        let runner = fixtures::two_domain_runner(catalog.clone());
        let server = McpServer::new(
            McpOptions::for_domains(["music", "video"]),
            Collaborators::new(catalog, runner),
        )
        .unwrap();

        let body = request(
            &server,
            "resources/read",
            json!({"uri": fixtures::FILM_NOTES_URI}),
        )
        .await;
        assert_eq!(body["result"]["contents"][0]["text"], "served from video");
    }

    #[tokio::test]
    async fn test_resource_not_found() {
        let body = request(
            &server(),
            "resources/read",
            json!({"uri": "file://does/not/exist"}),
        )
        .await;
        assert_eq!(body["error"]["code"], RESOURCE_NOT_FOUND);
        assert_eq!(body["error"]["data"]["uri"], "file://does/not/exist");
    }

    #[tokio::test]
    async fn test_resource_read_failure() {
        let body = request(&server(), "resources/read", json!({"uri": fixtures::CARD_URI})).await;
        assert_eq!(body["error"]["code"], INTERNAL_ERROR);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Resource read failed:"));
        assert_eq!(body["error"]["data"]["uri"], fixtures::CARD_URI);
    }

    #[tokio::test]
    async fn test_ui_meta_uses_server_origin() {
        let server = server();
        let outcome = server
            .handle_payload(
                br#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#,
                RequestOverrides {
                    server_url: Some("https://mcp.example.com/mcp".into()),
                    ..Default::default()
                },
            )
            .await;
        let body = outcome.body.unwrap();
        let ui = &body["result"]["resources"][1]["_meta"]["ui"];
        assert_eq!(ui["domain"], "https://mcp.example.com");
        assert_eq!(ui["csp"]["connectDomains"][0], "https://api.example.com");
        assert_eq!(ui["permissions"], json!({"clipboardWrite": {}}));
        assert_eq!(ui["prefersBorder"], true);
    }

    #[test]
    fn test_configuration_errors() {
        let catalog = fixtures::catalog();
        let runner = fixtures::runner(catalog.clone());
        let collaborators = Collaborators::new(catalog, runner);

        let err = McpServer::new(McpOptions::default(), collaborators.clone()).err().unwrap();
        assert!(matches!(err, ConfigError::MissingDomains));

        let options = McpOptions {
            actions: Some(vec![crate::options::ActionScope::new("album", ["create"])]),
            ..Default::default()
        };
        let err = McpServer::new(options, collaborators).err().unwrap();
        assert!(matches!(err, ConfigError::ActionNotExposed { .. }));
    }

    #[test]
    fn test_origin_and_camel_case() {
        assert_eq!(origin("http://localhost:8080/mcp").as_deref(), Some("http://localhost:8080"));
        assert_eq!(origin("localhost"), None);
        assert_eq!(origin("https://h.example?x=1").as_deref(), Some("https://h.example"));
        assert_eq!(origin("https://u:p@h.example/mcp").as_deref(), Some("https://h.example"));
        assert_eq!(origin("https://h.example:443/mcp").as_deref(), Some("https://h.example"));
        assert_eq!(origin("data:text/plain,hi"), None);
        assert_eq!(camel_case("clipboard_write"), "clipboardWrite");
        assert_eq!(camel_case("camera"), "camera");
    }
}
