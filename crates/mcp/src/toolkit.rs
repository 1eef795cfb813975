// In-process tool calling for LLM clients that do not speak MCP

use crate::executor::Executor;
use crate::options::{McpOptions, RequestOverrides, InvocationContext};
use crate::registry::Registry;
use crate::schema;
use crate::server::Collaborators;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use toolgate_core::error::ConfigError;

/// Function definition in the shape LLM tool-calling APIs expect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub name: String,
    pub is_error: bool,
    pub content: String,
}

/// Same registry and engine as the MCP server, without JSON-RPC
pub struct Toolkit {
    options: McpOptions,
    registry: Registry,
    executor: Executor,
}

impl Toolkit {
    pub fn new(options: McpOptions, collaborators: Collaborators) -> Result<Self, ConfigError> {
        options.validate(collaborators.catalog.as_ref())?;
        let executor = Executor::new(collaborators.runner, collaborators.serializer)
            .with_callbacks(options.on_tool_start.clone(), options.on_tool_end.clone());
        Ok(Self {
            registry: Registry::new(collaborators.catalog, collaborators.authorizer),
            executor,
            options,
        })
    }

    fn context(&self, overrides: RequestOverrides) -> InvocationContext {
        InvocationContext::new(&self.options, self.registry.catalog().as_ref(), overrides)
    }

    /// Every tool exposed to the caller
    pub async fn functions(&self, overrides: RequestOverrides) -> Vec<FunctionSpec> {
        let ctx = self.context(overrides);
        self.registry
            .tools(&ctx)
            .await
            .iter()
            .map(|resolved| FunctionSpec {
                name: resolved.tool.name.clone(),
                description: resolved.description(),
                parameters: schema::tool_schema(resolved, ctx.strict),
                strict: ctx.strict,
            })
            .collect()
    }

    /// Run a tool by name. Unknown tools and aborted calls come back as
    /// error results.
    pub async fn call(
        &self,
        overrides: RequestOverrides,
        name: &str,
        arguments: Value,
    ) -> ToolCallResult {
        let ctx = self.context(overrides);
        let error = |content: String| ToolCallResult {
            name: name.to_string(),
            is_error: true,
            content,
        };

        let Some(resolved) = self.registry.tool(&ctx, name).await else {
            return error(json!({ "error": format!("Tool not found: {}", name) }).to_string());
        };
        let arguments = match arguments {
            Value::Null => Map::new(),
            Value::Object(arguments) => arguments,
            _ => return error(json!({ "error": "arguments must be an object" }).to_string()),
        };

        match self.executor.run_tool(&resolved, arguments, &ctx).await {
            Ok(outcome) => ToolCallResult {
                name: name.to_string(),
                is_error: outcome.is_error,
                content: outcome.text,
            },
            Err(fault) => {
                tracing::error!("Tool {} aborted: {}", name, fault);
                error(json!({ "error": fault.to_string() }).to_string())
            }
        }
    }

    /// The configured system prompt, or a default describing the caller
    pub fn system_prompt(&self, overrides: RequestOverrides) -> String {
        if let Some(prompt) = &self.options.system_prompt {
            return prompt.clone();
        }
        let ctx = self.context(overrides);
        let mut prompt = String::from(
            "You are a helpful assistant. Use the available tools to read and change \
             application data. Only call tools with arguments that match their schemas.",
        );
        if let Some(actor) = &ctx.actor {
            prompt.push_str(&format!(" You are acting on behalf of user {}.", actor.id));
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use toolgate_core::context::Actor;

    fn toolkit(options: McpOptions) -> Toolkit {
        let catalog = fixtures::catalog();
        let runner = fixtures::runner(catalog.clone());
        Toolkit::new(options, Collaborators::new(catalog, runner)).unwrap()
    }

    #[tokio::test]
    async fn test_functions_mirror_tools() {
        let toolkit = toolkit(McpOptions {
            strict: true,
            ..McpOptions::for_domains(["music"])
        });
        let functions = toolkit.functions(RequestOverrides::default()).await;
        assert_eq!(functions.len(), 7);
        assert!(functions.iter().all(|f| f.strict));
        assert_eq!(functions[0].parameters["additionalProperties"], false);
    }

    #[tokio::test]
    async fn test_call_runs_tool() {
        let toolkit = toolkit(McpOptions::for_domains(["music"]));
        let result = toolkit
            .call(
                RequestOverrides::default(),
                "shout",
                json!({"input": {"text": "hey"}}),
            )
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content, "HEY!");
    }

    #[tokio::test]
    async fn test_call_unknown_tool_is_error_result() {
        let toolkit = toolkit(McpOptions::for_domains(["music"]));
        let result = toolkit
            .call(RequestOverrides::default(), "missing", Value::Null)
            .await;
        assert!(result.is_error);
        assert!(result.content.contains("Tool not found: missing"));
    }

    #[tokio::test]
    async fn test_overrides_filter_functions() {
        let toolkit = toolkit(McpOptions::for_domains(["music"]));
        let functions = toolkit
            .functions(RequestOverrides {
                tools: Some(crate::options::NameFilter::only(["list_albums"])),
                ..Default::default()
            })
            .await;
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["list_albums"]);
    }

    #[test]
    fn test_system_prompt() {
        let toolkit = toolkit(McpOptions::for_domains(["music"]));
        let prompt = toolkit.system_prompt(RequestOverrides {
            actor: Some(Actor::new("ada")),
            ..Default::default()
        });
        assert!(prompt.contains("user ada"));

        let toolkit = self::toolkit(McpOptions {
            system_prompt: Some("Be brief.".into()),
            ..McpOptions::for_domains(["music"])
        });
        assert_eq!(toolkit.system_prompt(RequestOverrides::default()), "Be brief.");
    }
}
