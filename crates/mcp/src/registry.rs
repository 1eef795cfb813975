// Tool and resource registry: computes what a request may see

use crate::options::{name_allowed, InvocationContext};
use std::collections::HashSet;
use std::sync::Arc;
use toolgate_core::catalog::ActionCatalog;
use toolgate_core::policy::{ActionTarget, Authorizer};
use toolgate_core::tool::{ActionResource, McpResource, Tool, UiResource};
use toolgate_core::types::{ActionDefinition, Entity};

/// A tool with its domain, entity and action definition attached
#[derive(Debug, Clone)]
pub struct ResolvedTool {
    pub tool: Tool,
    pub domain: String,
    pub entity: Entity,
    pub action: ActionDefinition,
}

impl ResolvedTool {
    pub fn name(&self) -> &str {
        &self.tool.name
    }

    pub fn description(&self) -> String {
        self.tool
            .description
            .clone()
            .or_else(|| self.action.description.clone())
            .unwrap_or_else(|| {
                format!(
                    "Run the {} action ({}) on {}",
                    self.action.name, self.action.action_type, self.entity.name
                )
            })
    }
}

/// Filters the declared tools and resources for an invocation context.
///
/// Every call recomputes its view from the catalog; nothing is cached.
#[derive(Clone)]
pub struct Registry {
    catalog: Arc<dyn ActionCatalog>,
    authorizer: Arc<dyn Authorizer>,
}

impl Registry {
    pub fn new(catalog: Arc<dyn ActionCatalog>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            catalog,
            authorizer,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn ActionCatalog> {
        &self.catalog
    }

    /// Tools exposed to the context, authorization applied last
    pub async fn tools(&self, ctx: &InvocationContext) -> Vec<ResolvedTool> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for domain in &ctx.domains {
            for tool in self.catalog.list_tools_for_domain(domain) {
                if !ctx.in_scope(&tool.entity, &tool.action)
                    || ctx.is_excluded(&tool.entity, &tool.action)
                    || !name_allowed(ctx.tools.as_ref(), &tool.name)
                    || !seen.insert(tool.name.clone())
                {
                    continue;
                }
                match self.resolve(tool, domain) {
                    Some(resolved) => candidates.push(resolved),
                    None => continue,
                }
            }
        }

        let mut exposed = Vec::with_capacity(candidates.len());
        for resolved in candidates {
            if self.permitted(ctx, &resolved).await {
                exposed.push(resolved);
            }
        }
        exposed
    }

    /// Look a tool up by name within the filtered set
    pub async fn tool(&self, ctx: &InvocationContext, name: &str) -> Option<ResolvedTool> {
        self.tools(ctx)
            .await
            .into_iter()
            .find(|t| t.tool.name == name)
    }

    pub fn action_resources(&self, ctx: &InvocationContext) -> Vec<ActionResource> {
        let mut seen = HashSet::new();
        let mut exposed = Vec::new();
        for domain in &ctx.domains {
            for resource in self.catalog.list_action_resources_for_domain(domain) {
                if ctx.in_scope(&resource.entity, &resource.action)
                    && !ctx.is_excluded(&resource.entity, &resource.action)
                    && name_allowed(ctx.resources.as_ref(), &resource.name)
                    && seen.insert(resource.name.clone())
                {
                    exposed.push(resource);
                }
            }
        }
        exposed
    }

    /// UI resources of the domain set; the action deny-list does not apply
    pub fn ui_resources(&self, ctx: &InvocationContext) -> Vec<UiResource> {
        let mut seen = HashSet::new();
        let mut exposed = Vec::new();
        for domain in &ctx.domains {
            for resource in self.catalog.list_ui_resources_for_domain(domain) {
                if name_allowed(ctx.resources.as_ref(), &resource.name)
                    && seen.insert(resource.name.clone())
                {
                    exposed.push(resource);
                }
            }
        }
        exposed
    }

    /// Action resources followed by UI resources
    pub fn resources(&self, ctx: &InvocationContext) -> Vec<McpResource> {
        self.action_resources(ctx)
            .into_iter()
            .map(McpResource::Action)
            .chain(self.ui_resources(ctx).into_iter().map(McpResource::Ui))
            .collect()
    }

    pub fn resource_by_uri(&self, ctx: &InvocationContext, uri: &str) -> Option<McpResource> {
        self.resources(ctx).into_iter().find(|r| r.uri() == uri)
    }

    fn resolve(&self, tool: Tool, domain: &str) -> Option<ResolvedTool> {
        let entity = self.catalog.entity(&tool.entity)?;
        let Some(action) = self.catalog.resolve_action(&tool.entity, &tool.action) else {
            tracing::warn!(
                "Tool {} references unknown action {}.{}",
                tool.name,
                tool.entity,
                tool.action
            );
            return None;
        };
        Some(ResolvedTool {
            tool,
            domain: domain.to_string(),
            entity,
            action,
        })
    }

    async fn permitted(&self, ctx: &InvocationContext, resolved: &ResolvedTool) -> bool {
        let target = ActionTarget {
            domain: &resolved.domain,
            entity: &resolved.entity.name,
            action: &resolved.action.name,
        };
        match self
            .authorizer
            .can_perform(ctx.actor.as_ref(), target, ctx.tenant.as_ref())
            .await
        {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(
                    "Authorization check for tool {} failed, denying: {}",
                    resolved.tool.name,
                    e
                );
                false
            }
        }
    }
}
