// Action catalog: the declared entities, tools, and resources of each domain

use crate::error::ConfigError;
use crate::tool::{ActionResource, Tool, UiResource, UI_RESOURCE_SCHEME};
use crate::types::{ActionDefinition, Entity, FieldType};
use std::collections::{HashMap, HashSet};

/// Read-only view of everything declared at configuration time
pub trait ActionCatalog: Send + Sync {
    /// Every domain registered with the catalog
    fn domains(&self) -> Vec<String>;

    fn entity(&self, name: &str) -> Option<Entity>;

    fn list_tools_for_domain(&self, domain: &str) -> Vec<Tool>;

    fn list_action_resources_for_domain(&self, domain: &str) -> Vec<ActionResource>;

    fn list_ui_resources_for_domain(&self, domain: &str) -> Vec<UiResource>;

    fn resolve_action(&self, entity: &str, action: &str) -> Option<ActionDefinition> {
        self.entity(entity)
            .and_then(|e| e.action(action).cloned())
    }
}

/// Immutable catalog produced by [`CatalogBuilder`]
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    domains: Vec<String>,
    entities: HashMap<String, Entity>,
    tools: Vec<Tool>,
    action_resources: Vec<ActionResource>,
    ui_resources: Vec<(String, UiResource)>,
}

impl StaticCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn resource_count(&self) -> usize {
        self.action_resources.len() + self.ui_resources.len()
    }

    fn domain_of(&self, entity: &str) -> Option<&str> {
        self.entities.get(entity).map(|e| e.domain.as_str())
    }
}

impl ActionCatalog for StaticCatalog {
    fn domains(&self) -> Vec<String> {
        self.domains.clone()
    }

    fn entity(&self, name: &str) -> Option<Entity> {
        self.entities.get(name).cloned()
    }

    fn list_tools_for_domain(&self, domain: &str) -> Vec<Tool> {
        self.tools
            .iter()
            .filter(|t| self.domain_of(&t.entity) == Some(domain))
            .cloned()
            .collect()
    }

    fn list_action_resources_for_domain(&self, domain: &str) -> Vec<ActionResource> {
        self.action_resources
            .iter()
            .filter(|r| self.domain_of(&r.entity) == Some(domain))
            .cloned()
            .collect()
    }

    fn list_ui_resources_for_domain(&self, domain: &str) -> Vec<UiResource> {
        self.ui_resources
            .iter()
            .filter(|(d, _)| d == domain)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

/// Collects declarations and validates them once at startup
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entities: Vec<Entity>,
    tools: Vec<Tool>,
    action_resources: Vec<ActionResource>,
    ui_resources: Vec<(String, UiResource)>,
}

impl CatalogBuilder {
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn action_resource(mut self, resource: ActionResource) -> Self {
        self.action_resources.push(resource);
        self
    }

    pub fn ui_resource(mut self, domain: impl Into<String>, resource: UiResource) -> Self {
        self.ui_resources.push((domain.into(), resource));
        self
    }

    /// Validate every declaration and freeze the catalog
    pub fn build(self) -> Result<StaticCatalog, ConfigError> {
        let mut entities = HashMap::new();
        let mut domains = Vec::new();
        for entity in self.entities {
            if !domains.contains(&entity.domain) {
                domains.push(entity.domain.clone());
            }
            if entities.contains_key(&entity.name) {
                return Err(ConfigError::DuplicateEntity(entity.name));
            }
            entities.insert(entity.name.clone(), entity);
        }

        let mut resource_names = HashSet::new();
        let mut resource_uris = HashSet::new();

        for (domain, resource) in &self.ui_resources {
            if !resource.uri.starts_with(UI_RESOURCE_SCHEME) {
                return Err(ConfigError::InvalidUiUri(resource.uri.clone()));
            }
            if !resource_names.insert(resource.name.clone()) {
                return Err(ConfigError::DuplicateResource(resource.name.clone()));
            }
            if !resource_uris.insert(resource.uri.clone()) {
                return Err(ConfigError::DuplicateResourceUri(resource.uri.clone()));
            }
            if !domains.contains(domain) {
                domains.push(domain.clone());
            }
        }

        for resource in &self.action_resources {
            let action = lookup_action(&entities, &resource.entity, &resource.action)?;
            if action.returns != Some(FieldType::String) {
                return Err(ConfigError::NonStringResource {
                    resource: resource.name.clone(),
                    entity: resource.entity.clone(),
                    action: resource.action.clone(),
                });
            }
            if !resource_names.insert(resource.name.clone()) {
                return Err(ConfigError::DuplicateResource(resource.name.clone()));
            }
            if !resource_uris.insert(resource.uri.clone()) {
                return Err(ConfigError::DuplicateResourceUri(resource.uri.clone()));
            }
        }

        let mut tool_names = HashSet::new();
        let mut tools = Vec::with_capacity(self.tools.len());
        for mut tool in self.tools {
            lookup_action(&entities, &tool.entity, &tool.action)?;
            if !tool_names.insert(tool.name.clone()) {
                return Err(ConfigError::DuplicateTool(tool.name));
            }
            if let crate::tool::IdentityTarget::Named(identity) = &tool.identity {
                let known = entities
                    .get(&tool.entity)
                    .is_some_and(|e| e.identity(identity).is_some());
                if !known {
                    return Err(ConfigError::UnknownIdentity {
                        tool: tool.name,
                        identity: identity.clone(),
                    });
                }
            }
            if let Some(uri) = tool.ui_resource.clone() {
                if !self.ui_resources.iter().any(|(_, r)| r.uri == uri) {
                    return Err(ConfigError::UnknownUiResource {
                        tool: tool.name,
                        uri,
                    });
                }
                let merged = match tool.metadata.get_mut("ui") {
                    Some(serde_json::Value::Object(ui)) => {
                        ui.insert("resourceUri".to_string(), serde_json::Value::String(uri.clone()));
                        true
                    }
                    Some(_) => {
                        tracing::warn!("Tool {} metadata \"ui\" is not an object, replacing it", tool.name);
                        false
                    }
                    None => false,
                };
                if !merged {
                    tool.metadata
                        .insert("ui".to_string(), serde_json::json!({ "resourceUri": uri }));
                }
            }
            tools.push(tool);
        }

        tracing::info!(
            "Catalog built: {} entities, {} tools, {} resources",
            entities.len(),
            tools.len(),
            self.action_resources.len() + self.ui_resources.len()
        );

        Ok(StaticCatalog {
            domains,
            entities,
            tools,
            action_resources: self.action_resources,
            ui_resources: self.ui_resources,
        })
    }
}

fn lookup_action<'a>(
    entities: &'a HashMap<String, Entity>,
    entity: &str,
    action: &str,
) -> Result<&'a ActionDefinition, ConfigError> {
    let e = entities
        .get(entity)
        .ok_or_else(|| ConfigError::UnknownEntity(entity.to_string()))?;
    e.action(action).ok_or_else(|| ConfigError::UnknownAction {
        entity: entity.to_string(),
        action: action.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{CspDirectives, DomainMode, IdentityTarget};
    use crate::types::{ActionType, Field};
    use std::path::PathBuf;

    fn artist() -> Entity {
        Entity::new("artist", "music")
            .with_field(Field::primary_key("id", FieldType::Uuid))
            .with_field(Field::attribute("name", FieldType::String))
            .with_identity("unique_name", vec!["name"])
            .with_action(ActionDefinition::new("read", ActionType::Read))
            .with_action(
                ActionDefinition::new("bio", ActionType::Action).with_returns(FieldType::String),
            )
            .with_action(
                ActionDefinition::new("stats", ActionType::Action).with_returns(FieldType::Map),
            )
    }

    fn card() -> UiResource {
        UiResource {
            name: "artist_card".into(),
            uri: "ui://artist/card".into(),
            html_path: PathBuf::from("card.html"),
            title: "Artist card".into(),
            description: None,
            csp: CspDirectives::default(),
            permissions: vec![],
            domain: DomainMode::Omitted,
            prefers_border: None,
        }
    }

    fn bio_resource(name: &str, action: &str) -> ActionResource {
        ActionResource {
            name: name.into(),
            uri: format!("file://artists/{}", name),
            title: "Bio".into(),
            description: None,
            mime_type: "text/plain".into(),
            entity: "artist".into(),
            action: action.into(),
        }
    }

    #[test]
    fn test_build_valid_catalog() {
        let catalog = StaticCatalog::builder()
            .entity(artist())
            .tool(Tool::new("list_artists", "artist", "read"))
            .action_resource(bio_resource("bio", "bio"))
            .ui_resource("music", card())
            .build()
            .unwrap();

        assert_eq!(catalog.domains(), vec!["music".to_string()]);
        assert_eq!(catalog.list_tools_for_domain("music").len(), 1);
        assert_eq!(catalog.list_tools_for_domain("video").len(), 0);
        assert_eq!(catalog.list_action_resources_for_domain("music").len(), 1);
        assert_eq!(catalog.list_ui_resources_for_domain("music").len(), 1);
        assert_eq!(catalog.resource_count(), 2);
        assert!(catalog.resolve_action("artist", "read").is_some());
        assert!(catalog.resolve_action("artist", "nope").is_none());
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let err = StaticCatalog::builder()
            .entity(artist())
            .tool(Tool::new("list_artists", "artist", "read"))
            .tool(Tool::new("list_artists", "artist", "read"))
            .build()
            .unwrap_err();

        assert_eq!(err, ConfigError::DuplicateTool("list_artists".into()));
    }

    #[test]
    fn test_unknown_tool_action_rejected() {
        let err = StaticCatalog::builder()
            .entity(artist())
            .tool(Tool::new("purge", "artist", "purge"))
            .build()
            .unwrap_err();

        assert!(matches!(err, ConfigError::UnknownAction { .. }));
    }

    #[test]
    fn test_resource_requires_string_return() {
        let err = StaticCatalog::builder()
            .entity(artist())
            .action_resource(bio_resource("stats", "stats"))
            .build()
            .unwrap_err();

        assert!(matches!(err, ConfigError::NonStringResource { .. }));
    }

    #[test]
    fn test_resource_names_unique_across_kinds() {
        let mut ui = card();
        ui.name = "bio".into();

        let err = StaticCatalog::builder()
            .entity(artist())
            .ui_resource("music", ui)
            .action_resource(bio_resource("bio", "bio"))
            .build()
            .unwrap_err();

        assert_eq!(err, ConfigError::DuplicateResource("bio".into()));
    }

    #[test]
    fn test_ui_uri_scheme_enforced() {
        let mut ui = card();
        ui.uri = "https://example.com/card".into();

        let err = StaticCatalog::builder()
            .entity(artist())
            .ui_resource("music", ui)
            .build()
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidUiUri(_)));
    }

    #[test]
    fn test_tool_identity_and_ui_reference() {
        let err = StaticCatalog::builder()
            .entity(artist())
            .tool(
                Tool::new("list_artists", "artist", "read")
                    .with_identity(IdentityTarget::Named("by_email".into())),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownIdentity { .. }));

        let catalog = StaticCatalog::builder()
            .entity(artist())
            .ui_resource("music", card())
            .tool(Tool::new("list_artists", "artist", "read").with_ui_resource("ui://artist/card"))
            .build()
            .unwrap();

        let tool = &catalog.list_tools_for_domain("music")[0];
        assert_eq!(tool.metadata["ui"]["resourceUri"], "ui://artist/card");
    }

    #[test]
    fn test_ui_reference_merges_existing_metadata() {
        let catalog = StaticCatalog::builder()
            .entity(artist())
            .ui_resource("music", card())
            .tool(
                Tool::new("list_artists", "artist", "read")
                    .with_metadata("ui", serde_json::json!({ "visibility": ["app"] }))
                    .with_metadata("owner", serde_json::json!("catalog-team"))
                    .with_ui_resource("ui://artist/card"),
            )
            .build()
            .unwrap();

        let tool = &catalog.list_tools_for_domain("music")[0];
        assert_eq!(tool.metadata["ui"]["resourceUri"], "ui://artist/card");
        assert_eq!(tool.metadata["ui"]["visibility"], serde_json::json!(["app"]));
        assert_eq!(tool.metadata["owner"], "catalog-team");
    }
}
