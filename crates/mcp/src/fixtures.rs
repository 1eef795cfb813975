// Music catalog shared by the crate's tests

use crate::registry::ResolvedTool;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use toolgate_core::catalog::{ActionCatalog, StaticCatalog};
use toolgate_core::error::ActionError;
use toolgate_core::memory::InMemoryRunner;
use toolgate_core::runner::ActionRequest;
use toolgate_core::tool::{
    ActionResource, CspDirectives, DomainMode, IdentityTarget, LoadSpec, Tool, UiResource,
};
use toolgate_core::types::{
    ActionDefinition, ActionType, Argument, Cardinality, Constraints, Entity, Field, FieldType,
    Pagination, Relationship,
};

pub const NINA: &str = "6f1c2a58-5d7e-4c1b-9a0e-2b3c4d5e6f70";
pub const MILES: &str = "0b8a7c6d-1e2f-4a3b-8c9d-0e1f2a3b4c5d";
pub const BJORK: &str = "9e8d7c6b-5a4f-4e3d-8c2b-1a0f9e8d7c6b";

pub const BIO_URI: &str = "file://artists/bio";
pub const CARD_URI: &str = "ui://artists/card";
pub const FILM_NOTES_URI: &str = "file://films/notes";

fn artist() -> Entity {
    Entity::new("artist", "music")
        .with_field(Field::primary_key("id", FieldType::Uuid))
        .with_field(Field {
            constraints: Constraints {
                min_length: Some(1),
                ..Default::default()
            },
            ..Field::attribute("name", FieldType::String).required()
        })
        .with_field(Field::attribute(
            "genre",
            FieldType::Enum(vec![
                "rock".into(),
                "jazz".into(),
                "pop".into(),
                "electronic".into(),
            ]),
        ))
        .with_field(
            Field::attribute("formed_year", FieldType::Integer)
                .with_description("Year the artist started recording"),
        )
        .with_field(Field::attribute("rating", FieldType::Float))
        .with_field(Field::attribute("royalties", FieldType::Float).private())
        .with_field(Field::calculation(
            "name_length",
            FieldType::Integer,
            vec![Argument::new("bonus", FieldType::Integer)],
        ))
        .with_relationship(Relationship {
            name: "albums".into(),
            destination: "album".into(),
            source_field: "id".into(),
            destination_field: "artist_id".into(),
            cardinality: Cardinality::Many,
            public: true,
        })
        .with_identity("unique_name", vec!["name"])
        .with_action(ActionDefinition::new("read", ActionType::Read))
        .with_action(
            ActionDefinition::new("create", ActionType::Create)
                .with_accept(["name", "genre", "formed_year", "rating"]),
        )
        .with_action(
            ActionDefinition::new("update", ActionType::Update)
                .with_accept(["genre", "formed_year", "rating"]),
        )
        .with_action(ActionDefinition::new("destroy", ActionType::Destroy))
        .with_action(
            ActionDefinition::new("shout", ActionType::Action)
                .with_description("Shout some text")
                .with_arguments(vec![Argument::new("text", FieldType::String).required()])
                .with_returns(FieldType::String),
        )
        .with_action(
            ActionDefinition::new("bio", ActionType::Action)
                .with_arguments(vec![Argument::new("style", FieldType::String)])
                .with_returns(FieldType::String),
        )
}

fn album() -> Entity {
    Entity::new("album", "music")
        .with_field(Field::primary_key("id", FieldType::Integer))
        .with_field(Field::attribute("title", FieldType::String).required())
        .with_field(Field::attribute("artist_id", FieldType::Uuid))
        .with_field(Field::attribute("year", FieldType::Integer))
        .with_relationship(Relationship {
            name: "artist".into(),
            destination: "artist".into(),
            source_field: "artist_id".into(),
            destination_field: "id".into(),
            cardinality: Cardinality::One,
            public: true,
        })
        .with_action(
            ActionDefinition::new("read", ActionType::Read).with_pagination(Pagination {
                default_limit: Some(10),
                max_page_size: Some(50),
            }),
        )
}

pub fn card(html_path: PathBuf) -> UiResource {
    UiResource {
        name: "artist_card".into(),
        uri: CARD_URI.into(),
        html_path,
        title: "Artist card".into(),
        description: Some("Interactive artist card".into()),
        csp: CspDirectives {
            connect_domains: vec!["https://api.example.com".into()],
            ..Default::default()
        },
        permissions: vec!["clipboard_write".into()],
        domain: DomainMode::Auto,
        prefers_border: Some(true),
    }
}

fn with_albums(arguments: &Map<String, Value>) -> Vec<String> {
    match arguments.get("input").and_then(|i| i.get("with_albums")) {
        Some(Value::Bool(true)) => vec!["albums".to_string()],
        _ => Vec::new(),
    }
}

pub fn catalog_with_card(html_path: PathBuf) -> Arc<StaticCatalog> {
    let catalog = StaticCatalog::builder()
        .entity(artist())
        .entity(album())
        .tool(
            Tool::new("list_artists", "artist", "read")
                .with_description("List artists")
                .with_ui_resource(CARD_URI),
        )
        .tool(Tool::new("create_artist", "artist", "create").with_load(LoadSpec::Static(vec![
            "albums".into(),
        ])))
        .tool(Tool::new("update_artist", "artist", "update"))
        .tool(
            Tool::new("update_artist_by_name", "artist", "update")
                .with_identity(IdentityTarget::Named("unique_name".into())),
        )
        .tool(
            Tool::new("destroy_artist", "artist", "destroy")
                .with_load(LoadSpec::Dynamic(Arc::new(with_albums)))
                .with_argument(Argument::new("with_albums", FieldType::Boolean)),
        )
        .tool(
            Tool::new("shout", "artist", "shout")
                .with_argument(Argument::new("excited", FieldType::Boolean)),
        )
        .tool(Tool::new("list_albums", "album", "read"))
        .action_resource(ActionResource {
            name: "artist_bio".into(),
            uri: BIO_URI.into(),
            title: "Artist biography".into(),
            description: Some("Short biography text".into()),
            mime_type: "text/plain".into(),
            entity: "artist".into(),
            action: "bio".into(),
        })
        .ui_resource("music", card(html_path))
        .build();

    match catalog {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => panic!("fixture catalog invalid: {}", e),
    }
}

fn film() -> Entity {
    Entity::new("film", "video")
        .with_field(Field::primary_key("id", FieldType::Integer))
        .with_field(Field::attribute("title", FieldType::String).required())
        .with_action(
            ActionDefinition::new("notes", ActionType::Action).with_returns(FieldType::String),
        )
}

/// The music catalog next to a `video` domain exposing one resource
pub fn two_domain_catalog() -> Arc<StaticCatalog> {
    let catalog = StaticCatalog::builder()
        .entity(artist())
        .entity(album())
        .entity(film())
        .tool(Tool::new("list_artists", "artist", "read"))
        .action_resource(ActionResource {
            name: "film_notes".into(),
            uri: FILM_NOTES_URI.into(),
            title: "Film notes".into(),
            description: None,
            mime_type: "text/plain".into(),
            entity: "film".into(),
            action: "notes".into(),
        })
        .build();

    match catalog {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => panic!("fixture catalog invalid: {}", e),
    }
}

/// Reports the domain the runner was invoked under
fn served_domain(request: &ActionRequest, _records: &[Value]) -> Result<Value, ActionError> {
    Ok(Value::String(format!("served from {}", request.options.domain)))
}

pub fn two_domain_runner(catalog: Arc<StaticCatalog>) -> Arc<InMemoryRunner> {
    Arc::new(InMemoryRunner::new(catalog).with_handler("film", "notes", Arc::new(served_domain)))
}

pub fn catalog() -> Arc<StaticCatalog> {
    catalog_with_card(PathBuf::from("/nonexistent/toolgate/artist_card.html"))
}

fn name_length(row: &Map<String, Value>, args: &Map<String, Value>) -> Value {
    let len = row.get("name").and_then(Value::as_str).map_or(0, str::len) as i64;
    Value::from(len + args.get("bonus").and_then(Value::as_i64).unwrap_or(0))
}

fn shout(request: &ActionRequest, _records: &[Value]) -> Result<Value, ActionError> {
    let text = request.input.get("text").and_then(Value::as_str).unwrap_or("");
    Ok(Value::String(format!("{}!", text.to_uppercase())))
}

fn bio(request: &ActionRequest, records: &[Value]) -> Result<Value, ActionError> {
    let style = request.input.get("style").and_then(Value::as_str).unwrap_or("plain");
    Ok(Value::String(format!("{} artists ({})", records.len(), style)))
}

pub fn runner(catalog: Arc<StaticCatalog>) -> Arc<InMemoryRunner> {
    let runner = InMemoryRunner::new(catalog)
        .with_calculation("artist", "name_length", Arc::new(name_length))
        .with_handler("artist", "shout", Arc::new(shout))
        .with_handler("artist", "bio", Arc::new(bio));

    let seeded = runner
        .seed(
            "artist",
            vec![
                json!({"id": NINA, "name": "Nina Simone", "genre": "jazz", "formed_year": 1954, "rating": 4.9, "royalties": 1200.0}),
                json!({"id": MILES, "name": "Miles Davis", "genre": "jazz", "formed_year": 1944, "rating": 4.8, "royalties": 900.0}),
                json!({"id": BJORK, "name": "Bjork", "genre": "electronic", "formed_year": 1977, "rating": 4.6, "royalties": 700.0}),
            ],
        )
        .and_then(|_| {
            runner.seed(
                "album",
                vec![
                    json!({"id": 1, "title": "Pastel Blues", "artist_id": NINA, "year": 1965}),
                    json!({"id": 2, "title": "Kind of Blue", "artist_id": MILES, "year": 1959}),
                    json!({"id": 3, "title": "Homogenic", "artist_id": BJORK, "year": 1997}),
                ],
            )
        });
    if let Err(e) = seeded {
        panic!("fixture seed failed: {}", e);
    }
    Arc::new(runner)
}

/// Resolve a fixture tool without going through the registry
pub fn resolved(name: &str) -> ResolvedTool {
    let catalog = catalog();
    let tool = catalog
        .list_tools_for_domain("music")
        .into_iter()
        .find(|t| t.name == name)
        .unwrap_or_else(|| panic!("no fixture tool {}", name));
    let entity = catalog
        .entity(&tool.entity)
        .unwrap_or_else(|| panic!("no fixture entity {}", tool.entity));
    let action = entity
        .action(&tool.action)
        .cloned()
        .unwrap_or_else(|| panic!("no fixture action {}", tool.action));
    ResolvedTool {
        tool,
        domain: "music".into(),
        entity,
        action,
    }
}
