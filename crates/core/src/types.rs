// Domain model: entities, their fields, and the actions they declare

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Domain type of a field, argument, or action return value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Decimal,
    Boolean,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Uuid,
    /// Free-form key/value data
    Map,
    /// One of a fixed set of string values
    Enum(Vec<String>),
    Array(Box<FieldType>),
    /// A record of the named entity
    Record(String),
}

impl FieldType {
    /// Whether values of this type support ordering comparisons
    pub fn is_orderable(&self) -> bool {
        matches!(
            self,
            Self::Integer | Self::Float | Self::Decimal | Self::Date | Self::DateTime
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Decimal)
    }
}

/// Value constraints attached to a field or argument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// How a field's value is produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Attribute,
    Calculation,
    Aggregate,
}

/// Argument accepted by an action or a calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub allow_nil: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default = "default_true")]
    pub public: bool,
    #[serde(default)]
    pub constraints: Constraints,
}

impl Argument {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: None,
            allow_nil: true,
            default: None,
            public: true,
            constraints: Constraints::default(),
        }
    }

    pub fn required(mut self) -> Self {
        self.allow_nil = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// An argument must be supplied when it cannot be nil and has no default
    pub fn is_required(&self) -> bool {
        !self.allow_nil && self.default.is_none()
    }
}

/// Attribute, calculation, or aggregate of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub public: bool,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub writable: bool,
    #[serde(default = "default_true")]
    pub allow_nil: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub constraints: Constraints,
    /// Arguments taken by a calculation
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

impl Field {
    pub fn attribute(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            kind: FieldKind::Attribute,
            description: None,
            public: true,
            filterable: true,
            sortable: true,
            writable: true,
            allow_nil: true,
            default: None,
            primary_key: false,
            constraints: Constraints::default(),
            arguments: Vec::new(),
        }
    }

    pub fn primary_key(name: impl Into<String>, field_type: FieldType) -> Self {
        let mut field = Self::attribute(name, field_type);
        field.primary_key = true;
        field.writable = false;
        field.allow_nil = false;
        field
    }

    pub fn calculation(
        name: impl Into<String>,
        field_type: FieldType,
        arguments: Vec<Argument>,
    ) -> Self {
        let mut field = Self::attribute(name, field_type);
        field.kind = FieldKind::Calculation;
        field.writable = false;
        field.arguments = arguments;
        field
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn not_filterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    pub fn not_sortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.allow_nil = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_attribute(&self) -> bool {
        self.kind == FieldKind::Attribute
    }
}

/// Cardinality of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Link from one entity to another, used for eager loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    pub destination: String,
    pub source_field: String,
    pub destination_field: String,
    pub cardinality: Cardinality,
    #[serde(default = "default_true")]
    pub public: bool,
}

/// Named uniqueness constraint over one or more attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub keys: Vec<String>,
}

/// Kind of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Read,
    Create,
    Update,
    Action,
    Destroy,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Action => "action",
            Self::Destroy => "destroy",
        }
    }

    /// Whether the action writes attributes from its input
    pub fn accepts_attributes(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Destroy)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pagination settings of a read action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub default_limit: Option<u64>,
    #[serde(default)]
    pub max_page_size: Option<u64>,
}

/// Fully resolved action of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    /// Attributes writable through this action's input
    #[serde(default)]
    pub accept: Vec<String>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    /// Return type of a generic action
    #[serde(default)]
    pub returns: Option<FieldType>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            name: name.into(),
            action_type,
            description: None,
            arguments: Vec::new(),
            accept: Vec::new(),
            pagination: None,
            returns: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Argument>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_accept<I, S>(mut self, accept: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept = accept.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_returns(mut self, returns: FieldType) -> Self {
        self.returns = Some(returns);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn public_arguments(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|a| a.public)
    }
}

/// An entity type owned by a domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

impl Entity {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            description: None,
            fields: Vec::new(),
            relationships: Vec::new(),
            identities: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_identity(mut self, name: impl Into<String>, keys: Vec<&str>) -> Self {
        self.identities.push(Identity {
            name: name.into(),
            keys: keys.into_iter().map(String::from).collect(),
        });
        self
    }

    pub fn with_action(mut self, action: ActionDefinition) -> Self {
        self.actions.push(action);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn action(&self, name: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn identity(&self, name: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.name == name)
    }

    pub fn primary_key(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.primary_key).collect()
    }

    pub fn public_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.public)
    }

    pub fn filterable_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.public && f.filterable)
    }

    pub fn sortable_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.public && f.sortable)
    }
}

fn default_true() -> bool {
    true
}
