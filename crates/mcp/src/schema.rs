// JSON Schema generation for tool parameters

use crate::registry::ResolvedTool;
use serde_json::{json, Map, Value};
use toolgate_core::runner::AggregateKind;
use toolgate_core::tool::IdentityTarget;
use toolgate_core::types::{ActionType, Argument, Constraints, Entity, Field, FieldKind, FieldType};

/// Page size used when neither the call nor the action sets one
pub const DEFAULT_PAGE_SIZE: u64 = 25;

pub const RESULT_TYPES: [&str; 3] = ["run_query", "count", "exists"];

/// Operators every filterable field supports
pub const EQUALITY_OPERATORS: [&str; 4] = ["eq", "not_eq", "in", "is_nil"];
/// Extra operators for numeric and date fields
pub const ORDERING_OPERATORS: [&str; 4] = [
    "greater_than",
    "greater_than_or_equal",
    "less_than",
    "less_than_or_equal",
];

/// Operators accepted for a field of this type
pub fn filter_operators(field_type: &FieldType) -> Vec<&'static str> {
    let mut ops = EQUALITY_OPERATORS.to_vec();
    if field_type.is_orderable() {
        ops.extend(ORDERING_OPERATORS);
    }
    if *field_type == FieldType::String {
        ops.push("contains");
    }
    ops
}

/// JSON Schema of a single domain type
pub fn type_schema(field_type: &FieldType, constraints: &Constraints) -> Value {
    let mut schema = match field_type {
        FieldType::String => json!({"type": "string"}),
        FieldType::Integer => json!({"type": "integer"}),
        FieldType::Float | FieldType::Decimal => json!({"type": "number"}),
        FieldType::Boolean => json!({"type": "boolean"}),
        FieldType::Date => json!({"type": "string", "format": "date"}),
        FieldType::DateTime => json!({"type": "string", "format": "date-time"}),
        FieldType::Uuid => json!({"type": "string", "format": "uuid"}),
        FieldType::Map | FieldType::Record(_) => {
            json!({"type": "object", "additionalProperties": true})
        }
        FieldType::Enum(values) => json!({"type": "string", "enum": values}),
        FieldType::Array(inner) => {
            json!({"type": "array", "items": type_schema(inner, &Constraints::default())})
        }
    };

    if let Value::Object(map) = &mut schema {
        if let Some(min) = constraints.min {
            map.insert("minimum".into(), json!(min));
        }
        if let Some(max) = constraints.max {
            map.insert("maximum".into(), json!(max));
        }
        if let Some(min) = constraints.min_length {
            map.insert("minLength".into(), json!(min));
        }
        if let Some(max) = constraints.max_length {
            map.insert("maxLength".into(), json!(max));
        }
    }
    schema
}

fn described(mut schema: Value, description: Option<&String>) -> Value {
    if let (Value::Object(map), Some(description)) = (&mut schema, description) {
        map.insert("description".into(), json!(description));
    }
    schema
}

fn field_schema(field: &Field) -> Value {
    described(
        type_schema(&field.field_type, &field.constraints),
        field.description.as_ref(),
    )
}

fn argument_schema(argument: &Argument) -> Value {
    let mut schema = described(
        type_schema(&argument.field_type, &argument.constraints),
        argument.description.as_ref(),
    );
    if let (Value::Object(map), Some(default)) = (&mut schema, &argument.default) {
        map.insert("default".into(), default.clone());
    }
    schema
}

fn object_schema(properties: Map<String, Value>, required: Vec<String>) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    schema.insert("additionalProperties".into(), json!(false));
    Value::Object(schema)
}

/// Keys accepted inside `input`: writable accepted attributes, public action
/// arguments, then arguments declared on the tool
pub fn input_properties(resolved: &ResolvedTool) -> (Map<String, Value>, Vec<String>) {
    let mut properties = Map::new();
    let mut required = Vec::new();

    if resolved.action.action_type.accepts_attributes() {
        for name in &resolved.action.accept {
            if let Some(field) = resolved
                .entity
                .field(name)
                .filter(|f| f.is_attribute() && f.writable)
            {
                properties.insert(field.name.clone(), field_schema(field));
            }
        }
    }

    for argument in resolved.action.public_arguments().chain(&resolved.tool.arguments) {
        properties.insert(argument.name.clone(), argument_schema(argument));
        if argument.is_required() && !required.contains(&argument.name) {
            required.push(argument.name.clone());
        }
    }

    (properties, required)
}

/// Fields locating the target of an update or destroy
pub fn identity_fields<'a>(resolved: &'a ResolvedTool) -> Vec<&'a Field> {
    if !matches!(
        resolved.action.action_type,
        ActionType::Update | ActionType::Destroy
    ) {
        return Vec::new();
    }
    match &resolved.tool.identity {
        IdentityTarget::Disabled => Vec::new(),
        IdentityTarget::PrimaryKey => resolved.entity.primary_key(),
        IdentityTarget::Named(name) => resolved
            .entity
            .identity(name)
            .map(|identity| {
                identity
                    .keys
                    .iter()
                    .filter_map(|key| resolved.entity.field(key))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Build the parameter schema of a tool
pub fn tool_schema(resolved: &ResolvedTool, strict: bool) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    let (input, input_required) = input_properties(resolved);
    if !input.is_empty() {
        if !input_required.is_empty() {
            required.push("input".to_string());
        }
        properties.insert("input".into(), object_schema(input, input_required));
    }

    for field in identity_fields(resolved) {
        properties.insert(field.name.clone(), field_schema(field));
        required.push(field.name.clone());
    }

    if resolved.action.action_type == ActionType::Read {
        read_properties(resolved, &mut properties);
    }

    let mut schema = object_schema(properties, required);
    if strict {
        make_strict(&mut schema);
    }
    schema
}

fn read_properties(resolved: &ResolvedTool, properties: &mut Map<String, Value>) {
    let entity = &resolved.entity;
    let pagination = resolved.action.pagination.clone().unwrap_or_default();

    properties.insert("filter".into(), filter_schema(entity));
    properties.insert("result_type".into(), result_type_schema(entity));

    let mut limit = json!({
        "type": "integer",
        "minimum": 1,
        "default": pagination.default_limit.unwrap_or(DEFAULT_PAGE_SIZE),
        "description": "Maximum number of records to return",
    });
    if let Some(max) = pagination.max_page_size {
        limit["description"] = json!(format!(
            "Maximum number of records to return, at most {}",
            max
        ));
    }
    properties.insert("limit".into(), limit);
    properties.insert(
        "offset".into(),
        json!({"type": "integer", "minimum": 0, "default": 0}),
    );

    if let Some(sort) = sort_schema(entity) {
        properties.insert("sort".into(), sort);
    }
}

fn filter_schema(entity: &Entity) -> Value {
    let mut properties = Map::new();
    for field in entity.filterable_fields() {
        let value = type_schema(&field.field_type, &Constraints::default());
        let mut ops = Map::new();
        for op in filter_operators(&field.field_type) {
            let schema = match op {
                "in" => json!({"type": "array", "items": value.clone()}),
                "is_nil" => json!({"type": "boolean"}),
                _ => value.clone(),
            };
            ops.insert(op.to_string(), schema);
        }
        properties.insert(
            field.name.clone(),
            described(object_schema(ops, Vec::new()), field.description.as_ref()),
        );
    }
    object_schema(properties, Vec::new())
}

/// Fields an aggregate may target
pub fn aggregate_fields(entity: &Entity) -> Vec<String> {
    entity.filterable_fields().map(|f| f.name.clone()).collect()
}

fn result_type_schema(entity: &Entity) -> Value {
    let mut variants = vec![json!({"type": "string", "enum": RESULT_TYPES})];
    let fields = aggregate_fields(entity);
    if !fields.is_empty() {
        let mut aggregate = Map::new();
        aggregate.insert(
            "aggregate".into(),
            json!({"type": "string", "enum": AggregateKind::ALL}),
        );
        aggregate.insert("field".into(), json!({"type": "string", "enum": fields}));
        variants.push(object_schema(
            aggregate,
            vec!["aggregate".into(), "field".into()],
        ));
    }
    json!({ "anyOf": variants, "default": "run_query" })
}

fn sort_schema(entity: &Entity) -> Option<Value> {
    let fields: Vec<&Field> = entity.sortable_fields().collect();
    if fields.is_empty() {
        return None;
    }
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();

    let mut item = Map::new();
    item.insert("field".into(), json!({"type": "string", "enum": names}));
    item.insert(
        "direction".into(),
        json!({"type": "string", "enum": ["asc", "desc"], "default": "asc"}),
    );

    let mut calc_inputs = Map::new();
    for field in fields
        .iter()
        .filter(|f| f.kind == FieldKind::Calculation && !f.arguments.is_empty())
    {
        let mut args = Map::new();
        let mut required = Vec::new();
        for argument in field.arguments.iter().filter(|a| a.public) {
            args.insert(argument.name.clone(), argument_schema(argument));
            if argument.is_required() {
                required.push(argument.name.clone());
            }
        }
        calc_inputs.insert(field.name.clone(), object_schema(args, required));
    }
    if !calc_inputs.is_empty() {
        item.insert(
            "input_for_fields".into(),
            object_schema(calc_inputs, Vec::new()),
        );
    }

    Some(json!({
        "type": "array",
        "items": object_schema(item, vec!["field".into()]),
    }))
}

/// Require every property and make the formerly optional ones nullable
pub fn make_strict(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };

    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(variants)) = map.get_mut(key) {
            variants.iter_mut().for_each(make_strict);
        }
    }
    if let Some(items) = map.get_mut("items") {
        make_strict(items);
    }

    let required: Vec<String> = match map.get("required") {
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(|n| n.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    };
    let Some(Value::Object(properties)) = map.get_mut("properties") else {
        return;
    };

    let mut all = Vec::with_capacity(properties.len());
    for (name, property) in properties.iter_mut() {
        make_strict(property);
        if !required.contains(name) {
            make_nullable(property);
        }
        all.push(Value::String(name.clone()));
    }
    map.insert("required".into(), Value::Array(all));
}

fn make_nullable(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };
    if let Some(Value::String(ty)) = map.get("type").cloned() {
        map.insert("type".into(), json!([ty, "null"]));
        if let Some(Value::Array(values)) = map.get_mut("enum") {
            values.push(Value::Null);
        }
    } else if let Some(Value::Array(variants)) = map.get_mut("anyOf") {
        variants.push(json!({"type": "null"}));
    }
}
