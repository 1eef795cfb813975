// Execution engine: validate, invoke, and serialize a single tool call

use crate::error::{ExecutionFault, ResourceReadError};
use crate::options::{InvocationContext, ToolEndCallback, ToolStartCallback};
use crate::registry::ResolvedTool;
use crate::schema::{self, DEFAULT_PAGE_SIZE};
use serde_json::{Map, Value};
use std::sync::Arc;
use toolgate_core::error::ActionError;
use toolgate_core::events::{ToolEndEvent, ToolOutcomeSummary, ToolStartEvent};
use toolgate_core::runner::{
    ActionOutput, ActionRequest, ActionRunner, AggregateKind, InvokeOptions, ReadQuery, ReadResult,
};
use toolgate_core::serializer::{SerializeOptions, Serializer};
use toolgate_core::tool::{ActionResource, IdentityTarget, UiResource};
use toolgate_core::types::{ActionDefinition, ActionType, Constraints, Entity, FieldType};

/// Text returned by generic actions without a declared return type
pub const SUCCESS_MARKER: &str = "success";

/// Transport-agnostic result of a tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub is_error: bool,
    /// Serialized result, or the serialized error list
    pub text: String,
    pub raw: Option<Value>,
}

pub struct Executor {
    runner: Arc<dyn ActionRunner>,
    serializer: Arc<dyn Serializer>,
    on_tool_start: Option<ToolStartCallback>,
    on_tool_end: Option<ToolEndCallback>,
}

impl Executor {
    pub fn new(runner: Arc<dyn ActionRunner>, serializer: Arc<dyn Serializer>) -> Self {
        Self {
            runner,
            serializer,
            on_tool_start: None,
            on_tool_end: None,
        }
    }

    pub fn with_callbacks(
        mut self,
        on_tool_start: Option<ToolStartCallback>,
        on_tool_end: Option<ToolEndCallback>,
    ) -> Self {
        self.on_tool_start = on_tool_start;
        self.on_tool_end = on_tool_end;
        self
    }

    /// Run a tool. Domain failures come back as an error outcome; only a
    /// failing lifecycle callback aborts the call.
    pub async fn run_tool(
        &self,
        resolved: &ResolvedTool,
        arguments: Map<String, Value>,
        ctx: &InvocationContext,
    ) -> Result<ToolOutcome, ExecutionFault> {
        let mut start = ToolStartEvent::new(
            &resolved.tool.name,
            &resolved.entity.name,
            &resolved.action.name,
            Value::Object(arguments.clone()),
        );
        start.actor = ctx.actor.clone();
        start.tenant = ctx.tenant.clone();

        if let Some(callback) = &self.on_tool_start {
            callback(&start).map_err(|e| ExecutionFault::StartCallback(e.to_string()))?;
        }

        tracing::debug!(
            "Calling tool {} ({}.{})",
            resolved.tool.name,
            resolved.entity.name,
            resolved.action.name
        );

        let outcome = match self.execute(resolved, arguments, ctx).await {
            Ok((raw, text)) => ToolOutcome {
                is_error: false,
                text,
                raw: Some(raw),
            },
            Err(e) => {
                tracing::debug!("Tool {} failed: {}", resolved.tool.name, e);
                ToolOutcome {
                    is_error: true,
                    text: self.serializer.serialize_errors(&e.to_entries()).to_string(),
                    raw: None,
                }
            }
        };

        let summary = if outcome.is_error {
            ToolOutcomeSummary::Error {
                error: outcome.text.clone(),
            }
        } else {
            ToolOutcomeSummary::Ok {
                result: outcome.text.clone(),
            }
        };
        let end = ToolEndEvent::new(&start, summary);
        if let Some(callback) = &self.on_tool_end {
            callback(&end).map_err(|e| ExecutionFault::EndCallback(e.to_string()))?;
        }

        tracing::debug!(
            "Tool {} finished in {}ms (error: {})",
            resolved.tool.name,
            end.duration_ms,
            outcome.is_error
        );
        Ok(outcome)
    }

    async fn execute(
        &self,
        resolved: &ResolvedTool,
        mut arguments: Map<String, Value>,
        ctx: &InvocationContext,
    ) -> Result<(Value, String), ActionError> {
        arguments.retain(|_, v| !v.is_null());

        let input = match arguments.get("input") {
            None => Map::new(),
            Some(Value::Object(input)) => input.clone(),
            Some(_) => return Err(ActionError::invalid_argument("input", "must be an object")),
        };
        check_inputs(resolved, &input)?;

        let action_input: Map<String, Value> = input
            .into_iter()
            .filter(|(key, _)| !resolved.tool.arguments.iter().any(|a| &a.name == key))
            .collect();

        let load = resolved.tool.load.resolve(&arguments);
        let mut options = InvokeOptions {
            domain: resolved.domain.clone(),
            actor: ctx.actor.clone(),
            tenant: ctx.tenant.clone(),
            context: ctx.context.clone(),
            load: load.clone(),
            ..Default::default()
        };
        let record_type = FieldType::Record(resolved.entity.name.clone());

        match resolved.action.action_type {
            ActionType::Read => {
                let query = build_query(resolved, &arguments, ctx.strict)?;
                let result = query.result.clone();
                options.query = Some(query);
                let (value, ty) = match self.invoke(resolved, action_input, options).await? {
                    ActionOutput::Records(records) => {
                        (Value::Array(records), FieldType::Array(Box::new(record_type)))
                    }
                    ActionOutput::Count(count) => (Value::from(count), FieldType::Integer),
                    ActionOutput::Exists(exists) => (Value::Bool(exists), FieldType::Boolean),
                    ActionOutput::Aggregate(value) => {
                        (value, aggregate_type(&resolved.entity, &result))
                    }
                    other => (other.to_value(), record_type),
                };
                self.render(&value, &ty, &resolved.domain, load)
            }
            ActionType::Create => {
                let record = self.invoke(resolved, action_input, options).await?.to_value();
                self.render(&record, &record_type, &resolved.domain, load)
            }
            ActionType::Update | ActionType::Destroy => {
                options.target = identity_target(resolved, &arguments)?;
                options.target_limit = Some(1);
                let first = match self.invoke(resolved, action_input, options).await? {
                    ActionOutput::Affected(records) | ActionOutput::Records(records) => {
                        records.into_iter().next()
                    }
                    other => Some(other.to_value()),
                };
                let record = first.ok_or_else(|| ActionError::not_found(&resolved.entity.name))?;
                self.render(&record, &record_type, &resolved.domain, load)
            }
            ActionType::Action => {
                let value = self.invoke(resolved, action_input, options).await?.to_value();
                match &resolved.action.returns {
                    Some(ty) => self.render(&value, ty, &resolved.domain, load),
                    None => Ok((
                        Value::String(SUCCESS_MARKER.to_string()),
                        SUCCESS_MARKER.to_string(),
                    )),
                }
            }
        }
    }

    async fn invoke(
        &self,
        resolved: &ResolvedTool,
        input: Map<String, Value>,
        options: InvokeOptions,
    ) -> Result<ActionOutput, ActionError> {
        self.runner
            .invoke(ActionRequest {
                entity: resolved.entity.name.clone(),
                action: resolved.action.name.clone(),
                action_type: resolved.action.action_type,
                input,
                options,
            })
            .await
    }

    fn render(
        &self,
        value: &Value,
        ty: &FieldType,
        domain: &str,
        load: Vec<String>,
    ) -> Result<(Value, String), ActionError> {
        let serialized = self
            .serializer
            .serialize_value(
                value,
                ty,
                &Constraints::default(),
                domain,
                &SerializeOptions { load },
            )
            .map_err(|e| ActionError::failed(format!("{:#}", e)))?;
        let text = to_text(&serialized);
        Ok((serialized, text))
    }

    /// Run the string-returning action behind a resource, under the domain
    /// of its entity. Arguments the action does not declare are dropped.
    pub async fn read_action_resource(
        &self,
        resource: &ActionResource,
        domain: &str,
        action: &ActionDefinition,
        arguments: Map<String, Value>,
        ctx: &InvocationContext,
    ) -> Result<String, ResourceReadError> {
        let input: Map<String, Value> = arguments
            .into_iter()
            .filter(|(key, _)| action.arguments.iter().any(|a| &a.name == key))
            .collect();

        let output = self
            .runner
            .invoke(ActionRequest {
                entity: resource.entity.clone(),
                action: action.name.clone(),
                action_type: action.action_type,
                input,
                options: InvokeOptions {
                    domain: domain.to_string(),
                    actor: ctx.actor.clone(),
                    tenant: ctx.tenant.clone(),
                    context: ctx.context.clone(),
                    ..Default::default()
                },
            })
            .await?;

        let ty = action.returns.clone().unwrap_or(FieldType::String);
        let serialized = self
            .serializer
            .serialize_value(
                &output.to_value(),
                &ty,
                &Constraints::default(),
                domain,
                &SerializeOptions::default(),
            )
            .map_err(|e| ActionError::failed(format!("{:#}", e)))?;
        Ok(to_text(&serialized))
    }

    /// Read a UI resource's HTML from disk, fresh on every call
    pub async fn read_ui_resource(&self, resource: &UiResource) -> Result<String, ResourceReadError> {
        tokio::fs::read_to_string(&resource.html_path)
            .await
            .map_err(|source| ResourceReadError::Io {
                path: resource.html_path.clone(),
                source,
            })
    }
}

/// Strings are returned bare, everything else as JSON text
fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reject keys the schema does not declare and missing required arguments
pub fn check_inputs(resolved: &ResolvedTool, input: &Map<String, Value>) -> Result<(), ActionError> {
    let (properties, required) = schema::input_properties(resolved);

    let unknown: Vec<String> = input
        .keys()
        .filter(|key| !properties.contains_key(*key))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(ActionError::UnknownInputs { keys: unknown });
    }

    for name in required {
        if input.get(&name).map_or(true, Value::is_null) {
            return Err(ActionError::Required { field: name });
        }
    }
    Ok(())
}

fn identity_target(
    resolved: &ResolvedTool,
    arguments: &Map<String, Value>,
) -> Result<Option<Vec<(String, Value)>>, ActionError> {
    if resolved.tool.identity == IdentityTarget::Disabled {
        return Ok(None);
    }
    schema::identity_fields(resolved)
        .into_iter()
        .map(|field| match arguments.get(&field.name) {
            Some(value) => Ok((field.name.clone(), value.clone())),
            None => Err(ActionError::Required {
                field: field.name.clone(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn build_query(
    resolved: &ResolvedTool,
    arguments: &Map<String, Value>,
    strict: bool,
) -> Result<ReadQuery, ActionError> {
    let entity = &resolved.entity;
    let pagination = resolved.action.pagination.clone().unwrap_or_default();

    let limit = match arguments.get("limit") {
        None => pagination.default_limit.unwrap_or(DEFAULT_PAGE_SIZE),
        Some(value) => {
            let requested = value.as_u64().ok_or_else(|| {
                ActionError::invalid_argument("limit", "must be a non-negative integer")
            })?;
            match pagination.max_page_size {
                Some(max) => requested.min(max),
                None => requested,
            }
        }
    };

    let offset = match arguments.get("offset") {
        None => None,
        Some(value) => Some(value.as_u64().ok_or_else(|| {
            ActionError::invalid_argument("offset", "must be a non-negative integer")
        })?),
    };

    let filter = match arguments.get("filter") {
        None => Map::new(),
        Some(Value::Object(filter)) => build_filter(entity, filter, strict)?,
        Some(_) => {
            return Err(ActionError::InvalidFilter {
                field: "filter".into(),
                message: "must be an object".into(),
            })
        }
    };

    let (sort, sort_input) = match arguments.get("sort") {
        None => (None, Map::new()),
        Some(Value::Array(items)) => build_sort(entity, items, strict)?,
        Some(_) => {
            return Err(ActionError::InvalidSort {
                field: "sort".into(),
                message: "must be a list".into(),
            })
        }
    };

    Ok(ReadQuery {
        filter,
        sort,
        sort_input,
        limit: Some(limit),
        offset,
        result: parse_result_type(entity, arguments.get("result_type"), strict)?,
    })
}

fn build_filter(
    entity: &Entity,
    filter: &Map<String, Value>,
    strict: bool,
) -> Result<Map<String, Value>, ActionError> {
    let mut built = Map::new();
    for (name, condition) in filter {
        let field = entity
            .filterable_fields()
            .find(|f| &f.name == name)
            .ok_or_else(|| ActionError::InvalidFilter {
                field: name.clone(),
                message: "no such filterable field".into(),
            })?;

        let operators = match condition {
            Value::Object(ops) => ops.clone(),
            Value::Null if strict => continue,
            bare => {
                let mut ops = Map::new();
                ops.insert("eq".into(), bare.clone());
                ops
            }
        };

        let allowed = schema::filter_operators(&field.field_type);
        let mut kept = Map::new();
        for (op, value) in operators {
            if strict && value.is_null() {
                continue;
            }
            if !allowed.contains(&op.as_str()) {
                return Err(ActionError::InvalidFilter {
                    field: name.clone(),
                    message: format!("unsupported operator {}", op),
                });
            }
            kept.insert(op, value);
        }
        if !kept.is_empty() {
            built.insert(name.clone(), Value::Object(kept));
        }
    }
    Ok(built)
}

fn build_sort(
    entity: &Entity,
    items: &[Value],
    strict: bool,
) -> Result<(Option<String>, Map<String, Value>), ActionError> {
    let mut specs = Vec::with_capacity(items.len());
    let mut sort_input = Map::new();

    for item in items {
        let Value::Object(item) = item else {
            return Err(ActionError::InvalidSort {
                field: "sort".into(),
                message: "each entry must be an object".into(),
            });
        };
        let name = item.get("field").and_then(Value::as_str).ok_or_else(|| {
            ActionError::InvalidSort {
                field: "sort".into(),
                message: "missing field".into(),
            }
        })?;
        if !entity.sortable_fields().any(|f| f.name == name) {
            return Err(ActionError::InvalidSort {
                field: name.to_string(),
                message: "no such sortable field".into(),
            });
        }

        let descending = match item.get("direction") {
            None | Some(Value::Null) => false,
            Some(Value::String(d)) if d == "asc" => false,
            Some(Value::String(d)) if d == "desc" => true,
            Some(other) => {
                return Err(ActionError::InvalidSort {
                    field: name.to_string(),
                    message: format!("invalid direction {}", other),
                })
            }
        };
        specs.push(if descending {
            format!("-{}", name)
        } else {
            name.to_string()
        });

        if let Some(Value::Object(inputs)) = item.get("input_for_fields") {
            for (calc, args) in inputs {
                if strict && args.is_null() {
                    continue;
                }
                sort_input.insert(calc.clone(), args.clone());
            }
        }
    }

    let sort = if specs.is_empty() {
        None
    } else {
        Some(specs.join(","))
    };
    Ok((sort, sort_input))
}

fn parse_result_type(
    entity: &Entity,
    value: Option<&Value>,
    strict: bool,
) -> Result<ReadResult, ActionError> {
    match value {
        None => Ok(ReadResult::Records),
        Some(Value::String(kind)) => match kind.as_str() {
            "run_query" => Ok(ReadResult::Records),
            "count" => Ok(ReadResult::Count),
            "exists" => Ok(ReadResult::Exists),
            other => Err(ActionError::invalid_argument(
                "result_type",
                format!("unknown result type {}", other),
            )),
        },
        Some(Value::Object(request)) => {
            let kind = request
                .get("aggregate")
                .and_then(Value::as_str)
                .and_then(AggregateKind::parse)
                .ok_or_else(|| {
                    ActionError::InvalidAggregate(format!(
                        "aggregate must be one of {}",
                        AggregateKind::ALL.join(", ")
                    ))
                })?;
            let field = request
                .get("field")
                .and_then(Value::as_str)
                .filter(|f| schema::aggregate_fields(entity).iter().any(|a| a == f))
                .ok_or_else(|| {
                    ActionError::InvalidAggregate(
                        "field must be a public, filterable field".into(),
                    )
                })?;
            Ok(ReadResult::Aggregate {
                kind,
                field: field.to_string(),
            })
        }
        Some(Value::Null) if strict => Ok(ReadResult::Records),
        Some(other) => Err(ActionError::invalid_argument(
            "result_type",
            format!("unexpected value {}", other),
        )),
    }
}

fn aggregate_type(entity: &Entity, result: &ReadResult) -> FieldType {
    match result {
        ReadResult::Aggregate {
            kind: AggregateKind::Count,
            ..
        } => FieldType::Integer,
        ReadResult::Aggregate {
            kind: AggregateKind::Avg,
            ..
        } => FieldType::Float,
        ReadResult::Aggregate { field, .. } => entity
            .field(field)
            .map(|f| f.field_type.clone())
            .unwrap_or(FieldType::Float),
        _ => FieldType::Integer,
    }
}
