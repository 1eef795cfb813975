// In-memory action runner backing the demo server and tests

use crate::catalog::ActionCatalog;
use crate::error::ActionError;
use crate::runner::{ActionOutput, ActionRequest, ActionRunner, AggregateKind, ReadQuery, ReadResult};
use crate::types::{ActionType, Cardinality, Entity, FieldKind, FieldType};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Record = Map<String, Value>;

/// Handler for a generic action; receives the entity's current records
pub type ActionHandler =
    Arc<dyn Fn(&ActionRequest, &[Value]) -> Result<Value, ActionError> + Send + Sync>;

/// Computes a calculation from a record and the calculation's arguments
pub type CalculationFn = Arc<dyn Fn(&Record, &Map<String, Value>) -> Value + Send + Sync>;

pub const FILTER_OPERATORS: [&str; 9] = [
    "eq",
    "not_eq",
    "in",
    "is_nil",
    "greater_than",
    "greater_than_or_equal",
    "less_than",
    "less_than_or_equal",
    "contains",
];

pub struct InMemoryRunner {
    catalog: Arc<dyn ActionCatalog>,
    records: RwLock<HashMap<String, Vec<Record>>>,
    handlers: HashMap<(String, String), ActionHandler>,
    calculations: HashMap<(String, String), CalculationFn>,
}

impl InMemoryRunner {
    pub fn new(catalog: Arc<dyn ActionCatalog>) -> Self {
        Self {
            catalog,
            records: RwLock::new(HashMap::new()),
            handlers: HashMap::new(),
            calculations: HashMap::new(),
        }
    }

    pub fn with_handler(
        mut self,
        entity: impl Into<String>,
        action: impl Into<String>,
        handler: ActionHandler,
    ) -> Self {
        self.handlers.insert((entity.into(), action.into()), handler);
        self
    }

    pub fn with_calculation(
        mut self,
        entity: impl Into<String>,
        field: impl Into<String>,
        calculation: CalculationFn,
    ) -> Self {
        self.calculations
            .insert((entity.into(), field.into()), calculation);
        self
    }

    /// Insert records as-is, bypassing actions
    pub fn seed(&self, entity: &str, records: Vec<Value>) -> anyhow::Result<()> {
        if self.catalog.entity(entity).is_none() {
            anyhow::bail!("cannot seed unknown entity {}", entity);
        }
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            match record {
                Value::Object(map) => rows.push(map),
                other => anyhow::bail!("seed record for {} is not an object: {}", entity, other),
            }
        }
        let mut store = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("record store lock poisoned"))?;
        store.entry(entity.to_string()).or_default().extend(rows);
        Ok(())
    }

    pub fn records(&self, entity: &str) -> Vec<Value> {
        self.records
            .read()
            .map(|store| {
                store
                    .get(entity)
                    .map(|rows| rows.iter().cloned().map(Value::Object).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn snapshot(&self, entity: &str) -> Result<Vec<Record>, ActionError> {
        let store = self.records.read().map_err(|_| poisoned())?;
        Ok(store.get(entity).cloned().unwrap_or_default())
    }

    fn entity(&self, name: &str) -> Result<Entity, ActionError> {
        self.catalog
            .entity(name)
            .ok_or_else(|| ActionError::failed(format!("unknown entity {}", name)))
    }

    fn read(&self, entity: &Entity, request: &ActionRequest) -> Result<ActionOutput, ActionError> {
        let query = request.options.query.clone().unwrap_or_default();
        let mut needed: Vec<String> = request.options.load.clone();
        needed.extend(query.filter.keys().cloned());
        if let Some(sort) = &query.sort {
            needed.extend(parse_sort(sort).into_iter().map(|(f, _)| f));
        }

        let mut rows = Vec::new();
        for mut row in self.snapshot(&entity.name)? {
            self.compute_calculations(entity, &mut row, &needed, &query.sort_input);
            if matches_filter(entity, &row, &query.filter)? {
                rows.push(row);
            }
        }

        if let Some(sort) = &query.sort {
            sort_rows(entity, &mut rows, sort)?;
        }

        match &query.result {
            ReadResult::Count => Ok(ActionOutput::Count(rows.len() as u64)),
            ReadResult::Exists => Ok(ActionOutput::Exists(!rows.is_empty())),
            ReadResult::Aggregate { kind, field } => {
                Ok(ActionOutput::Aggregate(aggregate(&rows, *kind, field)))
            }
            ReadResult::Records => {
                let records = paginate(rows, &query)
                    .into_iter()
                    .map(|row| self.with_loads(entity, row, &request.options.load))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ActionOutput::Records(records))
            }
        }
    }

    fn create(&self, entity: &Entity, request: &ActionRequest) -> Result<ActionOutput, ActionError> {
        let action = self.action(entity, &request.action)?;
        let mut store = self.records.write().map_err(|_| poisoned())?;
        let rows = store.entry(entity.name.clone()).or_default();

        let mut record = Record::new();
        for field in entity.fields.iter().filter(|f| f.is_attribute()) {
            let supplied = request
                .input
                .get(&field.name)
                .filter(|_| action.accept.contains(&field.name));
            let value = match (supplied, &field.default) {
                (Some(v), _) => {
                    check_type(&field.name, &field.field_type, v)?;
                    v.clone()
                }
                (None, Some(default)) => default.clone(),
                (None, None) if field.primary_key => generate_key(&field.name, &field.field_type, rows),
                (None, None) => Value::Null,
            };
            if value.is_null() && !field.allow_nil {
                return Err(ActionError::Required {
                    field: field.name.clone(),
                });
            }
            record.insert(field.name.clone(), value);
        }

        rows.push(record.clone());
        drop(store);

        let record = self.with_loads(entity, record, &request.options.load)?;
        tracing::debug!("Created {} record", entity.name);
        Ok(ActionOutput::Record(record))
    }

    fn update(&self, entity: &Entity, request: &ActionRequest) -> Result<ActionOutput, ActionError> {
        let action = self.action(entity, &request.action)?;
        for (key, value) in &request.input {
            if let Some(field) = entity.field(key).filter(|_| action.accept.contains(key)) {
                check_type(key, &field.field_type, value)?;
            }
        }

        let mut store = self.records.write().map_err(|_| poisoned())?;
        let rows = store.entry(entity.name.clone()).or_default();
        let limit = request.options.target_limit.map(|l| l as usize).unwrap_or(usize::MAX);

        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if updated.len() >= limit {
                break;
            }
            if !matches_target(row, request.options.target.as_deref()) {
                continue;
            }
            for (key, value) in &request.input {
                if action.accept.contains(key) {
                    row.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        drop(store);

        let updated = updated
            .into_iter()
            .map(|row| self.with_loads(entity, row, &request.options.load))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ActionOutput::Affected(updated))
    }

    fn destroy(&self, entity: &Entity, request: &ActionRequest) -> Result<ActionOutput, ActionError> {
        let mut store = self.records.write().map_err(|_| poisoned())?;
        let rows = store.entry(entity.name.clone()).or_default();
        let limit = request.options.target_limit.map(|l| l as usize).unwrap_or(usize::MAX);

        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows.drain(..) {
            if removed.len() < limit && matches_target(&row, request.options.target.as_deref()) {
                removed.push(row);
            } else {
                kept.push(row);
            }
        }
        *rows = kept;
        drop(store);

        let removed = removed
            .into_iter()
            .map(|row| self.with_loads(entity, row, &request.options.load))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ActionOutput::Affected(removed))
    }

    fn run_handler(&self, entity: &Entity, request: &ActionRequest) -> Result<ActionOutput, ActionError> {
        let handler = self
            .handlers
            .get(&(entity.name.clone(), request.action.clone()))
            .ok_or_else(|| {
                ActionError::failed(format!(
                    "no handler registered for {}.{}",
                    entity.name, request.action
                ))
            })?;
        let records: Vec<Value> = self
            .snapshot(&entity.name)?
            .into_iter()
            .map(Value::Object)
            .collect();
        handler(request, &records).map(ActionOutput::Value)
    }

    fn action<'a>(
        &self,
        entity: &'a Entity,
        name: &str,
    ) -> Result<&'a crate::types::ActionDefinition, ActionError> {
        entity
            .action(name)
            .ok_or_else(|| ActionError::failed(format!("unknown action {}.{}", entity.name, name)))
    }

    fn compute_calculations(
        &self,
        entity: &Entity,
        row: &mut Record,
        needed: &[String],
        sort_input: &Map<String, Value>,
    ) {
        for field in entity.fields.iter().filter(|f| f.kind == FieldKind::Calculation) {
            if !needed.iter().any(|n| n == &field.name) {
                continue;
            }
            let Some(calc) = self
                .calculations
                .get(&(entity.name.clone(), field.name.clone()))
            else {
                continue;
            };
            let mut args = Map::new();
            for arg in &field.arguments {
                if let Some(default) = &arg.default {
                    args.insert(arg.name.clone(), default.clone());
                }
            }
            if let Some(Value::Object(supplied)) = sort_input.get(&field.name) {
                for (k, v) in supplied {
                    args.insert(k.clone(), v.clone());
                }
            }
            let value = calc(row, &args);
            row.insert(field.name.clone(), value);
        }
    }

    fn with_loads(&self, entity: &Entity, mut row: Record, load: &[String]) -> Result<Value, ActionError> {
        for path in load {
            let (head, rest) = match path.split_once('.') {
                Some((head, rest)) => (head, vec![rest.to_string()]),
                None => (path.as_str(), vec![]),
            };
            let Some(rel) = entity.relationship(head) else {
                continue;
            };
            let destination = self.entity(&rel.destination)?;
            let key = row.get(&rel.source_field).cloned().unwrap_or(Value::Null);
            let related: Vec<Record> = self
                .snapshot(&rel.destination)?
                .into_iter()
                .filter(|r| !key.is_null() && r.get(&rel.destination_field) == Some(&key))
                .collect();

            let value = match rel.cardinality {
                Cardinality::One => match related.into_iter().next() {
                    Some(r) => self.with_loads(&destination, r, &rest)?,
                    None => Value::Null,
                },
                Cardinality::Many => Value::Array(
                    related
                        .into_iter()
                        .map(|r| self.with_loads(&destination, r, &rest))
                        .collect::<Result<_, _>>()?,
                ),
            };
            row.insert(head.to_string(), value);
        }
        Ok(Value::Object(row))
    }
}

#[async_trait::async_trait]
impl ActionRunner for InMemoryRunner {
    async fn invoke(&self, request: ActionRequest) -> Result<ActionOutput, ActionError> {
        let entity = self.entity(&request.entity)?;
        tracing::debug!(
            "Invoking {}.{} ({})",
            request.entity,
            request.action,
            request.action_type
        );
        match request.action_type {
            ActionType::Read => self.read(&entity, &request),
            ActionType::Create => self.create(&entity, &request),
            ActionType::Update => self.update(&entity, &request),
            ActionType::Destroy => self.destroy(&entity, &request),
            ActionType::Action => self.run_handler(&entity, &request),
        }
    }
}

fn poisoned() -> ActionError {
    ActionError::failed("record store lock poisoned")
}

fn generate_key(name: &str, field_type: &FieldType, rows: &[Record]) -> Value {
    match field_type {
        FieldType::Integer => {
            let max = rows
                .iter()
                .filter_map(|r| r.get(name).and_then(Value::as_i64))
                .max()
                .unwrap_or(0);
            Value::from(max + 1)
        }
        _ => Value::String(uuid::Uuid::new_v4().to_string()),
    }
}

fn check_type(name: &str, field_type: &FieldType, value: &Value) -> Result<(), ActionError> {
    let ok = match (field_type, value) {
        (_, Value::Null) => true,
        (FieldType::Integer, v) => v.is_i64() || v.is_u64(),
        (FieldType::Float | FieldType::Decimal, v) => v.is_number(),
        (FieldType::Boolean, v) => v.is_boolean(),
        (FieldType::Enum(values), Value::String(s)) => values.contains(s),
        (FieldType::Enum(_), _) => false,
        (FieldType::String | FieldType::Uuid | FieldType::Date | FieldType::DateTime, v) => {
            v.is_string()
        }
        (FieldType::Array(_), v) => v.is_array(),
        (FieldType::Map | FieldType::Record(_), v) => v.is_object(),
    };
    if ok {
        Ok(())
    } else {
        Err(ActionError::invalid_argument(
            name,
            format!("expected {:?}, got {}", field_type, value),
        ))
    }
}

fn matches_target(row: &Record, target: Option<&[(String, Value)]>) -> bool {
    match target {
        None => true,
        Some(pairs) => pairs.iter().all(|(k, v)| row.get(k) == Some(v)),
    }
}

fn matches_filter(entity: &Entity, row: &Record, filter: &Map<String, Value>) -> Result<bool, ActionError> {
    for (field, condition) in filter {
        if entity.field(field).is_none() {
            return Err(ActionError::InvalidFilter {
                field: field.clone(),
                message: "no such field".into(),
            });
        }
        let value = row.get(field).unwrap_or(&Value::Null);
        let operators = match condition {
            Value::Object(ops) => ops.clone(),
            bare => {
                let mut ops = Map::new();
                ops.insert("eq".into(), bare.clone());
                ops
            }
        };
        for (op, expected) in &operators {
            if !apply_operator(field, op, value, expected)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn apply_operator(field: &str, op: &str, value: &Value, expected: &Value) -> Result<bool, ActionError> {
    let ordered = |want: &[Ordering]| {
        !value.is_null() && !expected.is_null() && want.contains(&compare_values(value, expected))
    };
    Ok(match op {
        "eq" => compare_values(value, expected) == Ordering::Equal,
        "not_eq" => compare_values(value, expected) != Ordering::Equal,
        "in" => match expected {
            Value::Array(items) => items
                .iter()
                .any(|item| compare_values(value, item) == Ordering::Equal),
            _ => {
                return Err(ActionError::InvalidFilter {
                    field: field.to_string(),
                    message: "`in` expects a list".into(),
                })
            }
        },
        "is_nil" => match expected {
            Value::Bool(nil) => value.is_null() == *nil,
            _ => {
                return Err(ActionError::InvalidFilter {
                    field: field.to_string(),
                    message: "`is_nil` expects a boolean".into(),
                })
            }
        },
        "greater_than" => ordered(&[Ordering::Greater]),
        "greater_than_or_equal" => ordered(&[Ordering::Greater, Ordering::Equal]),
        "less_than" => ordered(&[Ordering::Less]),
        "less_than_or_equal" => ordered(&[Ordering::Less, Ordering::Equal]),
        "contains" => match (value, expected) {
            (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
            (Value::Array(items), needle) => items.contains(needle),
            _ => false,
        },
        other => {
            return Err(ActionError::InvalidFilter {
                field: field.to_string(),
                message: format!("unknown operator {}", other),
            })
        }
    })
}

/// Total order over JSON values: null first, then by type, then by value
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)).then_with(|| {
            if a == b {
                Ordering::Equal
            } else {
                a.to_string().cmp(&b.to_string())
            }
        }),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Parse `"name,-year"` into `[("name", asc), ("year", desc)]`
pub fn parse_sort(sort: &str) -> Vec<(String, bool)> {
    sort.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('-') {
            Some(field) => (field.to_string(), true),
            None => (s.trim_start_matches('+').to_string(), false),
        })
        .collect()
}

fn sort_rows(entity: &Entity, rows: &mut [Record], sort: &str) -> Result<(), ActionError> {
    let keys = parse_sort(sort);
    for (field, _) in &keys {
        if entity.field(field).is_none() {
            return Err(ActionError::InvalidSort {
                field: field.clone(),
                message: "no such field".into(),
            });
        }
    }
    rows.sort_by(|a, b| {
        keys.iter().fold(Ordering::Equal, |acc, (field, desc)| {
            acc.then_with(|| {
                let left = a.get(field).unwrap_or(&Value::Null);
                let right = b.get(field).unwrap_or(&Value::Null);
                let ord = compare_values(left, right);
                if *desc {
                    ord.reverse()
                } else {
                    ord
                }
            })
        })
    });
    Ok(())
}

fn paginate(rows: Vec<Record>, query: &ReadQuery) -> Vec<Record> {
    let offset = query.offset.unwrap_or(0) as usize;
    let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
    rows.into_iter().skip(offset).take(limit).collect()
}

fn aggregate(rows: &[Record], kind: AggregateKind, field: &str) -> Value {
    let values: Vec<&Value> = rows
        .iter()
        .filter_map(|r| r.get(field))
        .filter(|v| !v.is_null())
        .collect();

    match kind {
        AggregateKind::Count => Value::from(values.len() as u64),
        AggregateKind::Min => values
            .into_iter()
            .min_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateKind::Max => values
            .into_iter()
            .max_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateKind::Sum | AggregateKind::Avg => {
            let numbers: Vec<&Value> = values.into_iter().filter(|v| v.is_number()).collect();
            if numbers.is_empty() {
                return Value::Null;
            }
            let all_ints = numbers.iter().all(|v| v.is_i64());
            let sum: f64 = numbers.iter().filter_map(|v| v.as_f64()).sum();
            match kind {
                AggregateKind::Sum if all_ints => Value::from(sum as i64),
                AggregateKind::Sum => Value::from(sum),
                _ => Value::from(sum / numbers.len() as f64),
            }
        }
    }
}
