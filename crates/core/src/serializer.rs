// Serializer collaborator: turns typed action results into JSON

use crate::catalog::ActionCatalog;
use crate::error::ErrorEntry;
use crate::types::{Cardinality, Constraints, FieldType};
use anyhow::{anyhow, Result};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// Loaded relationships to include, dotted for nesting (`albums.tracks`)
    pub load: Vec<String>,
}

pub trait Serializer: Send + Sync {
    fn serialize_value(
        &self,
        value: &Value,
        ty: &FieldType,
        constraints: &Constraints,
        domain: &str,
        opts: &SerializeOptions,
    ) -> Result<Value>;

    fn serialize_errors(&self, errors: &[ErrorEntry]) -> Value;
}

/// Keeps the public fields of records plus whatever relationships were
/// explicitly loaded. Scalars pass through unchanged.
pub struct JsonSerializer {
    catalog: Arc<dyn ActionCatalog>,
}

impl JsonSerializer {
    pub fn new(catalog: Arc<dyn ActionCatalog>) -> Self {
        Self { catalog }
    }

    fn serialize_record(&self, value: &Value, entity_name: &str, load: &[String]) -> Result<Value> {
        let record = match value {
            Value::Null => return Ok(Value::Null),
            Value::Object(record) => record,
            other => return Err(anyhow!("expected a {} record, got {}", entity_name, other)),
        };
        let entity = self
            .catalog
            .entity(entity_name)
            .ok_or_else(|| anyhow!("unknown entity {}", entity_name))?;

        let mut out = Map::new();
        for field in entity.public_fields() {
            if let Some(v) = record.get(&field.name) {
                out.insert(field.name.clone(), v.clone());
            }
        }

        for (name, nested) in split_loads(load) {
            let Some(rel) = entity.relationship(&name).filter(|r| r.public) else {
                continue;
            };
            let Some(v) = record.get(&name) else {
                continue;
            };
            let serialized = match rel.cardinality {
                Cardinality::One => self.serialize_record(v, &rel.destination, &nested)?,
                Cardinality::Many => match v {
                    Value::Array(items) => Value::Array(
                        items
                            .iter()
                            .map(|item| self.serialize_record(item, &rel.destination, &nested))
                            .collect::<Result<_>>()?,
                    ),
                    other => return Err(anyhow!("expected a list for {}, got {}", name, other)),
                },
            };
            out.insert(name, serialized);
        }

        Ok(Value::Object(out))
    }

    fn serialize_typed(&self, value: &Value, ty: &FieldType, load: &[String]) -> Result<Value> {
        match (ty, value) {
            (FieldType::Record(entity), _) => self.serialize_record(value, entity, load),
            (FieldType::Array(inner), Value::Array(items)) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| self.serialize_typed(item, inner, load))
                    .collect::<Result<_>>()?,
            )),
            (FieldType::Array(_), Value::Null) => Ok(Value::Null),
            (FieldType::Array(_), other) => Err(anyhow!("expected a list, got {}", other)),
            _ => Ok(value.clone()),
        }
    }
}

impl Serializer for JsonSerializer {
    fn serialize_value(
        &self,
        value: &Value,
        ty: &FieldType,
        _constraints: &Constraints,
        _domain: &str,
        opts: &SerializeOptions,
    ) -> Result<Value> {
        self.serialize_typed(value, ty, &opts.load)
    }

    fn serialize_errors(&self, errors: &[ErrorEntry]) -> Value {
        serde_json::to_value(errors).unwrap_or_else(|_| Value::Array(Vec::new()))
    }
}

/// Group `["albums.tracks", "albums", "label"]` into top-level names with
/// their nested remainders, preserving first-seen order.
fn split_loads(load: &[String]) -> Vec<(String, Vec<String>)> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for path in load {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path.as_str(), None),
        };
        let idx = match grouped.iter().position(|(name, _)| name == head) {
            Some(idx) => idx,
            None => {
                grouped.push((head.to_string(), Vec::new()));
                grouped.len() - 1
            }
        };
        if let Some(rest) = rest {
            grouped[idx].1.push(rest.to_string());
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::error::ActionError;
    use crate::types::{ActionDefinition, ActionType, Entity, Field, Relationship};
    use serde_json::json;

    fn serializer() -> JsonSerializer {
        let catalog = StaticCatalog::builder()
            .entity(
                Entity::new("artist", "music")
                    .with_field(Field::primary_key("id", FieldType::Integer))
                    .with_field(Field::attribute("name", FieldType::String))
                    .with_field(Field::attribute("royalties", FieldType::Float).private())
                    .with_relationship(Relationship {
                        name: "albums".into(),
                        destination: "album".into(),
                        source_field: "id".into(),
                        destination_field: "artist_id".into(),
                        cardinality: Cardinality::Many,
                        public: true,
                    })
                    .with_action(ActionDefinition::new("read", ActionType::Read)),
            )
            .entity(
                Entity::new("album", "music")
                    .with_field(Field::primary_key("id", FieldType::Integer))
                    .with_field(Field::attribute("title", FieldType::String))
                    .with_field(Field::attribute("artist_id", FieldType::Integer)),
            )
            .build()
            .unwrap();
        JsonSerializer::new(Arc::new(catalog))
    }

    #[test]
    fn test_private_fields_dropped() {
        let value = json!([{"id": 1, "name": "Nina", "royalties": 12.5}]);
        let out = serializer()
            .serialize_value(
                &value,
                &FieldType::Array(Box::new(FieldType::Record("artist".into()))),
                &Constraints::default(),
                "music",
                &SerializeOptions::default(),
            )
            .unwrap();

        assert_eq!(out, json!([{"id": 1, "name": "Nina"}]));
    }

    #[test]
    fn test_loaded_relationships_included() {
        let value = json!({
            "id": 1,
            "name": "Nina",
            "albums": [{"id": 7, "title": "Pastel Blues", "artist_id": 1}]
        });
        let ty = FieldType::Record("artist".into());

        let without = serializer()
            .serialize_value(&value, &ty, &Constraints::default(), "music", &SerializeOptions::default())
            .unwrap();
        assert!(without.get("albums").is_none());

        let with = serializer()
            .serialize_value(
                &value,
                &ty,
                &Constraints::default(),
                "music",
                &SerializeOptions {
                    load: vec!["albums".into()],
                },
            )
            .unwrap();
        assert_eq!(with["albums"][0]["title"], "Pastel Blues");
    }

    #[test]
    fn test_scalars_pass_through() {
        let out = serializer()
            .serialize_value(
                &json!("hello"),
                &FieldType::String,
                &Constraints::default(),
                "music",
                &SerializeOptions::default(),
            )
            .unwrap();
        assert_eq!(out, json!("hello"));
    }

    #[test]
    fn test_split_loads() {
        let grouped = split_loads(&["albums.tracks".into(), "label".into(), "albums".into()]);
        assert_eq!(
            grouped,
            vec![
                ("albums".to_string(), vec!["tracks".to_string()]),
                ("label".to_string(), vec![]),
            ]
        );
    }

    #[test]
    fn test_serialize_errors_as_list() {
        let entries = ActionError::not_found("artist").to_entries();
        let out = serializer().serialize_errors(&entries);
        assert_eq!(out[0]["code"], "not_found");
        assert_eq!(out.as_array().unwrap().len(), 1);
    }
}
