//! Record validation against a schema descriptor.
//!
//! Shared by regular writes on a store handle and by the last stage of a
//! mapping run. Errors are plain messages; callers wrap them.

use super::document::EntityTable;
use ladder_core::{AttributeType, EntityDescriptor, Record, SchemaDescriptor};
use serde_json::Value;

/// Sets every unset attribute that declares a default.
pub fn fill_defaults(entity: &EntityDescriptor, record: &mut Record) {
    for attribute in &entity.attributes {
        let Some(default) = &attribute.default else {
            continue;
        };
        let unset = record.get(&attribute.name).is_none_or(Value::is_null);
        if unset {
            record.insert(attribute.name.clone(), default.clone());
        }
    }
}

/// Checks property names, required values and value shapes of one record.
pub fn validate_record(entity: &EntityDescriptor, record: &Record) -> Result<(), String> {
    for key in record.keys() {
        if !entity.has_property(key) {
            return Err(format!("unknown property '{}.{}'", entity.name, key));
        }
    }

    for attribute in &entity.attributes {
        match record.get(&attribute.name) {
            None | Some(Value::Null) => {
                if !attribute.optional {
                    return Err(format!(
                        "missing required attribute '{}.{}'",
                        entity.name, attribute.name
                    ));
                }
            }
            Some(value) => {
                if !value_matches(attribute.kind, value) {
                    return Err(format!(
                        "attribute '{}.{}' expects {} but got {}",
                        entity.name,
                        attribute.name,
                        attribute.kind.as_str(),
                        value
                    ));
                }
            }
        }
    }

    for relationship in &entity.relationships {
        let value = record.get(&relationship.name).unwrap_or(&Value::Null);
        let well_formed = match (relationship.to_many, value) {
            (_, Value::Null) => relationship.optional,
            (false, Value::String(_)) => true,
            (true, Value::Array(ids)) => {
                ids.iter().all(Value::is_string) && (relationship.optional || !ids.is_empty())
            }
            _ => false,
        };
        if !well_formed {
            return Err(format!(
                "relationship '{}.{}' holds {} ({}, {})",
                entity.name,
                relationship.name,
                value,
                if relationship.to_many { "to-many" } else { "to-one" },
                if relationship.optional { "optional" } else { "required" },
            ));
        }
    }

    Ok(())
}

/// Checks that every relationship in `entities` points at an existing record.
pub fn validate_references(descriptor: &SchemaDescriptor, entities: &EntityTable) -> Result<(), String> {
    for entity in &descriptor.entities {
        let Some(records) = entities.get(&entity.name) else {
            continue;
        };
        for (id, record) in records {
            for relationship in &entity.relationships {
                for target in referenced_ids(record.get(&relationship.name)) {
                    let exists = entities
                        .get(&relationship.destination)
                        .is_some_and(|targets| targets.contains_key(target));
                    if !exists {
                        return Err(format!(
                            "{} '{}' relationship '{}' points at missing {} '{}'",
                            entity.name, id, relationship.name, relationship.destination, target
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Object ids held by a relationship value.
pub fn referenced_ids(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::String(id)) => vec![id.as_str()],
        Some(Value::Array(ids)) => ids.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn value_matches(kind: AttributeType, value: &Value) -> bool {
    match kind {
        AttributeType::String => value.is_string(),
        AttributeType::Integer => value.is_i64() || value.is_u64(),
        AttributeType::Double => value.is_number(),
        AttributeType::Boolean => value.is_boolean(),
        AttributeType::Date => value
            .as_str()
            .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn descriptor() -> SchemaDescriptor {
        SchemaDescriptor::from_toml(
            r#"
version = 1
model_name = "Sample"

[[entity]]
name = "Note"

[[entity.attribute]]
name = "when"
type = "date"

[[entity.attribute]]
name = "pinned"
type = "boolean"
default = false

[[entity.relationship]]
name = "tag"
destination = "Tag"
optional = true

[[entity]]
name = "Tag"
"#,
        )
        .unwrap()
    }

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_defaults_then_valid() {
        let descriptor = descriptor();
        let note = descriptor.entity("Note").unwrap();
        let mut r = record(json!({"when": "2017-09-12T13:03:58Z"}));
        assert!(validate_record(note, &r).is_err());

        fill_defaults(note, &mut r);
        assert_eq!(r["pinned"], json!(false));
        validate_record(note, &r).unwrap();
    }

    #[test]
    fn test_rejects_bad_date_and_unknown_property() {
        let descriptor = descriptor();
        let note = descriptor.entity("Note").unwrap();

        let bad_date = record(json!({"when": "yesterday", "pinned": true}));
        assert!(validate_record(note, &bad_date).unwrap_err().contains("expects date"));

        let extra = record(json!({"when": "2017-09-12T13:03:58Z", "pinned": true, "x": 1}));
        assert!(validate_record(note, &extra).unwrap_err().contains("unknown property"));
    }

    #[test]
    fn test_dangling_reference() {
        let descriptor = descriptor();
        let mut entities = BTreeMap::new();
        let mut notes = BTreeMap::new();
        notes.insert(
            "n1".to_string(),
            record(json!({"when": "2017-09-12T13:03:58Z", "pinned": false, "tag": "t1"})),
        );
        entities.insert("Note".to_string(), notes);
        entities.insert("Tag".to_string(), BTreeMap::new());

        let err = validate_references(&descriptor, &entities).unwrap_err();
        assert!(err.contains("missing Tag 't1'"));

        entities
            .get_mut("Tag")
            .unwrap()
            .insert("t1".to_string(), Record::new());
        validate_references(&descriptor, &entities).unwrap();
    }
}
