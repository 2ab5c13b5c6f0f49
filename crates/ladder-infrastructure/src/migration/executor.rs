//! Runs a mapping model over in-memory records.
//!
//! Execution has three stages:
//! 1. create destination instances, running each entity policy right after
//!    the instance's attribute copy,
//! 2. rewrite relationships through the instance table,
//! 3. fill defaults and validate the whole destination.

use crate::storage::document::EntityTable;
use crate::storage::validate::{fill_defaults, validate_record, validate_references};
use ladder_core::mapping::{EntityMapping, EntityPolicy, ValueExpression};
use ladder_core::{LadderError, MigrationStep, ObjectId, Record, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Source (entity, id) to destination (entity, id).
type InstanceTable = HashMap<(String, ObjectId), (String, ObjectId)>;

/// Transforms `source` records into the destination version of `step`.
pub fn execute(step: &MigrationStep, source: &EntityTable) -> Result<EntityTable> {
    Execution::new(step).run(source)
}

struct Execution<'a> {
    step: &'a MigrationStep,
    destination: EntityTable,
    instances: InstanceTable,
}

impl<'a> Execution<'a> {
    fn new(step: &'a MigrationStep) -> Self {
        let destination = step
            .destination
            .entity_names()
            .map(|name| (name.to_string(), Default::default()))
            .collect();
        Self {
            step,
            destination,
            instances: HashMap::new(),
        }
    }

    fn fail(&self, message: impl Into<String>) -> LadderError {
        LadderError::mapping_failed(self.step.from.ordinal(), self.step.to.ordinal(), message)
    }

    fn run(mut self, source: &EntityTable) -> Result<EntityTable> {
        let step = self.step;
        let mappings = &step.ruleset.model().entity_mappings;

        for mapping in mappings {
            for (id, record) in source.get(&mapping.source).into_iter().flatten() {
                self.create_instance(mapping, id, record)?;
            }
        }

        for mapping in mappings {
            for (id, record) in source.get(&mapping.source).into_iter().flatten() {
                self.link_relationships(mapping, id, record)?;
            }
        }

        self.validate()?;
        Ok(self.destination)
    }

    fn create_instance(&mut self, mapping: &EntityMapping, id: &ObjectId, source: &Record) -> Result<()> {
        let mut record = Record::new();
        for attribute in &mapping.attributes {
            let value = match attribute.expression() {
                Some(ValueExpression::Source(name)) => source.get(name).cloned(),
                Some(ValueExpression::Constant(value)) => Some(value.clone()),
                None => {
                    return Err(self.fail(format!(
                        "{}: attribute '{}' has no value expression",
                        mapping.name, attribute.destination
                    )));
                }
            };
            if let Some(value) = value.filter(|v| !v.is_null()) {
                record.insert(attribute.destination.clone(), value);
            }
        }

        if let Some(policy) = &mapping.policy {
            self.apply_policy(mapping, policy, source, &mut record)?;
        }

        self.instances.insert(
            (mapping.source.clone(), id.clone()),
            (mapping.destination.clone(), id.clone()),
        );
        self.insert(&mapping.destination, id.clone(), record)
    }

    fn apply_policy(
        &mut self,
        mapping: &EntityMapping,
        policy: &EntityPolicy,
        source: &Record,
        record: &mut Record,
    ) -> Result<()> {
        match policy {
            EntityPolicy::SynthesizeRelated {
                source_field,
                entity,
                id_field,
                value_field,
                relationship,
            } => {
                let value = source.get(source_field).cloned().unwrap_or(Value::Null);
                if value.is_null() {
                    return Err(self.fail(format!(
                        "{}: '{}' is empty, cannot create {}",
                        mapping.name, source_field, entity
                    )));
                }
                let mut related = Record::new();
                related.insert(id_field.clone(), Value::String(new_object_id()));
                related.insert(value_field.clone(), value);

                let related_id = new_object_id();
                self.insert(entity, related_id.clone(), related)?;
                record.insert(relationship.clone(), Value::String(related_id));
            }
            EntityPolicy::SplitField {
                source_field,
                max_title_chars,
                entity,
                content_field,
                shared_field,
                shared_destination_field,
                title_relationship,
                body_relationship,
            } => {
                let content = match source.get(source_field) {
                    None | Some(Value::Null) => "",
                    Some(Value::String(s)) => s.as_str(),
                    Some(other) => {
                        return Err(self.fail(format!(
                            "{}: '{}' is not text: {}",
                            mapping.name, source_field, other
                        )));
                    }
                };
                let title: String = content.chars().take(*max_title_chars).collect();
                let shared = source.get(shared_field).cloned().unwrap_or(Value::Null);

                for (relationship, text) in [
                    (title_relationship, title),
                    (body_relationship, content.to_string()),
                ] {
                    let mut section = Record::new();
                    section.insert(content_field.clone(), Value::String(text));
                    section.insert(shared_destination_field.clone(), shared.clone());

                    let section_id = new_object_id();
                    self.insert(entity, section_id.clone(), section)?;
                    record.insert(relationship.clone(), Value::String(section_id));
                }
            }
        }
        Ok(())
    }

    fn link_relationships(&mut self, mapping: &EntityMapping, id: &ObjectId, source: &Record) -> Result<()> {
        let step = self.step;
        let Some(source_entity) = step.source.entity(&mapping.source) else {
            return Err(self.fail(format!("unknown source entity '{}'", mapping.source)));
        };

        for relationship in &mapping.relationships {
            let Some(source_relationship) = source_entity.relationship(&relationship.source) else {
                return Err(self.fail(format!(
                    "unknown source relationship '{}.{}'",
                    mapping.source, relationship.source
                )));
            };
            let target_entity = &source_relationship.destination;

            let value = match source.get(&relationship.source) {
                None | Some(Value::Null) => Value::Null,
                Some(Value::String(target)) => Value::String(self.resolve(target_entity, target)?),
                Some(Value::Array(targets)) => {
                    let mut resolved = Vec::with_capacity(targets.len());
                    for target in targets {
                        let target = target.as_str().ok_or_else(|| {
                            self.fail(format!(
                                "{} '{}' relationship '{}' holds a non-id {}",
                                mapping.source, id, relationship.source, target
                            ))
                        })?;
                        resolved.push(Value::String(self.resolve(target_entity, target)?));
                    }
                    Value::Array(resolved)
                }
                Some(other) => {
                    return Err(self.fail(format!(
                        "{} '{}' relationship '{}' holds {}",
                        mapping.source, id, relationship.source, other
                    )));
                }
            };

            if value.is_null() {
                continue;
            }
            let record = self
                .destination
                .get_mut(&mapping.destination)
                .and_then(|records| records.get_mut(id))
                .ok_or_else(|| {
                    LadderError::mapping_failed(
                        step.from.ordinal(),
                        step.to.ordinal(),
                        format!("{} '{}' was never created", mapping.destination, id),
                    )
                })?;
            record.insert(relationship.destination.clone(), value);
        }
        Ok(())
    }

    /// Destination id of the source instance `entity`/`id`.
    fn resolve(&self, entity: &str, id: &str) -> Result<ObjectId> {
        self.instances
            .get(&(entity.to_string(), id.to_string()))
            .map(|(_, destination_id)| destination_id.clone())
            .ok_or_else(|| {
                self.fail(format!(
                    "relationship target {} '{}' was not migrated",
                    entity, id
                ))
            })
    }

    fn insert(&mut self, entity: &str, id: ObjectId, record: Record) -> Result<()> {
        let records = self.destination.get_mut(entity).ok_or_else(|| {
            LadderError::mapping_failed(
                self.step.from.ordinal(),
                self.step.to.ordinal(),
                format!("destination has no entity '{}'", entity),
            )
        })?;
        if records.insert(id.clone(), record).is_some() {
            return Err(self.fail(format!("duplicate {} instance '{}'", entity, id)));
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let step = self.step;
        let fail = |message: String| {
            LadderError::mapping_failed(step.from.ordinal(), step.to.ordinal(), message)
        };

        for entity in &step.destination.entities {
            let Some(records) = self.destination.get_mut(&entity.name) else {
                continue;
            };
            for (id, record) in records.iter_mut() {
                fill_defaults(entity, record);
                validate_record(entity, record)
                    .map_err(|e| fail(format!("{} '{}': {}", entity.name, id, e)))?;
            }
        }
        validate_references(&step.destination, &self.destination).map_err(fail)
    }
}

fn new_object_id() -> ObjectId {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorCache;
    use crate::migration::resolver::MappingResolver;
    use ladder_core::SchemaVersion;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn step(from: SchemaVersion) -> MigrationStep {
        let cache = Arc::new(DescriptorCache::bundled());
        let resolver = MappingResolver::new(Arc::clone(&cache));
        let to = from.successor().unwrap();
        MigrationStep {
            from,
            to,
            source: cache.get(from).unwrap(),
            destination: cache.get(to).unwrap(),
            ruleset: resolver.ruleset_for(from).unwrap().unwrap(),
        }
    }

    fn table(entity: &str, records: Vec<(&str, serde_json::Value)>) -> EntityTable {
        let mut table = EntityTable::new();
        let rows: BTreeMap<_, _> = records
            .into_iter()
            .map(|(id, v)| (id.to_string(), v.as_object().unwrap().clone()))
            .collect();
        table.insert(entity.to_string(), rows);
        table
    }

    #[test]
    fn test_split_field_creates_title_and_body() {
        let long = "x".repeat(100);
        let source = table(
            "Post",
            vec![(
                "p1",
                json!({"postID": "ABC", "date": "2017-09-12T13:03:58Z", "hexColor": "FF0000", "content": long}),
            )],
        );

        let out = execute(&step(SchemaVersion::V1), &source).unwrap();
        let post = &out["Post"]["p1"];
        assert_eq!(post["color"], json!("FF0000"));
        assert!(post.get("hexColor").is_none());

        let title = &out["Section"][post["title"].as_str().unwrap()];
        let body = &out["Section"][post["body"].as_str().unwrap()];
        assert_eq!(title["content"].as_str().unwrap().chars().count(), 80);
        assert_eq!(body["content"].as_str().unwrap(), long);
        assert_eq!(title["hexColor"], json!("FF0000"));
        assert_eq!(body["hexColor"], json!("FF0000"));
        assert_eq!(out["Section"].len(), 2);
    }

    #[test]
    fn test_split_field_truncates_by_characters() {
        let content = "é".repeat(90);
        let source = table(
            "Post",
            vec![(
                "p1",
                json!({"postID": "A", "date": "2017-09-12T13:03:58Z", "hexColor": "00FF00", "content": content}),
            )],
        );
        let out = execute(&step(SchemaVersion::V1), &source).unwrap();
        let post = &out["Post"]["p1"];
        let title = &out["Section"][post["title"].as_str().unwrap()];
        assert_eq!(title["content"].as_str().unwrap(), "é".repeat(80));
    }

    #[test]
    fn test_missing_content_yields_empty_sections() {
        let source = table(
            "Post",
            vec![("p1", json!({"postID": "A", "date": "2017-09-12T13:03:58Z", "hexColor": "00FF00"}))],
        );
        let out = execute(&step(SchemaVersion::V1), &source).unwrap();
        assert!(out["Section"].values().all(|s| s["content"] == json!("")));
    }

    #[test]
    fn test_missing_required_value_fails_validation() {
        let source = table(
            "Post",
            vec![("p1", json!({"postID": "A", "hexColor": "00FF00"}))],
        );
        let err = execute(&step(SchemaVersion::V1), &source).unwrap_err();
        assert!(err.is_mapping_failed());
        assert!(err.to_string().contains("date"));
    }

    #[test]
    fn test_inferred_step_fills_default() {
        let mut source = table("Color", vec![("c1", json!({"colorID": "id-1", "hex": "FF0000"}))]);
        source.extend(table(
            "Section",
            vec![
                ("s1", json!({"content": "t", "hexColor": "FF0000"})),
                ("s2", json!({"content": "b", "hexColor": "FF0000"})),
            ],
        ));
        source.extend(table(
            "Post",
            vec![(
                "p1",
                json!({"postID": "A", "date": "2017-09-12T13:03:58Z", "title": "s1", "body": "s2", "color": "c1"}),
            )],
        ));

        let out = execute(&step(SchemaVersion::V3), &source).unwrap();
        let post = &out["Post"]["p1"];
        assert_eq!(post["softDeleted"], json!(false));
        assert_eq!(post["color"], json!("c1"));
        assert_eq!(out["Section"].len(), 2);
    }
}
