//! Inferring a one-to-one mapping between two structurally close descriptors.
//!
//! Elements pair up by renaming identifier, falling back to name. Anything
//! that cannot be paired unambiguously is an error: such a transition needs a
//! hand-authored mapping.

use ladder_core::mapping::{AttributeMapping, EntityMapping, RelationshipMapping};
use ladder_core::{EntityDescriptor, LadderError, MappingModel, Result, SchemaDescriptor};
use std::collections::HashMap;

/// Derives the mapping from `source` to `destination`.
pub fn infer(source: &SchemaDescriptor, destination: &SchemaDescriptor) -> Result<MappingModel> {
    let fail = |message: String| {
        Err(LadderError::inference(
            source.version,
            destination.version,
            message,
        ))
    };

    let mut pairs: Vec<(&EntityDescriptor, &EntityDescriptor)> = Vec::new();
    // source entity name -> destination entity name
    let mut claimed: HashMap<&str, &str> = HashMap::new();
    for entity in &destination.entities {
        let Some(source_entity) = source.entity(entity.renaming_key()) else {
            tracing::debug!("Entity {} is new in version {}", entity.name, destination.version);
            continue;
        };
        if let Some(other) = claimed.insert(source_entity.name.as_str(), entity.name.as_str()) {
            return fail(format!(
                "entities '{}' and '{}' both claim source entity '{}'",
                other, entity.name, source_entity.name
            ));
        }
        pairs.push((source_entity, entity));
    }

    let mut entity_mappings = Vec::with_capacity(pairs.len());
    for (source_entity, entity) in &pairs {
        match infer_entity(source_entity, entity, &claimed) {
            Ok(mapping) => entity_mappings.push(mapping),
            Err(message) => return fail(format!("{}: {}", entity.name, message)),
        }
    }

    Ok(MappingModel {
        source_version: source.version,
        destination_version: destination.version,
        entity_mappings,
    })
}

/// `entity_pairs` maps source entity names to destination entity names.
fn infer_entity(
    source: &EntityDescriptor,
    destination: &EntityDescriptor,
    entity_pairs: &HashMap<&str, &str>,
) -> std::result::Result<EntityMapping, String> {
    // source property -> destination property
    let mut claimed: HashMap<String, String> = HashMap::new();

    let mut attributes = Vec::new();
    for attribute in &destination.attributes {
        let key = attribute.renaming_id.as_deref().unwrap_or(&attribute.name);
        let Some(source_attribute) = source.attribute(key) else {
            if !attribute.optional && attribute.default.is_none() {
                return Err(format!(
                    "required attribute '{}' has no source and no default",
                    attribute.name
                ));
            }
            continue;
        };
        if source_attribute.kind != attribute.kind {
            return Err(format!(
                "attribute '{}' changes type from {} to {}",
                attribute.name,
                source_attribute.kind.as_str(),
                attribute.kind.as_str()
            ));
        }
        if source_attribute.optional && !attribute.optional && attribute.default.is_none() {
            return Err(format!(
                "optional attribute '{}' becomes required without a default",
                attribute.name
            ));
        }
        claim(&mut claimed, &source_attribute.name, &attribute.name)?;
        attributes.push(AttributeMapping::copy(&attribute.name, &source_attribute.name));
    }

    let mut relationships = Vec::new();
    for relationship in &destination.relationships {
        let key = relationship.renaming_id.as_deref().unwrap_or(&relationship.name);
        let Some(source_relationship) = source.relationship(key) else {
            if !relationship.optional {
                return Err(format!(
                    "required relationship '{}' has no source",
                    relationship.name
                ));
            }
            continue;
        };
        if source_relationship.to_many != relationship.to_many {
            return Err(format!(
                "relationship '{}' changes cardinality",
                relationship.name
            ));
        }
        if source_relationship.optional && !relationship.optional {
            return Err(format!(
                "optional relationship '{}' becomes required",
                relationship.name
            ));
        }
        let target = entity_pairs.get(source_relationship.destination.as_str());
        if target != Some(&relationship.destination.as_str()) {
            return Err(format!(
                "relationship '{}' targets '{}' which does not correspond to '{}'",
                relationship.name, relationship.destination, source_relationship.destination
            ));
        }
        claim(&mut claimed, &source_relationship.name, &relationship.name)?;
        relationships.push(RelationshipMapping {
            destination: relationship.name.clone(),
            source: source_relationship.name.clone(),
        });
    }

    Ok(EntityMapping {
        name: format!("{}To{}", source.name, destination.name),
        source: source.name.clone(),
        destination: destination.name.clone(),
        attributes,
        relationships,
        policy: None,
    })
}

fn claim(
    claimed: &mut HashMap<String, String>,
    source: &str,
    destination: &str,
) -> std::result::Result<(), String> {
    match claimed.insert(source.to_string(), destination.to_string()) {
        Some(other) => Err(format!(
            "'{}' and '{}' both claim source property '{}'",
            other, destination, source
        )),
        None => Ok(()),
    }
}
