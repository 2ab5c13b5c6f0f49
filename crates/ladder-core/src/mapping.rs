//! Mapping models describing how one version's data becomes the next one's.

use crate::descriptor::{EntityDescriptor, SchemaDescriptor};
use crate::error::{LadderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a version transition is authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum MappingPolicy {
    /// A hand-authored ruleset that reshapes data.
    Manual,
    /// A one-to-one ruleset derived from structural correspondence.
    Inferred,
}

/// The ruleset used by one migration step.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingRuleset {
    Manual(MappingModel),
    Inferred(MappingModel),
}

impl MappingRuleset {
    pub fn model(&self) -> &MappingModel {
        match self {
            MappingRuleset::Manual(model) | MappingRuleset::Inferred(model) => model,
        }
    }

    pub fn policy(&self) -> MappingPolicy {
        match self {
            MappingRuleset::Manual(_) => MappingPolicy::Manual,
            MappingRuleset::Inferred(_) => MappingPolicy::Inferred,
        }
    }
}

/// An ordered set of entity mappings between two adjacent versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingModel {
    pub source_version: u32,
    pub destination_version: u32,
    #[serde(default, rename = "entity")]
    pub entity_mappings: Vec<EntityMapping>,
}

/// Moves every instance of one source entity into one destination entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub name: String,
    pub source: String,
    pub destination: String,
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<AttributeMapping>,
    #[serde(default, rename = "relationship")]
    pub relationships: Vec<RelationshipMapping>,
    /// Extra work run once per instance after its default copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<EntityPolicy>,
}

/// Fills one destination attribute from a source attribute or a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMapping {
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Where an attribute mapping takes its value from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueExpression<'a> {
    Source(&'a str),
    Constant(&'a serde_json::Value),
}

impl AttributeMapping {
    pub fn copy(destination: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            source: Some(source.into()),
            value: None,
        }
    }

    /// The value expression, or `None` when both or neither of `source` and
    /// `value` are set.
    pub fn expression(&self) -> Option<ValueExpression<'_>> {
        match (&self.source, &self.value) {
            (Some(source), None) => Some(ValueExpression::Source(source)),
            (None, Some(value)) => Some(ValueExpression::Constant(value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMapping {
    pub destination: String,
    pub source: String,
}

/// Per-instance data reshaping used by manual rulesets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityPolicy {
    /// Creates one `entity` instance per source record with a fresh id in
    /// `id_field`, copies `source_field` into `value_field` and links it back
    /// through `relationship`.
    SynthesizeRelated {
        source_field: String,
        entity: String,
        id_field: String,
        value_field: String,
        relationship: String,
    },
    /// Creates a title and a body `entity` instance per source record. The
    /// title holds `source_field` truncated to `max_title_chars` characters,
    /// the body holds it whole. Both carry a copy of `shared_field`.
    SplitField {
        source_field: String,
        max_title_chars: usize,
        entity: String,
        content_field: String,
        shared_field: String,
        shared_destination_field: String,
        title_relationship: String,
        body_relationship: String,
    },
}

impl EntityPolicy {
    /// The destination entity whose instances this policy creates.
    pub fn synthesized_entity(&self) -> &str {
        match self {
            EntityPolicy::SynthesizeRelated { entity, .. }
            | EntityPolicy::SplitField { entity, .. } => entity.as_str(),
        }
    }

    /// Relationships on the mapped destination instance that this policy sets.
    pub fn linked_relationships(&self) -> Vec<&str> {
        match self {
            EntityPolicy::SynthesizeRelated { relationship, .. } => vec![relationship.as_str()],
            EntityPolicy::SplitField {
                title_relationship,
                body_relationship,
                ..
            } => vec![title_relationship.as_str(), body_relationship.as_str()],
        }
    }

    /// Attributes of the synthesized entity that this policy fills.
    pub fn synthesized_attributes(&self) -> Vec<&str> {
        match self {
            EntityPolicy::SynthesizeRelated {
                id_field,
                value_field,
                ..
            } => vec![id_field.as_str(), value_field.as_str()],
            EntityPolicy::SplitField {
                content_field,
                shared_destination_field,
                ..
            } => vec![content_field.as_str(), shared_destination_field.as_str()],
        }
    }

    /// Source attributes the policy reads.
    pub fn source_fields(&self) -> Vec<&str> {
        match self {
            EntityPolicy::SynthesizeRelated { source_field, .. } => vec![source_field.as_str()],
            EntityPolicy::SplitField {
                source_field,
                shared_field,
                ..
            } => vec![source_field.as_str(), shared_field.as_str()],
        }
    }
}

impl MappingModel {
    pub fn entity_mapping(&self, name: &str) -> Option<&EntityMapping> {
        self.entity_mappings.iter().find(|m| m.name == name)
    }

    /// Parses a model declared in TOML. Call [`MappingModel::validate`] before use.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Checks that every name in the model resolves against the two
    /// descriptors and that every destination entity gets produced.
    pub fn validate(&self, source: &SchemaDescriptor, destination: &SchemaDescriptor) -> Result<()> {
        let fail = |message: String| {
            Err(LadderError::mapping_failed(
                self.source_version,
                self.destination_version,
                format!("invalid mapping model: {}", message),
            ))
        };

        if self.source_version != source.version || self.destination_version != destination.version
        {
            return fail(format!(
                "model maps {} -> {} but descriptors are {} -> {}",
                self.source_version, self.destination_version, source.version, destination.version
            ));
        }

        let mut produced = HashSet::new();
        let mut names = HashSet::new();
        for mapping in &self.entity_mappings {
            if !names.insert(mapping.name.as_str()) {
                return fail(format!("duplicate entity mapping '{}'", mapping.name));
            }
            let Some(source_entity) = source.entity(&mapping.source) else {
                return fail(format!("unknown source entity '{}'", mapping.source));
            };
            let Some(destination_entity) = destination.entity(&mapping.destination) else {
                return fail(format!(
                    "unknown destination entity '{}'",
                    mapping.destination
                ));
            };
            if let Err(message) = check_entity_mapping(mapping, source_entity, destination_entity, destination)
            {
                return fail(format!("{}: {}", mapping.name, message));
            }
            produced.insert(mapping.destination.as_str());
            if let Some(policy) = &mapping.policy {
                produced.insert(policy.synthesized_entity());
            }
        }

        for entity in destination.entity_names() {
            if !produced.contains(entity) {
                return fail(format!("nothing produces destination entity '{}'", entity));
            }
        }
        Ok(())
    }
}

fn check_entity_mapping(
    mapping: &EntityMapping,
    source: &EntityDescriptor,
    destination: &EntityDescriptor,
    destination_schema: &SchemaDescriptor,
) -> std::result::Result<(), String> {
    for attribute in &mapping.attributes {
        if destination.attribute(&attribute.destination).is_none() {
            return Err(format!("unknown destination attribute '{}'", attribute.destination));
        }
        match attribute.expression() {
            Some(ValueExpression::Source(name)) if source.attribute(name).is_none() => {
                return Err(format!("unknown source attribute '{}'", name));
            }
            Some(_) => {}
            None => {
                return Err(format!(
                    "attribute '{}' needs exactly one of source or value",
                    attribute.destination
                ));
            }
        }
    }

    for relationship in &mapping.relationships {
        if destination.relationship(&relationship.destination).is_none() {
            return Err(format!(
                "unknown destination relationship '{}'",
                relationship.destination
            ));
        }
        if source.relationship(&relationship.source).is_none() {
            return Err(format!("unknown source relationship '{}'", relationship.source));
        }
    }

    if let Some(policy) = &mapping.policy {
        for field in policy.source_fields() {
            if source.attribute(field).is_none() {
                return Err(format!("policy reads unknown source attribute '{}'", field));
            }
        }
        let Some(synthesized) = destination_schema.entity(policy.synthesized_entity()) else {
            return Err(format!(
                "policy creates unknown entity '{}'",
                policy.synthesized_entity()
            ));
        };
        for attribute in policy.synthesized_attributes() {
            if synthesized.attribute(attribute).is_none() {
                return Err(format!(
                    "policy fills unknown attribute '{}.{}'",
                    synthesized.name, attribute
                ));
            }
        }
        for relationship in policy.linked_relationships() {
            match destination.relationship(relationship) {
                Some(r) if r.destination == synthesized.name => {}
                _ => {
                    return Err(format!(
                        "policy links through unknown relationship '{}'",
                        relationship
                    ));
                }
            }
        }
    }

    Ok(())
}
