//! Structural descriptions of each schema version.
//!
//! A descriptor lists the entities of one version together with their
//! attributes and relationships. The engine uses it for two things: deciding
//! whether a store on disk was written under this version, and serving as the
//! source or destination of a mapping.

use crate::error::{LadderError, Result};
use crate::store::StoreMetadata;
use crate::version::SchemaVersion;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

/// Value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Integer,
    Double,
    Boolean,
    /// RFC 3339 timestamp stored as a string.
    Date,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Integer => "integer",
            AttributeType::Double => "double",
            AttributeType::Boolean => "boolean",
            AttributeType::Date => "date",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    #[serde(default)]
    pub optional: bool,
    /// Value filled in when a record leaves the attribute unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Name of the element this attribute was renamed from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renaming_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub name: String,
    /// Name of the target entity.
    pub destination: String,
    #[serde(default)]
    pub to_many: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renaming_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renaming_id: Option<String>,
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<AttributeDescriptor>,
    #[serde(default, rename = "relationship")]
    pub relationships: Vec<RelationshipDescriptor>,
}

impl EntityDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// True when `name` is declared as an attribute or a relationship.
    pub fn has_property(&self, name: &str) -> bool {
        self.attribute(name).is_some() || self.relationship(name).is_some()
    }

    /// Key used to pair this entity with one in another version.
    pub fn renaming_key(&self) -> &str {
        self.renaming_id.as_deref().unwrap_or(&self.name)
    }

    /// SHA-256 over the canonical structure of the entity, hex encoded.
    ///
    /// Defaults and renaming identifiers do not affect the hash.
    pub fn structural_hash(&self) -> String {
        let mut attributes: Vec<_> = self
            .attributes
            .iter()
            .map(|a| format!("attr:{}:{}:{}", a.name, a.kind.as_str(), a.optional))
            .collect();
        attributes.sort();

        let mut relationships: Vec<_> = self
            .relationships
            .iter()
            .map(|r| {
                format!(
                    "rel:{}:{}:{}:{}",
                    r.name, r.destination, r.to_many, r.optional
                )
            })
            .collect();
        relationships.sort();

        let mut canonical = format!("entity:{}\n", self.name);
        for line in attributes.iter().chain(relationships.iter()) {
            canonical.push_str(line);
            canonical.push('\n');
        }

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// The structural description of one schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub version: u32,
    pub model_name: String,
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityDescriptor>,
}

impl SchemaDescriptor {
    /// Parses and validates a descriptor declared in TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        let descriptor: SchemaDescriptor = toml::from_str(content)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// The registered version this descriptor declares.
    pub fn schema_version(&self) -> Result<SchemaVersion> {
        SchemaVersion::try_from(self.version)
            .map_err(|_| LadderError::descriptor(self.version, "version is not registered"))
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    /// Structural hash of every entity, keyed by entity name.
    pub fn entity_hashes(&self) -> BTreeMap<String, String> {
        self.entities
            .iter()
            .map(|e| (e.name.clone(), e.structural_hash()))
            .collect()
    }

    /// Whether a store carrying `metadata` was written under this descriptor.
    pub fn is_compatible_with(&self, metadata: &StoreMetadata) -> bool {
        self.entity_hashes() == metadata.entity_hashes
    }

    /// Checks internal consistency: unique names, resolvable relationship
    /// targets and defaults that match their attribute type.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(LadderError::descriptor(self.version, message));

        let mut entity_names = HashSet::new();
        for entity in &self.entities {
            if !entity_names.insert(entity.name.as_str()) {
                return fail(format!("duplicate entity '{}'", entity.name));
            }
        }

        for entity in &self.entities {
            let mut properties = HashSet::new();
            for attribute in &entity.attributes {
                if !properties.insert(attribute.name.as_str()) {
                    return fail(format!(
                        "duplicate property '{}.{}'",
                        entity.name, attribute.name
                    ));
                }
                if let Some(default) = &attribute.default {
                    if !default_matches(attribute.kind, default) {
                        return fail(format!(
                            "default of '{}.{}' is not a {}",
                            entity.name,
                            attribute.name,
                            attribute.kind.as_str()
                        ));
                    }
                }
            }
            for relationship in &entity.relationships {
                if !properties.insert(relationship.name.as_str()) {
                    return fail(format!(
                        "duplicate property '{}.{}'",
                        entity.name, relationship.name
                    ));
                }
                if !entity_names.contains(relationship.destination.as_str()) {
                    return fail(format!(
                        "relationship '{}.{}' targets unknown entity '{}'",
                        entity.name, relationship.name, relationship.destination
                    ));
                }
            }
        }

        Ok(())
    }
}

fn default_matches(kind: AttributeType, value: &serde_json::Value) -> bool {
    match kind {
        AttributeType::String | AttributeType::Date => value.is_string(),
        AttributeType::Integer => value.is_i64() || value.is_u64(),
        AttributeType::Double => value.is_number(),
        AttributeType::Boolean => value.is_boolean(),
    }
}
