//! Store-level types and the storage engine seam.
//!
//! The migration core never looks inside a store file. It only uses the
//! primitives on [`StoreEngine`].

use crate::descriptor::SchemaDescriptor;
use crate::error::Result;
use crate::plan::MigrationStep;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Engine format marker written into every store's metadata.
pub const STORE_FORMAT: u32 = 1;

/// Identifier of one record inside a store.
pub type ObjectId = String;

/// A record: attribute and relationship values keyed by property name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The small compatibility token stored at the head of every store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub format: u32,
    /// Identity of this physical store. A replaced store gets a new one.
    pub store_id: String,
    /// Entity name to structural hash, as produced by the creating descriptor.
    pub entity_hashes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

impl StoreMetadata {
    /// Metadata for a fresh store written under `descriptor`.
    pub fn for_descriptor(descriptor: &SchemaDescriptor, store_id: impl Into<String>) -> Self {
        Self {
            format: STORE_FORMAT,
            store_id: store_id.into(),
            entity_hashes: descriptor.entity_hashes(),
            model_name: Some(descriptor.model_name.clone()),
        }
    }
}

/// The primitives the migration engine needs from a storage engine.
///
/// Every call is blocking. Implementations must make `apply_mapping` and
/// `replace` atomic-or-failed.
pub trait StoreEngine: Send + Sync {
    /// Reads only the metadata of the store at `location`.
    fn metadata(&self, location: &Path) -> Result<StoreMetadata>;

    /// Merges any pending journal into the main file of a store that is
    /// compatible with `descriptor`.
    fn checkpoint(&self, location: &Path, descriptor: &SchemaDescriptor) -> Result<()>;

    /// Runs one migration step, writing a brand new store at `destination`.
    fn apply_mapping(&self, source: &Path, destination: &Path, step: &MigrationStep)
        -> Result<()>;

    /// Installs the store at `staged` as the contents of `target`.
    fn replace(&self, target: &Path, staged: &Path) -> Result<()>;

    /// Removes every file belonging to the store at `location`.
    fn destroy(&self, location: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_omits_missing_model_name() {
        let metadata = StoreMetadata {
            format: STORE_FORMAT,
            store_id: "abc".to_string(),
            entity_hashes: BTreeMap::new(),
            model_name: None,
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(!json.contains("model_name"));
        let parsed: StoreMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metadata);
    }
}
