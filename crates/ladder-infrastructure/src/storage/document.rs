//! The on-disk main file of a JSON store.

use super::atomic_file::write_json_atomic;
use super::journal::JournalEntry;
use ladder_core::{LadderError, ObjectId, Record, Result, SchemaDescriptor, StoreMetadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Records of every entity, keyed by entity name then object id.
pub type EntityTable = BTreeMap<String, BTreeMap<ObjectId, Record>>;

/// Full contents of a store's main file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub metadata: StoreMetadata,
    #[serde(default)]
    pub entities: EntityTable,
}

/// Only the head of the main file; entity data is skipped.
#[derive(Deserialize)]
struct MetadataOnly {
    metadata: StoreMetadata,
}

impl StoreDocument {
    /// An empty document for a brand new store written under `descriptor`.
    pub fn empty(descriptor: &SchemaDescriptor) -> Self {
        Self::with_entities(descriptor, EntityTable::new())
    }

    /// A new document under `descriptor` holding `entities`, with a fresh
    /// store identity. Every declared entity gets a table.
    pub fn with_entities(descriptor: &SchemaDescriptor, mut entities: EntityTable) -> Self {
        for name in descriptor.entity_names() {
            entities.entry(name.to_string()).or_default();
        }
        Self {
            metadata: StoreMetadata::for_descriptor(
                descriptor,
                uuid::Uuid::new_v4().to_string(),
            ),
            entities,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Reads the metadata object without keeping any record data.
    pub fn read_metadata(path: &Path) -> Result<StoreMetadata> {
        let unreadable = |e: &dyn std::fmt::Display| {
            LadderError::metadata_unreadable(path.display().to_string(), e.to_string())
        };
        let file = File::open(path).map_err(|e| unreadable(&e))?;
        let head: MetadataOnly =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| unreadable(&e))?;
        Ok(head.metadata)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)?;
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.entities.values().map(|records| records.len()).sum()
    }

    /// Applies one journal entry to the in-memory records.
    pub fn apply(&mut self, entry: &JournalEntry) {
        match entry {
            JournalEntry::Header { .. } => {}
            JournalEntry::Insert { entity, id, record }
            | JournalEntry::Update { entity, id, record } => {
                self.entities
                    .entry(entity.clone())
                    .or_default()
                    .insert(id.clone(), record.clone());
            }
            JournalEntry::Delete { entity, id } => {
                if let Some(records) = self.entities.get_mut(entity) {
                    records.remove(id);
                }
            }
        }
    }
}
