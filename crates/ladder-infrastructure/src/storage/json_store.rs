//! A file-backed JSON store with a write-ahead journal.
//!
//! ```text
//! posts.store        # main file: metadata + records
//! posts.store-wal    # journal of writes not yet merged
//! posts.store.lock   # held while a StoreHandle is open
//! ```

use super::atomic_file::{FileLock, sibling_path, temp_path_for};
use super::document::StoreDocument;
use super::journal::{Journal, JournalContents, JournalEntry};
use super::validate::{fill_defaults, referenced_ids, validate_record};
use crate::migration::executor;
use ladder_core::{
    LadderError, MigrationStep, ObjectId, Record, Result, SchemaDescriptor, StoreEngine,
    StoreMetadata,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const JOURNAL_SUFFIX: &str = "-wal";
const LOCK_SUFFIX: &str = ".lock";

/// How writes reach the main file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Writes are appended to the journal and merged on checkpoint.
    #[default]
    Wal,
    /// Any journal is merged on open; writes go straight to the main file.
    Delete,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    pub journal_mode: JournalMode,
    pub create_if_missing: bool,
}

pub fn journal_path(location: &Path) -> PathBuf {
    sibling_path(location, JOURNAL_SUFFIX)
}

pub fn lock_path(location: &Path) -> PathBuf {
    sibling_path(location, LOCK_SUFFIX)
}

/// The JSON store engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileStore;

impl JsonFileStore {
    pub fn new() -> Self {
        Self
    }

    /// Opens the store at `location` for regular use under `descriptor`.
    ///
    /// Fails if another handle holds the store, or if the store on disk was
    /// written under a different descriptor.
    pub fn open(
        location: &Path,
        descriptor: Arc<SchemaDescriptor>,
        options: StoreOptions,
    ) -> Result<StoreHandle> {
        let lock = FileLock::try_acquire(&lock_path(location))?;

        if !location.exists() {
            if !options.create_if_missing {
                return Err(LadderError::store(format!(
                    "no store at {}",
                    location.display()
                )));
            }
            StoreDocument::empty(&descriptor).save(location)?;
            tracing::info!(
                "Created store at {} ({})",
                location.display(),
                descriptor.model_name
            );
        }

        let mut document = StoreDocument::load(location)?;
        if !descriptor.is_compatible_with(&document.metadata) {
            return Err(LadderError::store(format!(
                "store at {} is not compatible with model '{}'",
                location.display(),
                descriptor.model_name
            )));
        }

        let journal = Journal::new(journal_path(location));
        let replayed = replay_journal(&journal, &mut document)?;

        let handle = StoreHandle {
            location: location.to_path_buf(),
            descriptor,
            document,
            journal,
            journal_mode: options.journal_mode,
            _lock: lock,
        };

        if options.journal_mode == JournalMode::Delete && replayed {
            handle.merge_journal()?;
        }
        Ok(handle)
    }

    /// Main file plus journal, as a reader would see them.
    fn load_merged(location: &Path) -> Result<StoreDocument> {
        let mut document = StoreDocument::load(location)?;
        replay_journal(&Journal::new(journal_path(location)), &mut document)?;
        Ok(document)
    }
}

/// Replays a matching journal into `document`. Returns whether any entries
/// were replayed.
///
/// A journal left damaged by a crash is cut back to its complete entries, and
/// one holding no complete entry is removed, so later appends start clean.
fn replay_journal(journal: &Journal, document: &mut StoreDocument) -> Result<bool> {
    match journal.read(&document.metadata.store_id)? {
        JournalContents::Missing => {
            if journal.exists() {
                tracing::warn!("Removing empty journal {}", journal.path().display());
                journal.remove()?;
            }
            Ok(false)
        }
        JournalContents::Stale { store_id } => {
            tracing::warn!(
                "Discarding stale journal {} (belongs to store {})",
                journal.path().display(),
                store_id
            );
            journal.remove()?;
            Ok(false)
        }
        JournalContents::Entries { entries, damaged } => {
            if damaged {
                tracing::warn!(
                    "Repairing journal {}: keeping {} complete entries",
                    journal.path().display(),
                    entries.len()
                );
                journal.rewrite(&document.metadata.store_id, &entries)?;
            }
            tracing::debug!(
                "Replaying {} journal entries from {}",
                entries.len(),
                journal.path().display()
            );
            for entry in &entries {
                document.apply(entry);
            }
            Ok(true)
        }
    }
}

impl StoreEngine for JsonFileStore {
    fn metadata(&self, location: &Path) -> Result<StoreMetadata> {
        StoreDocument::read_metadata(location)
    }

    fn checkpoint(&self, location: &Path, descriptor: &SchemaDescriptor) -> Result<()> {
        let failed = |e: LadderError| {
            LadderError::checkpoint_failed(location.display().to_string(), e.to_string())
        };
        let handle = Self::open(
            location,
            Arc::new(descriptor.clone()),
            StoreOptions {
                journal_mode: JournalMode::Delete,
                create_if_missing: false,
            },
        )
        .map_err(failed)?;
        handle.close().map_err(failed)
    }

    fn apply_mapping(&self, source: &Path, destination: &Path, step: &MigrationStep) -> Result<()> {
        let failed = |message: String| {
            LadderError::mapping_failed(step.from.ordinal(), step.to.ordinal(), message)
        };

        if destination.exists() {
            return Err(failed(format!(
                "destination {} already exists",
                destination.display()
            )));
        }

        let document = Self::load_merged(source)
            .map_err(|e| failed(format!("cannot read {}: {}", source.display(), e)))?;
        if !step.source.is_compatible_with(&document.metadata) {
            return Err(failed(format!(
                "{} is not a {} store",
                source.display(),
                step.source.model_name
            )));
        }

        let entities = executor::execute(step, &document.entities)?;
        let migrated = StoreDocument::with_entities(&step.destination, entities);
        migrated
            .save(destination)
            .map_err(|e| failed(format!("cannot write {}: {}", destination.display(), e)))?;

        tracing::debug!(
            "Wrote {} records to {}",
            migrated.record_count(),
            destination.display()
        );
        Ok(())
    }

    fn replace(&self, target: &Path, staged: &Path) -> Result<()> {
        let failed = |e: &dyn std::fmt::Display| {
            LadderError::replace_failed(target.display().to_string(), e.to_string())
        };

        let tmp_path = temp_path_for(target).map_err(|e| failed(&e))?;
        fs::copy(staged, &tmp_path).map_err(|e| failed(&e))?;
        File::open(&tmp_path)
            .and_then(|f| f.sync_all())
            .map_err(|e| failed(&e))?;

        if let Err(e) = fs::rename(&tmp_path, target) {
            let _ = fs::remove_file(&tmp_path);
            return Err(failed(&e));
        }

        // The old journal now belongs to no store. One that survives is
        // discarded as stale on the next open.
        if let Err(e) = Journal::new(journal_path(target)).remove() {
            tracing::warn!(
                "Failed to remove old journal of {}: {}",
                target.display(),
                e
            );
        }
        Ok(())
    }

    fn destroy(&self, location: &Path) -> Result<()> {
        for path in [
            location.to_path_buf(),
            journal_path(location),
            lock_path(location),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// An open store. Holds the store's lock until closed or dropped.
#[derive(Debug)]
pub struct StoreHandle {
    location: PathBuf,
    descriptor: Arc<SchemaDescriptor>,
    document: StoreDocument,
    journal: Journal,
    journal_mode: JournalMode,
    _lock: FileLock,
}

impl StoreHandle {
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.document.metadata
    }

    pub fn journal_mode(&self) -> JournalMode {
        self.journal_mode
    }

    /// Inserts a new record and returns its object id.
    pub fn insert(&mut self, entity: &str, mut record: Record) -> Result<ObjectId> {
        self.prepare(entity, &mut record)?;
        let id = uuid::Uuid::new_v4().to_string();
        self.write(JournalEntry::Insert {
            entity: entity.to_string(),
            id: id.clone(),
            record,
        })?;
        Ok(id)
    }

    /// Replaces the record `id` of `entity`.
    pub fn update(&mut self, entity: &str, id: &str, mut record: Record) -> Result<()> {
        if self.get(entity, id).is_none() {
            return Err(LadderError::store(format!("no {} '{}'", entity, id)));
        }
        self.prepare(entity, &mut record)?;
        self.write(JournalEntry::Update {
            entity: entity.to_string(),
            id: id.to_string(),
            record,
        })
    }

    /// Deletes a record. Records that are still referenced cannot be deleted.
    pub fn delete(&mut self, entity: &str, id: &str) -> Result<()> {
        if self.get(entity, id).is_none() {
            return Err(LadderError::store(format!("no {} '{}'", entity, id)));
        }
        for owner in &self.descriptor.entities {
            for relationship in owner.relationships.iter().filter(|r| r.destination == entity) {
                let referenced = self
                    .fetch(&owner.name)
                    .any(|(_, r)| referenced_ids(r.get(&relationship.name)).contains(&id));
                if referenced {
                    return Err(LadderError::store(format!(
                        "{} '{}' is still referenced by {}.{}",
                        entity, id, owner.name, relationship.name
                    )));
                }
            }
        }
        self.write(JournalEntry::Delete {
            entity: entity.to_string(),
            id: id.to_string(),
        })
    }

    pub fn get(&self, entity: &str, id: &str) -> Option<&Record> {
        self.document.entities.get(entity)?.get(id)
    }

    /// Every record of `entity`, ordered by object id.
    pub fn fetch(&self, entity: &str) -> impl Iterator<Item = (&ObjectId, &Record)> {
        self.document.entities.get(entity).into_iter().flatten()
    }

    pub fn count(&self, entity: &str) -> usize {
        self.document.entities.get(entity).map_or(0, |r| r.len())
    }

    pub fn total_count(&self) -> usize {
        self.document.record_count()
    }

    /// Merges the journal into the main file. No-op without a journal.
    pub fn checkpoint(&self) -> Result<()> {
        if !self.journal.exists() {
            return Ok(());
        }
        self.merge_journal()
    }

    /// Closes the handle and releases the lock. Unmerged journal writes stay
    /// in the journal.
    pub fn close(self) -> Result<()> {
        tracing::debug!("Closed store {}", self.location.display());
        Ok(())
    }

    fn merge_journal(&self) -> Result<()> {
        self.document.save(&self.location)?;
        self.journal.remove()?;
        tracing::info!("Checkpointed journal into {}", self.location.display());
        Ok(())
    }

    fn prepare(&self, entity: &str, record: &mut Record) -> Result<()> {
        let descriptor = self.descriptor.entity(entity).ok_or_else(|| {
            LadderError::store(format!(
                "model '{}' has no entity '{}'",
                self.descriptor.model_name, entity
            ))
        })?;
        fill_defaults(descriptor, record);
        validate_record(descriptor, record).map_err(LadderError::store)?;

        for relationship in &descriptor.relationships {
            for target in referenced_ids(record.get(&relationship.name)) {
                if self.get(&relationship.destination, target).is_none() {
                    return Err(LadderError::store(format!(
                        "{}.{} points at missing {} '{}'",
                        entity, relationship.name, relationship.destination, target
                    )));
                }
            }
        }
        Ok(())
    }

    fn write(&mut self, entry: JournalEntry) -> Result<()> {
        match self.journal_mode {
            JournalMode::Wal => {
                self.journal
                    .append(&self.document.metadata.store_id, &entry)?;
                self.document.apply(&entry);
            }
            JournalMode::Delete => {
                self.document.apply(&entry);
                self.document.save(&self.location)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn descriptor() -> Arc<SchemaDescriptor> {
        Arc::new(
            SchemaDescriptor::from_toml(
                r#"
version = 1
model_name = "Sample"

[[entity]]
name = "Note"

[[entity.attribute]]
name = "text"
type = "string"

[[entity.relationship]]
name = "tag"
destination = "Tag"
optional = true

[[entity]]
name = "Tag"

[[entity.attribute]]
name = "label"
type = "string"
"#,
            )
            .unwrap(),
        )
    }

    fn create() -> StoreOptions {
        StoreOptions {
            journal_mode: JournalMode::Wal,
            create_if_missing: true,
        }
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_wal_writes_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");

        let mut handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        let id = handle.insert("Note", record(json!({"text": "hello"}))).unwrap();
        handle.close().unwrap();
        assert!(journal_path(&location).exists());

        let handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        assert_eq!(handle.get("Note", &id).unwrap()["text"], json!("hello"));
    }

    #[test]
    fn test_second_handle_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");

        let _handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        let err = JsonFileStore::open(&location, descriptor(), create()).unwrap_err();
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_incompatible_descriptor_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");
        JsonFileStore::open(&location, descriptor(), create())
            .unwrap()
            .close()
            .unwrap();

        let mut other = (*descriptor()).clone();
        other.entities[1].attributes[0].optional = true;
        let err = JsonFileStore::open(&location, Arc::new(other), create()).unwrap_err();
        assert!(err.to_string().contains("not compatible"));
    }

    #[test]
    fn test_write_validation() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");
        let mut handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();

        assert!(handle.insert("Note", Record::new()).is_err());
        assert!(handle.insert("Nope", Record::new()).is_err());
        assert!(
            handle
                .insert("Note", record(json!({"text": "x", "tag": "missing"})))
                .is_err()
        );

        let tag = handle.insert("Tag", record(json!({"label": "red"}))).unwrap();
        let note = handle
            .insert("Note", record(json!({"text": "x", "tag": tag})))
            .unwrap();
        assert!(handle.delete("Tag", &tag).is_err());
        handle.delete("Note", &note).unwrap();
        handle.delete("Tag", &tag).unwrap();
        assert_eq!(handle.total_count(), 0);
    }

    #[test]
    fn test_engine_checkpoint_merges_journal() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");
        let mut handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        handle.insert("Tag", record(json!({"label": "red"}))).unwrap();
        handle.close().unwrap();

        let before = fs::metadata(&location).unwrap().len();
        JsonFileStore.checkpoint(&location, &descriptor()).unwrap();
        let after = fs::metadata(&location).unwrap().len();

        assert!(!journal_path(&location).exists());
        assert!(after >= before);
        assert_eq!(StoreDocument::load(&location).unwrap().record_count(), 1);
    }

    #[test]
    fn test_engine_checkpoint_without_journal_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");
        JsonFileStore::open(&location, descriptor(), create())
            .unwrap()
            .close()
            .unwrap();
        let before = fs::read(&location).unwrap();

        JsonFileStore.checkpoint(&location, &descriptor()).unwrap();
        assert_eq!(fs::read(&location).unwrap(), before);
    }

    #[test]
    fn test_replace_discards_old_journal() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("notes.store");
        let staged = temp_dir.path().join("staged.store");

        let mut handle = JsonFileStore::open(&target, descriptor(), create()).unwrap();
        handle.insert("Tag", record(json!({"label": "old"}))).unwrap();
        handle.close().unwrap();
        JsonFileStore::open(&staged, descriptor(), create())
            .unwrap()
            .close()
            .unwrap();

        JsonFileStore.replace(&target, &staged).unwrap();

        assert!(!journal_path(&target).exists());
        let handle = JsonFileStore::open(&target, descriptor(), create()).unwrap();
        assert_eq!(handle.total_count(), 0);
        assert_eq!(
            handle.metadata().store_id,
            StoreDocument::read_metadata(&staged).unwrap().store_id
        );
    }

    #[test]
    fn test_destroy_ignores_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");
        JsonFileStore.destroy(&location).unwrap();

        let mut handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        handle.insert("Tag", record(json!({"label": "x"}))).unwrap();
        handle.close().unwrap();

        JsonFileStore.destroy(&location).unwrap();
        assert!(!location.exists());
        assert!(!journal_path(&location).exists());
    }

    #[test]
    fn test_update_replaces_record() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");
        let mut handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        let id = handle.insert("Tag", record(json!({"label": "red"}))).unwrap();

        handle
            .update("Tag", &id, record(json!({"label": "blue"})))
            .unwrap();
        assert!(handle.update("Tag", "missing", record(json!({"label": "x"}))).is_err());
        assert!(handle.update("Tag", &id, Record::new()).is_err());
        handle.close().unwrap();

        let handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        assert_eq!(handle.get("Tag", &id).unwrap()["label"], json!("blue"));
        assert_eq!(handle.total_count(), 1);
    }

    #[test]
    fn test_torn_journal_is_repaired_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");
        let mut handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        let first = handle.insert("Tag", record(json!({"label": "red"}))).unwrap();
        handle.close().unwrap();

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(journal_path(&location))
            .unwrap();
        std::io::Write::write_all(&mut file, b"{\"op\":\"insert\",\"ent").unwrap();
        drop(file);

        let mut handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        let second = handle.insert("Tag", record(json!({"label": "blue"}))).unwrap();
        handle.close().unwrap();

        let mut handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        assert_eq!(handle.get("Tag", &first).unwrap()["label"], json!("red"));
        assert_eq!(handle.get("Tag", &second).unwrap()["label"], json!("blue"));
        let third = handle.insert("Tag", record(json!({"label": "green"}))).unwrap();
        handle.close().unwrap();

        let handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        assert!(handle.get("Tag", &third).is_some());
        assert_eq!(handle.total_count(), 3);
    }

    #[test]
    fn test_empty_journal_is_discarded_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");
        JsonFileStore::open(&location, descriptor(), create())
            .unwrap()
            .close()
            .unwrap();
        fs::write(journal_path(&location), b"").unwrap();

        let mut handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        let id = handle.insert("Tag", record(json!({"label": "red"}))).unwrap();
        handle.close().unwrap();

        let handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        assert_eq!(handle.get("Tag", &id).unwrap()["label"], json!("red"));
    }

    #[test]
    fn test_engine_checkpoint_repairs_torn_journal() {
        let temp_dir = TempDir::new().unwrap();
        let location = temp_dir.path().join("notes.store");
        let mut handle = JsonFileStore::open(&location, descriptor(), create()).unwrap();
        handle.insert("Tag", record(json!({"label": "red"}))).unwrap();
        handle.close().unwrap();

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(journal_path(&location))
            .unwrap();
        std::io::Write::write_all(&mut file, b"{\"op\":\"del").unwrap();
        drop(file);

        JsonFileStore.checkpoint(&location, &descriptor()).unwrap();
        assert!(!journal_path(&location).exists());
        assert_eq!(StoreDocument::load(&location).unwrap().record_count(), 1);
    }

    #[test]
    fn test_replace_succeeds_when_old_journal_cannot_be_removed() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("notes.store");
        let staged = temp_dir.path().join("staged.store");
        JsonFileStore::open(&target, descriptor(), create())
            .unwrap()
            .close()
            .unwrap();
        JsonFileStore::open(&staged, descriptor(), create())
            .unwrap()
            .close()
            .unwrap();
        fs::create_dir_all(journal_path(&target).join("blocker")).unwrap();

        JsonFileStore.replace(&target, &staged).unwrap();

        assert_eq!(
            StoreDocument::read_metadata(&target).unwrap().store_id,
            StoreDocument::read_metadata(&staged).unwrap().store_id
        );
    }
}
