//! Store lifecycle: migrate at startup, open for use, tear down.

use anyhow::{Context, Result};
use ladder_core::{SchemaVersion, StoreMigration};
use ladder_infrastructure::{
    DescriptorCache, JournalMode, JsonFileStore, LadderConfig, StoreHandle, StoreMigrator,
    StoreOptions,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Where the store lives and which version the application expects.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub location: PathBuf,
    pub target: SchemaVersion,
    pub journal_mode: JournalMode,
}

impl StoreSettings {
    pub fn from_config(config: &LadderConfig) -> Result<Self> {
        Ok(Self {
            location: config.store_path()?,
            target: config.target_version()?,
            journal_mode: config.store.journal_mode,
        })
    }
}

/// Owns the store's startup sequence.
///
/// Construct one at startup and pass it by reference. `setup` must finish
/// before anything else opens the store.
pub struct StoreManager {
    settings: StoreSettings,
    migrator: Arc<dyn StoreMigration>,
    descriptors: Arc<DescriptorCache>,
}

impl StoreManager {
    pub fn new(
        settings: StoreSettings,
        migrator: Arc<dyn StoreMigration>,
        descriptors: Arc<DescriptorCache>,
    ) -> Self {
        Self {
            settings,
            migrator,
            descriptors,
        }
    }

    /// Wires the JSON store engine and a migrator from configuration.
    pub fn from_config(config: &LadderConfig) -> Result<Self> {
        let settings = StoreSettings::from_config(config)?;
        let descriptors = Arc::new(config.descriptors());
        let migrator = StoreMigrator::new(
            Arc::new(JsonFileStore::new()),
            Arc::clone(&descriptors),
            config.scratch_dir(),
        );
        Ok(Self::new(settings, Arc::new(migrator), descriptors))
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Migrates the store if needed, then opens it for regular use.
    ///
    /// The work runs on a blocking worker; the caller resumes with the open
    /// handle once it is done.
    pub async fn setup(&self) -> Result<StoreHandle> {
        let settings = self.settings.clone();
        let migrator = Arc::clone(&self.migrator);
        let descriptors = Arc::clone(&self.descriptors);

        tokio::task::spawn_blocking(move || -> Result<StoreHandle> {
            Self::migrate_if_needed(&settings, migrator.as_ref())?;
            Self::open(&settings, &descriptors)
        })
        .await
        .context("Store setup task did not complete")?
    }

    /// Merges the journal and releases the store.
    pub fn teardown(&self, handle: StoreHandle) -> Result<()> {
        handle
            .checkpoint()
            .with_context(|| format!("Failed to checkpoint {}", handle.location().display()))?;
        handle.close()?;
        Ok(())
    }

    fn migrate_if_needed(settings: &StoreSettings, migrator: &dyn StoreMigration) -> Result<()> {
        let location = &settings.location;
        if !migrator.requires_migration(location, settings.target)? {
            tracing::debug!("{} is at version {}", location.display(), settings.target);
            return Ok(());
        }

        let report = migrator
            .migrate(location, settings.target)
            .with_context(|| format!("Failed to migrate {}", location.display()))?;
        tracing::info!(
            "Store {} migrated to version {} ({} step(s))",
            location.display(),
            report.to,
            report.steps
        );
        Ok(())
    }

    fn open(settings: &StoreSettings, descriptors: &DescriptorCache) -> Result<StoreHandle> {
        let descriptor = descriptors.get(settings.target)?;
        JsonFileStore::open(
            &settings.location,
            descriptor,
            StoreOptions {
                journal_mode: settings.journal_mode,
                create_if_missing: true,
            },
        )
        .with_context(|| format!("Failed to open store {}", settings.location.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladder_core::{MigrationReport, Result as LadderResult};
    use ladder_infrastructure::storage::StoreDocument;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records calls; `migrate` writes an empty store at the target version.
    struct MockMigration {
        requires: bool,
        descriptors: Arc<DescriptorCache>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl MockMigration {
        fn new(requires: bool, descriptors: Arc<DescriptorCache>) -> Self {
            Self {
                requires,
                descriptors,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl StoreMigration for MockMigration {
        fn requires_migration(&self, _location: &Path, _target: SchemaVersion) -> LadderResult<bool> {
            self.calls.lock().unwrap().push("requires_migration");
            Ok(self.requires)
        }

        fn migrate(&self, location: &Path, target: SchemaVersion) -> LadderResult<MigrationReport> {
            self.calls.lock().unwrap().push("migrate");
            StoreDocument::empty(&*self.descriptors.get(target)?).save(location)?;
            Ok(MigrationReport {
                location: location.to_path_buf(),
                from: Some(SchemaVersion::V1),
                to: target,
                steps: 1,
            })
        }
    }

    fn manager(temp_dir: &TempDir, requires: bool) -> (StoreManager, Arc<MockMigration>) {
        let descriptors = Arc::new(DescriptorCache::bundled());
        let migration = Arc::new(MockMigration::new(requires, Arc::clone(&descriptors)));
        let settings = StoreSettings {
            location: temp_dir.path().join("posts.store"),
            target: SchemaVersion::latest(),
            journal_mode: JournalMode::Wal,
        };
        let manager = StoreManager::new(settings, migration.clone(), descriptors);
        (manager, migration)
    }

    #[tokio::test]
    async fn test_setup_skips_migration_when_not_required() {
        let temp_dir = TempDir::new().unwrap();
        let (manager, migration) = manager(&temp_dir, false);

        let handle = manager.setup().await.unwrap();

        assert_eq!(migration.calls(), vec!["requires_migration"]);
        assert_eq!(handle.total_count(), 0);
        assert!(manager.settings().location.exists());
        manager.teardown(handle).unwrap();
    }

    #[tokio::test]
    async fn test_setup_migrates_when_required() {
        let temp_dir = TempDir::new().unwrap();
        let (manager, migration) = manager(&temp_dir, true);

        let handle = manager.setup().await.unwrap();

        assert_eq!(migration.calls(), vec!["requires_migration", "migrate"]);
        assert_eq!(handle.descriptor().model_name, SchemaVersion::latest().name());
    }

    #[tokio::test]
    async fn test_store_is_locked_until_teardown() {
        let temp_dir = TempDir::new().unwrap();
        let (manager, _) = manager(&temp_dir, false);

        let handle = manager.setup().await.unwrap();
        assert!(manager.setup().await.is_err());

        manager.teardown(handle).unwrap();
        manager.setup().await.unwrap();
    }
}
