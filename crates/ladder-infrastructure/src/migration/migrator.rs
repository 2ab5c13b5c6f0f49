//! Running a migration plan against a store on disk.

use super::planner::MigrationPlanner;
use crate::descriptor::DescriptorCache;
use ladder_core::{
    LadderError, MigrationReport, MigrationState, Result, SchemaVersion, StoreEngine,
    StoreMigration,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Brings a store up to a target version one step at a time.
///
/// Each step writes a new store under the scratch directory. The original is
/// only touched by the final replace, so a failure anywhere before that
/// leaves it exactly as it was.
pub struct StoreMigrator {
    engine: Arc<dyn StoreEngine>,
    planner: MigrationPlanner,
    scratch_dir: PathBuf,
    state: Mutex<MigrationState>,
}

impl StoreMigrator {
    pub fn new(
        engine: Arc<dyn StoreEngine>,
        descriptors: Arc<DescriptorCache>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            planner: MigrationPlanner::new(descriptors),
            scratch_dir: scratch_dir.into(),
            state: Mutex::new(MigrationState::Idle),
        }
    }

    pub fn planner(&self) -> &MigrationPlanner {
        &self.planner
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn state(&self) -> MigrationState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(MigrationState::Failed)
    }

    fn set_state(&self, state: MigrationState) {
        tracing::info!("Migration state: {}", state);
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    /// Merges any pending journal into the main file.
    ///
    /// A store whose version cannot be determined is skipped: there is
    /// nothing to checkpoint.
    pub fn force_checkpoint(&self, location: &Path) -> Result<()> {
        let metadata = match self.engine.metadata(location) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!("Skipping checkpoint of {}: {}", location.display(), e);
                return Ok(());
            }
        };
        let Some(version) = self.planner.detect_version(&metadata)? else {
            tracing::debug!(
                "Skipping checkpoint of {}: unknown version",
                location.display()
            );
            return Ok(());
        };

        let descriptor = self.planner.descriptors().get(version)?;
        self.engine.checkpoint(location, &descriptor)
    }

    fn run(&self, location: &Path, target: SchemaVersion) -> Result<MigrationReport> {
        self.set_state(MigrationState::CheckingVersion);
        self.force_checkpoint(location)?;

        let metadata = match self.engine.metadata(location) {
            Ok(metadata) => metadata,
            Err(e) => {
                if e.is_not_found_or_missing() {
                    tracing::info!("No store at {}, nothing to migrate", location.display());
                } else {
                    tracing::warn!(
                        "Skipping migration of {}: unreadable metadata: {}",
                        location.display(),
                        e
                    );
                }
                self.set_state(MigrationState::NoMigrationNeeded);
                return Ok(MigrationReport {
                    location: location.to_path_buf(),
                    from: None,
                    to: target,
                    steps: 0,
                });
            }
        };
        let from = self
            .planner
            .detect_version(&metadata)?
            .ok_or_else(|| LadderError::unknown_store_version(location.display().to_string()))?;

        let plan = self.planner.plan(from, target)?;
        if plan.is_empty() {
            self.set_state(MigrationState::NoMigrationNeeded);
            return Ok(MigrationReport {
                location: location.to_path_buf(),
                from: Some(from),
                to: target,
                steps: 0,
            });
        }

        fs::create_dir_all(&self.scratch_dir)?;

        let total = plan.len();
        let mut current = location.to_path_buf();
        for (index, step) in plan.iter().enumerate() {
            self.set_state(MigrationState::Migrating {
                step: index + 1,
                of: total,
            });
            tracing::info!(
                "Migration step {}/{}: {}",
                index + 1,
                total,
                step.description()
            );

            let output = self.scratch_location();
            if let Err(e) = self.engine.apply_mapping(&current, &output, step) {
                self.discard(&output);
                if current != location {
                    self.discard(&current);
                }
                return Err(e);
            }

            if current != location {
                self.discard(&current);
            }
            current = output;
        }

        self.set_state(MigrationState::Replacing);
        if let Err(e) = self.engine.replace(location, &current) {
            self.discard(&current);
            return Err(e);
        }
        self.discard(&current);

        Ok(MigrationReport {
            location: location.to_path_buf(),
            from: Some(from),
            to: target,
            steps: total,
        })
    }

    /// A fresh, process-unique store location under the scratch directory.
    fn scratch_location(&self) -> PathBuf {
        self.scratch_dir
            .join(format!("{}.store", uuid::Uuid::new_v4()))
    }

    /// Destroys an intermediate store. Failure only leaves an orphan behind.
    fn discard(&self, location: &Path) {
        if let Err(e) = self.engine.destroy(location) {
            tracing::warn!(
                "Failed to remove intermediate store {}: {}",
                location.display(),
                e
            );
        }
    }
}

impl StoreMigration for StoreMigrator {
    fn requires_migration(&self, location: &Path, target: SchemaVersion) -> Result<bool> {
        self.set_state(MigrationState::CheckingVersion);

        let metadata = match self.engine.metadata(location) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!("No readable store at {}: {}", location.display(), e);
                self.set_state(MigrationState::NoMigrationNeeded);
                return Ok(false);
            }
        };

        let required = !self
            .planner
            .descriptors()
            .get(target)?
            .is_compatible_with(&metadata);
        self.set_state(if required {
            MigrationState::Idle
        } else {
            MigrationState::NoMigrationNeeded
        });
        Ok(required)
    }

    fn migrate(&self, location: &Path, target: SchemaVersion) -> Result<MigrationReport> {
        match self.run(location, target) {
            Ok(report) => {
                if !report.is_noop() {
                    self.set_state(MigrationState::Done);
                    tracing::info!(
                        "Migrated {} from version {} to {} in {} step(s)",
                        location.display(),
                        report.from.map_or_else(|| "?".to_string(), |v| v.to_string()),
                        report.to,
                        report.steps
                    );
                }
                Ok(report)
            }
            Err(e) => {
                self.set_state(MigrationState::Failed);
                tracing::error!("Migration of {} failed: {}", location.display(), e);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for StoreMigrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreMigrator")
            .field("scratch_dir", &self.scratch_dir)
            .field("state", &self.state())
            .finish()
    }
}
