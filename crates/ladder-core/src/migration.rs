//! The migration seam used by the application layer.

use crate::error::Result;
use crate::version::SchemaVersion;
use std::fmt;
use std::path::{Path, PathBuf};

/// Brings a store at a location up to a target schema version.
///
/// Callers must not run two migrations against the same location at once,
/// and must not open the store for regular use while a migration runs.
pub trait StoreMigration: Send + Sync {
    /// True when the store exists, has a readable version and is not yet
    /// compatible with `target`.
    fn requires_migration(&self, location: &Path, target: SchemaVersion) -> Result<bool>;

    /// Runs every step needed to reach `target` and installs the result in
    /// place of the original. A store that needs nothing is left alone.
    fn migrate(&self, location: &Path, target: SchemaVersion) -> Result<MigrationReport>;
}

/// Progress of a migrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Idle,
    CheckingVersion,
    NoMigrationNeeded,
    Migrating { step: usize, of: usize },
    Replacing,
    Done,
    Failed,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Idle => write!(f, "idle"),
            MigrationState::CheckingVersion => write!(f, "checking version"),
            MigrationState::NoMigrationNeeded => write!(f, "no migration needed"),
            MigrationState::Migrating { step, of } => write!(f, "migrating {}/{}", step, of),
            MigrationState::Replacing => write!(f, "replacing"),
            MigrationState::Done => write!(f, "done"),
            MigrationState::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a successful `migrate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub location: PathBuf,
    /// Detected starting version. `None` when the store has no readable version.
    pub from: Option<SchemaVersion>,
    pub to: SchemaVersion,
    /// Number of steps run. Zero when nothing was needed.
    pub steps: usize,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.steps == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(MigrationState::Migrating { step: 2, of: 3 }.to_string(), "migrating 2/3");
        assert_eq!(MigrationState::NoMigrationNeeded.to_string(), "no migration needed");
    }
}
