//! Platform paths for ladder configuration and data.
//!
//! ```text
//! ~/.config/ladder/            # Config directory
//! └── ladder.toml              # LadderConfig
//!
//! ~/.local/share/ladder/       # Data directory
//! └── posts.store              # Default store location
//!
//! $TMPDIR/ladder-migrations/   # Scratch space for intermediate stores
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "ladder";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for ladder.
pub struct LadderPaths;

impl LadderPaths {
    /// Returns the ladder configuration directory (e.g. `~/.config/ladder/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the ladder data directory (e.g. `~/.local/share/ladder/`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("ladder.toml"))
    }

    /// Returns the store location used when none is configured.
    pub fn default_store() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("posts.store"))
    }

    /// Returns the process-wide scratch directory for intermediate stores.
    pub fn default_scratch_dir() -> PathBuf {
        std::env::temp_dir().join("ladder-migrations")
    }
}
