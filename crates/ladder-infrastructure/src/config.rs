//! The `ladder.toml` configuration file.
//!
//! ```toml
//! [store]
//! path = "/home/me/.local/share/ladder/posts.store"
//! journal_mode = "wal"
//!
//! [migration]
//! scratch_dir = "/tmp/ladder-migrations"
//! target_version = 4
//! descriptor_dir = "/etc/ladder/models"
//! ```
//!
//! Every key is optional. A missing file means all defaults.

use crate::descriptor::DescriptorCache;
use crate::paths::LadderPaths;
use crate::storage::{AtomicTomlFile, JournalMode};
use anyhow::{Context, Result};
use ladder_core::SchemaVersion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LadderConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub journal_mode: JournalMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    /// Version ordinal to migrate to. Latest when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_version: Option<u32>,
    /// Directory of descriptor and mapping declarations. Bundled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_dir: Option<PathBuf>,
}

impl LadderConfig {
    /// Loads from `path`, falling back to defaults when the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = AtomicTomlFile::<LadderConfig>::new(path.to_path_buf())
            .load()
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Ok(config.unwrap_or_default())
    }

    /// Loads from the platform config file.
    pub fn load_default() -> Result<Self> {
        let path = LadderPaths::config_file().context("Failed to locate config file")?;
        Self::load_from(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        AtomicTomlFile::<LadderConfig>::new(path.to_path_buf())
            .save(self)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => LadderPaths::default_store().context("Failed to locate default store"),
        }
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.migration
            .scratch_dir
            .clone()
            .unwrap_or_else(LadderPaths::default_scratch_dir)
    }

    pub fn target_version(&self) -> Result<SchemaVersion> {
        match self.migration.target_version {
            Some(ordinal) => Ok(SchemaVersion::try_from(ordinal)?),
            None => Ok(SchemaVersion::latest()),
        }
    }

    pub fn descriptors(&self) -> DescriptorCache {
        DescriptorCache::from_dir(self.migration.descriptor_dir.clone())
    }
}
