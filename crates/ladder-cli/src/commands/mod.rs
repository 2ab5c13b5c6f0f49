pub mod checkpoint;
pub mod config;
pub mod init;
pub mod migrate;
pub mod plan;
pub mod records;
pub mod setup;
pub mod status;

use anyhow::Result;
use ladder_core::SchemaVersion;
use ladder_infrastructure::{JsonFileStore, LadderConfig, StoreMigrator};
use std::path::PathBuf;
use std::sync::Arc;

/// The store given on the command line, else the configured one.
pub fn store_location(config: &LadderConfig, store: Option<PathBuf>) -> Result<PathBuf> {
    match store {
        Some(path) => Ok(path),
        None => config.store_path(),
    }
}

/// The version given on the command line, else the configured target.
pub fn target_version(config: &LadderConfig, to: Option<u32>) -> Result<SchemaVersion> {
    match to {
        Some(ordinal) => Ok(SchemaVersion::try_from(ordinal)?),
        None => config.target_version(),
    }
}

pub fn migrator(config: &LadderConfig, scratch: Option<PathBuf>) -> StoreMigrator {
    StoreMigrator::new(
        Arc::new(JsonFileStore::new()),
        Arc::new(config.descriptors()),
        scratch.unwrap_or_else(|| config.scratch_dir()),
    )
}
