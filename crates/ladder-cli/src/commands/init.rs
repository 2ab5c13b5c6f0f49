use anyhow::{Result, bail};
use ladder_core::SchemaVersion;
use ladder_infrastructure::{JsonFileStore, LadderConfig, StoreOptions};
use std::path::PathBuf;

pub fn run(config: &LadderConfig, store: Option<PathBuf>, version: Option<u32>) -> Result<()> {
    let location = super::store_location(config, store)?;
    if location.exists() {
        bail!("{} already exists", location.display());
    }

    let version = match version {
        Some(ordinal) => SchemaVersion::try_from(ordinal)?,
        None => SchemaVersion::latest(),
    };
    let descriptor = config.descriptors().get(version)?;

    JsonFileStore::open(
        &location,
        descriptor,
        StoreOptions {
            journal_mode: config.store.journal_mode,
            create_if_missing: true,
        },
    )?
    .close()?;

    println!("Created {} at version {} ({})", location.display(), version, version.name());
    Ok(())
}
