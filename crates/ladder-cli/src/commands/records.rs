use anyhow::{Context, Result, anyhow};
use ladder_core::{Record, StoreEngine};
use ladder_infrastructure::{JsonFileStore, LadderConfig, StoreHandle, StoreOptions};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Opens an existing store under whichever version it was written with.
fn open_detected(config: &LadderConfig, location: &Path) -> Result<StoreHandle> {
    let metadata = JsonFileStore::new().metadata(location)?;
    let descriptors = config.descriptors();
    let version = descriptors
        .detect_version(&metadata)?
        .ok_or_else(|| anyhow!("{} has an unknown version", location.display()))?;

    Ok(JsonFileStore::open(
        location,
        descriptors.get(version)?,
        StoreOptions {
            journal_mode: config.store.journal_mode,
            create_if_missing: false,
        },
    )?)
}

pub fn insert(config: &LadderConfig, store: PathBuf, entity: &str, json: &str) -> Result<()> {
    let record: Record = serde_json::from_str(json).context("Record must be a JSON object")?;

    let mut handle = open_detected(config, &store)?;
    let id = handle.insert(entity, record)?;
    handle.close()?;

    println!("{}", id);
    Ok(())
}

pub fn update(
    config: &LadderConfig,
    store: PathBuf,
    entity: &str,
    id: &str,
    json: &str,
) -> Result<()> {
    let record: Record = serde_json::from_str(json).context("Record must be a JSON object")?;

    let mut handle = open_detected(config, &store)?;
    handle.update(entity, id, record)?;
    handle.close()?;

    println!("Updated {} '{}'", entity, id);
    Ok(())
}

pub fn dump(config: &LadderConfig, store: Option<PathBuf>) -> Result<()> {
    let location = super::store_location(config, store)?;
    let handle = open_detected(config, &location)?;

    let mut entities = Map::new();
    for entity in handle.descriptor().entity_names() {
        let records: Map<String, Value> = handle
            .fetch(entity)
            .map(|(id, record)| (id.clone(), Value::Object(record.clone())))
            .collect();
        entities.insert(entity.to_string(), Value::Object(records));
    }
    println!("{}", serde_json::to_string_pretty(&Value::Object(entities))?);

    handle.close()?;
    Ok(())
}
