use anyhow::Result;
use ladder_core::{StoreEngine, StoreMigration};
use ladder_infrastructure::JsonFileStore;
use ladder_infrastructure::storage::json_store::journal_path;
use std::path::PathBuf;

pub fn run(
    config: &ladder_infrastructure::LadderConfig,
    store: Option<PathBuf>,
    to: Option<u32>,
) -> Result<()> {
    let location = super::store_location(config, store)?;
    let target = super::target_version(config, to)?;
    let migrator = super::migrator(config, None);

    println!("Store:   {}", location.display());
    let metadata = match JsonFileStore::new().metadata(&location) {
        Ok(metadata) => metadata,
        Err(e) => {
            println!("Status:  no readable store ({})", e);
            return Ok(());
        }
    };

    match migrator.planner().detect_version(&metadata)? {
        Some(version) => println!("Version: {} ({})", version, version.name()),
        None => println!("Version: unknown"),
    }
    println!("Id:      {}", metadata.store_id);
    println!(
        "Journal: {}",
        if journal_path(&location).exists() {
            "pending writes"
        } else {
            "clean"
        }
    );

    let required = migrator.requires_migration(&location, target)?;
    println!(
        "Target:  {} ({})",
        target,
        if required {
            "migration required"
        } else {
            "up to date"
        }
    );
    Ok(())
}
