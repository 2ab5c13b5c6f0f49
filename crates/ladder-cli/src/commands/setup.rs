use anyhow::Result;
use ladder_application::StoreManager;
use ladder_infrastructure::LadderConfig;
use std::path::PathBuf;

pub async fn run(config: &LadderConfig, store: Option<PathBuf>) -> Result<()> {
    let mut config = config.clone();
    config.store.path = Some(super::store_location(&config, store)?);

    let manager = StoreManager::from_config(&config)?;
    let handle = manager.setup().await?;

    println!(
        "Opened {} as {} (journal mode: {:?})",
        handle.location().display(),
        handle.descriptor().model_name,
        handle.journal_mode()
    );
    for entity in handle.descriptor().entity_names() {
        println!("  {}: {}", entity, handle.count(entity));
    }

    manager.teardown(handle)
}
