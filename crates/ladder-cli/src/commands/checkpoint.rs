use anyhow::{Context, Result};
use ladder_infrastructure::LadderConfig;
use std::path::PathBuf;

pub fn run(config: &LadderConfig, store: Option<PathBuf>) -> Result<()> {
    let location = super::store_location(config, store)?;
    super::migrator(config, None)
        .force_checkpoint(&location)
        .with_context(|| format!("Failed to checkpoint {}", location.display()))?;
    println!("Checkpointed {}", location.display());
    Ok(())
}
