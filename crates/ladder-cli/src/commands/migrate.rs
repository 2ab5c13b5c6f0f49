use anyhow::{Context, Result};
use ladder_core::StoreMigration;
use ladder_infrastructure::LadderConfig;
use std::path::PathBuf;

pub fn run(
    config: &LadderConfig,
    store: Option<PathBuf>,
    to: Option<u32>,
    scratch: Option<PathBuf>,
) -> Result<()> {
    let location = super::store_location(config, store)?;
    let target = super::target_version(config, to)?;
    let migrator = super::migrator(config, scratch);

    if !migrator.requires_migration(&location, target)? {
        println!("{} needs no migration to version {}", location.display(), target);
        return Ok(());
    }

    let report = migrator
        .migrate(&location, target)
        .with_context(|| format!("Failed to migrate {}", location.display()))?;

    match report.from {
        Some(from) if !report.is_noop() => println!(
            "Migrated {} from version {} to {} in {} step(s)",
            location.display(),
            from,
            report.to,
            report.steps
        ),
        _ => println!("{} needs no migration to version {}", location.display(), target),
    }
    Ok(())
}
