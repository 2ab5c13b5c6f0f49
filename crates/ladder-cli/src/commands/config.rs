use anyhow::Result;
use ladder_infrastructure::LadderConfig;
use ladder_infrastructure::paths::LadderPaths;
use std::path::PathBuf;

pub fn run(config: &LadderConfig, path: Option<PathBuf>, write: bool) -> Result<()> {
    print!("{}", toml::to_string_pretty(config)?);

    if write {
        let path = match path {
            Some(path) => path,
            None => LadderPaths::config_file()?,
        };
        config.save_to(&path)?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}
