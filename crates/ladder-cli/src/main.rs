use anyhow::Result;
use clap::{Parser, Subcommand};
use ladder_infrastructure::LadderConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "ladder")]
#[command(about = "Ladder - progressive schema migration for file-backed stores", long_about = None)]
struct Cli {
    /// Config file (default: platform config dir / ladder.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the detected version of a store and whether it needs migrating
    Status {
        store: Option<PathBuf>,
        #[arg(long)]
        to: Option<u32>,
    },
    /// List the steps between two versions
    Plan {
        #[arg(long)]
        from: u32,
        #[arg(long)]
        to: Option<u32>,
    },
    /// Migrate a store to the target version
    Migrate {
        store: Option<PathBuf>,
        #[arg(long)]
        to: Option<u32>,
        /// Directory for intermediate stores
        #[arg(long)]
        scratch: Option<PathBuf>,
    },
    /// Merge a store's journal into its main file
    Checkpoint { store: Option<PathBuf> },
    /// Create an empty store
    Init {
        store: Option<PathBuf>,
        #[arg(long)]
        version: Option<u32>,
    },
    /// Migrate if needed and open the store the way the application does
    Setup { store: Option<PathBuf> },
    /// Insert one record given as a JSON object
    Insert {
        store: PathBuf,
        entity: String,
        json: String,
    },
    /// Replace one record with the given JSON object
    Update {
        store: PathBuf,
        entity: String,
        id: String,
        json: String,
    },
    /// Print every record of a store as JSON
    Dump { store: Option<PathBuf> },
    /// Print the effective configuration as TOML
    Config {
        /// Also write it to the config file
        #[arg(long)]
        write: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LADDER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LadderConfig::load_from(path)?,
        None => LadderConfig::load_default()?,
    };
    tracing::debug!("Using config: {:?}", config);

    match cli.command {
        Commands::Status { store, to } => commands::status::run(&config, store, to)?,
        Commands::Plan { from, to } => commands::plan::run(&config, from, to)?,
        Commands::Migrate { store, to, scratch } => {
            commands::migrate::run(&config, store, to, scratch)?
        }
        Commands::Checkpoint { store } => commands::checkpoint::run(&config, store)?,
        Commands::Init { store, version } => commands::init::run(&config, store, version)?,
        Commands::Setup { store } => commands::setup::run(&config, store).await?,
        Commands::Insert {
            store,
            entity,
            json,
        } => commands::records::insert(&config, store, &entity, &json)?,
        Commands::Update {
            store,
            entity,
            id,
            json,
        } => commands::records::update(&config, store, &entity, &id, &json)?,
        Commands::Dump { store } => commands::records::dump(&config, store)?,
        Commands::Config { write } => commands::config::run(&config, cli.config, write)?,
    }

    Ok(())
}
