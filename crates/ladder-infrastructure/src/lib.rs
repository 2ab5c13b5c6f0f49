pub mod config;
pub mod descriptor;
pub mod migration;
pub mod paths;
pub mod storage;

pub use crate::config::LadderConfig;
pub use crate::descriptor::DescriptorCache;
pub use crate::migration::{MappingResolver, MigrationPlanner, StoreMigrator};
pub use crate::storage::{JournalMode, JsonFileStore, StoreHandle, StoreOptions};
