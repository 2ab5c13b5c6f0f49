//! Domain types for progressive schema migration.
//!
//! This crate has no I/O. Storage engines and the migrator itself live in
//! `ladder-infrastructure`.

pub mod descriptor;
pub mod error;
pub mod mapping;
pub mod migration;
pub mod plan;
pub mod store;
pub mod version;

// Re-export common types
pub use descriptor::{AttributeDescriptor, AttributeType, EntityDescriptor, RelationshipDescriptor, SchemaDescriptor};
pub use error::{LadderError, Result};
pub use mapping::{MappingModel, MappingPolicy, MappingRuleset};
pub use migration::{MigrationReport, MigrationState, StoreMigration};
pub use plan::{MigrationPlan, MigrationStep};
pub use store::{ObjectId, Record, StoreEngine, StoreMetadata};
pub use version::SchemaVersion;
