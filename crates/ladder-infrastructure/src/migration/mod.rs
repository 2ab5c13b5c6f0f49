//! Migration engine: ruleset resolution, planning, mapping execution and the
//! store migrator.

pub mod executor;
pub mod inferred;
pub mod migrator;
pub mod planner;
pub mod resolver;

pub use migrator::StoreMigrator;
pub use planner::MigrationPlanner;
pub use resolver::MappingResolver;
