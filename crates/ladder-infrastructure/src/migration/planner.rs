//! Building the chain of steps between two versions.

use super::resolver::MappingResolver;
use crate::descriptor::DescriptorCache;
use ladder_core::{
    LadderError, MigrationPlan, MigrationStep, Result, SchemaVersion, StoreMetadata,
};
use std::sync::Arc;

/// Plans linear migrations: every step moves exactly one version forward.
#[derive(Debug, Clone)]
pub struct MigrationPlanner {
    descriptors: Arc<DescriptorCache>,
    resolver: MappingResolver,
}

impl MigrationPlanner {
    pub fn new(descriptors: Arc<DescriptorCache>) -> Self {
        Self {
            resolver: MappingResolver::new(Arc::clone(&descriptors)),
            descriptors,
        }
    }

    pub fn descriptors(&self) -> &Arc<DescriptorCache> {
        &self.descriptors
    }

    /// Steps from `from` to `to`. Empty when they are equal.
    ///
    /// Going backwards is not supported and yields `UnreachableVersion`.
    pub fn plan(&self, from: SchemaVersion, to: SchemaVersion) -> Result<MigrationPlan> {
        let unreachable = || LadderError::UnreachableVersion {
            from: from.ordinal(),
            to: to.ordinal(),
        };
        if from > to {
            return Err(unreachable());
        }

        let mut plan = MigrationPlan::new();
        let mut current = from;
        while current != to {
            let next = current.successor().ok_or_else(unreachable)?;
            let ruleset = self.resolver.ruleset_for(current)?.ok_or_else(unreachable)?;
            plan.push(MigrationStep {
                from: current,
                to: next,
                source: self.descriptors.get(current)?,
                destination: self.descriptors.get(next)?,
                ruleset,
            });
            current = next;
        }

        tracing::debug!("Planned {} step(s) from {} to {}", plan.len(), from, to);
        Ok(plan)
    }

    /// The version a store with `metadata` was written under.
    pub fn detect_version(&self, metadata: &StoreMetadata) -> Result<Option<SchemaVersion>> {
        self.descriptors.detect_version(metadata)
    }
}
