//! Migration steps and plans.

use crate::descriptor::SchemaDescriptor;
use crate::mapping::MappingRuleset;
use crate::version::SchemaVersion;
use std::sync::Arc;

/// One single-version migration: source descriptor, destination descriptor
/// and the ruleset between them.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub source: Arc<SchemaDescriptor>,
    pub destination: Arc<SchemaDescriptor>,
    pub ruleset: MappingRuleset,
}

impl MigrationStep {
    pub fn description(&self) -> String {
        format!("{} -> {} ({})", self.from, self.to, self.ruleset.policy())
    }
}

/// Ordered steps from a store's version to a target version.
///
/// Empty iff the store is already at the target.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step. Steps must chain: each one starts where the last ended.
    ///
    /// # Panics
    ///
    /// Panics if the step does not connect to the previous one.
    pub fn push(&mut self, step: MigrationStep) {
        if let Some(last) = self.steps.last() {
            assert_eq!(
                last.to, step.from,
                "Migration chain broken: previous step ends at {}, next starts at {}",
                last.to, step.from
            );
        }
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MigrationStep> {
        self.steps.iter()
    }

    /// Version the plan starts from, if it has any steps.
    pub fn start(&self) -> Option<SchemaVersion> {
        self.steps.first().map(|s| s.from)
    }

    /// Version the plan ends at, if it has any steps.
    pub fn end(&self) -> Option<SchemaVersion> {
        self.steps.last().map(|s| s.to)
    }
}

impl IntoIterator for MigrationPlan {
    type Item = MigrationStep;
    type IntoIter = std::vec::IntoIter<MigrationStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

impl<'a> IntoIterator for &'a MigrationPlan {
    type Item = &'a MigrationStep;
    type IntoIter = std::slice::Iter<'a, MigrationStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
