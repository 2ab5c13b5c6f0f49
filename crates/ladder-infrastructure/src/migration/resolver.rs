//! Choosing the ruleset for each version transition.

use super::inferred;
use crate::descriptor::DescriptorCache;
use ladder_core::{LadderError, MappingPolicy, MappingRuleset, Result, SchemaVersion};
use std::sync::Arc;

/// Produces the ruleset that moves a version to its successor.
///
/// The kind of ruleset comes from [`SchemaVersion::mapping_policy`], never from
/// inspecting the data.
#[derive(Debug, Clone)]
pub struct MappingResolver {
    descriptors: Arc<DescriptorCache>,
}

impl MappingResolver {
    pub fn new(descriptors: Arc<DescriptorCache>) -> Self {
        Self { descriptors }
    }

    /// The ruleset from `version` to its successor, or `None` for the latest.
    pub fn ruleset_for(&self, version: SchemaVersion) -> Result<Option<MappingRuleset>> {
        let Some(next) = version.successor() else {
            return Ok(None);
        };
        let source = self.descriptors.get(version)?;
        let destination = self.descriptors.get(next)?;

        let ruleset = match version.mapping_policy() {
            MappingPolicy::Manual => {
                let model = self.descriptors.manual_mapping(version)?.ok_or_else(|| {
                    LadderError::mapping_failed(
                        version.ordinal(),
                        next.ordinal(),
                        "no manual mapping is declared",
                    )
                })?;
                model.validate(&source, &destination)?;
                MappingRuleset::Manual(model)
            }
            MappingPolicy::Inferred => {
                MappingRuleset::Inferred(inferred::infer(&source, &destination)?)
            }
        };

        tracing::debug!(
            "Resolved {} ruleset for {} -> {}",
            ruleset.policy(),
            version,
            next
        );
        Ok(Some(ruleset))
    }
}
