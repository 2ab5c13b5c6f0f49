//! The registry of known schema versions.
//!
//! Versions form a strict linear chain in declaration order. Adding a version
//! means appending one variant here and one ruleset for the transition into it.

use crate::error::{LadderError, Result};
use crate::mapping::MappingPolicy;
use std::fmt;
use strum::{EnumIter, IntoEnumIterator};

/// Display name shared by every version of the shipped model.
const MODEL_BASE_NAME: &str = "PostStore";

/// Versions whose transition into their successor needs a hand-authored ruleset.
const MANUAL_TRANSITIONS: &[SchemaVersion] = &[SchemaVersion::V1, SchemaVersion::V2];

/// A known schema version of the store.
///
/// Variants are declared in creation order; the discriminant is the ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum SchemaVersion {
    V1 = 1,
    V2 = 2,
    V3 = 3,
    V4 = 4,
}

impl SchemaVersion {
    /// All versions in ascending chronological order.
    pub fn all() -> Vec<SchemaVersion> {
        Self::iter().collect()
    }

    /// The newest version.
    pub fn latest() -> SchemaVersion {
        Self::iter()
            .next_back()
            .expect("the version list always has at least one entry")
    }

    /// The oldest version.
    pub fn oldest() -> SchemaVersion {
        Self::iter()
            .next()
            .expect("the version list always has at least one entry")
    }

    /// The next version in the chain, or `None` for the latest.
    pub fn successor(self) -> Option<SchemaVersion> {
        Self::iter().skip_while(|v| *v != self).nth(1)
    }

    /// The previous version in the chain, or `None` for the oldest.
    pub fn predecessor(self) -> Option<SchemaVersion> {
        Self::iter().take_while(|v| *v != self).last()
    }

    pub fn ordinal(self) -> u32 {
        self as u32
    }

    /// Looks up a version by ordinal.
    ///
    /// # Panics
    ///
    /// Panics when the ordinal is not a known version. Use `TryFrom<u32>` for
    /// values that come from outside the program.
    pub fn from_ordinal(ordinal: u32) -> SchemaVersion {
        match Self::try_from(ordinal) {
            Ok(version) => version,
            Err(_) => panic!("schema version {} is not registered", ordinal),
        }
    }

    /// Human readable model name, e.g. `PostStore` or `PostStore 3`.
    pub fn name(self) -> String {
        if self == Self::oldest() {
            MODEL_BASE_NAME.to_string()
        } else {
            format!("{} {}", MODEL_BASE_NAME, self.ordinal())
        }
    }

    /// File stem used for descriptor resources, e.g. `v2`.
    pub fn file_stem(self) -> String {
        format!("v{}", self.ordinal())
    }

    /// How the transition from this version to its successor is authored.
    pub fn mapping_policy(self) -> MappingPolicy {
        if MANUAL_TRANSITIONS.contains(&self) {
            MappingPolicy::Manual
        } else {
            MappingPolicy::Inferred
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ordinal())
    }
}

impl TryFrom<u32> for SchemaVersion {
    type Error = LadderError;

    fn try_from(ordinal: u32) -> Result<Self> {
        Self::iter().find(|v| v.ordinal() == ordinal).ok_or_else(|| {
            LadderError::config(format!(
                "unknown schema version {} (known: {})",
                ordinal,
                Self::iter()
                    .map(|v| v.ordinal().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }
}
