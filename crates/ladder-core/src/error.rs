//! Error types for Ladder.

use thiserror::Error;

/// A shared error type for every Ladder crate.
///
/// Variants carry plain strings so the error stays `Clone` and can cross the
/// blocking-task boundary used by the application layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LadderError {
    /// The store's metadata matches no known schema descriptor.
    #[error("Unknown store version at {location}")]
    UnknownStoreVersion { location: String },

    /// The store's metadata could not be read at all.
    #[error("Unable to read store metadata at {location}: {message}")]
    MetadataUnreadable { location: String, message: String },

    /// A schema descriptor could not be loaded or is malformed.
    #[error("Descriptor error for version {version}: {message}")]
    Descriptor { version: u32, message: String },

    /// No one-to-one mapping could be inferred between two descriptors.
    #[error("Unable to infer mapping from version {from} to {to}: {message}")]
    Inference { from: u32, to: u32, message: String },

    /// A migration step failed to transform its source.
    #[error("Failed attempting to migrate from version {from} to {to}: {message}")]
    MappingFailed { from: u32, to: u32, message: String },

    /// The write-ahead journal could not be merged into the main file.
    #[error("Failed to force journal checkpoint at {location}: {message}")]
    CheckpointFailed { location: String, message: String },

    /// The migrated store could not be installed over the original.
    #[error("Failed to replace store at {target}: {message}")]
    ReplaceFailed { target: String, message: String },

    /// The target version is not reachable by walking successors.
    #[error("Version {to} is not reachable from version {from}")]
    UnreachableVersion { from: u32, to: u32 },

    /// Store engine error during regular use (open, write, lock).
    #[error("Store error: {0}")]
    Store(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LadderError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    pub fn unknown_store_version(location: impl Into<String>) -> Self {
        Self::UnknownStoreVersion {
            location: location.into(),
        }
    }

    pub fn metadata_unreadable(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MetadataUnreadable {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn descriptor(version: u32, message: impl Into<String>) -> Self {
        Self::Descriptor {
            version,
            message: message.into(),
        }
    }

    pub fn inference(from: u32, to: u32, message: impl Into<String>) -> Self {
        Self::Inference {
            from,
            to,
            message: message.into(),
        }
    }

    pub fn mapping_failed(from: u32, to: u32, message: impl Into<String>) -> Self {
        Self::MappingFailed {
            from,
            to,
            message: message.into(),
        }
    }

    pub fn checkpoint_failed(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CheckpointFailed {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn replace_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReplaceFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    pub fn is_unknown_store_version(&self) -> bool {
        matches!(self, Self::UnknownStoreVersion { .. })
    }

    pub fn is_mapping_failed(&self) -> bool {
        matches!(self, Self::MappingFailed { .. })
    }

    /// Check if this error means the store simply is not there.
    ///
    /// Metadata reads on a missing file surface as `MetadataUnreadable` with
    /// the io "not found" text, so both shapes are accepted.
    pub fn is_not_found_or_missing(&self) -> bool {
        match self {
            Self::Io { message } | Self::MetadataUnreadable { message, .. } => {
                let lower = message.to_lowercase();
                lower.contains("not found") || lower.contains("no such file")
            }
            _ => false,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for LadderError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for LadderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for LadderError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for LadderError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, LadderError>`.
pub type Result<T> = std::result::Result<T, LadderError>;
