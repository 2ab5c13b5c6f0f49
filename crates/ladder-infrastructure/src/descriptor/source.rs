//! Where descriptor and manual mapping declarations come from.

use ladder_core::{LadderError, Result, SchemaVersion};
use std::fs;
use std::path::PathBuf;

/// Supplies the TOML declarations for each version.
pub trait ModelSource: Send + Sync {
    /// The descriptor declaration of `version`.
    fn descriptor_toml(&self, version: SchemaVersion) -> Result<String>;

    /// The manual mapping from `from` to its successor, if one is declared.
    fn mapping_toml(&self, from: SchemaVersion) -> Result<Option<String>>;
}

/// Declarations compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledModels;

impl ModelSource for BundledModels {
    fn descriptor_toml(&self, version: SchemaVersion) -> Result<String> {
        let content = match version {
            SchemaVersion::V1 => include_str!("../../resources/models/v1.toml"),
            SchemaVersion::V2 => include_str!("../../resources/models/v2.toml"),
            SchemaVersion::V3 => include_str!("../../resources/models/v3.toml"),
            SchemaVersion::V4 => include_str!("../../resources/models/v4.toml"),
        };
        Ok(content.to_string())
    }

    fn mapping_toml(&self, from: SchemaVersion) -> Result<Option<String>> {
        let content = match from {
            SchemaVersion::V1 => Some(include_str!("../../resources/mappings/v1_to_v2.toml")),
            SchemaVersion::V2 => Some(include_str!("../../resources/mappings/v2_to_v3.toml")),
            SchemaVersion::V3 | SchemaVersion::V4 => None,
        };
        Ok(content.map(str::to_string))
    }
}

/// Declarations read from a directory: `v1.toml`, `v1_to_v2.toml`, ...
#[derive(Debug, Clone)]
pub struct DirectoryModels {
    dir: PathBuf,
}

impl DirectoryModels {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ModelSource for DirectoryModels {
    fn descriptor_toml(&self, version: SchemaVersion) -> Result<String> {
        let path = self.dir.join(format!("{}.toml", version.file_stem()));
        fs::read_to_string(&path).map_err(|e| {
            LadderError::descriptor(
                version.ordinal(),
                format!("cannot read {}: {}", path.display(), e),
            )
        })
    }

    fn mapping_toml(&self, from: SchemaVersion) -> Result<Option<String>> {
        let Some(to) = from.successor() else {
            return Ok(None);
        };
        let path = self
            .dir
            .join(format!("{}_to_{}.toml", from.file_stem(), to.file_stem()));
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
