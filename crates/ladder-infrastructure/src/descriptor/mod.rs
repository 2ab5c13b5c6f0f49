//! Loading and caching schema descriptors.

mod source;

pub use source::{BundledModels, DirectoryModels, ModelSource};

use ladder_core::{LadderError, MappingModel, Result, SchemaDescriptor, SchemaVersion, StoreMetadata};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Loads descriptors on demand and keeps them for the cache's lifetime.
pub struct DescriptorCache {
    source: Box<dyn ModelSource>,
    loaded: Mutex<HashMap<SchemaVersion, Arc<SchemaDescriptor>>>,
}

impl DescriptorCache {
    pub fn new(source: impl ModelSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn bundled() -> Self {
        Self::new(BundledModels)
    }

    /// Bundled declarations, or the ones in `dir` when given.
    pub fn from_dir(dir: Option<PathBuf>) -> Self {
        match dir {
            Some(dir) => Self::new(DirectoryModels::new(dir)),
            None => Self::bundled(),
        }
    }

    pub fn get(&self, version: SchemaVersion) -> Result<Arc<SchemaDescriptor>> {
        if let Some(descriptor) = self.lock()?.get(&version) {
            tracing::debug!("Descriptor {} served from cache", version);
            return Ok(Arc::clone(descriptor));
        }

        let descriptor = SchemaDescriptor::from_toml(&self.source.descriptor_toml(version)?)
            .map_err(|e| match e {
                LadderError::Descriptor { .. } => e,
                other => LadderError::descriptor(version.ordinal(), other.to_string()),
            })?;
        if descriptor.version != version.ordinal() {
            return Err(LadderError::descriptor(
                version.ordinal(),
                format!("declaration is for version {}", descriptor.version),
            ));
        }

        let descriptor = Arc::new(descriptor);
        self.lock()?.insert(version, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// The manual mapping declared for `from`, if any. Not validated.
    pub fn manual_mapping(&self, from: SchemaVersion) -> Result<Option<MappingModel>> {
        self.source
            .mapping_toml(from)?
            .map(|content| MappingModel::from_toml(&content))
            .transpose()
    }

    /// The first version, oldest first, whose descriptor matches `metadata`.
    pub fn detect_version(&self, metadata: &StoreMetadata) -> Result<Option<SchemaVersion>> {
        for version in SchemaVersion::all() {
            if self.get(version)?.is_compatible_with(metadata) {
                return Ok(Some(version));
            }
        }
        Ok(None)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SchemaVersion, Arc<SchemaDescriptor>>>> {
        self.loaded
            .lock()
            .map_err(|_| LadderError::internal("descriptor cache lock poisoned"))
    }
}

impl std::fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loaded = self.loaded.lock().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("DescriptorCache")
            .field("loaded", &loaded)
            .finish()
    }
}
