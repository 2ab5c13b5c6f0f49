//! Storage layer: atomic file writes and the JSON store engine.

pub mod atomic_file;
pub mod document;
pub mod journal;
pub mod json_store;
pub mod validate;

pub use atomic_file::{AtomicFileError, AtomicTomlFile, FileLock};
pub use document::{EntityTable, StoreDocument};
pub use json_store::{JournalMode, JsonFileStore, StoreHandle, StoreOptions};
