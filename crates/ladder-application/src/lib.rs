//! Application layer for Ladder.
//!
//! Coordinates the migration engine and the store engine into an explicit
//! startup sequence.

pub mod store_manager;

pub use store_manager::{StoreManager, StoreSettings};
