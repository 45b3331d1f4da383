//! Resource type registry.
//!
//! Resource type descriptors are loaded from embedded JSON files at first
//! access, then a one-time finalization pass binds the common capability
//! set to every class.
//!
//! - [`types`] - descriptor data model
//! - [`catalog`] - embedded descriptor loading and two-phase init
//! - [`capability`] - per-class action/filter bindings

pub mod capability;
pub mod catalog;
pub mod types;

pub use catalog::{catalog, Catalog};
pub use types::{ResourceRecord, ResourceTypeDescriptor};
