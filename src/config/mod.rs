// src/config/mod.rs

//! Manifest loading and validation for datamill.
//!
//! Responsibilities:
//! - Define the manifest data model (`model.rs`).
//! - Load a manifest and its includes from disk (`loader.rs`).
//! - Validate target definitions and static dependency cycles (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{Manifest, ManifestData};
pub use validate::{dependency_refs, validate_manifest};
