// src/env/mod.rs

//! Loaded data and the namespaces that scope it.
//!
//! - `namespace.rs`: per-namespace directory lists, loaded data and the
//!   clone policy used for private target namespaces.
//! - `loader.rs`: maps a directory tree of data files onto nested keys.
//! - `schema.rs`: schema validation with a scoped type registry.
//! - `templates.rs`: template discovery and rendering (`minijinja`).

pub mod loader;
pub mod namespace;
pub mod schema;
pub mod templates;

pub use namespace::{DirEntry, EnvironmentNamespace};
pub use schema::{TypeRegistry, TypeScope};
pub use templates::{TemplateMap, TemplateSource};
