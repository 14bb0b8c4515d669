// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatamillError {
    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Target '{name}' matches multiple patterns: {patterns:?}")]
    AmbiguousTarget { name: String, patterns: Vec<String> },

    #[error("Cyclic dependency detected: {0}")]
    CyclicDependency(String),

    #[error("No handler registered for category '{0}'")]
    UnregisteredCategory(String),

    #[error("Namespace '{0}' is invalid")]
    InvalidNamespace(String),

    #[error("Merge conflict at key '{0}'")]
    MergeConflict(String),

    #[error("Schema validation failed: {0}")]
    SchemaError(String),

    #[error("Unsupported data format: {0}")]
    UnsupportedFormat(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DatamillError>;
