// src/types.rs

//! Shared identifiers: task categories, data types and task slugs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_MANIFEST: &str = "manifest.yaml";
pub const DEFAULT_OUTPUT_DIR: &str = "datamill-out";
pub const CACHE_SUFFIX: &str = "_cache";

/// Name of the namespace every environment starts with.
pub const ROOT_NAMESPACE: &str = "__root__";

/// Cache bucket holding the hashes of manifest fragments.
pub const MANIFEST_BUCKET: &str = "manifest";

/// Key that binds the whole render context to itself.
pub const GLOBAL_KEY: &str = "global";

pub const SLUG_DELIM: char = '-';

/// The four kinds of target a manifest can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Compiles,
    Renders,
    Commands,
    Groups,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Compiles,
        Category::Renders,
        Category::Commands,
        Category::Groups,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Compiles => "compiles",
            Category::Renders => "renders",
            Category::Commands => "commands",
            Category::Groups => "groups",
        }
    }

    /// Data types whose directories a target of this category may add to
    /// its own namespace.
    pub fn load_deps(&self) -> &'static [DataType] {
        match self {
            Category::Compiles => &[
                DataType::Config,
                DataType::Variable,
                DataType::Schema,
                DataType::SchemaType,
            ],
            Category::Renders => &[DataType::Template],
            Category::Commands | Category::Groups => &[],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "compiles" => Ok(Category::Compiles),
            "renders" => Ok(Category::Renders),
            "commands" => Ok(Category::Commands),
            "groups" => Ok(Category::Groups),
            other => Err(format!(
                "unknown category: {other} (expected compiles, renders, commands or groups)"
            )),
        }
    }
}

/// How a data type is carried over when a namespace is cloned from root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClonePolicy {
    /// Structural clone of the loaded data.
    Deep,
    /// Share the loaded entries (they are immutable once loaded).
    Shared,
    /// Start empty in the clone.
    Skip,
}

/// Kinds of data directory a namespace tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Config,
    Schema,
    SchemaType,
    Template,
    Variable,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::Config,
        DataType::Schema,
        DataType::SchemaType,
        DataType::Template,
        DataType::Variable,
    ];

    /// Manifest key and cache bucket name.
    pub fn key(&self) -> &'static str {
        match self {
            DataType::Config => "configs",
            DataType::Schema => "schemas",
            DataType::SchemaType => "schema_types",
            DataType::Template => "templates",
            DataType::Variable => "variables",
        }
    }

    pub fn clone_policy(&self) -> ClonePolicy {
        match self {
            DataType::Config | DataType::Schema | DataType::Variable => ClonePolicy::Deep,
            DataType::Template => ClonePolicy::Shared,
            DataType::SchemaType => ClonePolicy::Skip,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Durable identity of an executable unit: `category-name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskSlug {
    pub category: Category,
    pub name: String,
}

impl TaskSlug {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    /// Parse a dependency reference.
    ///
    /// `renders-index` names the render `index`. When the text before the
    /// first delimiter is not a category, the whole string is a name in
    /// `default`, so `echo-world` stays a compile named `echo-world`.
    pub fn parse(reference: &str, default: Category) -> Self {
        if let Some((prefix, rest)) = reference.split_once(SLUG_DELIM) {
            if let Ok(category) = prefix.parse::<Category>() {
                if !rest.is_empty() {
                    return Self::new(category, rest);
                }
            }
        }
        Self::new(default, reference)
    }
}

impl fmt::Display for TaskSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.category, SLUG_DELIM, self.name)
    }
}
