// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::types::{CACHE_SUFFIX, Category, DEFAULT_OUTPUT_DIR, DataType};
use crate::value::Data;

/// Top-level manifest as read from YAML/JSON/TOML.
///
/// ```yaml
/// default_target: index
/// includes: [extra/manifest.yaml]
/// params: { project: demo }
///
/// compiles:
///   - name: app
///     output_type: json
/// renders:
///   - name: index.md
///     dependencies: [compiles-app]
/// ```
///
/// Target lists are kept as raw maps: target definitions carry arbitrary
/// handler-specific keys and may be patterns (`echo-{word}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestData {
    #[serde(default)]
    pub compiles: Vec<Value>,
    #[serde(default)]
    pub renders: Vec<Value>,
    #[serde(default)]
    pub commands: Vec<Value>,
    #[serde(default)]
    pub groups: Vec<Value>,

    /// Other manifests to merge in, relative to the including manifest.
    #[serde(default)]
    pub includes: Vec<String>,

    /// Template parameters used to render the manifest text itself.
    #[serde(default)]
    pub params: Data,

    pub default_target: Option<String>,

    /// Where targets write their output (default `datamill-out`).
    pub output_dir: Option<String>,

    /// Cache directory (default `.<manifest-stem>_cache`).
    pub cache_dir: Option<String>,

    /// Pick up `configs/`, `templates/`, ... next to the manifest when no
    /// explicit list is given.
    #[serde(default = "default_true")]
    pub default_dirs: bool,

    pub configs: Option<Vec<String>>,
    pub schemas: Option<Vec<String>>,
    pub schema_types: Option<Vec<String>>,
    pub templates: Option<Vec<String>>,
    pub variables: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

impl ManifestData {
    pub fn targets(&self, category: Category) -> &[Value] {
        match category {
            Category::Compiles => &self.compiles,
            Category::Renders => &self.renders,
            Category::Commands => &self.commands,
            Category::Groups => &self.groups,
        }
    }

    pub fn dir_list(&self, dtype: DataType) -> Option<&[String]> {
        match dtype {
            DataType::Config => self.configs.as_deref(),
            DataType::Schema => self.schemas.as_deref(),
            DataType::SchemaType => self.schema_types.as_deref(),
            DataType::Template => self.templates.as_deref(),
            DataType::Variable => self.variables.as_deref(),
        }
    }
}

/// A fully loaded manifest (all includes merged).
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Absolute path of the root manifest file.
    pub path: PathBuf,
    /// Directory containing the root manifest.
    pub dir: PathBuf,
    pub data: ManifestData,
    /// Every manifest fragment that contributed, root first.
    pub files: Vec<PathBuf>,
    /// Data directories for the root namespace, already absolute.
    pub dirs: Vec<(DataType, PathBuf)>,
}

impl Manifest {
    pub fn output_dir(&self) -> PathBuf {
        resolve_dir(
            self.data.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR),
            &self.dir,
        )
    }

    pub fn cache_dir(&self) -> PathBuf {
        match self.data.cache_dir.as_deref() {
            Some(dir) => resolve_dir(dir, &self.dir),
            None => {
                let stem = self
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.dir.join(format!(".{stem}{CACHE_SUFFIX}"))
            }
        }
    }

    pub fn default_target(&self) -> Option<String> {
        if let Some(target) = &self.data.default_target {
            return Some(target.clone());
        }
        self.data
            .compiles
            .first()
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Join `path` onto `rel` unless it is already absolute.
pub fn resolve_dir(path: &str, rel: &Path) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        rel.join(path)
    }
}
