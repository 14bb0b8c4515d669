// src/env/templates.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use minijinja::{AutoEscape, Environment};
use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::cache::FileInfoCache;
use crate::errors::Result;
use crate::types::DataType;

pub const TEMPLATE_SUFFIX: &str = ".j2";

/// A template file as discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    /// Name used by `{% extends %}` / `{% include %}` (path relative to
    /// its template directory, `/`-separated).
    pub name: String,
    pub path: PathBuf,
    pub source: String,
}

/// Templates of a namespace, keyed by name without the `.j2` suffix.
pub type TemplateMap = BTreeMap<String, Arc<TemplateSource>>;

/// Lookup key for a template name (`base.html.j2` -> `base.html`).
pub fn template_key(name: &str) -> &str {
    name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(name)
}

/// Load every template under `dir`, hit-testing each file in the
/// `templates` bucket.
pub fn load_template_dir(dir: &Path, cache: &mut FileInfoCache) -> Result<TemplateMap> {
    let mut result = TemplateMap::new();

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking template directory {:?}", dir))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel = path.strip_prefix(dir).unwrap_or(path);
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let source = fs::read_to_string(path)
            .with_context(|| format!("reading template {:?}", path))?;
        cache.check_hit(DataType::Template.key(), path, true)?;

        debug!(template = %name, path = %path.display(), "loaded template");
        result.insert(
            template_key(&name).to_string(),
            Arc::new(TemplateSource {
                name,
                path: path.to_path_buf(),
                source,
            }),
        );
    }

    Ok(result)
}

fn base_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    // No escaping, whatever the template extension.
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env
}

/// Build a rendering environment holding every template of a namespace.
pub fn build_environment(templates: &TemplateMap) -> Result<Environment<'static>> {
    let mut env = base_environment();
    for template in templates.values() {
        env.add_template_owned(template.name.clone(), template.source.clone())?;
    }
    Ok(env)
}

/// Render a one-off template string (used for manifests and data files).
pub fn render_str<S: Serialize>(source: &str, ctx: S) -> Result<String> {
    Ok(base_environment().render_str(source, ctx)?)
}
