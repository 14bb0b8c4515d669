// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;
use tracing::{debug, info};

use crate::codec::Format;
use crate::config::model::{Manifest, ManifestData, resolve_dir};
use crate::config::validate::validate_manifest;
use crate::env::templates::render_str;
use crate::errors::{DatamillError, Result};
use crate::types::{Category, DataType};
use crate::value::{Data, MergePolicy, merge};

/// Target categories whose definitions may list data directories.
const TARGETS_WITH_PATHS: [Category; 2] = [Category::Compiles, Category::Renders];

/// Load a manifest and all of its includes, without semantic validation.
///
/// Each fragment is rendered as a template with the accumulated `params`
/// first. Directory lists (manifest-level and per-target) are made
/// absolute relative to the fragment that declared them.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Manifest> {
    let path = absolute(path.as_ref())?;
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    let raw = load_fragment(&path, &Data::new(), &mut files, &mut dirs)?;
    let data: ManifestData = serde_json::from_value(Value::Object(raw))?;

    info!(manifest = %path.display(), fragments = files.len(), "loaded manifest");
    Ok(Manifest {
        path,
        dir,
        data,
        files,
        dirs,
    })
}

/// Load a manifest from path and run basic validation.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Manifest> {
    let manifest = load_from_path(path)?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("resolving current directory")?;
    Ok(cwd.join(path))
}

fn render_and_parse(path: &Path, format: Format, text: &str, params: &Data) -> Result<Data> {
    let rendered = render_str(text, params)
        .map_err(|e| DatamillError::ManifestError(format!("rendering {}: {e}", path.display())))?;
    format.parse_str(&rendered)
}

fn load_fragment(
    path: &Path,
    params: &Data,
    files: &mut Vec<PathBuf>,
    dirs: &mut Vec<(DataType, PathBuf)>,
) -> Result<Data> {
    if files.iter().any(|f| f == path) {
        return Err(DatamillError::ManifestError(format!(
            "manifest {} is included more than once",
            path.display()
        )));
    }
    files.push(path.to_path_buf());

    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading manifest {:?}", path))?;

    let mut params = params.clone();
    let mut raw = render_and_parse(path, format, &text, &params)?;

    // Render again so params may reference each other.
    if let Some(Value::Object(own)) = raw.get("params") {
        merge(&mut params, own.clone(), MergePolicy::Overwrite)?;
        raw = render_and_parse(path, format, &text, &params)?;
    }

    let fragment: ManifestData = serde_json::from_value(Value::Object(raw.clone()))
        .map_err(|e| DatamillError::ManifestError(format!("{}: {e}", path.display())))?;
    let frag_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    collect_dirs(&fragment, &frag_dir, dirs);
    update_task_dirs(&mut raw, &frag_dir);

    let mut merged = raw;
    for include in &fragment.includes {
        let include_path = resolve_dir(include, &frag_dir);
        debug!(manifest = %path.display(), include = %include_path.display(), "loading include");
        let child = load_fragment(&include_path, &params, files, dirs)?;
        merge(&mut merged, child, MergePolicy::Overwrite)?;
    }

    Ok(merged)
}

fn collect_dirs(fragment: &ManifestData, frag_dir: &Path, dirs: &mut Vec<(DataType, PathBuf)>) {
    for dtype in DataType::ALL {
        match fragment.dir_list(dtype) {
            Some(list) => {
                dirs.extend(list.iter().map(|d| (dtype, resolve_dir(d, frag_dir))));
            }
            None => {
                let default = frag_dir.join(dtype.key());
                if fragment.default_dirs && default.is_dir() {
                    dirs.push((dtype, default));
                }
            }
        }
    }
}

/// Make the directory lists of compile/render targets absolute.
fn update_task_dirs(raw: &mut Data, frag_dir: &Path) {
    for category in TARGETS_WITH_PATHS {
        let Some(Value::Array(targets)) = raw.get_mut(category.as_str()) else {
            continue;
        };
        for target in targets.iter_mut().filter_map(Value::as_object_mut) {
            for dtype in DataType::ALL {
                if let Some(Value::Array(paths)) = target.get_mut(dtype.key()) {
                    for entry in paths.iter_mut() {
                        if let Value::String(p) = entry {
                            *p = resolve_dir(p, frag_dir).to_string_lossy().into_owned();
                        }
                    }
                }
            }
        }
    }
}
