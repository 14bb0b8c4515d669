// src/env/loader.rs

//! Load a directory tree of data files into one nested map.
//!
//! ```text
//! configs/
//!   app.yaml         -> { app: {..} }
//!   boards/
//!     .yaml          -> { boards: {..} }
//!     alpha.json     -> { boards: { alpha: {..} } }
//! ```
//!
//! Sub-directories become keys, each file melds under the part of its
//! name before the first `.`, and a file with no such part melds into the
//! enclosing map.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::cache::FileInfoCache;
use crate::codec::Format;
use crate::env::templates::render_str;
use crate::errors::Result;
use crate::value::{Data, MergePolicy, merge};

/// Name a data file contributes (`app.yaml` -> `app`, `.yaml` -> ``).
pub fn file_key(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .unwrap_or_default()
        .to_string()
}

/// How file contents are turned into data.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions<'a> {
    /// Cache bucket the files are hit-tested in.
    pub bucket: &'a str,
    /// Variables to render files with; `None` decodes files verbatim.
    pub variables: Option<&'a Data>,
}

/// Load every data file under `dir` into `existing`.
///
/// Returns the number of files loaded. Files with an extension no codec
/// understands are skipped.
pub fn load_dir(
    dir: &Path,
    existing: &mut Data,
    cache: &mut FileInfoCache,
    options: LoadOptions<'_>,
) -> Result<usize> {
    let mut count = 0;

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking data directory {:?}", dir))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Ok(format) = Format::from_path(path) else {
            debug!(path = %path.display(), "skipping file with unknown format");
            continue;
        };

        let rel_dir = path
            .parent()
            .and_then(|p| p.strip_prefix(dir).ok())
            .unwrap_or_else(|| Path::new(""));
        let keys: Vec<String> = rel_dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let key = file_key(path);
        let mut slot = descend(existing, &keys);
        if !key.is_empty() {
            slot = child_map(slot, &key);
        }

        let variables = options.variables.map(|vars| {
            let at_dir = lookup(vars, &keys);
            match at_dir.and_then(|d| d.get(&key)) {
                Some(Value::Object(sub)) if !key.is_empty() => Some(sub),
                _ => at_dir,
            }
        });

        cache.check_hit(options.bucket, path, true)?;
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading data file {:?}", path))?;

        let data = match variables.flatten() {
            Some(vars) if !vars.is_empty() => format.parse_str(&render_str(&text, vars)?)?,
            _ => format.parse_str(&text)?,
        };

        merge(slot, data, MergePolicy::Overwrite)?;
        debug!(bucket = %options.bucket, path = %path.display(), "loaded data file");
        count += 1;
    }

    Ok(count)
}

fn child_map<'a>(data: &'a mut Data, key: &str) -> &'a mut Data {
    let entry = data
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Data::new()));
    if !entry.is_object() {
        *entry = Value::Object(Data::new());
    }
    match entry {
        Value::Object(map) => map,
        _ => unreachable!("entry was just made a map"),
    }
}

fn descend<'a>(data: &'a mut Data, keys: &[String]) -> &'a mut Data {
    keys.iter().fold(data, |acc, key| child_map(acc, key))
}

fn lookup<'a>(data: &'a Data, keys: &[String]) -> Option<&'a Data> {
    let mut current = data;
    for key in keys {
        current = current.get(key)?.as_object()?;
    }
    Some(current)
}
