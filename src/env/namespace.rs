// src/env/namespace.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::env::templates::TemplateMap;
use crate::types::{ClonePolicy, DataType};
use crate::value::Data;

/// A data directory registered with a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub loaded: bool,
}

/// An isolated bundle of data directories and the data loaded from them.
///
/// Templates are kept apart from the other data types: they are shared
/// between clones instead of copied.
#[derive(Debug, Clone)]
pub struct EnvironmentNamespace {
    name: String,
    dirs: BTreeMap<DataType, Vec<DirEntry>>,
    data: BTreeMap<DataType, Data>,
    templates: TemplateMap,
    valid: bool,
}

impl EnvironmentNamespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dirs: BTreeMap::new(),
            data: BTreeMap::new(),
            templates: TemplateMap::new(),
            valid: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Create a namespace named `name` from this one.
    ///
    /// Directory lists and the valid flag are copied. Loaded data follows
    /// [`DataType::clone_policy`]; for data types that are not cloned, the
    /// clone's directories are marked unloaded so it loads its own copy.
    pub fn clone_as(&self, name: impl Into<String>) -> Self {
        let mut clone = Self::new(name);
        clone.valid = self.valid;
        clone.dirs = self.dirs.clone();

        for dtype in DataType::ALL {
            match dtype.clone_policy() {
                ClonePolicy::Deep => {
                    if let Some(data) = self.data.get(&dtype) {
                        clone.data.insert(dtype, data.clone());
                    }
                }
                ClonePolicy::Shared => {
                    if dtype == DataType::Template {
                        clone.templates = self.templates.clone();
                    }
                }
                ClonePolicy::Skip => {
                    if let Some(dirs) = clone.dirs.get_mut(&dtype) {
                        for dir in dirs.iter_mut() {
                            dir.loaded = false;
                        }
                    }
                }
            }
        }

        debug!(from = %self.name, to = %clone.name, "cloned namespace");
        clone
    }

    pub fn dirs(&self, dtype: DataType) -> &[DirEntry] {
        self.dirs.get(&dtype).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_dir(&self, dtype: DataType, path: &Path) -> bool {
        self.dirs(dtype).iter().any(|d| d.path == path)
    }

    /// Directories of `dtype` that have not been loaded yet.
    pub fn get_to_load(&self, dtype: DataType) -> Vec<PathBuf> {
        self.dirs(dtype)
            .iter()
            .filter(|d| !d.loaded)
            .map(|d| d.path.clone())
            .collect()
    }

    /// Mark the given directories as loaded, returning how many matched.
    pub fn update_load_state(&mut self, dtype: DataType, loaded: &[PathBuf]) -> usize {
        let mut count = 0;
        if let Some(dirs) = self.dirs.get_mut(&dtype) {
            for dir in dirs.iter_mut().filter(|d| loaded.contains(&d.path)) {
                dir.loaded = true;
                count += 1;
            }
        }
        debug!(namespace = %self.name, dtype = %dtype, count, "updated load state");
        count
    }

    /// Forget loaded data of `dtype` so the next access reloads it.
    pub fn unload(&mut self, dtype: DataType) {
        if let Some(dirs) = self.dirs.get_mut(&dtype) {
            for dir in dirs.iter_mut() {
                dir.loaded = false;
            }
        }
        if dtype == DataType::Template {
            self.templates.clear();
        } else {
            self.data.remove(&dtype);
        }
    }

    pub fn unload_all(&mut self) {
        for dtype in DataType::ALL {
            self.unload(dtype);
        }
    }

    /// Register a directory. `path` is resolved against `rel` when relative.
    ///
    /// A duplicate is accepted only when `allow_dup` is set. A path that is
    /// not a directory is rejected.
    pub fn add_dir(&mut self, dtype: DataType, path: &Path, rel: &Path, allow_dup: bool) -> bool {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            rel.join(path)
        };

        if self.has_dir(dtype, &path) {
            debug!(namespace = %self.name, dtype = %dtype, path = %path.display(), "duplicate directory");
            return allow_dup;
        }

        if !path.is_dir() {
            error!(
                namespace = %self.name,
                dtype = %dtype,
                path = %path.display(),
                "not a directory, not adding"
            );
            return false;
        }

        debug!(namespace = %self.name, dtype = %dtype, path = %path.display(), "added directory");
        self.dirs.entry(dtype).or_default().push(DirEntry { path, loaded: false });
        true
    }

    /// Register several directories; marks the namespace invalid unless all
    /// of them were accepted.
    pub fn add_dirs(&mut self, dtype: DataType, paths: &[PathBuf], rel: &Path, allow_dup: bool) -> usize {
        let added = paths
            .iter()
            .filter(|p| self.add_dir(dtype, p, rel, allow_dup))
            .count();

        if added != paths.len() {
            error!(
                namespace = %self.name,
                dtype = %dtype,
                added,
                requested = paths.len(),
                "not every directory was added, marking namespace invalid"
            );
            self.valid = false;
        }
        added
    }

    pub fn data(&self, dtype: DataType) -> Option<&Data> {
        self.data.get(&dtype)
    }

    pub fn data_mut(&mut self, dtype: DataType) -> &mut Data {
        self.data.entry(dtype).or_default()
    }

    pub fn templates(&self) -> &TemplateMap {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateMap {
        &mut self.templates
    }
}
