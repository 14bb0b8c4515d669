// src/cache/task_data.rs

//! Persisted output payloads of executed tasks, one file per category.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;
use tracing::debug;

use crate::codec;
use crate::errors::Result;
use crate::types::Category;
use crate::value::{Data, MergePolicy, merge};

/// Directory (inside the cache directory) holding task data.
pub const TASK_DATA_DIR: &str = "task_data";

#[derive(Debug, Clone)]
pub struct TaskDataCache {
    dir: PathBuf,
    data: BTreeMap<Category, Data>,
}

impl TaskDataCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let data = Category::ALL.iter().map(|c| (*c, Data::new())).collect();
        Self {
            dir: dir.into(),
            data,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn category_path(&self, category: Category) -> PathBuf {
        self.dir.join(format!("{}.json", category.as_str()))
    }

    /// Merge persisted payloads into memory.
    ///
    /// Existing in-memory entries are merged with, not replaced by, what is
    /// on disk.
    pub fn load(&mut self) -> Result<()> {
        for category in Category::ALL {
            let path = self.category_path(category);
            if !path.is_file() {
                continue;
            }
            let stored = codec::decode(&path)?;
            let entry = self.data.entry(category).or_default();
            merge(entry, stored, MergePolicy::Overwrite)?;
            debug!(category = %category, path = %path.display(), "loaded task data");
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating task data directory {:?}", self.dir))?;
        for (category, data) in &self.data {
            codec::encode(&self.category_path(*category), &Value::Object(data.clone()))?;
        }
        Ok(())
    }

    /// Drop every payload, in memory and on disk.
    pub fn clean(&mut self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)
                .with_context(|| format!("removing task data directory {:?}", self.dir))?;
        }
        for data in self.data.values_mut() {
            data.clear();
        }
        Ok(())
    }

    pub fn get(&self, category: Category, name: &str) -> Option<&Value> {
        self.data.get(&category).and_then(|d| d.get(name))
    }

    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.get(category, name).is_some()
    }

    pub fn insert(&mut self, category: Category, name: impl Into<String>, value: Value) {
        self.data.entry(category).or_default().insert(name.into(), value);
    }

    pub fn category(&self, category: Category) -> Option<&Data> {
        self.data.get(&category)
    }
}
