// src/engine/caches.rs

//! Lifecycle of the three cache snapshots and the task data cache.

use std::fs;

use anyhow::Context;
use tracing::info;

use crate::cache::{BucketSummary, FileInfoCache, meld};
use crate::engine::Environment;
use crate::errors::Result;

impl Environment {
    /// Fold the live cache into the aggregate and persist it, together
    /// with task data.
    pub fn write_cache(&mut self) -> Result<()> {
        meld(&mut self.aggregate, &self.cache);
        self.aggregate.write(&self.cache_dir, self.cache_format)?;
        self.task_data.save()?;
        Ok(())
    }

    /// Fold the live cache into the aggregate, then reset it to the
    /// snapshot taken at load time.
    pub fn restore_cache(&mut self) {
        let initial = FileInfoCache::from_data(self.initial.data().clone());
        self.rewind_cache(initial);
    }

    /// Fold the live cache into the aggregate, then replace it with
    /// `snapshot`.
    ///
    /// The executor rewinds to the state from before a private-namespace
    /// task, so files only that task loaded do not count against later
    /// root-namespace tasks.
    pub(crate) fn rewind_cache(&mut self, snapshot: FileInfoCache) {
        meld(&mut self.aggregate, &self.cache);
        self.cache = snapshot;
    }

    /// Log (and return) what the live cache knows about each bucket.
    pub fn describe_cache(&self) -> Vec<BucketSummary> {
        info!(cache = %self.cache_dir.display(), "describing fingerprint cache");
        self.cache.describe()
    }

    /// Remove every persisted cache and start over as if nothing was ever
    /// built.
    pub fn clean(&mut self) -> Result<()> {
        self.task_data.clean()?;
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)
                .with_context(|| format!("removing cache directory {:?}", self.cache_dir))?;
        }

        let mut cache = FileInfoCache::new();
        cache.load(&self.cache_dir)?;
        self.cache = cache;
        self.initial = FileInfoCache::new();
        self.aggregate = FileInfoCache::new();
        self.manifest_changed = true;
        self.visited.clear();
        for namespace in self.namespaces.values_mut() {
            namespace.unload_all();
        }

        info!(cache = %self.cache_dir.display(), "cleaned cache");
        Ok(())
    }
}
