// src/cache/fingerprint.rs

//! File fingerprint cache.
//!
//! Layout on disk: one file per top-level key inside the cache directory
//! (`hashes.json`, `loaded.json`, `removed.json`, `meta.json`; the
//! extension follows the write format).
//!
//! - `hashes`: bucket -> absolute path -> `{hash, time}`
//! - `loaded`: bucket -> paths observed as new or changed
//! - `removed`: bucket -> records whose file vanished before a write
//! - `meta`: cache format version

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::hash::{compute_file_hash, now_nanos};
use crate::codec::Format;
use crate::errors::Result;
use crate::types::VERSION;

/// One observation of a file's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub hash: String,
    /// Nanoseconds since the Unix epoch.
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub version: String,
}

impl Default for CacheMeta {
    fn default() -> Self {
        Self {
            version: VERSION.to_string(),
        }
    }
}

pub type BucketRecords = BTreeMap<String, FileRecord>;

/// Per-bucket subsets of files that a staleness check should consider.
pub type LoadChecks = BTreeMap<String, Vec<String>>;

/// The serializable part of a fingerprint cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheData {
    #[serde(default)]
    pub hashes: BTreeMap<String, BucketRecords>,
    #[serde(default)]
    pub loaded: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub removed: BTreeMap<String, BucketRecords>,
    #[serde(default)]
    pub meta: CacheMeta,
}

const KEY_HASHES: &str = "hashes";
const KEY_LOADED: &str = "loaded";
const KEY_REMOVED: &str = "removed";
const KEY_META: &str = "meta";

impl CacheData {
    /// Union-merge `other` into `self`; newer records win on hash conflicts.
    pub fn meld(&mut self, other: &CacheData) {
        meld_records(&mut self.hashes, &other.hashes);
        meld_records(&mut self.removed, &other.removed);

        for (bucket, paths) in &other.loaded {
            let list = self.loaded.entry(bucket.clone()).or_default();
            for path in paths {
                if !list.contains(path) {
                    list.push(path.clone());
                }
            }
        }
    }

    /// Copy of this data reconciled with what is on disk right now.
    ///
    /// Lists are de-duplicated, records of files that no longer exist move
    /// to `removed`, and loaded entries of missing files are dropped.
    pub fn synced(&self) -> CacheData {
        let mut result = self.clone();
        result.meta.version = VERSION.to_string();

        for list in result.loaded.values_mut() {
            dedup_in_place(list);
            list.retain(|path| Path::new(path).exists());
        }

        for (bucket, records) in result.hashes.iter_mut() {
            let missing: Vec<String> = records
                .keys()
                .filter(|path| !Path::new(path.as_str()).exists())
                .cloned()
                .collect();

            let removed = result.removed.entry(bucket.clone()).or_default();
            for path in missing {
                if let Some(record) = records.remove(&path) {
                    debug!(bucket = %bucket, path = %path, "file removed since last observation");
                    removed.insert(path, record);
                }
            }
            removed.retain(|path, _| !records.contains_key(path));
        }
        result.removed.retain(|_, records| !records.is_empty());

        result
    }
}

fn meld_records(dst: &mut BTreeMap<String, BucketRecords>, src: &BTreeMap<String, BucketRecords>) {
    for (bucket, records) in src {
        let target = dst.entry(bucket.clone()).or_default();
        for (path, record) in records {
            match target.get_mut(path) {
                None => {
                    target.insert(path.clone(), record.clone());
                }
                Some(existing) => {
                    if existing.hash != record.hash && record.time > existing.time {
                        *existing = record.clone();
                    }
                }
            }
        }
    }
}

fn dedup_in_place(list: &mut Vec<String>) {
    let mut seen = HashSet::new();
    list.retain(|item| seen.insert(item.clone()));
}

/// Counts reported by [`FileInfoCache::describe`] for one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketSummary {
    pub bucket: String,
    pub matched: usize,
    pub changed: usize,
    pub missing: usize,
    pub removed: usize,
}

/// In-memory fingerprint cache bound to (at most) one cache directory.
#[derive(Debug, Clone, Default)]
pub struct FileInfoCache {
    data: CacheData,
    dir: Option<PathBuf>,
    /// Paths appended to `loaded` by this instance, per bucket.
    appended: BTreeMap<String, BTreeSet<String>>,
}

impl FileInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh instance holding a copy of `data`.
    pub fn from_data(data: CacheData) -> Self {
        Self {
            data,
            dir: None,
            appended: BTreeMap::new(),
        }
    }

    pub fn data(&self) -> &CacheData {
        &self.data
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Read persisted records from `dir`, creating it if missing.
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        if let Some(existing) = &self.dir {
            return Err(anyhow!("fingerprint cache already loaded from {:?}", existing).into());
        }

        fs::create_dir_all(dir).with_context(|| format!("creating cache directory {:?}", dir))?;

        let hashes = read_key(dir, KEY_HASHES)?;
        let loaded = read_key(dir, KEY_LOADED)?;
        let removed = read_key(dir, KEY_REMOVED)?;
        let meta = read_key(dir, KEY_META)?;

        self.data = CacheData {
            hashes: hashes.unwrap_or_default(),
            loaded: loaded.unwrap_or_default(),
            removed: removed.unwrap_or_default(),
            meta: meta.unwrap_or_default(),
        };
        self.dir = Some(dir.to_path_buf());

        debug!(
            dir = %dir.display(),
            buckets = self.data.hashes.len(),
            "loaded fingerprint cache"
        );
        Ok(())
    }

    /// Test whether `path` is unchanged since it was last recorded in
    /// `bucket`.
    ///
    /// Returns `true` on a hit. On a miss, and when `also_cache` is set, the
    /// new hash is stored and the path is appended to the bucket's loaded
    /// list (once per instance).
    pub fn check_hit(&mut self, bucket: &str, path: &Path, also_cache: bool) -> Result<bool> {
        let key = path_key(path);
        let hash = compute_file_hash(path)?;

        let was_removed = self
            .data
            .removed
            .get(bucket)
            .is_some_and(|records| records.contains_key(&key));

        let hit = !was_removed
            && self
                .data
                .hashes
                .get(bucket)
                .and_then(|records| records.get(&key))
                .is_some_and(|record| record.hash == hash);

        if hit {
            return Ok(true);
        }

        if also_cache {
            self.data.hashes.entry(bucket.to_string()).or_default().insert(
                key.clone(),
                FileRecord {
                    hash,
                    time: now_nanos(),
                },
            );
            if let Some(records) = self.data.removed.get_mut(bucket) {
                records.remove(&key);
            }
            if self
                .appended
                .entry(bucket.to_string())
                .or_default()
                .insert(key.clone())
            {
                self.data.loaded.entry(bucket.to_string()).or_default().push(key.clone());
            }
            debug!(bucket = %bucket, path = %key, "file is new or changed");
        }

        Ok(false)
    }

    /// Re-check every stored record against disk and log the outcome.
    pub fn describe(&self) -> Vec<BucketSummary> {
        let mut summaries = Vec::new();

        for (bucket, records) in &self.data.hashes {
            let mut summary = BucketSummary {
                bucket: bucket.clone(),
                ..BucketSummary::default()
            };

            for (path, record) in records {
                match compute_file_hash(Path::new(path)) {
                    Ok(hash) if hash == record.hash => {
                        summary.matched += 1;
                        debug!(bucket = %bucket, path = %path, "match");
                    }
                    Ok(_) => {
                        summary.changed += 1;
                        info!(bucket = %bucket, path = %path, last_seen = record.time, "changed");
                    }
                    Err(_) => {
                        summary.missing += 1;
                        info!(bucket = %bucket, path = %path, last_seen = record.time, "missing");
                    }
                }
            }

            if let Some(removed) = self.data.removed.get(bucket) {
                summary.removed = removed.len();
                for path in removed.keys() {
                    info!(bucket = %bucket, path = %path, "previously removed");
                }
            }

            info!(
                bucket = %bucket,
                matched = summary.matched,
                changed = summary.changed,
                missing = summary.missing,
                removed = summary.removed,
                "cache bucket summary"
            );
            summaries.push(summary);
        }

        if self.data.meta.version == VERSION {
            info!(version = %VERSION, "cache version matches");
        } else {
            warn!(
                cache_version = %self.data.meta.version,
                running_version = %VERSION,
                "cache was written by a different version"
            );
        }

        summaries
    }

    /// Persist a synced copy of this cache; in-memory state is untouched.
    pub fn write(&self, dir: &Path, format: Format) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("creating cache directory {:?}", dir))?;

        let synced = self.data.synced();
        write_key(dir, KEY_HASHES, format, &synced.hashes)?;
        write_key(dir, KEY_LOADED, format, &synced.loaded)?;
        write_key(dir, KEY_REMOVED, format, &synced.removed)?;
        write_key(dir, KEY_META, format, &synced.meta)?;

        debug!(dir = %dir.display(), "wrote fingerprint cache");
        Ok(())
    }

    /// Number of paths recorded in `bucket`'s loaded list.
    pub fn loaded_count(&self, bucket: &str) -> usize {
        self.data.loaded.get(bucket).map_or(0, Vec::len)
    }
}

/// Merge `b` into `a` (see [`CacheData::meld`]).
pub fn meld(a: &mut FileInfoCache, b: &FileInfoCache) {
    a.data.meld(&b.data);
}

/// Count how many loaded files differ between `a` and `b` for the given
/// buckets.
///
/// With a subset for a bucket, only those files are counted, and only when
/// `a` loaded them more often than `b`. Without one, every distinct path
/// contributes the absolute difference of its occurrence counts.
pub fn compare(
    a: &FileInfoCache,
    b: &FileInfoCache,
    buckets: &[&str],
    load_checks: Option<&LoadChecks>,
) -> usize {
    let empty = Vec::new();
    let mut result = 0;

    for bucket in buckets {
        let a_list = a.data.loaded.get(*bucket).unwrap_or(&empty);
        let b_list = b.data.loaded.get(*bucket).unwrap_or(&empty);

        match load_checks.and_then(|checks| checks.get(*bucket)) {
            Some(subset) => {
                for path in subset {
                    if occurrences(a_list, path) > occurrences(b_list, path) {
                        result += 1;
                    }
                }
            }
            None => {
                let all: BTreeSet<&String> = a_list.iter().chain(b_list.iter()).collect();
                for path in all {
                    result += occurrences(a_list, path).abs_diff(occurrences(b_list, path));
                }
            }
        }
    }

    result
}

fn occurrences(list: &[String], path: &str) -> usize {
    list.iter().filter(|p| p.as_str() == path).count()
}

/// Stable string key for a path.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn read_key<T: DeserializeOwned>(dir: &Path, key: &str) -> Result<Option<T>> {
    for format in [Format::Json, Format::Yaml, Format::Toml] {
        let path = dir.join(format!("{key}.{}", format.extension()));
        if !path.is_file() {
            continue;
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading cache file {:?}", path))?;
        let data = format.parse_str(&text)?;
        let value = serde_json::from_value(serde_json::Value::Object(data))?;
        return Ok(Some(value));
    }
    Ok(None)
}

fn write_key<T: Serialize>(dir: &Path, key: &str, format: Format, value: &T) -> Result<()> {
    let path = dir.join(format!("{key}.{}", format.extension()));
    let text = format.dump(&serde_json::to_value(value)?)?;
    fs::write(&path, text).with_context(|| format!("writing cache file {:?}", path))?;
    Ok(())
}
