// src/cache/mod.rs

//! Persistent state that makes repeated runs incremental.
//!
//! - `fingerprint.rs`: per-bucket file hashes and loaded-file lists, used
//!   to decide whether a target's inputs changed.
//! - `task_data.rs`: each task's last output payload, used to feed
//!   dependents without recomputing the dependency.
//! - `hash.rs`: content hashing helpers shared by both.

pub mod fingerprint;
pub mod hash;
pub mod task_data;

pub use fingerprint::{
    BucketSummary, CacheData, FileInfoCache, FileRecord, LoadChecks, compare, meld, path_key,
};
pub use hash::{compute_file_hash, compute_str_hash};
pub use task_data::TaskDataCache;
