// src/value.rs

//! Operations on the loaded data model.
//!
//! All loaded data is a JSON-shaped tree (`serde_json::Value`). Merging is
//! explicit about conflicts: two maps merge key by key, two lists
//! concatenate, and anything else is a conflict resolved by the
//! [`MergePolicy`]. Values of different kinds are never coerced into one
//! another.

use serde_json::{Map, Value};

use crate::errors::{DatamillError, Result};

/// A loaded document, or a subtree of one.
pub type Data = Map<String, Value>;

/// What to do when two scalar (or mismatched) values meet during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// The incoming value replaces the existing one.
    #[default]
    Overwrite,
    /// Report a [`DatamillError::MergeConflict`] naming the dotted key.
    Error,
}

/// Merge `src` into `dst`.
pub fn merge(dst: &mut Data, src: Data, policy: MergePolicy) -> Result<()> {
    merge_maps(dst, src, policy, "")
}

/// Merge every map, in order, into a fresh one. Later maps win under
/// [`MergePolicy::Overwrite`].
pub fn merge_all<I>(items: I, policy: MergePolicy) -> Result<Data>
where
    I: IntoIterator<Item = Data>,
{
    let mut result = Data::new();
    for item in items {
        merge(&mut result, item, policy)?;
    }
    Ok(result)
}

fn merge_maps(dst: &mut Data, src: Data, policy: MergePolicy, path: &str) -> Result<()> {
    for (key, value) in src {
        let key_path = join_key(path, &key);
        match dst.get_mut(&key) {
            Some(existing) => merge_value(existing, value, policy, &key_path)?,
            None => {
                dst.insert(key, value);
            }
        }
    }
    Ok(())
}

fn merge_value(dst: &mut Value, src: Value, policy: MergePolicy, path: &str) -> Result<()> {
    match (dst, src) {
        (Value::Object(d), Value::Object(s)) => merge_maps(d, s, policy, path),
        (Value::Array(d), Value::Array(s)) => {
            d.extend(s);
            Ok(())
        }
        (d, s) => {
            if *d == s {
                return Ok(());
            }
            match policy {
                MergePolicy::Overwrite => {
                    *d = s;
                    Ok(())
                }
                MergePolicy::Error => Err(DatamillError::MergeConflict(path.to_string())),
            }
        }
    }
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Expand dotted keys (`a.b.c`) into nested maps.
///
/// Keys that collide with a non-map value replace it.
pub fn unflatten(flat: &Data) -> Data {
    let mut result = Data::new();
    for (key, value) in flat {
        let mut parts: Vec<&str> = key.split('.').collect();
        let leaf = parts.pop().unwrap_or_default();

        let mut cursor = &mut result;
        for part in parts {
            let entry = cursor
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Data::new()));
            if !entry.is_object() {
                *entry = Value::Object(Data::new());
            }
            cursor = match entry {
                Value::Object(map) => map,
                _ => unreachable!("entry was just made an object"),
            };
        }
        cursor.insert(leaf.to_string(), value.clone());
    }
    result
}

/// Walk into `data` by a `.`-separated key path.
///
/// Missing or non-map segments yield an empty map, matching how a
/// directory tree with no data at that location would load.
pub fn advance_by_path(data: Data, path: &str) -> Data {
    let mut current = data;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current.remove(segment) {
            Some(Value::Object(map)) => map,
            _ => Data::new(),
        };
    }
    current
}
