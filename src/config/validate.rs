// src/config/validate.rs

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde_json::Value;

use crate::config::model::Manifest;
use crate::errors::{DatamillError, Result};
use crate::targets::is_literal;
use crate::types::{Category, TaskSlug};

/// Validate target definitions and the static dependency graph.
pub fn validate_manifest(manifest: &Manifest) -> Result<()> {
    validate_targets(manifest)?;
    validate_dag(manifest)?;
    Ok(())
}

fn validate_targets(manifest: &Manifest) -> Result<()> {
    for category in Category::ALL {
        for target in manifest.data.targets(category) {
            let Some(map) = target.as_object() else {
                return Err(DatamillError::ManifestError(format!(
                    "{category} entry is not a map: {target}"
                )));
            };
            let Some(name) = map.get("name").and_then(Value::as_str) else {
                return Err(DatamillError::ManifestError(format!(
                    "{category} entry has no string 'name': {target}"
                )));
            };
            for key in ["dependencies", "children"] {
                match map.get(key) {
                    None => {}
                    Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
                    Some(other) => {
                        return Err(DatamillError::ManifestError(format!(
                            "{category} '{name}': '{key}' must be a list of strings, got {other}"
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Dependency references of a target definition, de-duplicated in order.
pub fn dependency_refs(target: &serde_json::Map<String, Value>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ["dependencies", "children"]
        .iter()
        .filter_map(|key| target.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .filter(|dep| seen.insert(dep.to_string()))
        .map(str::to_string)
        .collect()
}

fn validate_dag(manifest: &Manifest) -> Result<()> {
    // Edge direction: dependency -> dependent. Only literal targets are
    // known before execution; pattern targets are checked while running.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    let mut slugs = Vec::new();

    for category in Category::ALL {
        for target in manifest.data.targets(category) {
            let Some(map) = target.as_object() else { continue };
            let Some(name) = map.get("name").and_then(Value::as_str) else { continue };
            if !is_literal(name) {
                continue;
            }
            let deps: Vec<String> = dependency_refs(map)
                .iter()
                .map(|d| TaskSlug::parse(d, Category::Compiles).to_string())
                .collect();
            slugs.push((TaskSlug::new(category, name).to_string(), deps));
        }
    }

    for (slug, _) in &slugs {
        graph.add_node(slug.as_str());
    }
    for (slug, deps) in &slugs {
        for dep in deps {
            if graph.contains_node(dep.as_str()) {
                graph.add_edge(dep.as_str(), slug.as_str(), ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(DatamillError::CyclicDependency(format!(
            "cycle detected in target graph involving '{}'",
            cycle.node_id()
        ))),
    }
}
