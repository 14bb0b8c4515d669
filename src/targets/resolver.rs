// src/targets/resolver.rs

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, error};

use crate::errors::{DatamillError, Result};
use crate::targets::pattern::{TargetPattern, is_literal, substitute};
use crate::types::Category;
use crate::value::{Data, MergePolicy, merge, unflatten};

/// Key under which materialized pattern targets record their captures.
pub const OVERRIDES_KEY: &str = "overrides";

#[derive(Debug, Clone)]
struct PatternTarget {
    pattern: TargetPattern,
    data: Data,
}

/// Literal and pattern targets, per category.
#[derive(Debug, Clone, Default)]
pub struct TargetResolver {
    literals: BTreeMap<Category, BTreeMap<String, Data>>,
    patterns: BTreeMap<Category, Vec<PatternTarget>>,
}

impl TargetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.literals.clear();
        self.patterns.clear();
    }

    /// Partition raw target definitions into literal and pattern tables.
    ///
    /// Every definition must be a map with a string `name`.
    pub fn register_group(&mut self, category: Category, targets: &[Value]) -> Result<()> {
        let literals = self.literals.entry(category).or_default();
        let patterns = self.patterns.entry(category).or_default();

        for target in targets {
            let data = target.as_object().ok_or_else(|| {
                DatamillError::ManifestError(format!("{category} entry is not a map: {target}"))
            })?;
            let name = data.get("name").and_then(Value::as_str).ok_or_else(|| {
                DatamillError::ManifestError(format!("{category} entry has no 'name': {target}"))
            })?;

            if is_literal(name) {
                literals.insert(name.to_string(), data.clone());
            } else {
                patterns.push(PatternTarget {
                    pattern: TargetPattern::compile(name)?,
                    data: data.clone(),
                });
            }
        }

        debug!(
            category = %category,
            literals = literals.len(),
            patterns = patterns.len(),
            "registered targets"
        );
        Ok(())
    }

    /// Resolve `name` in `category`.
    ///
    /// `Ok(None)` means no literal and no pattern matched. More than one
    /// matching pattern is an [`DatamillError::AmbiguousTarget`] error.
    pub fn resolve(&mut self, category: Category, name: &str) -> Result<Option<Data>> {
        if let Some(found) = self.literals.get(&category).and_then(|l| l.get(name)) {
            return Ok(Some(found.clone()));
        }

        let candidates = self.patterns.get(&category).map(Vec::as_slice).unwrap_or_default();
        let matched: Vec<(&PatternTarget, Data)> = candidates
            .iter()
            .filter_map(|p| p.pattern.matches(name).map(|subs| (p, subs)))
            .collect();

        let (pattern, subs) = match matched.as_slice() {
            [] => return Ok(None),
            [(pattern, subs)] => (*pattern, subs.clone()),
            many => {
                return Err(DatamillError::AmbiguousTarget {
                    name: name.to_string(),
                    patterns: many.iter().map(|(p, _)| p.pattern.name().to_string()).collect(),
                });
            }
        };

        let target = materialize(pattern, name, &subs)?;
        debug!(category = %category, name = %name, pattern = %pattern.pattern.name(), "materialized pattern target");

        self.literals
            .entry(category)
            .or_default()
            .insert(name.to_string(), target.clone());
        Ok(Some(target))
    }

    /// Like [`resolve`](Self::resolve), but a missing target is a
    /// [`DatamillError::TargetNotFound`] error.
    pub fn require(&mut self, category: Category, name: &str) -> Result<Data> {
        self.resolve(category, name)?
            .ok_or_else(|| DatamillError::TargetNotFound(format!("{category}-{name}")))
    }

    /// Like [`resolve`](Self::resolve), but ambiguity is logged and
    /// reported as not found.
    pub fn get_target(&mut self, category: Category, name: &str) -> Option<Data> {
        match self.resolve(category, name) {
            Ok(found) => found,
            Err(err) => {
                error!(category = %category, name = %name, error = %err, "target resolution failed");
                None
            }
        }
    }

    /// Literal target names registered (or materialized) so far.
    pub fn literal_names(&self, category: Category) -> Vec<String> {
        self.literals
            .get(&category)
            .map(|l| l.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn materialize(pattern: &PatternTarget, name: &str, subs: &Data) -> Result<Data> {
    let mut target = match substitute(&Value::Object(pattern.data.clone()), subs) {
        Value::Object(map) => map,
        _ => Data::new(),
    };
    target.insert("name".to_string(), Value::String(name.to_string()));

    let mut overrides = match target.remove(OVERRIDES_KEY) {
        Some(Value::Object(map)) => map,
        _ => Data::new(),
    };
    merge(&mut overrides, unflatten(subs), MergePolicy::Overwrite)?;
    target.insert(OVERRIDES_KEY.to_string(), Value::Object(overrides));

    Ok(target)
}

/// Apply a target's `overrides` on top of `data`.
pub fn resolve_dep_data(target: &Data, mut data: Data) -> Result<Data> {
    if let Some(Value::Object(overrides)) = target.get(OVERRIDES_KEY) {
        merge(&mut data, overrides.clone(), MergePolicy::Overwrite)?;
    }
    Ok(data)
}
