// src/env/schema.rs

//! Schema validation for loaded config data.
//!
//! A schema document maps a top-level config key to a field -> rules map:
//!
//! ```yaml
//! app:
//!   name: { type: string }
//!   port: { type: integer, required: false }
//!   boards: { type: list, schema: { type: dict, schema: board } }
//! ```
//!
//! Rules: `type`, `required`, `nullable`, `allowed` and `schema`. On a map,
//! `schema` holds field rules; on a list it holds the rules of each item.
//! A rule set (or a `schema` value) may be a string naming a type
//! registered through [`TypeRegistry::scoped`].

use std::collections::BTreeMap;
use std::ops::Deref;

use serde_json::Value;
use tracing::{debug, error};

use crate::value::Data;

/// Named rule sets that schemas can refer to.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, Value>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.types.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Register `types` for the lifetime of the returned guard.
    ///
    /// Dropping the guard restores whatever the registry held before.
    pub fn scoped(&mut self, types: &Data) -> TypeScope<'_> {
        let mut previous = Vec::with_capacity(types.len());
        for (name, rules) in types {
            previous.push((name.clone(), self.types.insert(name.clone(), rules.clone())));
        }
        debug!(count = previous.len(), "registered schema types");
        TypeScope {
            registry: self,
            previous,
        }
    }
}

/// Guard returned by [`TypeRegistry::scoped`].
pub struct TypeScope<'a> {
    registry: &'a mut TypeRegistry,
    previous: Vec<(String, Option<Value>)>,
}

impl Deref for TypeScope<'_> {
    type Target = TypeRegistry;

    fn deref(&self) -> &TypeRegistry {
        self.registry
    }
}

impl Drop for TypeScope<'_> {
    fn drop(&mut self) {
        for (name, old) in self.previous.drain(..).rev() {
            match old {
                Some(rules) => {
                    self.registry.types.insert(name, rules);
                }
                None => {
                    self.registry.types.remove(&name);
                }
            }
        }
    }
}

struct Validator<'a> {
    registry: &'a TypeRegistry,
    require_all: bool,
    errors: Vec<String>,
}

impl Validator<'_> {
    fn resolve<'v>(&'v self, rules: &'v Value, path: &str) -> Option<&'v Data> {
        match rules {
            Value::Object(map) => Some(map),
            Value::String(name) => match self.registry.get(name) {
                Some(Value::Object(map)) => Some(map),
                _ => None,
            },
            _ => None,
        }
        .or_else(|| {
            debug!(path = %path, rules = %rules, "unresolvable rule set");
            None
        })
    }

    fn mapping(&mut self, path: &str, value: &Data, fields: &Data) {
        for (field, rules) in fields {
            let field_path = join(path, field);
            let Some(rules) = self.resolve(rules, &field_path).cloned() else {
                self.errors.push(format!("{field_path}: unknown rule set {rules}"));
                continue;
            };

            match value.get(field) {
                None => {
                    let required = rules
                        .get("required")
                        .and_then(Value::as_bool)
                        .unwrap_or(self.require_all);
                    if required {
                        self.errors.push(format!("{field_path}: required field"));
                    }
                }
                Some(item) => self.value(&field_path, item, &rules),
            }
        }
    }

    fn value(&mut self, path: &str, value: &Value, rules: &Data) {
        if value.is_null() {
            if !rules.get("nullable").and_then(Value::as_bool).unwrap_or(false) {
                self.errors.push(format!("{path}: null value not allowed"));
            }
            return;
        }

        if let Some(types) = rules.get("type") {
            let names: Vec<&str> = match types {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            if !names.iter().any(|name| type_matches(name, value)) {
                self.errors.push(format!("{path}: expected type {types}"));
                return;
            }
        }

        if let Some(Value::Array(allowed)) = rules.get("allowed") {
            let ok = match value {
                Value::Array(items) => items.iter().all(|i| allowed.contains(i)),
                other => allowed.contains(other),
            };
            if !ok {
                self.errors.push(format!("{path}: value {value} not in {allowed:?}"));
            }
        }

        if let Some(schema) = rules.get("schema") {
            let Some(schema) = self.resolve(schema, path).cloned() else {
                self.errors.push(format!("{path}: unknown schema {schema}"));
                return;
            };
            match value {
                Value::Object(map) => self.mapping(path, map, &schema),
                Value::Array(items) => {
                    for (idx, item) in items.iter().enumerate() {
                        self.value(&format!("{path}[{idx}]"), item, &schema);
                    }
                }
                _ => {}
            }
        }
    }
}

fn type_matches(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "float" => value.is_f64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "list" => value.is_array(),
        "dict" => value.is_object(),
        _ => false,
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Validate `data` against every schema whose key it contains.
///
/// Returns the list of violations on failure.
pub fn validate(
    schemas: &Data,
    data: &Data,
    require_all: bool,
    registry: &TypeRegistry,
) -> std::result::Result<(), Vec<String>> {
    let mut validator = Validator {
        registry,
        require_all,
        errors: Vec::new(),
    };

    for (key, fields) in schemas {
        let Some(value) = data.get(key) else {
            continue;
        };
        match (value, validator.resolve(fields, key).cloned()) {
            (Value::Object(map), Some(fields)) => validator.mapping(key, map, &fields),
            (_, Some(_)) => validator.errors.push(format!("{key}: expected a map")),
            (_, None) => validator.errors.push(format!("{key}: schema is not a map")),
        }
    }

    if validator.errors.is_empty() {
        Ok(())
    } else {
        for err in &validator.errors {
            error!(violation = %err, "schema validation");
        }
        Err(validator.errors)
    }
}
