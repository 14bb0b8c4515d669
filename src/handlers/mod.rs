// src/handlers/mod.rs

//! Category handlers: the code that actually performs a task.
//!
//! The engine resolves dependencies and picks a namespace, then hands the
//! task to the [`TaskHandler`] registered for its category. Handlers decide
//! freshness themselves (usually via
//! [`Environment::already_satisfied`]) and must write their durable output
//! before reporting a fresh result.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::config::model::resolve_dir;
use crate::engine::{Environment, TaskResult};
use crate::errors::{DatamillError, Result};
use crate::types::{Category, TaskSlug};
use crate::value::Data;

pub mod command;
pub mod compile;
pub mod fingerprint;
pub mod group;
pub mod render;

pub use command::CommandHandler;
pub use compile::CompileHandler;
pub use group::GroupHandler;
pub use render::RenderHandler;

/// Everything a handler gets to know about the task it runs.
#[derive(Debug, Clone, Copy)]
pub struct TaskRequest<'a> {
    pub slug: &'a TaskSlug,
    /// Target definition, with `output_dir` already resolved.
    pub target: &'a Data,
    pub namespace: &'a str,
    /// Stored outputs of all dependencies, merged.
    pub dep_data: &'a Data,
    /// Dependencies that did work (or were found changed) this run.
    pub deps_changed: &'a [TaskSlug],
}

impl TaskRequest<'_> {
    pub fn name(&self) -> &str {
        &self.slug.name
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.target.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.target.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_u64(&self, key: &str) -> u64 {
        self.target.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn get_strings(&self, key: &str) -> Vec<String> {
        self.target
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().map(value_to_string).collect())
            .unwrap_or_default()
    }

    /// Output location: `key` (or `default_name` when absent), joined onto
    /// `output_dir` unless absolute.
    pub fn output_path(&self, key: &str, default_name: &str) -> PathBuf {
        let name = self.get_str(key).unwrap_or(default_name);
        let output_dir = self.get_str("output_dir").unwrap_or(".");
        resolve_dir(name, std::path::Path::new(output_dir))
    }
}

/// Render a scalar for command lines and paths.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Performs tasks of one category.
pub trait TaskHandler: Send + Sync {
    fn handle(&self, env: &mut Environment, request: &TaskRequest<'_>) -> Result<TaskResult>;
}

/// Handlers by category. Missing entries are an explicit error.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: BTreeMap<Category, Arc<dyn TaskHandler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in handler for every category.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register(Category::Compiles, Arc::new(CompileHandler));
        table.register(Category::Renders, Arc::new(RenderHandler));
        table.register(Category::Commands, Arc::new(CommandHandler));
        table.register(Category::Groups, Arc::new(GroupHandler));
        table
    }

    pub fn register(&mut self, category: Category, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(category, handler);
    }

    pub fn unregister(&mut self, category: Category) {
        self.handlers.remove(&category);
    }

    pub fn get(&self, category: Category) -> Result<Arc<dyn TaskHandler>> {
        self.handlers
            .get(&category)
            .cloned()
            .ok_or_else(|| DatamillError::UnregisteredCategory(category.to_string()))
    }
}
