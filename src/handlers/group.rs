// src/handlers/group.rs

use serde_json::Value;
use tracing::debug;

use crate::engine::{Environment, TaskResult};
use crate::errors::Result;
use crate::handlers::{TaskHandler, TaskRequest};
use crate::types::Category;

/// Bundles other targets. Does no work of its own; it is fresh whenever
/// one of its dependencies was.
#[derive(Debug, Default)]
pub struct GroupHandler;

impl TaskHandler for GroupHandler {
    fn handle(&self, env: &mut Environment, request: &TaskRequest<'_>) -> Result<TaskResult> {
        env.task_data_mut().insert(
            Category::Groups,
            request.name(),
            Value::Object(request.dep_data.clone()),
        );

        let fresh = !request.deps_changed.is_empty();
        debug!(task = %request.slug, fresh, changed = request.deps_changed.len(), "group resolved");
        Ok(TaskResult::new(true, fresh))
    }
}
