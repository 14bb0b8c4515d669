use std::sync::{Arc, Mutex};

use datamill::engine::{Environment, TaskResult};
use datamill::errors::Result;
use datamill::handlers::{TaskHandler, TaskRequest};
use serde_json::{Value, json};

/// One observed handler invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub slug: String,
    pub namespace: String,
    pub dep_data: datamill::value::Data,
    pub deps_changed: Vec<String>,
}

/// A fake handler that:
/// - records every task it is asked to perform
/// - stores `{"ran": <name>}` as the task's data
/// - reports a fixed outcome (fresh success by default)
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<Invocation>>>,
    result: TaskResult,
    fail_on: Vec<String>,
}

impl RecordingHandler {
    pub fn new(calls: Arc<Mutex<Vec<Invocation>>>) -> Self {
        Self {
            calls,
            result: TaskResult::executed(),
            fail_on: Vec::new(),
        }
    }

    /// Report `result` for every task instead of a fresh success.
    pub fn with_result(mut self, result: TaskResult) -> Self {
        self.result = result;
        self
    }

    /// Fail tasks with this name.
    pub fn failing(mut self, name: &str) -> Self {
        self.fail_on.push(name.to_string());
        self
    }
}

impl TaskHandler for RecordingHandler {
    fn handle(&self, env: &mut Environment, request: &TaskRequest<'_>) -> Result<TaskResult> {
        {
            let mut guard = self.calls.lock().unwrap();
            guard.push(Invocation {
                slug: request.slug.to_string(),
                namespace: request.namespace.to_string(),
                dep_data: request.dep_data.clone(),
                deps_changed: request.deps_changed.iter().map(ToString::to_string).collect(),
            });
        }

        if self.fail_on.iter().any(|n| n == request.name()) {
            return Ok(TaskResult::failed());
        }

        let mut data = datamill::value::Data::new();
        data.insert(request.name().to_string(), json!({ "ran": request.name() }));
        env.task_data_mut()
            .insert(request.slug.category, request.name(), Value::Object(data));
        Ok(self.result)
    }
}

/// Slugs recorded so far, in call order.
pub fn recorded(calls: &Arc<Mutex<Vec<Invocation>>>) -> Vec<String> {
    calls.lock().unwrap().iter().map(|c| c.slug.clone()).collect()
}
