// src/engine/task.rs

//! Dependency resolution and task execution.
//!
//! Dependencies are resolved depth-first with an explicit stack of frames
//! instead of recursion. Each frame walks its dependency list; an
//! unresolved dependency pushes a new frame, a resolved one is folded in
//! directly. The set of frames on the stack is the active resolution path,
//! so a dependency that is already on it is a cycle.

use std::fs;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::dependency_refs;
use crate::config::model::resolve_dir;
use crate::engine::{Environment, TaskResult};
use crate::errors::{DatamillError, Result};
use crate::handlers::TaskRequest;
use crate::types::{Category, ROOT_NAMESPACE, TaskSlug};
use crate::value::{Data, MergePolicy, merge};

/// A task whose dependencies are being resolved.
struct Frame {
    slug: TaskSlug,
    target: Data,
    deps: Vec<TaskSlug>,
    next: usize,
    dep_data: Data,
    changed: Vec<TaskSlug>,
}

impl Environment {
    /// Resolve and execute `name` in `category`, dependencies first.
    ///
    /// Resolution, validity and handler failures are reported as a failed
    /// [`TaskResult`]. Dependency cycles and cache write failures are
    /// returned as errors.
    pub fn handle_task(&mut self, category: Category, name: &str, should_cache: bool) -> Result<TaskResult> {
        let start = Instant::now();
        let requested = TaskSlug::new(category, name);

        if self.visited.contains_key(&requested) {
            return Ok(TaskResult::satisfied());
        }

        let frame = match self.open_frame(requested.clone()) {
            Ok(frame) => frame,
            Err(err) => {
                error!(task = %requested, error = %err, "can't resolve target");
                return Ok(TaskResult::failed().with_duration(start.elapsed()));
            }
        };
        let mut stack = vec![frame];

        while let Some(top) = stack.last_mut() {
            if top.next < top.deps.len() {
                let dep = top.deps[top.next].clone();
                top.next += 1;

                if let Some(fresh) = self.visited.get(&dep).copied() {
                    if fresh {
                        top.changed.push(dep.clone());
                    }
                    self.fold_dep_data(&mut stack, &dep)?;
                    continue;
                }

                if stack.iter().any(|f| f.slug == dep) {
                    let path: Vec<String> = stack
                        .iter()
                        .map(|f| f.slug.to_string())
                        .chain(std::iter::once(dep.to_string()))
                        .collect();
                    return Err(DatamillError::CyclicDependency(path.join(" -> ")));
                }

                match self.open_frame(dep.clone()) {
                    Ok(frame) => stack.push(frame),
                    Err(err) => {
                        error!(task = %dep, error = %err, "can't resolve dependency");
                        return Ok(TaskResult::failed().with_duration(start.elapsed()));
                    }
                }
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            let slug = frame.slug.clone();
            let is_requested = stack.is_empty();
            let result = self.run_frame(frame, should_cache)?;

            if !result.success {
                return Ok(TaskResult::failed().with_duration(start.elapsed()));
            }
            if is_requested {
                return Ok(result.with_duration(start.elapsed()));
            }

            if let Some(parent) = stack.last_mut() {
                if result.fresh {
                    parent.changed.push(slug.clone());
                }
            }
            self.fold_dep_data(&mut stack, &slug)?;
        }

        Ok(TaskResult::failed().with_duration(start.elapsed()))
    }

    /// Merge a resolved dependency's stored output into the top frame.
    fn fold_dep_data(&self, stack: &mut [Frame], dep: &TaskSlug) -> Result<()> {
        let Some(top) = stack.last_mut() else {
            return Ok(());
        };
        if let Some(Value::Object(data)) = self.task_data.get(dep.category, &dep.name) {
            merge(&mut top.dep_data, data.clone(), MergePolicy::Overwrite)?;
        }
        Ok(())
    }

    fn open_frame(&mut self, slug: TaskSlug) -> Result<Frame> {
        let target = self.resolver.require(slug.category, &slug.name)?;

        let deps = dependency_refs(&target)
            .iter()
            .map(|d| TaskSlug::parse(d, self.default_category))
            .collect();

        debug!(task = %slug, "resolving");
        Ok(Frame {
            slug,
            target,
            deps,
            next: 0,
            dep_data: Data::new(),
            changed: Vec::new(),
        })
    }

    /// Run a task whose dependencies are all resolved.
    fn run_frame(&mut self, frame: Frame, should_cache: bool) -> Result<TaskResult> {
        let Frame {
            slug,
            mut target,
            dep_data,
            changed,
            ..
        } = frame;

        if let Err(err) = self.set_output_dir(&mut target) {
            error!(task = %slug, error = %err, "couldn't create output directory");
            return Ok(TaskResult::failed());
        }

        let namespace = self.get_namespace(&slug, &target);
        if !self.namespace(&namespace).is_some_and(|ns| ns.is_valid()) {
            error!(task = %slug, namespace = %namespace, "namespace is invalid");
            return Ok(TaskResult::failed());
        }

        let handler = match self.handlers.get(slug.category) {
            Ok(handler) => handler,
            Err(err) => {
                error!(task = %slug, error = %err, "can't execute");
                return Ok(TaskResult::failed());
            }
        };

        // Private namespaces load extra files; hide them from later tasks.
        let snapshot = (namespace != ROOT_NAMESPACE).then(|| self.cache.clone());

        let start = Instant::now();
        let request = TaskRequest {
            slug: &slug,
            target: &target,
            namespace: &namespace,
            dep_data: &dep_data,
            deps_changed: &changed,
        };
        let result = match handler.handle(self, &request) {
            Ok(result) => result,
            Err(err) => {
                error!(task = %slug, error = %err, "task failed");
                TaskResult::failed()
            }
        }
        .with_duration(start.elapsed());

        if result.success {
            self.visited.insert(slug.clone(), result.fresh);
            if should_cache {
                self.write_cache()?;
            }
        }
        if let Some(snapshot) = snapshot {
            debug!(task = %slug, namespace = %namespace, "rewinding live cache");
            self.rewind_cache(snapshot);
        }

        match result.outcome() {
            (true, true) => info!(task = %slug, elapsed = ?result.duration, "executed"),
            (true, false) => debug!(task = %slug, "already satisfied"),
            _ => error!(task = %slug, elapsed = ?result.duration, "failed"),
        }
        Ok(result)
    }

    /// Resolve the target's `output_dir` against the manifest and create it.
    fn set_output_dir(&self, target: &mut Data) -> Result<()> {
        let dir = match target.get("output_dir").and_then(Value::as_str) {
            Some(dir) => resolve_dir(dir, &self.manifest.dir),
            None => self.manifest.output_dir(),
        };
        fs::create_dir_all(&dir)?;
        target.insert(
            "output_dir".to_string(),
            Value::String(dir.to_string_lossy().into_owned()),
        );
        Ok(())
    }
}
