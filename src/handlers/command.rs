// src/handlers/command.rs

use std::process::Command;

use anyhow::Context;
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::engine::{Environment, TaskResult};
use crate::errors::Result;
use crate::handlers::{TaskHandler, TaskRequest};
use crate::types::Category;
use crate::value::Data;

/// Runs an external program (no shell) from the manifest directory.
///
/// Target keys: `command`, `arguments`, `file` (an output, relative to the
/// output dir, whose absence forces a run) and `force`.
#[derive(Debug, Default)]
pub struct CommandHandler;

impl TaskHandler for CommandHandler {
    fn handle(&self, env: &mut Environment, request: &TaskRequest<'_>) -> Result<TaskResult> {
        let name = request.name();
        let Some(program) = request.get_str("command") else {
            error!(task = %request.slug, "command target has no 'command'");
            return Ok(TaskResult::failed());
        };
        let arguments = request.get_strings("arguments");

        let file_ok = match request.get_str("file") {
            Some(_) => request.output_path("file", "").is_file(),
            None => true,
        };
        if !request.get_bool("force")
            && env.already_satisfied(name, None, &[], request.deps_changed, None)
            && file_ok
            && env.task_data().contains(Category::Commands, name)
        {
            debug!(task = %request.slug, "command satisfied, skipping");
            return Ok(TaskResult::satisfied());
        }

        let mut args = vec![program.to_string()];
        args.extend(arguments.iter().cloned());

        debug!(task = %request.slug, ?args, "spawning");
        let output = Command::new(program)
            .args(&arguments)
            .current_dir(env.manifest_dir())
            .output()
            .with_context(|| format!("spawning command '{}'", program))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let returncode = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            error!(task = %request.slug, ?args, returncode, "command failed");
            error!(task = %request.slug, "stdout: {}", stdout.trim_end());
            error!(task = %request.slug, "stderr: {}", stderr.trim_end());
            return Ok(TaskResult::failed());
        }

        info!(task = %request.slug, ?args, "command succeeded");
        let mut stored = Data::new();
        stored.insert(
            name.to_string(),
            json!({
                "args": args,
                "stdout": stdout,
                "stderr": stderr,
                "returncode": returncode,
            }),
        );
        env.task_data_mut().insert(Category::Commands, name, Value::Object(stored));
        Ok(TaskResult::executed())
    }
}
