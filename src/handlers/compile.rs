// src/handlers/compile.rs

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::Context;
use serde_json::Value;
use tracing::{debug, info};

use crate::codec::Format;
use crate::engine::{Environment, TaskResult};
use crate::errors::Result;
use crate::handlers::{TaskHandler, TaskRequest};
use crate::targets::resolve_dep_data;
use crate::types::{Category, DataType};
use crate::value::{MergePolicy, advance_by_path, merge};

pub const DEFAULT_OUTPUT_TYPE: &str = "yaml";

/// Serializes namespace config data (plus dependency data) to a file.
///
/// Target keys:
/// - `output_type`: `yaml` (default), `json` or `toml`
/// - `output_path`: explicit output file
/// - `merge_deps`: deep-merge dependency data instead of a shallow update
/// - `index_path`: dotted path to compile only a subtree
/// - `key`: write only this top-level key
/// - `append`: append to the output instead of replacing it
#[derive(Debug, Default)]
pub struct CompileHandler;

impl TaskHandler for CompileHandler {
    fn handle(&self, env: &mut Environment, request: &TaskRequest<'_>) -> Result<TaskResult> {
        let name = request.name();
        let output_type = request.get_str("output_type").unwrap_or(DEFAULT_OUTPUT_TYPE);
        let format: Format = output_type.parse()?;
        let path = request.output_path("output_path", &format!("{name}.{output_type}"));

        let mut data = env.cached_load_configs(request.namespace)?;

        if !request.dep_data.is_empty() {
            if request.get_bool("merge_deps") {
                merge(&mut data, request.dep_data.clone(), MergePolicy::Overwrite)?;
            } else {
                for (key, value) in request.dep_data {
                    data.insert(key.clone(), value.clone());
                }
            }
        }

        if let Some(index) = request.get_str("index_path") {
            data = advance_by_path(data, index);
        }
        let data = resolve_dep_data(request.target, data)?;

        if env.already_satisfied(
            name,
            Some(&path),
            &[DataType::Config, DataType::Variable, DataType::Schema],
            request.deps_changed,
            None,
        ) {
            debug!(task = %request.slug, "compile satisfied, skipping");
            env.task_data_mut().insert(Category::Compiles, name, Value::Object(data));
            return Ok(TaskResult::satisfied());
        }

        let output = match request.get_str("key") {
            Some(key) => data.get(key).cloned().unwrap_or_else(|| Value::Object(Default::default())),
            None => Value::Object(data.clone()),
        };
        let text = format.dump(&output)?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(request.get_bool("append"))
            .truncate(!request.get_bool("append"))
            .open(&path)
            .with_context(|| format!("opening compile output {:?}", path))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("writing compile output {:?}", path))?;

        info!(task = %request.slug, format = %format, path = %path.display(), "compiled");
        env.task_data_mut().insert(Category::Compiles, name, Value::Object(data));
        Ok(TaskResult::executed())
    }
}
