// src/handlers/render.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::cache::{LoadChecks, path_key};
use crate::codec::file_extension;
use crate::engine::{Environment, TaskResult};
use crate::env::templates::build_environment;
use crate::env::TemplateMap;
use crate::errors::Result;
use crate::handlers::fingerprint::build_fingerprint;
use crate::handlers::{TaskHandler, TaskRequest, value_to_string};
use crate::targets::resolve_dep_data;
use crate::types::{Category, DataType, GLOBAL_KEY, TaskSlug};
use crate::value::Data;

/// Context key holding the joined outputs of a target's `children`.
pub const CHILDREN_KEY: &str = "__children";

/// Data key a render's output is stored under.
pub fn render_name_to_key(name: &str) -> String {
    name.replace('.', "_")
}

/// Indent every non-empty line of `data` by `indent` spaces, trimming
/// trailing whitespace from the result.
pub fn indent_str(data: &str, indent: usize, newline: &str) -> String {
    let pad = " ".repeat(indent);
    let mut result = String::new();
    for line in data.split(newline) {
        if !line.is_empty() {
            result.push_str(&pad);
            result.push_str(line);
        }
        result.push_str(newline);
    }
    result.trim_end().to_string()
}

/// Renders a template from the namespace to a file.
///
/// The template is looked up by `key`, then `name`, then the part of
/// `name` before its first dot (`README.md` finds `README`).
#[derive(Debug, Default)]
pub struct RenderHandler;

fn find_template<'a>(templates: &'a TemplateMap, request: &TaskRequest<'_>) -> Option<&'a str> {
    let name = request.name();
    let mut candidates = vec![request.get_str("key").unwrap_or(name)];
    if let Some((stem, _)) = name.split_once('.') {
        candidates.push(stem);
    }
    candidates
        .into_iter()
        .find_map(|c| templates.get_key_value(c).map(|(k, _)| k.as_str()))
}

fn render_children(
    request: &TaskRequest<'_>,
    context: &mut Data,
    default_category: Category,
    newline: &str,
) -> Result<()> {
    let Some(Value::Array(children)) = request.target.get("children") else {
        return Ok(());
    };

    let mut parts = Vec::with_capacity(children.len());
    for child in children {
        let slug = TaskSlug::parse(&value_to_string(child), default_category);
        let key = render_name_to_key(&slug.name);
        match context.get(&key).and_then(Value::as_str) {
            Some(text) => parts.push(text.to_string()),
            None => return Err(anyhow!("child '{}' produced no render output", slug).into()),
        }
    }

    let delimiter = request.get_str("child_delimiter").unwrap_or("");
    let indent = request.get_u64("child_indent") as usize;
    context.insert(
        CHILDREN_KEY.to_string(),
        Value::String(indent_str(&parts.join(delimiter), indent, newline)),
    );
    Ok(())
}

impl TaskHandler for RenderHandler {
    fn handle(&self, env: &mut Environment, request: &TaskRequest<'_>) -> Result<TaskResult> {
        let name = request.name();
        let path = request.output_path("output_path", name);
        let write_file = !request.get_bool("no_file");
        let indent = request.get_u64("indent") as usize;

        let templates = env.cached_load_templates(request.namespace)?;
        let Some(key) = find_template(&templates, request) else {
            let options: Vec<&String> = templates.keys().collect();
            error!(task = %request.slug, ?options, "no template found");
            return Ok(TaskResult::failed());
        };
        let template = &templates[key];

        let mut criteria = vec![DataType::Template];
        let mut context = request.dep_data.clone();
        if context.is_empty() && !request.target.contains_key("dependencies") {
            context = env.cached_load_configs(request.namespace)?;
            criteria.push(DataType::Config);
            debug!(task = %request.slug, "no dependencies, rendering with config data");
        }
        let mut context = resolve_dep_data(request.target, context)?;
        let newline = env.newline().to_string();
        render_children(request, &mut context, env.default_category(), &newline)?;

        let mut checked = vec![path_key(&template.path)];
        for dep in request.get_strings("template_dependencies") {
            let source = templates
                .get(&dep)
                .ok_or_else(|| anyhow!("unknown template dependency '{}'", dep))?;
            checked.push(path_key(&source.path));
        }
        let load_checks = LoadChecks::from([(DataType::Template.key().to_string(), checked)]);

        let output = write_file.then_some(path.as_path());
        if env.already_satisfied(name, output, &criteria, request.deps_changed, Some(&load_checks)) {
            debug!(task = %request.slug, "render satisfied, skipping");
            return Ok(TaskResult::satisfied());
        }

        if !context.contains_key(GLOBAL_KEY) {
            let global = Value::Object(context.clone());
            context.insert(GLOBAL_KEY.to_string(), global);
        }
        let jinja = build_environment(&templates)?;
        let rendered = jinja.get_template(&template.name)?.render(&context)?;
        let text = indent_str(rendered.trim_end(), indent, &newline);
        let body = format!("{text}{newline}");

        if write_file {
            let dynamic = !request.get_bool("no_dynamic_fingerprint") && indent == 0;
            let extension = file_extension(&path).unwrap_or("");
            let header = build_fingerprint(&body, extension, dynamic, &newline);
            write_output(&path, &header, &body)?;
            info!(task = %request.slug, path = %path.display(), "rendered");
        } else {
            info!(task = %request.slug, "rendered (no file)");
        }

        let out_key = request
            .get_str("as")
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| render_name_to_key(name));
        let mut stored = Data::new();
        stored.insert(out_key, Value::String(text));
        env.task_data_mut().insert(Category::Renders, name, Value::Object(stored));

        Ok(TaskResult::executed())
    }
}

fn write_output(path: &Path, header: &str, body: &str) -> Result<()> {
    fs::write(path, format!("{header}{body}"))
        .with_context(|| format!("writing render output {:?}", path))?;
    Ok(())
}
