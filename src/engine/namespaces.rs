// src/engine/namespaces.rs

//! Namespace selection and on-demand loading of namespace data.

use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::model::resolve_dir;
use crate::engine::Environment;
use crate::env::loader::{LoadOptions, load_dir};
use crate::env::namespace::EnvironmentNamespace;
use crate::env::schema::validate;
use crate::env::templates::{TemplateMap, load_template_dir};
use crate::errors::{DatamillError, Result};
use crate::types::{DataType, ROOT_NAMESPACE, TaskSlug};
use crate::value::Data;

impl Environment {
    fn namespace_mut(&mut self, name: &str) -> Result<&mut EnvironmentNamespace> {
        self.namespaces
            .get_mut(name)
            .ok_or_else(|| DatamillError::InvalidNamespace(name.to_string()))
    }

    /// Pick the namespace `slug` executes in.
    ///
    /// A target that lists directories the root namespace does not have
    /// (for the data types its category loads) gets a private namespace,
    /// cloned from root and named after the slug. Everything else runs in
    /// the root namespace.
    pub fn get_namespace(&mut self, slug: &TaskSlug, target: &Data) -> String {
        let requested: Vec<(DataType, Vec<PathBuf>)> = slug
            .category
            .load_deps()
            .iter()
            .filter_map(|dtype| {
                let items = target.get(dtype.key())?.as_array()?;
                let paths = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|p| resolve_dir(p, &self.manifest.dir))
                    .collect();
                Some((*dtype, paths))
            })
            .collect();

        let Some(root) = self.namespaces.get(ROOT_NAMESPACE) else {
            return ROOT_NAMESPACE.to_string();
        };
        let introduces_new = requested
            .iter()
            .any(|(dtype, paths)| paths.iter().any(|p| !root.has_dir(*dtype, p)));
        if !introduces_new {
            return ROOT_NAMESPACE.to_string();
        }

        let name = slug.to_string();
        if !self.namespaces.contains_key(&name) {
            let private = root.clone_as(&name);
            info!(task = %slug, namespace = %name, "created private namespace");
            self.namespaces.insert(name.clone(), private);
        }

        if let Some(namespace) = self.namespaces.get_mut(&name) {
            for (dtype, paths) in &requested {
                namespace.add_dirs(*dtype, paths, &self.manifest.dir, true);
            }
        }
        name
    }

    /// Load any not-yet-loaded directories of `dtype` in `namespace` and
    /// return the namespace's data for it.
    fn load_data(&mut self, namespace: &str, dtype: DataType, variables: Option<&Data>) -> Result<Data> {
        let ns = self
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| DatamillError::InvalidNamespace(namespace.to_string()))?;

        let to_load = ns.get_to_load(dtype);
        for dir in &to_load {
            let options = LoadOptions {
                bucket: dtype.key(),
                variables: if dtype == DataType::Config { variables } else { None },
            };
            match load_dir(dir, ns.data_mut(dtype), &mut self.cache, options) {
                Ok(count) => {
                    debug!(namespace = %namespace, dtype = %dtype, dir = %dir.display(), count, "loaded directory");
                }
                Err(err) => {
                    error!(namespace = %namespace, dtype = %dtype, dir = %dir.display(), error = %err, "failed to load directory");
                    ns.set_valid(false);
                    return Err(err);
                }
            }
        }
        if !to_load.is_empty() {
            ns.update_load_state(dtype, &to_load);
        }

        Ok(ns.data(dtype).cloned().unwrap_or_default())
    }

    pub fn load_variables(&mut self, namespace: &str) -> Result<Data> {
        self.load_data(namespace, DataType::Variable, None)
    }

    pub fn load_schema_types(&mut self, namespace: &str) -> Result<Data> {
        self.load_data(namespace, DataType::SchemaType, None)
    }

    pub fn load_schemas(&mut self, namespace: &str) -> Result<Data> {
        self.load_data(namespace, DataType::Schema, None)
    }

    /// Validate `data` against the namespace's schemas, with its schema
    /// types registered for the duration of the check.
    pub fn enforce_schemas(&mut self, namespace: &str, data: &Data) -> Result<()> {
        let types = self.load_schema_types(namespace)?;
        let schemas = self.load_schemas(namespace)?;

        let outcome = {
            let scope = self.registry.scoped(&types);
            validate(&schemas, data, true, &scope)
        };

        if let Err(violations) = outcome {
            self.namespace_mut(namespace)?.set_valid(false);
            return Err(DatamillError::SchemaError(violations.join("; ")));
        }
        Ok(())
    }

    /// Load variables, then configs (rendered with those variables), then
    /// enforce schemas.
    pub fn cached_load_configs(&mut self, namespace: &str) -> Result<Data> {
        let variables = self.load_variables(namespace)?;
        let configs = self.load_data(namespace, DataType::Config, Some(&variables))?;
        self.enforce_schemas(namespace, &configs)?;
        Ok(configs)
    }

    pub fn cached_load_templates(&mut self, namespace: &str) -> Result<TemplateMap> {
        let ns = self
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| DatamillError::InvalidNamespace(namespace.to_string()))?;

        let to_load = ns.get_to_load(DataType::Template);
        for dir in &to_load {
            match load_template_dir(dir, &mut self.cache) {
                Ok(loaded) => ns.templates_mut().extend(loaded),
                Err(err) => {
                    error!(namespace = %namespace, dir = %dir.display(), error = %err, "failed to load templates");
                    ns.set_valid(false);
                    return Err(err);
                }
            }
        }
        if !to_load.is_empty() {
            ns.update_load_state(DataType::Template, &to_load);
        }

        Ok(ns.templates().clone())
    }
}
