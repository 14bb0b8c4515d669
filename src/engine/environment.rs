// src/engine/environment.rs

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use crate::cache::task_data::TASK_DATA_DIR;
use crate::cache::{FileInfoCache, TaskDataCache};
use crate::codec::Format;
use crate::config::{Manifest, load_and_validate};
use crate::engine::{SharedEnvironment, TaskResult};
use crate::env::{EnvironmentNamespace, TypeRegistry};
use crate::errors::Result;
use crate::handlers::{HandlerTable, TaskHandler};
use crate::targets::TargetResolver;
use crate::types::{Category, MANIFEST_BUCKET, ROOT_NAMESPACE, TaskSlug};
use crate::value::Data;

/// Everything one run of the tool operates on.
///
/// Built once per manifest. Targets are executed through
/// [`execute`](Self::execute) / [`handle_task`](Self::handle_task).
pub struct Environment {
    pub(crate) manifest: Manifest,
    pub(crate) resolver: TargetResolver,
    pub(crate) namespaces: BTreeMap<String, EnvironmentNamespace>,

    /// Live cache, mutated by hit-tests during the run.
    pub(crate) cache: FileInfoCache,
    /// Snapshot taken right after load; never mutated.
    pub(crate) initial: FileInfoCache,
    /// Accumulates every observation; this is what gets written.
    pub(crate) aggregate: FileInfoCache,
    pub(crate) cache_dir: PathBuf,
    pub(crate) cache_format: Format,
    pub(crate) manifest_changed: bool,

    pub(crate) task_data: TaskDataCache,
    /// Tasks resolved this run, mapped to whether they did work.
    pub(crate) visited: HashMap<TaskSlug, bool>,
    pub(crate) handlers: HandlerTable,
    pub(crate) registry: TypeRegistry,
    pub(crate) default_category: Category,
    pub(crate) newline: String,
}

impl Environment {
    /// Load and validate the manifest at `path`, then build the environment.
    pub fn from_manifest(path: impl AsRef<Path>) -> Result<Self> {
        let manifest = load_and_validate(path)?;
        Self::new(manifest)
    }

    pub fn new(manifest: Manifest) -> Result<Self> {
        let mut resolver = TargetResolver::new();
        for category in Category::ALL {
            resolver.register_group(category, manifest.data.targets(category))?;
        }

        let mut root = EnvironmentNamespace::new(ROOT_NAMESPACE);
        for (dtype, dir) in &manifest.dirs {
            root.add_dirs(*dtype, std::slice::from_ref(dir), &manifest.dir, true);
        }
        if !root.is_valid() {
            error!(manifest = %manifest.path.display(), "root namespace is invalid");
        }

        let cache_dir = manifest.cache_dir();
        let mut cache = FileInfoCache::new();
        cache.load(&cache_dir)?;
        let aggregate = FileInfoCache::from_data(cache.data().clone());

        // Check every fragment so all of their hashes get recorded.
        let mut manifest_changed = false;
        for file in &manifest.files {
            if !cache.check_hit(MANIFEST_BUCKET, file, true)? {
                debug!(path = %file.display(), "manifest fragment changed");
                manifest_changed = true;
            }
        }
        let initial = FileInfoCache::from_data(cache.data().clone());

        let mut task_data = TaskDataCache::new(cache_dir.join(TASK_DATA_DIR));
        task_data.load()?;

        let mut namespaces = BTreeMap::new();
        namespaces.insert(ROOT_NAMESPACE.to_string(), root);

        info!(
            manifest = %manifest.path.display(),
            cache = %cache_dir.display(),
            manifest_changed,
            "environment ready"
        );

        Ok(Self {
            manifest,
            resolver,
            namespaces,
            cache,
            initial,
            aggregate,
            cache_dir,
            cache_format: Format::Json,
            manifest_changed,
            task_data,
            visited: HashMap::new(),
            handlers: HandlerTable::with_defaults(),
            registry: TypeRegistry::new(),
            default_category: Category::Compiles,
            newline: "\n".to_string(),
        })
    }

    /// Wrap this environment for use from several threads.
    pub fn into_shared(self) -> SharedEnvironment {
        Arc::new(Mutex::new(self))
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_dir(&self) -> &Path {
        &self.manifest.dir
    }

    /// Whether the root namespace loaded every declared directory.
    pub fn is_valid(&self) -> bool {
        self.namespace(ROOT_NAMESPACE).is_some_and(EnvironmentNamespace::is_valid)
    }

    pub fn manifest_changed(&self) -> bool {
        self.manifest_changed
    }

    pub fn namespace(&self, name: &str) -> Option<&EnvironmentNamespace> {
        self.namespaces.get(name)
    }

    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces.keys().cloned().collect()
    }

    pub fn task_data(&self) -> &TaskDataCache {
        &self.task_data
    }

    pub fn task_data_mut(&mut self) -> &mut TaskDataCache {
        &mut self.task_data
    }

    pub fn cache(&self) -> &FileInfoCache {
        &self.cache
    }

    pub fn initial_cache(&self) -> &FileInfoCache {
        &self.initial
    }

    pub fn aggregate_cache(&self) -> &FileInfoCache {
        &self.aggregate
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn set_cache_format(&mut self, format: Format) {
        self.cache_format = format;
    }

    pub fn newline(&self) -> &str {
        &self.newline
    }

    pub fn set_newline(&mut self, newline: impl Into<String>) {
        self.newline = newline.into();
    }

    pub fn default_category(&self) -> Category {
        self.default_category
    }

    /// Replace the handler used for `category`.
    pub fn set_handler(&mut self, category: Category, handler: Arc<dyn TaskHandler>) {
        self.handlers.register(category, handler);
    }

    pub fn remove_handler(&mut self, category: Category) {
        self.handlers.unregister(category);
    }

    /// Resolve a target definition (literal or pattern).
    pub fn get_target(&mut self, category: Category, name: &str) -> Option<Data> {
        self.resolver.get_target(category, name)
    }

    /// Whether `slug` was resolved this run; `Some(fresh)` if so.
    pub fn resolution(&self, slug: &TaskSlug) -> Option<bool> {
        self.visited.get(slug).copied()
    }

    /// Execute a target reference such as `renders-index` or `app`.
    ///
    /// An empty reference means the manifest's default target, falling
    /// back to the first compile.
    pub fn execute(&mut self, target: &str, should_cache: bool) -> Result<TaskResult> {
        let reference = if target.is_empty() {
            match self.manifest.default_target() {
                Some(default) => {
                    info!(target = %default, "using default target");
                    default
                }
                None => {
                    error!("no target requested and the manifest has no default");
                    return Ok(TaskResult::failed());
                }
            }
        } else {
            target.to_string()
        };

        let slug = TaskSlug::parse(&reference, self.default_category);
        self.handle_task(slug.category, &slug.name, should_cache)
    }

    /// Execute every target in order, stopping at the first failure.
    ///
    /// Caches are written through after each successful task. Returns
    /// whether all targets succeeded.
    pub fn execute_targets(&mut self, targets: &[String]) -> Result<bool> {
        if !self.is_valid() {
            error!(manifest = %self.manifest.path.display(), "environment is invalid, not executing");
            return Ok(false);
        }

        let defaults = [String::new()];
        let targets = if targets.is_empty() { &defaults[..] } else { targets };

        for target in targets {
            let result = self.execute(target, true)?;
            if !result.success {
                error!(target = %target, "target failed");
                return Ok(false);
            }
            if !result.fresh {
                info!(target = %target, "already satisfied");
            }
        }

        Ok(true)
    }
}
