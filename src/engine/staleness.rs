// src/engine/staleness.rs

use std::path::Path;

use tracing::debug;

use crate::cache::{LoadChecks, compare};
use crate::engine::Environment;
use crate::types::{DataType, TaskSlug};

impl Environment {
    /// Whether a target can skip its work.
    ///
    /// True only if the manifest is unchanged, `output` (when given)
    /// exists, no dependency changed, and no file in `load_deps` (narrowed
    /// by `load_checks`) was newly loaded since the run started.
    pub fn already_satisfied(
        &self,
        target: &str,
        output: Option<&Path>,
        load_deps: &[DataType],
        deps_changed: &[TaskSlug],
        load_checks: Option<&LoadChecks>,
    ) -> bool {
        let buckets: Vec<&str> = load_deps.iter().map(DataType::key).collect();
        let newly_loaded = compare(&self.cache, &self.initial, &buckets, load_checks);

        let output_exists = output.is_none_or(Path::is_file);

        if output_exists {
            if !deps_changed.is_empty() {
                let changed: Vec<String> = deps_changed.iter().map(ToString::to_string).collect();
                debug!(target = %target, ?changed, "dependency updates detected");
            }
            if newly_loaded != 0 {
                debug!(target = %target, newly_loaded, "file updates detected");
            }
        } else {
            debug!(target = %target, "output missing");
        }

        !self.manifest_changed && output_exists && deps_changed.is_empty() && newly_loaded == 0
    }
}
