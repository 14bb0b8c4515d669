// src/lib.rs

pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod env;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod targets;
pub mod types;
pub mod value;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::engine::Environment;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - changing into the project directory
/// - manifest loading and environment construction
/// - the maintenance modes (`--sync`, `--clean`, `--describe`)
/// - target execution
///
/// Returns whether every requested target succeeded.
pub fn run(args: CliArgs) -> Result<bool> {
    std::env::set_current_dir(&args.dir)
        .with_context(|| format!("changing directory to {:?}", args.dir))?;
    debug!(dir = %args.dir.display(), "changed directory");

    let mut env = Environment::from_manifest(&args.manifest)
        .with_context(|| format!("loading manifest {:?}", args.manifest))?;

    if args.sync {
        env.write_cache()?;
        info!(cache = %env.cache_dir().display(), "cache synced");
    }

    if args.clean {
        env.clean()?;
        return Ok(true);
    }

    if args.describe {
        for summary in env.describe_cache() {
            info!(
                bucket = %summary.bucket,
                matched = summary.matched,
                changed = summary.changed,
                missing = summary.missing,
                removed = summary.removed,
                "bucket"
            );
        }
        return Ok(true);
    }

    Ok(env.execute_targets(&args.targets)?)
}
