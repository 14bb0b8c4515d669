// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::DEFAULT_MANIFEST;

/// Command-line arguments for `datamill`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "datamill",
    version,
    about = "Compile and render schema-validated configuration data, incrementally.",
    long_about = None
)]
pub struct CliArgs {
    /// Manifest to load (YAML, JSON or TOML).
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Change to this directory before doing anything else.
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Remove the cache and task data, then exit.
    #[arg(short, long)]
    pub clean: bool,

    /// Write the cache against the current disk state before running.
    #[arg(long)]
    pub sync: bool,

    /// Log the contents of the fingerprint cache, then exit.
    #[arg(short, long)]
    pub describe: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DATAMILL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Shorthand for `--log-level debug`.
    #[arg(short, long)]
    pub verbose: bool,

    /// Targets to execute. Uses the manifest's default target when empty.
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
