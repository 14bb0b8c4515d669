// src/targets/mod.rs

//! Target definitions and name resolution.
//!
//! - `pattern.rs`: the `{placeholder}` mini-language (matching and
//!   substitution).
//! - `resolver.rs`: per-category literal/pattern tables and lookup.

pub mod pattern;
pub mod resolver;

pub use pattern::{TargetPattern, is_literal, substitute};
pub use resolver::{TargetResolver, resolve_dep_data};
