// src/handlers/fingerprint.rs

//! Header comments stamped onto rendered files.
//!
//! ```text
//! # =====================================
//! # generator=datamill
//! # version=0.1.0
//! # hash=<blake3 of the rendered text>
//! # =====================================
//! ```

use crate::cache::compute_str_hash;
use crate::types::{PKG_NAME, VERSION};

pub const BARRIER: char = '=';

/// Key/value lines for a header over `text`. `dynamic` adds entries that
/// change between releases without the content changing.
pub fn comment_data(text: &str, dynamic: bool) -> Vec<(&'static str, String)> {
    let mut lines = vec![("generator", PKG_NAME.to_string())];
    if dynamic {
        lines.push(("version", VERSION.to_string()));
    }
    lines.push(("hash", compute_str_hash(text)));
    lines
}

/// Wrap the lines in comments appropriate for `extension`. Unknown
/// extensions get no header at all.
fn encapsulate(lines: &[String], extension: &str, newline: &str) -> String {
    let mut out: Vec<String> = Vec::new();

    match extension.to_ascii_lowercase().as_str() {
        "py" | "mk" | "yaml" | "yml" | "sh" => {
            for line in lines {
                if line.is_empty() {
                    out.push(String::new());
                } else {
                    out.push(format!("# {line}"));
                }
            }
        }
        "md" | "html" | "svg" => {
            out.push("<!--".to_string());
            out.extend(lines.iter().filter(|l| !l.is_empty()).map(|l| format!("    {l}")));
            out.push(format!("-->{newline}{newline}"));
        }
        _ => {}
    }

    out.join(newline)
}

/// Build the header to prepend to `text` when writing a file with the
/// given extension.
pub fn build_fingerprint(text: &str, extension: &str, dynamic: bool, newline: &str) -> String {
    let mut lines: Vec<String> = comment_data(text, dynamic)
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();

    let width = lines.iter().map(String::len).max().unwrap_or(0);
    let barrier = BARRIER.to_string().repeat(width);
    lines.insert(0, barrier.clone());
    lines.push(barrier);
    lines.push(String::new());

    encapsulate(&lines, extension, newline)
}
