// src/targets/pattern.rs

//! Parameterized target names.
//!
//! A target name such as `echo-{word}` or `build-{board.name}` contains
//! placeholders. Each placeholder matches a run of characters from
//! [`VALUE_CLASS`]; a successful match yields a flat map from the
//! (possibly dotted) key to the matched text.

use regex::Regex;
use serde_json::Value;

use crate::errors::{DatamillError, Result};
use crate::value::Data;

/// Characters a placeholder may capture.
pub const VALUE_CLASS: &str = "[a-zA-Z0-9._-]+";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Key(&'a str),
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Split `text` into literal runs and `{key}` placeholders.
///
/// Braces that do not enclose a valid key stay literal.
fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut result = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(open) = text[cursor..].find('{').map(|i| i + cursor) {
        let Some(close) = text[open + 1..].find('}').map(|i| i + open + 1) else {
            break;
        };
        let key = &text[open + 1..close];
        if !key.is_empty() && key.chars().all(is_key_char) {
            if open > literal_start {
                result.push(Segment::Literal(&text[literal_start..open]));
            }
            result.push(Segment::Key(key));
            literal_start = close + 1;
            cursor = close + 1;
        } else {
            cursor = open + 1;
        }
    }

    if literal_start < text.len() {
        result.push(Segment::Literal(&text[literal_start..]));
    }
    result
}

/// Whether a target name has no placeholders.
pub fn is_literal(name: &str) -> bool {
    !segments(name).iter().any(|s| matches!(s, Segment::Key(_)))
}

/// A compiled pattern target name.
#[derive(Debug, Clone)]
pub struct TargetPattern {
    name: String,
    keys: Vec<String>,
    regex: Regex,
}

impl TargetPattern {
    /// Compile a pattern name. Literal names are rejected.
    pub fn compile(name: &str) -> Result<Self> {
        let mut expr = String::from("^");
        let mut keys = Vec::new();

        for segment in segments(name) {
            match segment {
                Segment::Literal(text) => expr.push_str(&regex::escape(text)),
                Segment::Key(key) => {
                    expr.push('(');
                    expr.push_str(VALUE_CLASS);
                    expr.push(')');
                    keys.push(key.to_string());
                }
            }
        }
        expr.push('$');

        if keys.is_empty() {
            return Err(DatamillError::ManifestError(format!(
                "target name '{name}' has no placeholders"
            )));
        }

        let regex = Regex::new(&expr)
            .map_err(|e| DatamillError::ManifestError(format!("bad target pattern '{name}': {e}")))?;

        Ok(Self {
            name: name.to_string(),
            keys,
            regex,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Match a candidate name, returning the captured substitutions.
    ///
    /// A key that appears more than once must capture the same text each
    /// time.
    pub fn matches(&self, candidate: &str) -> Option<Data> {
        let captures = self.regex.captures(candidate)?;
        let mut data = Data::new();

        for (idx, key) in self.keys.iter().enumerate() {
            let text = captures.get(idx + 1)?.as_str();
            match data.get(key) {
                Some(Value::String(existing)) if existing != text => return None,
                _ => {
                    data.insert(key.clone(), Value::String(text.to_string()));
                }
            }
        }

        Some(data)
    }
}

/// Replace `{key}` placeholders in every string of `value` (recursing
/// through maps and lists) with entries of `subs`.
///
/// Dotted keys are looked up as-is in the flat substitution map. Unknown
/// placeholders are left untouched.
pub fn substitute(value: &Value, subs: &Data) -> Value {
    match value {
        Value::String(text) => Value::String(substitute_str(text, subs)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, subs)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, subs)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_str(text: &str, subs: &Data) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in segments(text) {
        match segment {
            Segment::Literal(lit) => out.push_str(lit),
            Segment::Key(key) => match subs.get(key) {
                Some(Value::String(s)) => out.push_str(s),
                Some(other) => out.push_str(&other.to_string()),
                None => {
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                }
            },
        }
    }
    out
}
