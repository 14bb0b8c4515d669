// src/codec.rs

//! Encode/decode of data files, keyed by file extension.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde_json::Value;

use crate::errors::{DatamillError, Result};
use crate::value::Data;

/// Serialization formats understood by loaders and compile targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    /// Pick a format from the last extension of `path`. A bare dotfile
    /// such as `.yaml` counts as having that extension.
    pub fn from_path(path: &Path) -> Result<Format> {
        file_extension(path)
            .and_then(Format::from_extension)
            .ok_or_else(|| DatamillError::UnsupportedFormat(path.display().to_string()))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Toml => "toml",
        }
    }

    /// Parse a document whose top level must be a map.
    ///
    /// An empty document (e.g. a blank YAML file) is an empty map.
    pub fn parse_str(&self, text: &str) -> Result<Data> {
        let value: Value = match self {
            Format::Json => {
                if text.trim().is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(text)?
                }
            }
            Format::Yaml => serde_yaml::from_str(text)?,
            Format::Toml => toml::from_str(text)?,
        };

        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Data::new()),
            other => Err(DatamillError::UnsupportedFormat(format!(
                "top-level {} document must be a map, got {}",
                self,
                kind_name(&other)
            ))),
        }
    }

    pub fn dump(&self, data: &Value) -> Result<String> {
        let text = match self {
            Format::Json => serde_json::to_string_pretty(data)?,
            Format::Yaml => serde_yaml::to_string(data)?,
            Format::Toml => toml::to_string(data)?,
        };
        Ok(text)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = DatamillError;

    fn from_str(s: &str) -> Result<Self> {
        Format::from_extension(s.trim()).ok_or_else(|| DatamillError::UnsupportedFormat(s.to_string()))
    }
}

/// Text after the last `.` of the file name, including for dotfiles,
/// which [`Path::extension`] treats as having none.
pub fn file_extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str()).or_else(|| {
        let name = path.file_name()?.to_str()?;
        name.rsplit_once('.').map(|(_, ext)| ext).filter(|ext| !ext.is_empty())
    })
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Read and decode a data file.
pub fn decode(path: &Path) -> Result<Data> {
    let format = Format::from_path(path)?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading data file {:?}", path))?;
    format.parse_str(&text)
}

/// Encode `data` in the format implied by `path` and write it.
pub fn encode(path: &Path, data: &Value) -> Result<()> {
    let format = Format::from_path(path)?;
    let text = format.dump(data)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {:?}", parent))?;
    }
    fs::write(path, text).with_context(|| format!("writing data file {:?}", path))?;
    Ok(())
}
