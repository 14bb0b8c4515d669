#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use datamill::engine::Environment;
use tempfile::TempDir;

/// Builder for a throwaway project directory (manifest plus data files).
pub struct ProjectBuilder {
    files: Vec<(PathBuf, String)>,
    manifest_name: String,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            manifest_name: "manifest.yaml".to_string(),
        }
    }

    /// Manifest contents, written as `manifest.yaml`.
    pub fn manifest(self, contents: &str) -> Self {
        let name = self.manifest_name.clone();
        self.file(&name, contents)
    }

    /// Use a different manifest file name (and therefore format).
    pub fn manifest_named(mut self, name: &str, contents: &str) -> Self {
        self.manifest_name = name.to_string();
        self.file(name, contents)
    }

    pub fn file(mut self, rel: &str, contents: &str) -> Self {
        self.files.push((PathBuf::from(rel), contents.to_string()));
        self
    }

    pub fn build(self) -> Result<TestProject> {
        let dir = TempDir::new().context("creating project directory")?;
        let project = TestProject {
            dir,
            manifest_name: self.manifest_name,
        };
        for (rel, contents) in &self.files {
            project.write(rel, contents)?;
        }
        Ok(project)
    }
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A project on disk. The directory is removed when this is dropped.
pub struct TestProject {
    dir: TempDir,
    manifest_name: String,
}

impl TestProject {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.join(&self.manifest_name)
    }

    /// Default output directory of a manifest without `output_dir`.
    pub fn output(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.join(datamill::types::DEFAULT_OUTPUT_DIR).join(rel)
    }

    pub fn write(&self, rel: impl AsRef<Path>, contents: &str) -> Result<()> {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }
        fs::write(&path, contents).with_context(|| format!("writing {:?}", path))
    }

    pub fn read(&self, rel: impl AsRef<Path>) -> Result<String> {
        let path = self.join(rel);
        fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))
    }

    pub fn remove(&self, rel: impl AsRef<Path>) -> Result<()> {
        let path = self.join(rel);
        fs::remove_file(&path).with_context(|| format!("removing {:?}", path))
    }

    /// A fresh environment, as a new process run would build it.
    pub fn environment(&self) -> Result<Environment> {
        Ok(Environment::from_manifest(self.manifest_path())?)
    }
}
