//! In-memory copies of the source files loaded packages were built from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;

use crate::error::{Error, Result};

/// One captured file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub digest: blake3::Hash,
    pub contents: Arc<[u8]>,
}

impl FileSnapshot {
    pub fn new(contents: impl Into<Arc<[u8]>>) -> Self {
        let contents = contents.into();
        Self {
            digest: blake3::hash(&contents),
            contents,
        }
    }
}

/// The files one module contributed, keyed by path relative to the module
/// root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSnapshot {
    pub module_name: String,
    files: BTreeMap<PathBuf, FileSnapshot>,
}

impl ModuleSnapshot {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            files: BTreeMap::new(),
        }
    }

    /// Record `rel` with new contents. Returns whether anything changed.
    pub fn update(&mut self, rel: impl Into<PathBuf>, file: FileSnapshot) -> bool {
        let rel = rel.into();
        if self.files.get(&rel).is_some_and(|f| f.digest == file.digest) {
            return false;
        }
        self.files.insert(rel, file);
        true
    }

    pub fn get(&self, rel: impl AsRef<Path>) -> Option<&FileSnapshot> {
        self.files.get(rel.as_ref())
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Read `rel_files` (relative to `module_root`) from disk.
pub async fn capture(module_root: &Path, rel_files: &[PathBuf]) -> Result<Vec<(PathBuf, FileSnapshot)>> {
    let mut captured = Vec::with_capacity(rel_files.len());
    for rel in rel_files {
        let path = module_root.join(rel);
        let contents = fs::read(&path).await.map_err(|e| Error::io(&path, e))?;
        captured.push((rel.clone(), FileSnapshot::new(contents)));
    }
    Ok(captured)
}

/// Snapshots of every module touched by a loader, sorted by module name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSources {
    pub modules: Vec<ModuleSnapshot>,
}

impl ModuleSources {
    pub fn module(&self, name: &str) -> Option<&ModuleSnapshot> {
        self.modules
            .binary_search_by(|m| m.module_name.as_str().cmp(name))
            .ok()
            .map(|i| &self.modules[i])
    }
}
