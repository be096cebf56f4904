//! Modules and package locations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sealgraph_schema::{PackageName, WorkspaceDescriptor};

/// A source tree root: the local workspace, a replaced directory, or a remote
/// module checked out at a pinned version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Declared module name (`example.com/app`).
    pub name: String,
    /// Absolute path of the module root.
    pub abs_path: PathBuf,
    /// Pinned version. Empty for the workspace and for replaced modules.
    pub version: String,
    /// The module's own `workspace.toml`.
    pub descriptor: WorkspaceDescriptor,
}

impl Module {
    /// Whether this module was fetched from a remote repository.
    pub fn is_external(&self) -> bool {
        !self.version.is_empty()
    }

    /// Build the location of `package_name` inside this module.
    ///
    /// Callers must have checked that the package lives under the module;
    /// a name outside it yields `None`.
    pub fn location(self: &Arc<Self>, package_name: &PackageName) -> Option<Location> {
        let rel_path = package_name.relative_to(&self.name)?.to_string();
        Some(Location {
            module: Arc::clone(self),
            package_name: package_name.clone(),
            rel_path,
        })
    }
}

/// A package's address: owning module, full name, and path relative to the
/// module root (`.` for the root package).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub module: Arc<Module>,
    pub package_name: PackageName,
    pub rel_path: String,
}

impl Location {
    pub fn module_name(&self) -> &str {
        &self.module.name
    }

    /// Absolute directory holding the package.
    pub fn abs_path(&self) -> PathBuf {
        if self.rel_path == "." {
            self.module.abs_path.clone()
        } else {
            self.module.abs_path.join(&self.rel_path)
        }
    }

    /// Path of `file` (relative to the package) relative to the module root.
    pub fn rel(&self, file: impl AsRef<Path>) -> PathBuf {
        if self.rel_path == "." {
            file.as_ref().to_path_buf()
        } else {
            Path::new(&self.rel_path).join(file)
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.module.is_external() {
            write!(f, "{}@{}", self.package_name, self.module.version)
        } else {
            write!(f, "{}", self.package_name)
        }
    }
}

/// A module available on the local filesystem, as returned by a fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModule {
    pub module_name: String,
    pub abs_path: PathBuf,
    pub version: String,
}
