//! The per-module `workspace.toml` descriptor.

use serde::{Deserialize, Serialize};

use crate::types::PackageName;

/// File name of a module descriptor, at the module root.
pub const WORKSPACE_FILE: &str = "workspace.toml";

/// A module's descriptor: its name, pinned dependencies and local overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceDescriptor {
    /// Name of the module; prefixes every package inside it.
    pub module_name: String,
    /// Remote modules pinned at a version.
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<ModuleDependency>,
    /// Modules served from a local path instead of being fetched.
    #[serde(default, rename = "replace")]
    pub replaces: Vec<ModuleReplace>,
}

/// A `[[dependency]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleDependency {
    /// Name of the remote module.
    pub module_name: String,
    /// Pinned version (a commit, tag or branch the fetcher understands).
    pub version: String,
}

/// A `[[replace]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReplace {
    /// Module being replaced.
    pub module_name: String,
    /// Local path, relative to the workspace root.
    pub path: String,
}

impl WorkspaceDescriptor {
    /// The replace entry covering `package`, if any.
    pub fn find_replace<'p>(&self, package: &'p PackageName) -> Option<(&ModuleReplace, &'p str)> {
        self.replaces
            .iter()
            .find_map(|r| package.relative_to(&r.module_name).map(|rel| (r, rel)))
    }

    /// The dependency entry covering `package`. When several entries match,
    /// the longest module name wins.
    pub fn find_dependency(&self, package: &PackageName) -> Option<&ModuleDependency> {
        self.dependencies
            .iter()
            .filter(|d| package.relative_to(&d.module_name).is_some())
            .max_by_key(|d| d.module_name.len())
    }
}
