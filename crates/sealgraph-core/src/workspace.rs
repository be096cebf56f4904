//! Locating and reading `workspace.toml` descriptors.
//!
//! A workspace is the directory holding the root module's descriptor. Every
//! fetched or replaced module carries its own descriptor at its root too, and
//! the module cache reads it through [`load_descriptor`].

use std::path::{Path, PathBuf};

use sealgraph_schema::{WORKSPACE_FILE, WorkspaceDescriptor};
use tokio::fs;
use tracing::debug;

use crate::error::{Error, Result};

/// The root workspace: where it lives and what it declares.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub descriptor: WorkspaceDescriptor,
}

impl Workspace {
    /// Load the workspace whose descriptor sits in `dir` or its closest
    /// ancestor.
    pub async fn discover(dir: &Path) -> Result<Self> {
        let start = std::path::absolute(dir).map_err(|e| Error::io(dir, e))?;

        for candidate in start.ancestors() {
            if fs::try_exists(candidate.join(WORKSPACE_FILE))
                .await
                .map_err(|e| Error::io(candidate, e))?
            {
                debug!(root = %candidate.display(), "found workspace");
                return Self::load(candidate).await;
            }
        }

        Err(Error::usage(
            format!("create a {WORKSPACE_FILE} declaring module_name"),
            format!("{}: not inside a workspace", start.display()),
        ))
    }

    /// Load the workspace rooted exactly at `root`.
    pub async fn load(root: &Path) -> Result<Self> {
        let descriptor = load_descriptor(root)
            .await?
            .ok_or_else(|| not_a_workspace(root))?;
        Ok(Self {
            root: root.to_path_buf(),
            descriptor,
        })
    }
}

/// Read the descriptor at `root`, or `None` if the directory has none.
pub async fn load_descriptor(root: &Path) -> Result<Option<WorkspaceDescriptor>> {
    let path = root.join(WORKSPACE_FILE);
    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(&path, e)),
    };

    let descriptor: WorkspaceDescriptor = toml::from_str(&content)
        .map_err(|e| Error::bad_input(format!("{}: {e}", path.display())))?;

    if descriptor.module_name.trim().is_empty() {
        return Err(Error::bad_input(format!(
            "{}: module_name is required",
            path.display()
        )));
    }

    Ok(Some(descriptor))
}

pub(crate) fn not_a_workspace(root: &Path) -> Error {
    Error::usage(
        format!("add a {WORKSPACE_FILE} to {}", root.display()),
        format!("{}: is not a workspace", root.display()),
    )
}
