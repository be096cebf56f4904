//! Fetching remote modules into the local module cache.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sealgraph_schema::{ModuleDependency, PackageName, WORKSPACE_FILE};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::module::LocalModule;
use crate::paths;

/// Retrieves a local copy of a module pinned at a version.
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    async fn download(&self, dep: &ModuleDependency) -> Result<LocalModule>;
}

/// Decides which module serves a package that no workspace entry covers.
#[async_trait]
pub trait MissingModuleResolver: Send + Sync {
    async fn resolve(&self, package: &PackageName) -> Result<ModuleDependency>;
}

/// Fails every lookup, asking the user to declare the dependency.
#[derive(Debug, Clone, Default)]
pub struct RequireDeclaredDependency;

#[async_trait]
impl MissingModuleResolver for RequireDeclaredDependency {
    async fn resolve(&self, package: &PackageName) -> Result<ModuleDependency> {
        Err(Error::usage(
            format!("add a dependency entry to {WORKSPACE_FILE} and retry"),
            format!("{package}: missing dependency entry in {WORKSPACE_FILE}"),
        ))
    }
}

/// Fetches modules with `git`, cloning `https://<module name>` and checking
/// out the pinned version.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    cache_dir: PathBuf,
}

impl GitFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// A fetcher writing to the default module cache.
    pub fn with_default_cache() -> Self {
        Self::new(paths::module_cache_path())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

#[async_trait]
impl ModuleFetcher for GitFetcher {
    async fn download(&self, dep: &ModuleDependency) -> Result<LocalModule> {
        let module_dir = paths::module_dir(&self.cache_dir, &dep.module_name, &dep.version);
        let local = LocalModule {
            module_name: dep.module_name.clone(),
            abs_path: module_dir.clone(),
            version: dep.version.clone(),
        };

        if fs::try_exists(&module_dir)
            .await
            .map_err(|e| Error::io(&module_dir, e))?
        {
            debug!(module = %dep.module_name, version = %dep.version, "module already fetched");
            return Ok(local);
        }

        let git = which::which("git").map_err(|_| {
            Error::usage(
                "install git and make sure it is on PATH",
                format!("{}: git is required to fetch modules", dep.module_name),
            )
        })?;

        fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| Error::io(&self.cache_dir, e))?;
        let tmp = tempfile::Builder::new()
            .prefix("fetch-")
            .tempdir_in(&self.cache_dir)
            .map_err(|e| Error::io(&self.cache_dir, e))?;
        let checkout = tmp.path().join("src");
        let repository = format!("https://{}", dep.module_name);

        info!(module = %dep.module_name, version = %dep.version, "fetching module");

        run_git(
            &git,
            tmp.path(),
            &["clone", "-q", &repository, &checkout.to_string_lossy()],
        )
        .await?;
        run_git(&git, &checkout, &["reset", "-q", "--hard", &dep.version]).await?;

        if let Some(parent) = module_dir.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }
        fs::rename(&checkout, &module_dir)
            .await
            .map_err(|e| Error::io(&module_dir, e))?;

        Ok(local)
    }
}

async fn run_git(git: &Path, dir: &Path, args: &[&str]) -> Result<()> {
    debug!(?args, dir = %dir.display(), "running git");

    let output = Command::new(git)
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::invocation(format!("git {}: {e}", args.join(" "))))?;

    if output.status.success() {
        return Ok(());
    }

    Err(Error::invocation(format!(
        "git {} failed ({}): {}",
        args.first().copied().unwrap_or_default(),
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}
