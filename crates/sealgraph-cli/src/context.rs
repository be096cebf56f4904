//! Shared command context.
//!
//! Groups the workspace, configuration and loader every command needs.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use sealgraph_core::{
    ConfigFile, GitFetcher, GraphConfig, PackageLoader, TomlFrontend, Workspace,
};
use tracing::debug;

use crate::Cli;

#[derive(Clone)]
pub struct Context {
    pub workspace: Workspace,
    pub config: Arc<GraphConfig>,
    pub loader: Arc<PackageLoader>,
    pub json: bool,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("workspace", &self.workspace.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub async fn load(cli: &Cli) -> Result<Self> {
        let workspace = Workspace::discover(&cli.workspace)
            .await
            .context("Failed to load workspace")?;
        let file = ConfigFile::load(&workspace.root)
            .await
            .context("Failed to load configuration")?;
        let config = GraphConfig::default().merge(file);

        let fetcher = match &cli.cache_dir {
            Some(dir) => GitFetcher::new(dir),
            None => GitFetcher::with_default_cache(),
        };
        debug!(
            root = %workspace.root.display(),
            module = %workspace.descriptor.module_name,
            cache = %fetcher.cache_dir().display(),
            "loaded workspace"
        );

        let loader = PackageLoader::new(workspace.clone(), Arc::new(TomlFrontend))
            .with_fetcher(Arc::new(fetcher))
            .with_options(config.load_options);

        Ok(Self {
            workspace,
            config: Arc::new(config),
            loader: Arc::new(loader),
            json: cli.json,
        })
    }
}
