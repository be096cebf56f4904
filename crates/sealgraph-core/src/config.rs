//! Sealing configuration.
//!
//! [`GraphConfig`] is built once by the caller and handed to the sealer. The
//! optional `sealgraph.toml` at the workspace root contributes the parts that
//! can be written down as data.

use std::path::Path;
use std::sync::Arc;

use sealgraph_schema::{Framework, PackageName};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::{Error, Result};
use crate::framework::FrameworkRegistry;
use crate::package::LoadOptions;

/// File name of the optional configuration file.
pub const CONFIG_FILE: &str = "sealgraph.toml";

/// What to do when the import graph loops back on itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Fail the seal, naming the cycle.
    #[default]
    Reject,
    /// Skip the back-edge and order the rest.
    Ignore,
}

/// Extra dependencies for every server of a framework.
pub type AdditionalServerDeps =
    Arc<dyn Fn(Framework) -> Result<Vec<PackageName>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct GraphConfig {
    pub frameworks: FrameworkRegistry,
    /// Dependencies every server gets, regardless of framework.
    pub static_deps: Vec<PackageName>,
    pub additional_server_deps: Option<AdditionalServerDeps>,
    pub cycles: CyclePolicy,
    pub load_options: LoadOptions,
}

impl GraphConfig {
    /// Overlay the settings from a configuration file.
    pub fn merge(mut self, file: ConfigFile) -> Self {
        self.static_deps.extend(file.static_deps);
        if let Some(cycles) = file.cycles {
            self.cycles = cycles;
        }
        if let Some(load_references) = file.load_references {
            self.load_options.load_references = load_references;
        }
        self
    }

    pub fn with_additional_server_deps(
        mut self,
        f: impl Fn(Framework) -> Result<Vec<PackageName>> + Send + Sync + 'static,
    ) -> Self {
        self.additional_server_deps = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("frameworks", &self.frameworks)
            .field("static_deps", &self.static_deps)
            .field(
                "additional_server_deps",
                &self.additional_server_deps.as_ref().map(|_| ".."),
            )
            .field("cycles", &self.cycles)
            .field("load_options", &self.load_options)
            .finish()
    }
}

/// Contents of `sealgraph.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Packages added to every server's closure.
    #[serde(default)]
    pub static_deps: Vec<PackageName>,
    pub cycles: Option<CyclePolicy>,
    pub load_references: Option<bool>,
}

impl ConfigFile {
    /// Load `sealgraph.toml` from `root`. A missing file yields the defaults.
    pub async fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file");
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::io(&path, e)),
        };

        Self::parse(&content).map_err(|e| Error::bad_input(format!("{}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
