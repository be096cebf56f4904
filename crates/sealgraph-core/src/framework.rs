use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sealgraph_schema::{Framework, PackageName};

use crate::error::Result;
use crate::module::Location;
use crate::sealer::Sealed;

/// Packages a framework needs alongside every server it handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerExtras {
    pub include: Vec<PackageName>,
}

/// Per-framework hooks run while sealing a server.
#[async_trait]
pub trait FrameworkHandler: Send + Sync {
    /// Called when a server of this framework is loaded, before its imports
    /// are expanded.
    async fn pre_parse_server(&self, _location: &Location) -> Result<ServerExtras> {
        Ok(ServerExtras::default())
    }

    /// Called once the seal is complete. An error fails the seal.
    async fn post_parse_server(&self, _sealed: &Sealed) -> Result<()> {
        Ok(())
    }
}

/// Framework handlers, keyed by framework.
#[derive(Clone, Default)]
pub struct FrameworkRegistry {
    handlers: HashMap<Framework, Arc<dyn FrameworkHandler>>,
}

impl FrameworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, framework: Framework, handler: Arc<dyn FrameworkHandler>) {
        self.handlers.insert(framework, handler);
    }

    pub fn with(mut self, framework: Framework, handler: Arc<dyn FrameworkHandler>) -> Self {
        self.register(framework, handler);
        self
    }

    pub fn get(&self, framework: Framework) -> Option<&Arc<dyn FrameworkHandler>> {
        self.handlers.get(&framework)
    }
}

impl std::fmt::Debug for FrameworkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut frameworks: Vec<String> = self.handlers.keys().map(ToString::to_string).collect();
        frameworks.sort();
        f.debug_struct("FrameworkRegistry")
            .field("frameworks", &frameworks)
            .finish()
    }
}
