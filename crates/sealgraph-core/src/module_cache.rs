use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use sealgraph_schema::WorkspaceDescriptor;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::module::{LocalModule, Module};
use crate::workspace::{load_descriptor, not_a_workspace};

type Inflight = Arc<OnceCell<Result<Arc<Module>>>>;

/// Registry of the modules known to one run.
///
/// Modules are registered once and never replaced. The first request for an
/// unknown external module runs its fetch; concurrent requests for the same
/// name wait on that fetch and see its outcome, failures included.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: RwLock<BTreeMap<String, Arc<Module>>>,
    inflight: Mutex<HashMap<String, Inflight>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module rooted at `abs_path`. A non-empty `version` marks it
    /// as external.
    pub fn inject(
        &self,
        abs_path: PathBuf,
        descriptor: WorkspaceDescriptor,
        version: &str,
    ) -> Arc<Module> {
        let module = Arc::new(Module {
            name: descriptor.module_name.clone(),
            abs_path,
            version: version.to_string(),
            descriptor,
        });

        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(module.name.clone(), Arc::clone(&module));

        module
    }

    pub fn get(&self, module_name: &str) -> Option<Arc<Module>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module_name)
            .cloned()
    }

    /// Return the module named `module_name`, running `fetch` to obtain a
    /// local copy if it is not registered yet.
    ///
    /// The fetched copy must carry a descriptor declaring the same module
    /// name.
    pub async fn resolve_external<F, Fut>(&self, module_name: &str, fetch: F) -> Result<Arc<Module>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LocalModule>>,
    {
        if let Some(module) = self.get(module_name) {
            debug!(module = module_name, "module cache hit");
            return Ok(module);
        }

        let cell = Arc::clone(
            self.inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(module_name.to_string())
                .or_default(),
        );

        cell.get_or_init(|| async {
            let local = fetch().await?;
            self.register_fetched(module_name, local).await
        })
        .await
        .clone()
    }

    async fn register_fetched(&self, requested: &str, local: LocalModule) -> Result<Arc<Module>> {
        let descriptor = load_descriptor(&local.abs_path)
            .await?
            .ok_or_else(|| not_a_workspace(&local.abs_path))?;

        if descriptor.module_name != requested {
            return Err(Error::internal(format!(
                "{}: inconsistent module definition: expected {requested:?}, descriptor declares {:?}",
                local.abs_path.display(),
                descriptor.module_name
            )));
        }

        info!(
            module = requested,
            version = %local.version,
            path = %local.abs_path.display(),
            "registered module"
        );
        Ok(self.inject(local.abs_path, descriptor, &local.version))
    }

    /// Registered modules, sorted by name.
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
