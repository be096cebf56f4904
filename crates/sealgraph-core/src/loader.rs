//! Resolving package names and loading packages, once each.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use sealgraph_schema::{ModuleDependency, PackageName};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::frontend::Frontend;
use crate::io::fetch::{GitFetcher, MissingModuleResolver, ModuleFetcher, RequireDeclaredDependency};
use crate::io::snapshot::{self, ModuleSnapshot, ModuleSources};
use crate::module::{LocalModule, Location, Module};
use crate::module_cache::ModuleCache;
use crate::package::{self, LoadOptions, Package, PackageKind};
use crate::workspace::Workspace;

/// Name resolution and loading, as seen by the sealer and the allocation
/// builder.
#[async_trait]
pub trait Packages: Send + Sync {
    async fn resolve(&self, name: &PackageName) -> Result<Location>;

    async fn load_by_name(&self, name: &PackageName) -> Result<Arc<Package>>;
}

type Loading = Arc<OnceCell<Result<Arc<Package>>>>;

/// Loads packages of one workspace and everything it depends on.
///
/// Every package is parsed at most once per loader; concurrent first loads
/// of the same name share a single parse.
pub struct PackageLoader {
    workspace_root: PathBuf,
    root: Arc<Module>,
    frontend: Arc<dyn Frontend>,
    fetcher: Arc<dyn ModuleFetcher>,
    missing: Arc<dyn MissingModuleResolver>,
    options: LoadOptions,
    modules: ModuleCache,
    loaded: RwLock<BTreeMap<PackageName, Arc<Package>>>,
    loading: Mutex<HashMap<PackageName, Loading>>,
    snapshots: Mutex<BTreeMap<String, ModuleSnapshot>>,
}

impl PackageLoader {
    pub fn new(workspace: Workspace, frontend: Arc<dyn Frontend>) -> Self {
        let modules = ModuleCache::new();
        let root = modules.inject(workspace.root.clone(), workspace.descriptor, "");

        Self {
            workspace_root: workspace.root,
            root,
            frontend,
            fetcher: Arc::new(GitFetcher::with_default_cache()),
            missing: Arc::new(RequireDeclaredDependency),
            options: LoadOptions::default(),
            modules,
            loaded: RwLock::new(BTreeMap::new()),
            loading: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ModuleFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_missing_module_resolver(mut self, resolver: Arc<dyn MissingModuleResolver>) -> Self {
        self.missing = resolver;
        self
    }

    /// Options used by [`Packages::load_by_name`].
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root_module(&self) -> &Arc<Module> {
        &self.root
    }

    pub fn module_cache(&self) -> &ModuleCache {
        &self.modules
    }

    /// Resolve `name` to the location of the package.
    ///
    /// Names are matched against the workspace module, then its replace
    /// entries, then its dependency entries (longest module name first).
    /// Anything else goes to the missing-module resolver.
    #[instrument(level = "debug", skip_all, fields(package = %name))]
    pub async fn resolve(&self, name: &PackageName) -> Result<Location> {
        if name.is_empty() || name.as_str() == "." {
            return Err(Error::internal(format!("{name:?}: bad package reference")));
        }
        if name.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Err(Error::bad_input(format!(
                "{name:?}: package names can't contain empty, '.' or '..' segments"
            )));
        }

        if let Some(loc) = self.root.location(name) {
            return Ok(loc);
        }

        if let Some((replace, _)) = self.root.descriptor.find_replace(name) {
            let path = self.workspace_root.join(&replace.path);
            debug!(module = %replace.module_name, path = %path.display(), "replaced module");
            let local = LocalModule {
                module_name: replace.module_name.clone(),
                abs_path: path,
                version: String::new(),
            };
            let module = self
                .modules
                .resolve_external(&replace.module_name, || async move { Ok(local) })
                .await?;
            return external_location(&module, name);
        }

        let dep = match self.root.descriptor.find_dependency(name) {
            Some(dep) => dep.clone(),
            None => self.missing.resolve(name).await?,
        };
        self.external(&dep, name).await
    }

    async fn external(&self, dep: &ModuleDependency, name: &PackageName) -> Result<Location> {
        let module = self
            .modules
            .resolve_external(&dep.module_name, || self.fetcher.download(dep))
            .await?;
        external_location(&module, name)
    }

    /// Load the package at `location`, parsing it on first use.
    ///
    /// With `load_references` set, every provider the package instantiates
    /// is loaded too and must be an extension.
    pub async fn load_package(&self, location: &Location, options: &LoadOptions) -> Result<Arc<Package>> {
        let pkg = self.load_cached(location, options).await?;
        if options.load_references {
            self.check_references(&pkg).await?;
        }
        Ok(pkg)
    }

    async fn load_cached(&self, location: &Location, options: &LoadOptions) -> Result<Arc<Package>> {
        let name = &location.package_name;
        if let Some(pkg) = self.get_loaded(name) {
            debug!(package = %name, "package cache hit");
            return Ok(pkg);
        }

        let cell = Arc::clone(
            self.loading
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(name.clone())
                .or_default(),
        );

        cell.get_or_init(|| self.parse(location, options)).await.clone()
    }

    async fn parse(&self, location: &Location, options: &LoadOptions) -> Result<Arc<Package>> {
        debug!(package = %location, "parsing package");

        let pkg = self.frontend.parse_package(location, options).await?;
        let pkg = Arc::new(package::normalize(pkg, location)?);

        let files = snapshot::capture(&location.module.abs_path, &pkg.sources).await?;
        {
            let mut snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
            let snap = snapshots
                .entry(location.module.name.clone())
                .or_insert_with(|| ModuleSnapshot::new(location.module.name.clone()));
            for (rel, file) in files {
                snap.update(rel, file);
            }
        }

        self.loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.package_name.clone(), Arc::clone(&pkg));

        Ok(pkg)
    }

    /// Every provider instantiated by a server or node must be an extension
    /// supporting the consumer's framework.
    async fn check_references(&self, pkg: &Package) -> Result<()> {
        let (instantiate, framework) = match &pkg.kind {
            PackageKind::Server(s) => (&s.instantiate, s.framework),
            PackageKind::Node(n) => (&n.instantiate, n.framework),
            _ => return Ok(()),
        };

        let shallow = LoadOptions {
            load_references: false,
        };
        for inst in instantiate {
            let provider = inst.provider_ref().map_err(|e| Error::package(pkg.name(), e))?;
            let Some(provider) = provider.package else {
                continue;
            };

            let loc = self.resolve(&provider).await?;
            let dep = self.load_cached(&loc, &shallow).await?;
            let Some(ext) = dep.node().filter(|_| dep.is_extension()) else {
                return Err(Error::package(
                    pkg.name(),
                    format!(
                        "instantiate {:?}: {provider} is a {}, expected an extension",
                        inst.name,
                        dep.kind.label()
                    ),
                ));
            };
            if !ext.supports(framework) {
                return Err(Error::package(
                    pkg.name(),
                    format!(
                        "instantiate {:?}: extension {provider} does not support framework {framework}",
                        inst.name
                    ),
                ));
            }
        }

        Ok(())
    }

    fn get_loaded(&self, name: &PackageName) -> Option<Arc<Package>> {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Whether a package definition exists for `name`.
    pub async fn has_package(&self, name: &PackageName) -> Result<bool> {
        let loc = self.resolve(name).await?;
        self.frontend.has_package(&loc).await
    }

    /// Immutable copy of everything loaded so far.
    pub fn seal(&self) -> SealedPackages {
        let packages = self.loaded.read().unwrap_or_else(PoisonError::into_inner).clone();
        let sources = ModuleSources {
            modules: self
                .snapshots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .cloned()
                .collect(),
        };

        SealedPackages {
            modules: self.modules.modules(),
            packages,
            sources,
        }
    }

    pub fn stats(&self) -> LoaderStats {
        let loaded = self.loaded.read().unwrap_or_else(PoisonError::into_inner);
        let mut packages_by_module: BTreeMap<String, Vec<PackageName>> = BTreeMap::new();
        for pkg in loaded.values() {
            packages_by_module
                .entry(pkg.location.module.name.clone())
                .or_default()
                .push(pkg.name().clone());
        }

        LoaderStats {
            packages: loaded.len(),
            modules: self.modules.modules().len(),
            packages_by_module,
        }
    }
}

impl std::fmt::Debug for PackageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageLoader")
            .field("workspace_root", &self.workspace_root)
            .field("root", &self.root.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Packages for PackageLoader {
    async fn resolve(&self, name: &PackageName) -> Result<Location> {
        PackageLoader::resolve(self, name).await
    }

    async fn load_by_name(&self, name: &PackageName) -> Result<Arc<Package>> {
        let loc = PackageLoader::resolve(self, name).await?;
        self.load_package(&loc, &self.options).await
    }
}

fn external_location(module: &Arc<Module>, name: &PackageName) -> Result<Location> {
    module.location(name).ok_or_else(|| {
        Error::internal(format!(
            "{name}: inconsistent module: resolved to {}, which does not contain it",
            module.name
        ))
    })
}

/// Counts of what a loader has loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub packages: usize,
    pub modules: usize,
    pub packages_by_module: BTreeMap<String, Vec<PackageName>>,
}

/// A frozen view of a loader: only what was loaded before [`PackageLoader::seal`].
#[derive(Debug, Clone, Default)]
pub struct SealedPackages {
    pub modules: Vec<Arc<Module>>,
    pub packages: BTreeMap<PackageName, Arc<Package>>,
    pub sources: ModuleSources,
}

impl SealedPackages {
    fn get(&self, name: &PackageName) -> Result<&Arc<Package>> {
        self.packages
            .get(name)
            .ok_or_else(|| Error::internal(format!("{name}: package not loaded")))
    }

    pub fn module(&self, name: &str) -> Option<&Arc<Module>> {
        self.modules.iter().find(|m| m.name == name)
    }
}

#[async_trait]
impl Packages for SealedPackages {
    async fn resolve(&self, name: &PackageName) -> Result<Location> {
        Ok(self.get(name)?.location.clone())
    }

    async fn load_by_name(&self, name: &PackageName) -> Result<Arc<Package>> {
        self.get(name).cloned()
    }
}
