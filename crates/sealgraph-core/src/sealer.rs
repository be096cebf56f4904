//! Expanding a package's import closure into a sealed, ordered graph.
//!
//! Expansion is concurrent: a coordinator spawns one task per newly seen
//! package name and collects the names each task discovers. Ordering and
//! validation happen afterwards on the complete set, so the result does not
//! depend on which task finished first.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use sealgraph_schema::{Node, PackageName, Server, StackEntry};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CyclePolicy, GraphConfig};
use crate::error::{Error, Result};
use crate::loader::Packages;
use crate::module::Location;
use crate::package::{Package, PackageKind};

/// The outcome of one seal.
#[derive(Debug, Clone)]
pub struct Sealed {
    /// Location of the focus package.
    pub location: Location,
    /// The server, if any, and its nodes ordered dependencies-first.
    pub entry: StackEntry,
    /// Node packages in the same order as `entry.nodes`.
    pub deps: Vec<Arc<Package>>,
    /// The server package as loaded, before its imports were reordered.
    pub parsed_server: Option<Arc<Package>>,
    /// Every package in the closure, sorted by name.
    pub packages: Vec<Arc<Package>>,
    /// `<module>/<path>` of every source file in the closure, sorted.
    pub file_deps: Vec<String>,
}

impl Sealed {
    pub fn server(&self) -> Option<&Server> {
        self.entry.server.as_ref()
    }

    pub fn package(&self, name: &PackageName) -> Option<&Arc<Package>> {
        self.packages.iter().find(|p| p.name() == name)
    }
}

#[derive(Default)]
struct SealState {
    seen: HashSet<PackageName>,
    server: Option<Arc<Package>>,
    /// The server's full include list, in enqueue order.
    server_includes: Vec<PackageName>,
    nodes: Vec<Arc<Package>>,
    parsed: Vec<Arc<Package>>,
}

struct Expansion {
    loader: Arc<dyn Packages>,
    config: Arc<GraphConfig>,
    state: Mutex<SealState>,
    cancel: CancellationToken,
}

impl Expansion {
    fn lock(&self) -> std::sync::MutexGuard<'_, SealState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Seals packages against one loader and configuration.
#[derive(Clone)]
pub struct Sealer {
    loader: Arc<dyn Packages>,
    config: Arc<GraphConfig>,
}

impl Sealer {
    pub fn new(loader: Arc<dyn Packages>, config: Arc<GraphConfig>) -> Self {
        Self { loader, config }
    }

    /// Expand, order and validate the closure of `focus`.
    pub async fn seal(&self, focus: &PackageName) -> Result<Sealed> {
        let expansion = Arc::new(Expansion {
            loader: Arc::clone(&self.loader),
            config: Arc::clone(&self.config),
            state: Mutex::new(SealState::default()),
            cancel: CancellationToken::new(),
        });

        let mut tasks = JoinSet::new();
        enqueue(&expansion, &mut tasks, vec![focus.clone()]);

        let mut first_err: Option<Error> = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined
                .unwrap_or_else(|e| Err(Error::internal(format!("seal task panicked: {e}"))));

            match result {
                Ok(discovered) if first_err.is_none() => {
                    enqueue(&expansion, &mut tasks, discovered);
                }
                Ok(_) => {}
                Err(e) => {
                    if first_err.is_none() {
                        debug!(error = %e, "cancelling seal");
                        expansion.cancel.cancel();
                        first_err = Some(e);
                    } else if !matches!(e, Error::Cancelled) {
                        warn!(error = %e, "additional failure while cancelling seal");
                    }
                }
            }
        }

        if let Some(e) = first_err {
            return Err(e);
        }

        let state = std::mem::take(&mut *expansion.lock());
        let sealed = finish(focus, state, &self.config)?;

        if let Some(server) = sealed.server() {
            if let Some(handler) = self.config.frameworks.get(server.framework) {
                handler.post_parse_server(&sealed).await?;
            }
        }

        info!(
            focus = %focus,
            nodes = sealed.entry.nodes.len(),
            packages = sealed.packages.len(),
            "sealed"
        );
        Ok(sealed)
    }
}

impl std::fmt::Debug for Sealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sealer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn enqueue(
    expansion: &Arc<Expansion>,
    tasks: &mut JoinSet<Result<Vec<PackageName>>>,
    names: Vec<PackageName>,
) {
    let mut state = expansion.lock();
    for name in names {
        if !state.seen.insert(name.clone()) {
            continue;
        }
        debug!(package = %name, "expanding");
        let expansion = Arc::clone(expansion);
        tasks.spawn(async move { expand(&expansion, &name).await });
    }
}

async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        res = fut => res,
    }
}

/// Load and classify one package. Returns the names it pulls into the
/// closure.
async fn expand(expansion: &Expansion, name: &PackageName) -> Result<Vec<PackageName>> {
    let pkg = cancellable(&expansion.cancel, expansion.loader.load_by_name(name)).await?;

    match &pkg.kind {
        PackageKind::Server(server) => {
            let include = server_includes(expansion, &pkg, server).await?;

            let mut state = expansion.lock();
            if let Some(existing) = &state.server {
                return Err(Error::internal(format!(
                    "server already defined: {} and {} are both servers in the same closure",
                    existing.name(),
                    pkg.name()
                )));
            }
            state.server = Some(Arc::clone(&pkg));
            state.server_includes.clone_from(&include);
            state.parsed.push(Arc::clone(&pkg));
            Ok(include)
        }
        PackageKind::Node(node) => {
            let imports = node.imports.clone();
            let mut state = expansion.lock();
            state.nodes.push(Arc::clone(&pkg));
            state.parsed.push(Arc::clone(&pkg));
            Ok(imports)
        }
        PackageKind::Binary(_) | PackageKind::Test(_) | PackageKind::Function(_) => {
            expansion.lock().parsed.push(Arc::clone(&pkg));
            Ok(Vec::new())
        }
    }
}

async fn server_includes(expansion: &Expansion, pkg: &Package, server: &Server) -> Result<Vec<PackageName>> {
    let config = &expansion.config;
    let mut include = Vec::new();

    if let Some(handler) = config.frameworks.get(server.framework) {
        let extras = cancellable(&expansion.cancel, handler.pre_parse_server(&pkg.location)).await?;
        include.extend(extras.include);
    }
    if let Some(additional) = &config.additional_server_deps {
        include.extend(additional(server.framework)?);
    }
    include.extend(server.imports.iter().cloned());
    include.extend(config.static_deps.iter().cloned());

    let mut seen = HashSet::new();
    include.retain(|name| seen.insert(name.clone()));
    Ok(include)
}

fn finish(focus: &PackageName, state: SealState, config: &GraphConfig) -> Result<Sealed> {
    let SealState {
        server,
        server_includes,
        nodes,
        mut parsed,
        ..
    } = state;

    let focus_pkg = parsed
        .iter()
        .find(|p| p.name() == focus)
        .cloned()
        .ok_or_else(|| Error::internal(format!("{focus}: focus package was not loaded")))?;

    let roots: &[PackageName] = match &focus_pkg.kind {
        PackageKind::Server(_) => &server_includes,
        PackageKind::Node(n) => &n.imports,
        _ => &[],
    };

    let graph: HashMap<&PackageName, &[PackageName]> = nodes
        .iter()
        .filter_map(|p| p.node().map(|n| (p.name(), n.imports.as_slice())))
        .collect();

    let order = topological_order(focus, roots, &graph, config.cycles)?;
    let rank: HashMap<&PackageName, usize> = order.iter().enumerate().map(|(i, n)| (n, i + 1)).collect();

    let mut deps = nodes;
    deps.sort_by(|a, b| {
        let ra = rank.get(a.name()).copied().unwrap_or(usize::MAX);
        let rb = rank.get(b.name()).copied().unwrap_or(usize::MAX);
        ra.cmp(&rb).then_with(|| a.name().cmp(b.name()))
    });

    let mut server_def: Option<Server> = server.as_ref().and_then(|p| p.server().cloned());
    if let (Some(srv), PackageKind::Server(_)) = (server_def.as_mut(), &focus_pkg.kind) {
        // Imports of the sealed server are its whole closure, dependencies first.
        srv.imports.clone_from(&order);
    }
    let ordered: Vec<Node> = deps.iter().filter_map(|p| p.node().cloned()).collect();

    if let Some(srv) = &server_def {
        for node in ordered.iter().filter(|n| n.is_service()) {
            if node.framework != srv.framework {
                return Err(Error::internal(format!(
                    "framework mismatch: server {} is {} but service {} is {}",
                    srv.package_name, srv.framework, node.package_name, node.framework
                )));
            }
        }
    }

    parsed.sort_by(|a, b| a.name().cmp(b.name()));
    let mut file_deps: Vec<String> = parsed
        .iter()
        .flat_map(|p| {
            let module = &p.location.module.name;
            p.sources
                .iter()
                .map(move |src| format!("{module}/{}", src.display()))
        })
        .collect();
    file_deps.sort();
    file_deps.dedup();

    Ok(Sealed {
        location: focus_pkg.location.clone(),
        entry: StackEntry {
            server: server_def,
            nodes: ordered,
        },
        deps,
        parsed_server: server,
        packages: parsed,
        file_deps,
    })
}

/// Order `roots` and everything they import, dependencies first.
///
/// `graph` maps each node to its imports; names missing from it are leaves.
fn topological_order(
    focus: &PackageName,
    roots: &[PackageName],
    graph: &HashMap<&PackageName, &[PackageName]>,
    cycles: CyclePolicy,
) -> Result<Vec<PackageName>> {
    struct Walk<'a> {
        graph: &'a HashMap<&'a PackageName, &'a [PackageName]>,
        cycles: CyclePolicy,
        stack: Vec<&'a PackageName>,
        done: HashSet<&'a PackageName>,
        order: Vec<PackageName>,
    }

    impl<'a> Walk<'a> {
        fn visit(&mut self, name: &'a PackageName) -> Result<()> {
            if self.done.contains(name) {
                return Ok(());
            }

            if let Some(start) = self.stack.iter().position(|n| *n == name) {
                return match self.cycles {
                    CyclePolicy::Ignore => {
                        debug!(package = %name, "ignoring import cycle");
                        Ok(())
                    }
                    CyclePolicy::Reject => {
                        let path: Vec<&str> = self.stack[start..]
                            .iter()
                            .map(|n| n.as_str())
                            .chain(std::iter::once(name.as_str()))
                            .collect();
                        Err(Error::bad_input(format!("import cycle: {}", path.join(" -> "))))
                    }
                };
            }

            self.stack.push(name);
            let imports: &'a [PackageName] = self.graph.get(name).copied().unwrap_or(&[]);
            for dep in imports {
                self.visit(dep)?;
            }
            self.stack.pop();

            self.done.insert(name);
            self.order.push(name.clone());
            Ok(())
        }
    }

    let mut walk = Walk {
        graph,
        cycles,
        stack: vec![focus],
        done: HashSet::new(),
        order: Vec::new(),
    };
    for root in roots {
        walk.visit(root)?;
    }
    Ok(walk.order)
}
