#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use sealgraph_core::types::{
    Binary, Framework, Ingress, Instantiate, Node, NodeKind, PackageName, Server,
    WorkspaceDescriptor,
};
use sealgraph_core::{
    Error, Frontend, LoadOptions, Location, Package, PackageKind, PackageLoader, Result, Workspace,
};
use tempfile::TempDir;

pub const MODULE: &str = "example.com/app";

/// Serves package definitions from memory, optionally sleeping a random
/// amount before each parse to shake up task interleavings. Parses are
/// counted once they complete.
#[derive(Default)]
pub struct MemoryFrontend {
    packages: HashMap<PackageName, PackageKind>,
    calls: Mutex<HashMap<PackageName, usize>>,
    max_delay_ms: u64,
    slow: HashMap<PackageName, Duration>,
}

impl MemoryFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delays(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Parse `name` only after sleeping for `delay`.
    pub fn with_slow(mut self, name: &str, delay: Duration) -> Self {
        self.slow.insert(name.into(), delay);
        self
    }

    pub fn add(mut self, name: &str, kind: PackageKind) -> Self {
        self.packages.insert(name.into(), kind);
        self
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Frontend for MemoryFrontend {
    async fn parse_package(&self, location: &Location, _options: &LoadOptions) -> Result<Package> {
        let delay = match self.slow.get(&location.package_name) {
            Some(delay) => *delay,
            None if self.max_delay_ms > 0 => {
                Duration::from_millis(rand::rng().random_range(0..=self.max_delay_ms))
            }
            None => Duration::ZERO,
        };
        tokio::time::sleep(delay).await;

        *self
            .calls
            .lock()
            .unwrap()
            .entry(location.package_name.clone())
            .or_default() += 1;

        let kind = self
            .packages
            .get(&location.package_name)
            .cloned()
            .ok_or_else(|| Error::package(&location.package_name, "no package definition found"))?;

        Ok(Package {
            location: location.clone(),
            sources: vec![],
            kind,
        })
    }

    async fn has_package(&self, location: &Location) -> Result<bool> {
        Ok(self.packages.contains_key(&location.package_name))
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub frontend: Arc<MemoryFrontend>,
    pub loader: Arc<PackageLoader>,
}

pub fn fixture(frontend: MemoryFrontend) -> Fixture {
    fixture_with_options(frontend, LoadOptions::default())
}

pub fn fixture_with_options(frontend: MemoryFrontend, options: LoadOptions) -> Fixture {
    let dir = TempDir::new().unwrap();
    let frontend = Arc::new(frontend);
    let workspace = Workspace {
        root: dir.path().to_path_buf(),
        descriptor: WorkspaceDescriptor {
            module_name: MODULE.into(),
            ..Default::default()
        },
    };
    let loader = Arc::new(PackageLoader::new(workspace, frontend.clone()).with_options(options));
    Fixture {
        dir,
        frontend,
        loader,
    }
}

pub fn names(list: &[&str]) -> Vec<PackageName> {
    list.iter().map(|n| PackageName::new(n)).collect()
}

pub fn server(name: &str, framework: Framework, imports: &[&str]) -> PackageKind {
    PackageKind::Server(Server {
        package_name: name.into(),
        module_name: MODULE.into(),
        name: PackageName::new(name).base().to_string(),
        id: String::new(),
        framework,
        imports: names(imports),
        instantiate: vec![],
        allocation: vec![],
    })
}

pub fn node(kind: NodeKind, name: &str, framework: Framework, imports: &[&str], instantiate: Vec<Instantiate>) -> PackageKind {
    PackageKind::Node(Node {
        package_name: name.into(),
        kind,
        framework,
        imports: names(imports),
        instantiate,
        provides: vec![],
        ingress: Ingress::Unspecified,
        exported_services: vec![],
    })
}

pub fn service(name: &str, framework: Framework, imports: &[&str]) -> PackageKind {
    node(NodeKind::Service, name, framework, imports, vec![])
}

pub fn extension(name: &str, imports: &[&str]) -> PackageKind {
    node(NodeKind::Extension, name, Framework::Unspecified, imports, vec![])
}

/// An extension usable from consumers following `frameworks`.
pub fn provider(name: &str, frameworks: &[Framework], instantiate: Vec<Instantiate>) -> PackageKind {
    let PackageKind::Node(mut ext) = node(NodeKind::Extension, name, Framework::Unspecified, &[], instantiate) else {
        unreachable!("node() builds nodes");
    };
    ext.provides = frameworks.to_vec();
    PackageKind::Node(ext)
}

pub fn binary(name: &str) -> PackageKind {
    PackageKind::Binary(Binary {
        package_name: name.into(),
        name: PackageName::new(name).base().to_string(),
    })
}

pub fn inst(name: &str, constructor: &str) -> Instantiate {
    Instantiate {
        name: name.into(),
        package_name: None,
        constructor: constructor.into(),
    }
}
