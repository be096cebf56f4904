//! Loaded packages and their normalization.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use sealgraph_schema::{
    Binary, Function, Ingress, Instantiate, Node, NodeKind, PackageName, Server, Test,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::module::Location;

/// Accepted server ids.
pub const SERVER_ID_PATTERN: &str = "^[0-9a-z]{16,32}$";

/// What a package is. Exactly one shape per package.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageKind {
    Server(Server),
    Node(Node),
    Binary(Binary),
    Test(Test),
    Function(Function),
}

impl PackageKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Server(_) => "server",
            Self::Node(n) if n.is_service() => "service",
            Self::Node(_) => "extension",
            Self::Binary(_) => "binary",
            Self::Test(_) => "test",
            Self::Function(_) => "function",
        }
    }
}

/// A parsed package at a [`Location`].
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub location: Location,
    /// Source files, relative to the module root.
    pub sources: Vec<PathBuf>,
    pub kind: PackageKind,
}

impl Package {
    pub fn name(&self) -> &PackageName {
        &self.location.package_name
    }

    pub fn server(&self) -> Option<&Server> {
        match &self.kind {
            PackageKind::Server(s) => Some(s),
            _ => None,
        }
    }

    pub fn node(&self) -> Option<&Node> {
        match &self.kind {
            PackageKind::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Whether the package is an extension node.
    pub fn is_extension(&self) -> bool {
        self.node().is_some_and(|n| n.kind == NodeKind::Extension)
    }
}

/// Controls how much a load touches beyond the requested package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Also load every provider a node instantiates and check that it is an
    /// extension. Cleared when only listing packages.
    pub load_references: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            load_references: true,
        }
    }
}

/// Stable server id derived from the package name.
pub fn stable_server_id(package: &PackageName) -> String {
    let hash = blake3::hash(package.as_str().as_bytes());
    hash.to_hex().as_str()[..16].to_string()
}

fn server_id_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(SERVER_ID_PATTERN))
        .as_ref()
        .map_err(Error::internal)
}

/// Check a freshly parsed package against the location it was requested at
/// and fill in derived fields.
pub(crate) fn normalize(mut pkg: Package, requested: &Location) -> Result<Package> {
    if pkg.location.package_name != requested.package_name {
        return Err(Error::internal(format!(
            "{}: frontend returned package {}",
            requested.package_name, pkg.location.package_name
        )));
    }

    let name = requested.package_name.clone();
    match &mut pkg.kind {
        PackageKind::Server(server) => normalize_server(server, requested)?,
        PackageKind::Node(node) => normalize_node(node, &name)?,
        PackageKind::Binary(b) => b.package_name = name,
        PackageKind::Test(t) => t.package_name = name,
        PackageKind::Function(f) => f.package_name = name,
    }

    Ok(pkg)
}

fn normalize_server(server: &mut Server, loc: &Location) -> Result<()> {
    let name = &loc.package_name;
    server.package_name = name.clone();
    if server.module_name.is_empty() {
        server.module_name = loc.module_name().to_string();
    }

    if server.name.trim().is_empty() {
        return Err(Error::package(name, "server name is required"));
    }

    server.imports = with_providers(name, &server.instantiate, std::mem::take(&mut server.imports))?;

    if server.id.is_empty() {
        server.id = stable_server_id(name);
    } else if !server_id_pattern()?.is_match(&server.id) {
        return Err(Error::package(
            name,
            format!("invalid server id {:?}: must match {SERVER_ID_PATTERN}", server.id),
        ));
    }

    Ok(())
}

fn normalize_node(node: &mut Node, name: &PackageName) -> Result<()> {
    node.package_name = name.clone();
    node.imports = with_providers(name, &node.instantiate, std::mem::take(&mut node.imports))?;

    if node.kind == NodeKind::Extension {
        if node.ingress != Ingress::Unspecified {
            return Err(Error::package(name, "extensions can't declare ingress"));
        }
        if !node.exported_services.is_empty() {
            return Err(Error::package(name, "extensions can't export services"));
        }
    }

    Ok(())
}

/// Providers referenced by `instantiate`, followed by `declared`, without
/// duplicates.
fn with_providers(
    owner: &PackageName,
    instantiate: &[Instantiate],
    declared: Vec<PackageName>,
) -> Result<Vec<PackageName>> {
    let mut imports: Vec<PackageName> = Vec::with_capacity(declared.len());
    for inst in instantiate {
        let provider = inst.provider_ref().map_err(|e| Error::package(owner, e))?;
        if let Some(pkg) = provider.package {
            if !imports.contains(&pkg) {
                imports.push(pkg);
            }
        }
    }
    for import in declared {
        if !imports.contains(&import) {
            imports.push(import);
        }
    }
    Ok(imports)
}
