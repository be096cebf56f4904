//! Parsing package definitions.
//!
//! The loader is agnostic of the definition syntax; it asks a [`Frontend`].
//! [`TomlFrontend`] reads one `package.toml` per package directory:
//!
//! ```toml
//! [service]
//! framework = "go"
//! imports = ["example.com/app/ext/db"]
//!
//! [[service.instantiate]]
//! name = "cache"
//! constructor = "example.com/app/ext/cache/Cache"
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use sealgraph_schema::{
    Binary, Framework, Function, Ingress, Instantiate, Node, NodeKind, PackageName, Server, Test,
};
use serde::Deserialize;
use tokio::fs;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::module::Location;
use crate::package::{LoadOptions, Package, PackageKind};

/// Name of the definition file inside a package directory.
pub const PACKAGE_FILE: &str = "package.toml";

/// Turns the definition at a location into a [`Package`].
#[async_trait]
pub trait Frontend: Send + Sync {
    async fn parse_package(&self, location: &Location, options: &LoadOptions) -> Result<Package>;

    /// Whether a definition exists at `location`.
    async fn has_package(&self, location: &Location) -> Result<bool>;
}

/// Reads `package.toml` definitions from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlFrontend;

/// Top-level shape of `package.toml`. Exactly one table may be present.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageFile {
    server: Option<ServerDef>,
    service: Option<NodeDef>,
    extension: Option<NodeDef>,
    binary: Option<NamedDef>,
    test: Option<TestDef>,
    function: Option<FunctionDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerDef {
    #[serde(default)]
    name: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    framework: Framework,
    #[serde(default)]
    imports: Vec<PackageName>,
    #[serde(default)]
    instantiate: Vec<Instantiate>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeDef {
    #[serde(default)]
    framework: Framework,
    #[serde(default)]
    imports: Vec<PackageName>,
    #[serde(default)]
    instantiate: Vec<Instantiate>,
    #[serde(default)]
    provides: Vec<Framework>,
    #[serde(default)]
    ingress: Ingress,
    #[serde(default)]
    exported_services: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NamedDef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TestDef {
    name: Option<String>,
    #[serde(default)]
    servers_under_test: Vec<PackageName>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FunctionDef {
    name: Option<String>,
    #[serde(default)]
    runtime: String,
}

impl PackageFile {
    fn into_kind(self, name: &PackageName) -> Result<PackageKind> {
        let default_name = || name.base().to_string();
        let mut kinds = Vec::with_capacity(1);

        if let Some(s) = self.server {
            kinds.push(PackageKind::Server(Server {
                package_name: name.clone(),
                module_name: String::new(),
                name: s.name,
                id: s.id,
                framework: s.framework,
                imports: s.imports,
                instantiate: s.instantiate,
                allocation: Vec::new(),
            }));
        }
        if let Some(n) = self.service {
            kinds.push(PackageKind::Node(n.into_node(name, NodeKind::Service)));
        }
        if let Some(n) = self.extension {
            kinds.push(PackageKind::Node(n.into_node(name, NodeKind::Extension)));
        }
        if let Some(b) = self.binary {
            kinds.push(PackageKind::Binary(Binary {
                package_name: name.clone(),
                name: b.name.unwrap_or_else(default_name),
            }));
        }
        if let Some(t) = self.test {
            kinds.push(PackageKind::Test(Test {
                package_name: name.clone(),
                name: t.name.unwrap_or_else(default_name),
                servers_under_test: t.servers_under_test,
            }));
        }
        if let Some(f) = self.function {
            kinds.push(PackageKind::Function(Function {
                package_name: name.clone(),
                name: f.name.unwrap_or_else(default_name),
                runtime: f.runtime,
            }));
        }

        match kinds.len() {
            1 => Ok(kinds.remove(0)),
            0 => Err(Error::package(
                name,
                format!("{PACKAGE_FILE} defines no server, service, extension, binary, test or function"),
            )),
            _ => Err(Error::package(
                name,
                format!(
                    "{PACKAGE_FILE} defines more than one package: {}",
                    kinds.iter().map(PackageKind::label).collect::<Vec<_>>().join(", ")
                ),
            )),
        }
    }
}

impl NodeDef {
    fn into_node(self, name: &PackageName, kind: NodeKind) -> Node {
        Node {
            package_name: name.clone(),
            kind,
            framework: self.framework,
            imports: self.imports,
            instantiate: self.instantiate,
            provides: self.provides,
            ingress: self.ingress,
            exported_services: self.exported_services,
        }
    }
}

impl TomlFrontend {
    /// Parse a definition file's contents.
    pub fn parse_str(name: &PackageName, content: &str) -> Result<PackageKind> {
        let file: PackageFile = toml::from_str(content)
            .map_err(|e| Error::package(name, format!("{PACKAGE_FILE}: {e}")))?;
        file.into_kind(name)
    }

    /// Regular files directly inside the package directory, relative to the
    /// module root, sorted.
    async fn list_sources(location: &Location) -> Result<Vec<PathBuf>> {
        let dir = location.abs_path();
        let walk_dir = dir.clone();
        let names = tokio::task::spawn_blocking(move || {
            let mut names = Vec::new();
            for entry in WalkDir::new(&walk_dir).min_depth(1).max_depth(1) {
                let entry = entry.map_err(|e| {
                    let path = e.path().unwrap_or(walk_dir.as_path()).to_path_buf();
                    Error::io(&path, std::io::Error::other(e))
                })?;
                if entry.file_type().is_file() {
                    names.push(entry.file_name().to_owned());
                }
            }
            Ok::<_, Error>(names)
        })
        .await
        .map_err(|e| Error::internal(format!("{}: listing sources: {e}", dir.display())))??;

        let mut sources: Vec<PathBuf> = names.into_iter().map(|n| location.rel(n)).collect();
        sources.sort();
        Ok(sources)
    }
}

#[async_trait]
impl Frontend for TomlFrontend {
    async fn parse_package(&self, location: &Location, _options: &LoadOptions) -> Result<Package> {
        let path = location.abs_path().join(PACKAGE_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::package(
                    &location.package_name,
                    format!("no package definition found at {}", path.display()),
                ));
            }
            Err(e) => return Err(Error::io(&path, e)),
        };

        let kind = Self::parse_str(&location.package_name, &content)?;
        let sources = Self::list_sources(location).await?;

        Ok(Package {
            location: location.clone(),
            sources,
            kind,
        })
    }

    async fn has_package(&self, location: &Location) -> Result<bool> {
        let path = location.abs_path().join(PACKAGE_FILE);
        fs::try_exists(&path).await.map_err(|e| Error::io(&path, e))
    }
}
