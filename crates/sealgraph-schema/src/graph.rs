//! Package shapes that make up a sealed graph.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allocation::Allocation;
use crate::types::{Framework, Ingress, NodeKind, PackageName};

/// Errors raised while interpreting an [`Instantiate`] statement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstantiateError {
    /// The statement names no constructor at all.
    #[error("instantiate {name:?}: missing constructor")]
    MissingConstructor {
        /// Name of the offending statement.
        name: String,
    },

    /// The constructor is not of the form `Type` or `package/path/Type`.
    #[error("instantiate {name:?}: don't know how to build type {constructor:?}")]
    Malformed {
        /// Name of the offending statement.
        name: String,
        /// The constructor as written.
        constructor: String,
    },
}

/// A declared instantiation: "build a value of this type, provided by that
/// package, and hand it to me under this name".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instantiate {
    /// Name under which the consumer receives the value.
    pub name: String,
    /// Explicit provider package. Overrides any package path embedded in
    /// the constructor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<PackageName>,
    /// Type reference: a bare builtin type (`Duration`) or a provider-qualified
    /// one (`example.com/app/ext/pool/Pool`).
    pub constructor: String,
}

/// The provider a statement resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRef {
    /// Providing package, or `None` for builtin types.
    pub package: Option<PackageName>,
    /// Type to construct.
    pub type_name: String,
}

impl Instantiate {
    /// Parse the constructor into a [`ProviderRef`].
    ///
    /// # Errors
    ///
    /// Returns [`InstantiateError`] when the constructor is empty or not a
    /// recognizable type reference.
    pub fn provider_ref(&self) -> Result<ProviderRef, InstantiateError> {
        let constructor = self.constructor.trim();
        if constructor.is_empty() {
            return Err(InstantiateError::MissingConstructor {
                name: self.name.clone(),
            });
        }

        let malformed = || InstantiateError::Malformed {
            name: self.name.clone(),
            constructor: self.constructor.clone(),
        };

        if constructor.contains(char::is_whitespace) {
            return Err(malformed());
        }

        let (embedded, type_name) = match constructor.rsplit_once('/') {
            Some((pkg, ty)) if !pkg.is_empty() && !ty.is_empty() => (Some(pkg), ty),
            Some(_) => return Err(malformed()),
            None => (None, constructor),
        };

        let package = self
            .package_name
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| embedded.map(PackageName::new));

        Ok(ProviderRef {
            package,
            type_name: type_name.to_string(),
        })
    }
}

/// A service or extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Fully qualified package name.
    pub package_name: PackageName,
    /// Service or extension.
    pub kind: NodeKind,
    /// Framework the node's code follows; binding only for services.
    #[serde(default)]
    pub framework: Framework,
    /// Packages this node depends on. After loading this also contains the
    /// providers referenced by `instantiate`.
    #[serde(default)]
    pub imports: Vec<PackageName>,
    /// Declared instantiation statements.
    #[serde(default)]
    pub instantiate: Vec<Instantiate>,
    /// Frameworks an extension supports. A consumer that follows a
    /// framework can only instantiate extensions listing it.
    #[serde(default)]
    pub provides: Vec<Framework>,
    /// Requested ingress (services only).
    #[serde(default)]
    pub ingress: Ingress,
    /// Exported service names (services only).
    #[serde(default)]
    pub exported_services: Vec<String>,
}

impl Node {
    /// Whether this node is a service.
    pub fn is_service(&self) -> bool {
        self.kind == NodeKind::Service
    }

    /// Whether a consumer following `framework` may instantiate this node.
    /// Consumers without a framework accept any provider.
    pub fn supports(&self, framework: Framework) -> bool {
        framework == Framework::Unspecified || self.provides.contains(&framework)
    }
}

/// The deploy-time root of a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// Fully qualified package name.
    pub package_name: PackageName,
    /// Module the server lives in.
    pub module_name: String,
    /// Human-facing server name.
    pub name: String,
    /// Stable identifier, `[0-9a-z]{16,32}`.
    pub id: String,
    /// Framework every embedded service must share.
    pub framework: Framework,
    /// Declared imports.
    #[serde(default)]
    pub imports: Vec<PackageName>,
    /// Declared instantiation statements.
    #[serde(default)]
    pub instantiate: Vec<Instantiate>,
    /// Derived allocation tree; empty until allocations are built.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocation: Vec<Allocation>,
}

/// A standalone binary target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binary {
    /// Fully qualified package name.
    pub package_name: PackageName,
    /// Binary name.
    pub name: String,
}

/// A test target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    /// Fully qualified package name.
    pub package_name: PackageName,
    /// Test name.
    pub name: String,
    /// Servers the test runs against.
    #[serde(default)]
    pub servers_under_test: Vec<PackageName>,
}

/// A function target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Fully qualified package name.
    pub package_name: PackageName,
    /// Function name.
    pub name: String,
    /// Runtime identifier, e.g. `nodejs18`.
    #[serde(default)]
    pub runtime: String,
}

/// The sealed stack: at most one server plus its nodes, in dependency order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackEntry {
    /// The stack's server, if the closure contained one.
    pub server: Option<Server>,
    /// Services and extensions, ordered dependencies-first.
    pub nodes: Vec<Node>,
}

impl StackEntry {
    /// Declared imports of `package`, which may be the server or any node.
    /// Unknown packages have no imports.
    pub fn imports_of(&self, package: &PackageName) -> &[PackageName] {
        if let Some(server) = self.server.as_ref().filter(|s| &s.package_name == package) {
            return &server.imports;
        }

        self.nodes
            .iter()
            .find(|n| &n.package_name == package)
            .map(|n| n.imports.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `package` is one of the stack's nodes.
    pub fn has_node(&self, package: &PackageName) -> bool {
        self.nodes.iter().any(|n| &n.package_name == package)
    }

    /// Package names of the stack's nodes, in order.
    pub fn node_names(&self) -> Vec<&PackageName> {
        self.nodes.iter().map(|n| &n.package_name).collect()
    }
}
