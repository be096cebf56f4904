//! Names, framework tags and other small shared types.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// A hierarchical, slash-delimited package name such as
/// `example.com/app/ext/cache`.
///
/// The leading segments usually name the module the package lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name, trimming surrounding whitespace and any
    /// trailing slash.
    pub fn new(name: &str) -> Self {
        Self(name.trim().trim_end_matches('/').to_string())
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name is empty (never a valid package reference).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the path of this package relative to `parent`, if `parent` is
    /// the package itself (`"."`) or one of its ancestors.
    ///
    /// ```
    /// use sealgraph_schema::PackageName;
    ///
    /// let name = PackageName::new("example.com/app/ext/db");
    /// assert_eq!(name.relative_to("example.com/app"), Some("ext/db"));
    /// assert_eq!(name.relative_to("example.com/app/ext/db"), Some("."));
    /// assert_eq!(name.relative_to("example.com/ap"), None);
    /// ```
    pub fn relative_to(&self, parent: &str) -> Option<&str> {
        if self.0 == parent {
            return Some(".");
        }

        self.0
            .strip_prefix(parent)?
            .strip_prefix('/')
            .filter(|rel| !rel.is_empty())
    }

    /// The last path segment (`db` for `example.com/app/ext/db`).
    pub fn base(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

/// The code-generation and runtime convention a server or node follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// No framework declared.
    #[default]
    Unspecified,
    /// Go services and servers.
    Go,
    /// Static web frontends.
    Web,
    /// Node.js services and servers.
    Nodejs,
    /// Opaque containers with no generated glue.
    Opaque,
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Unspecified => "FRAMEWORK_UNSPECIFIED",
            Self::Go => "GO",
            Self::Web => "WEB",
            Self::Nodejs => "NODEJS",
            Self::Opaque => "OPAQUE",
        };
        f.write_str(label)
    }
}

/// Whether a node is a service (serves requests, framework-bound) or an
/// extension (a reusable provider of instantiable values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Exposes an endpoint inside a server.
    Service,
    /// Provides values to other nodes through instantiation statements.
    Extension,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service => f.write_str("service"),
            Self::Extension => f.write_str("extension"),
        }
    }
}

/// Ingress exposure requested by a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ingress {
    /// No ingress requested.
    #[default]
    Unspecified,
    /// Reachable only from within the deployment.
    Private,
    /// Exposed to the internet.
    Internet,
}
