//! Domain-specific errors for resolution, loading and sealing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sealgraph_schema::PackageName;
use thiserror::Error;

/// Broad classification of an [`Error`], for callers that branch on the
/// kind of failure rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Misconfiguration with an actionable remedy.
    Usage,
    /// Malformed input data.
    BadInput,
    /// A structural invariant was violated.
    Internal,
    /// An external tool or the network failed.
    Invocation,
    /// The work was abandoned because a sibling task failed.
    Cancelled,
}

/// Errors produced by the core. `Clone` so that a single failed load can be
/// handed to every caller that was waiting on it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("{message}\n  hint: {remedy}")]
    Usage { message: String, remedy: String },

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error("{package}: {message}")]
    Package {
        package: PackageName,
        message: String,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn usage(remedy: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Usage {
            message: message.to_string(),
            remedy: remedy.into(),
        }
    }

    pub fn bad_input(message: impl std::fmt::Display) -> Self {
        Self::BadInput(message.to_string())
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        Self::Internal(message.to_string())
    }

    pub fn invocation(message: impl std::fmt::Display) -> Self {
        Self::Invocation(message.to_string())
    }

    /// A user error attributed to `package`.
    pub fn package(package: &PackageName, message: impl std::fmt::Display) -> Self {
        Self::Package {
            package: package.clone(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source: Arc::new(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage { .. } => ErrorKind::Usage,
            Self::BadInput(_) | Self::Package { .. } => ErrorKind::BadInput,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Invocation(_) | Self::Io { .. } => ErrorKind::Invocation,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
