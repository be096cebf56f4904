//! sealgraph - package graph resolver
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Resolves the import closure of a package in a workspace, seals it into an
//! ordered graph and derives the server's allocation tree.
//!
//! # Workspace Layout
//!
//! ```text
//! my-app/
//! ├── workspace.toml    # module_name, [[dependency]], [[replace]]
//! ├── sealgraph.toml    # optional: static_deps, cycles, load_references
//! ├── server/
//! │   └── package.toml  # [server]
//! └── ext/db/
//!     └── package.toml  # [extension]
//! ```

pub mod cmd;
pub mod context;
pub mod output;

pub use context::Context;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sealgraph")]
#[command(author, version, about = "sealgraph - resolve and seal package graphs")]
pub struct Cli {
    /// Directory inside the workspace to operate on
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Where fetched modules are cached
    #[arg(long, global = true, env = "SEALGRAPH_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show where packages live
    Resolve {
        /// Package name(s)
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Load packages without following their references
    List {
        /// Package name(s)
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Seal the import closure of a package
    Seal {
        /// Focus package
        package: String,
    },
    /// Seal a server and print its allocation tree
    Alloc {
        /// Server package
        package: String,
    },
}
