pub mod allocation;
pub mod config;
pub mod error;
pub mod framework;
pub mod frontend;
pub mod io;
pub mod loader;
pub mod module;
pub mod module_cache;
pub mod package;
pub mod paths;
pub mod sealer;
pub mod types;
pub mod workspace;

pub use allocation::{AllocationBuilder, allocate};
pub use config::{ConfigFile, CyclePolicy, GraphConfig};
pub use error::{Error, ErrorKind, Result};
pub use framework::{FrameworkHandler, FrameworkRegistry, ServerExtras};
pub use frontend::{Frontend, TomlFrontend};
pub use io::fetch::{GitFetcher, MissingModuleResolver, ModuleFetcher, RequireDeclaredDependency};
pub use loader::{PackageLoader, Packages, SealedPackages};
pub use module::{LocalModule, Location, Module};
pub use package::{LoadOptions, Package, PackageKind};
pub use paths::*;
pub use sealer::{Sealed, Sealer};
pub use workspace::Workspace;
