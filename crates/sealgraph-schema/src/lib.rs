//! Shared types for the sealgraph package graph.
//!
//! Everything in this crate is plain data: names, package shapes, the sealed
//! stack entry and the allocation tree. Loading, resolution and sealing live
//! in `sealgraph-core`.

pub mod allocation;
pub mod graph;
pub mod types;
pub mod workspace;

// Re-exports
pub use allocation::{Allocation, AllocationInstance};
pub use graph::{
    Binary, Function, Instantiate, InstantiateError, Node, ProviderRef, Server, StackEntry, Test,
};
pub use types::*;
pub use workspace::{ModuleDependency, ModuleReplace, WORKSPACE_FILE, WorkspaceDescriptor};
