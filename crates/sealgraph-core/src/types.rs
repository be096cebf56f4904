pub use sealgraph_schema::{
    Allocation, AllocationInstance, Binary, Framework, Function, Ingress, Instantiate,
    ModuleDependency, ModuleReplace, Node, NodeKind, PackageName, Server, StackEntry, Test,
    WorkspaceDescriptor,
};
