//! The dependency-injection tree derived from instantiation statements.

use serde::{Deserialize, Serialize};

use crate::graph::Instantiate;
use crate::types::PackageName;

/// One consumer's set of provider instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// One instance per distinct provider package, ordered by package name.
    pub instance: Vec<AllocationInstance>,
}

/// A provider package instantiated on behalf of one consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationInstance {
    /// The consumer that declared the statements.
    pub instance_owner: PackageName,
    /// The providing package.
    pub package_name: PackageName,
    /// Statements this provider satisfies for the owner.
    pub instantiated: Vec<Instantiate>,
    /// Stable dotted-decimal name, unique within one tree.
    pub alloc_name: String,
    /// Allocations the provider itself needs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downstream_allocation: Vec<Allocation>,
}

/// Depth-first walk over every instance in `allocs`, parents before children.
pub fn walk<'a>(allocs: &'a [Allocation], visit: &mut impl FnMut(&'a AllocationInstance)) {
    for alloc in allocs {
        for inst in &alloc.instance {
            visit(inst);
            walk(&inst.downstream_allocation, visit);
        }
    }
}

/// All allocation names in depth-first order.
pub fn alloc_names(allocs: &[Allocation]) -> Vec<&str> {
    let mut names = Vec::new();
    walk(allocs, &mut |inst| names.push(inst.alloc_name.as_str()));
    names
}
