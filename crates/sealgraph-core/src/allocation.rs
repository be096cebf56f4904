//! Building the allocation tree of a sealed server.
//!
//! Every consumer (the server itself, then each node in sealed order) has
//! its instantiate statements grouped by providing package. Each provider
//! becomes one [`AllocationInstance`], and the provider's own statements are
//! allocated beneath it. Names come from a single depth-first counter, so
//! they are stable for an unchanged graph.

use std::collections::BTreeMap;

use futures::future::{BoxFuture, FutureExt};
use sealgraph_schema::{Allocation, AllocationInstance, Instantiate, Node, PackageName, Server};
use tracing::debug;

use crate::error::{Error, Result};
use crate::loader::Packages;
use crate::sealer::Sealed;

/// Mints allocation names and walks providers. One builder per server.
pub struct AllocationBuilder<'a> {
    loader: &'a dyn Packages,
    next: usize,
}

impl<'a> AllocationBuilder<'a> {
    pub fn new(loader: &'a dyn Packages) -> Self {
        Self { loader, next: 0 }
    }

    fn alloc_name(&mut self, parent: &str) -> String {
        let n = self.next;
        self.next += 1;
        if parent.is_empty() {
            n.to_string()
        } else {
            format!("{parent}.{n}")
        }
    }

    /// Allocations for `server` and the nodes sealed with it.
    pub async fn build(&mut self, server: &Server, nodes: &[Node]) -> Result<Vec<Allocation>> {
        let mut allocs = Vec::new();

        let consumers = std::iter::once((&server.package_name, server.instantiate.as_slice()))
            .chain(nodes.iter().map(|n| (&n.package_name, n.instantiate.as_slice())));

        for (owner, instantiate) in consumers {
            let mut chain = vec![owner.clone()];
            if let Some(alloc) = self.visit(owner, instantiate, "", &mut chain).await? {
                allocs.push(alloc);
            }
        }

        Ok(allocs)
    }

    /// Allocation for one consumer's statements, or `None` when none of them
    /// needs a provider.
    fn visit<'b>(
        &'b mut self,
        owner: &'b PackageName,
        instantiate: &'b [Instantiate],
        parent: &'b str,
        chain: &'b mut Vec<PackageName>,
    ) -> BoxFuture<'b, Result<Option<Allocation>>> {
        async move {
            let mut per_provider: BTreeMap<PackageName, Vec<Instantiate>> = BTreeMap::new();
            for inst in instantiate {
                let provider = inst.provider_ref().map_err(|e| Error::package(owner, e))?;
                if let Some(pkg) = provider.package {
                    per_provider.entry(pkg).or_default().push(inst.clone());
                }
            }

            if per_provider.is_empty() {
                return Ok(None);
            }

            let mut alloc = Allocation::default();
            for (provider, instantiated) in per_provider {
                if chain.contains(&provider) {
                    let path: Vec<&str> = chain
                        .iter()
                        .map(PackageName::as_str)
                        .chain(std::iter::once(provider.as_str()))
                        .collect();
                    return Err(Error::bad_input(format!(
                        "instantiation cycle: {}",
                        path.join(" -> ")
                    )));
                }

                let pkg = self.loader.load_by_name(&provider).await?;
                let Some(node) = pkg.node() else {
                    return Err(Error::bad_input(format!(
                        "{owner}: cannot instantiate from {provider}: it is a {}, not a node",
                        pkg.kind.label()
                    )));
                };

                let alloc_name = self.alloc_name(parent);
                debug!(owner = %owner, provider = %provider, %alloc_name, "allocating");

                chain.push(provider.clone());
                let downstream = self
                    .visit(&node.package_name, &node.instantiate, &alloc_name, chain)
                    .await?;
                chain.pop();

                alloc.instance.push(AllocationInstance {
                    instance_owner: owner.clone(),
                    package_name: provider,
                    instantiated,
                    alloc_name,
                    downstream_allocation: downstream.into_iter().collect(),
                });
            }

            Ok(Some(alloc))
        }
        .boxed()
    }
}

impl std::fmt::Debug for AllocationBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationBuilder")
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

/// Build the allocation tree of the sealed server, if there is one, and
/// store it on the server.
pub async fn allocate(loader: &dyn Packages, sealed: &mut Sealed) -> Result<()> {
    let Some(server) = sealed.entry.server.as_ref() else {
        return Ok(());
    };

    let allocation = AllocationBuilder::new(loader)
        .build(server, &sealed.entry.nodes)
        .await?;

    if let Some(server) = sealed.entry.server.as_mut() {
        server.allocation = allocation;
    }
    Ok(())
}
