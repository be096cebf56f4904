use anyhow::{Result, bail};
use sealgraph_core::allocate;

use crate::Context;
use crate::output::{print_allocations, print_json};

use super::seal::seal_focus;

/// Seal `package`, which must be a server, and print its allocation tree.
pub async fn alloc(ctx: &Context, package: &str) -> Result<()> {
    let mut sealed = seal_focus(ctx, package).await?;
    if sealed.server().is_none() {
        bail!("{package} is not a server: nothing to allocate");
    }

    allocate(ctx.loader.as_ref(), &mut sealed).await?;
    let allocation = sealed
        .server()
        .map(|s| s.allocation.as_slice())
        .unwrap_or_default();

    if ctx.json {
        return print_json(allocation);
    }
    print_allocations(allocation);
    Ok(())
}
