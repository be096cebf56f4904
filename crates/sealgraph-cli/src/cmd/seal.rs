use anyhow::{Context as _, Result};
use sealgraph_core::{Sealed, Sealer};
use sealgraph_schema::PackageName;

use crate::Context;
use crate::output::{SealView, print_json, print_sealed};

pub(crate) async fn seal_focus(ctx: &Context, package: &str) -> Result<Sealed> {
    let sealer = Sealer::new(ctx.loader.clone(), ctx.config.clone());
    sealer
        .seal(&PackageName::new(package))
        .await
        .with_context(|| format!("Failed to seal {package}"))
}

/// Seal the closure of `package` and print the ordered graph.
pub async fn seal(ctx: &Context, package: &str) -> Result<()> {
    let sealed = seal_focus(ctx, package).await?;

    if ctx.json {
        return print_json(&SealView::from(&sealed));
    }
    print_sealed(&sealed);
    Ok(())
}
