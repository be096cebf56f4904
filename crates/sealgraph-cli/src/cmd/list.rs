use anyhow::Result;
use sealgraph_core::LoadOptions;
use sealgraph_schema::PackageName;

use crate::Context;
use crate::output::{PackageView, print_json, print_package};

/// Load each package on its own, without touching what it references.
pub async fn list(ctx: &Context, packages: &[String]) -> Result<()> {
    let options = LoadOptions {
        load_references: false,
    };

    let mut views = Vec::with_capacity(packages.len());
    for name in packages {
        let loc = ctx.loader.resolve(&PackageName::new(name)).await?;
        let pkg = ctx.loader.load_package(&loc, &options).await?;
        views.push(PackageView::from(pkg.as_ref()));
    }

    if ctx.json {
        return print_json(&views);
    }
    for view in &views {
        print_package(view);
    }
    Ok(())
}
