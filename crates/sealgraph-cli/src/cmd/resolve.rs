use anyhow::Result;
use sealgraph_schema::PackageName;

use crate::Context;
use crate::output::{LocationView, print_json, print_location};

/// Print the location of each package.
pub async fn resolve(ctx: &Context, packages: &[String]) -> Result<()> {
    let mut views = Vec::with_capacity(packages.len());
    for name in packages {
        let loc = ctx.loader.resolve(&PackageName::new(name)).await?;
        views.push(LocationView::from(&loc));
    }

    if ctx.json {
        return print_json(&views);
    }
    for view in &views {
        print_location(view);
    }
    Ok(())
}
