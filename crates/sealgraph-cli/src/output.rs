//! Text and JSON rendering of command results.

use anyhow::Result;
use sealgraph_core::{Location, Package, Sealed};
use sealgraph_schema::{Allocation, Node, PackageName, Server};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LocationView {
    pub package: PackageName,
    pub module: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    pub path: String,
    pub dir: String,
}

impl From<&Location> for LocationView {
    fn from(loc: &Location) -> Self {
        Self {
            package: loc.package_name.clone(),
            module: loc.module.name.clone(),
            version: loc.module.version.clone(),
            path: loc.rel_path.clone(),
            dir: loc.abs_path().display().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PackageView {
    pub package: PackageName,
    pub kind: &'static str,
    pub module: String,
    pub imports: Vec<PackageName>,
    pub sources: Vec<String>,
}

impl From<&Package> for PackageView {
    fn from(pkg: &Package) -> Self {
        let imports = match (pkg.server(), pkg.node()) {
            (Some(s), _) => s.imports.clone(),
            (_, Some(n)) => n.imports.clone(),
            _ => Vec::new(),
        };
        Self {
            package: pkg.name().clone(),
            kind: pkg.kind.label(),
            module: pkg.location.module.name.clone(),
            imports,
            sources: pkg.sources.iter().map(|s| s.display().to_string()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SealView<'a> {
    pub focus: &'a PackageName,
    pub server: Option<&'a Server>,
    pub nodes: &'a [Node],
    pub packages: Vec<&'a PackageName>,
    pub file_deps: &'a [String],
}

impl<'a> From<&'a Sealed> for SealView<'a> {
    fn from(sealed: &'a Sealed) -> Self {
        Self {
            focus: &sealed.location.package_name,
            server: sealed.server(),
            nodes: &sealed.entry.nodes,
            packages: sealed.packages.iter().map(|p| p.name()).collect(),
            file_deps: &sealed.file_deps,
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_location(view: &LocationView) {
    if view.version.is_empty() {
        println!("{}  {}  {}", view.package, view.module, view.dir);
    } else {
        println!("{}  {}@{}  {}", view.package, view.module, view.version, view.dir);
    }
}

pub fn print_package(view: &PackageView) {
    println!("{} ({})", view.package, view.kind);
    for import in &view.imports {
        println!("  imports {import}");
    }
}

pub fn print_sealed(sealed: &Sealed) {
    match sealed.server() {
        Some(server) => println!(
            "server {} [{}] id={}",
            server.package_name, server.framework, server.id
        ),
        None => println!("focus {} (no server)", sealed.location.package_name),
    }

    for node in &sealed.entry.nodes {
        println!("  {:<9} {}", node.kind, node.package_name);
    }
    println!(
        "{} package(s), {} source file(s)",
        sealed.packages.len(),
        sealed.file_deps.len()
    );
}

pub fn print_allocations(allocs: &[Allocation]) {
    if allocs.is_empty() {
        println!("no allocations");
        return;
    }
    print_allocation_level(allocs, 0);
}

fn print_allocation_level(allocs: &[Allocation], depth: usize) {
    let indent = "  ".repeat(depth);
    for alloc in allocs {
        for inst in &alloc.instance {
            let names: Vec<&str> = inst.instantiated.iter().map(|i| i.name.as_str()).collect();
            println!(
                "{indent}{}  {}  <- {} [{}]",
                inst.alloc_name,
                inst.package_name,
                inst.instance_owner,
                names.join(", ")
            );
            print_allocation_level(&inst.downstream_allocation, depth + 1);
        }
    }
}
