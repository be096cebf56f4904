mod common;

use std::sync::Arc;

use common::{MemoryFrontend, binary, fixture, fixture_with_options, inst, node, provider};
use sealgraph_core::types::{Framework, Instantiate, NodeKind, Server};
use sealgraph_core::{ErrorKind, GraphConfig, LoadOptions, PackageKind, Sealer, allocate};
use sealgraph_schema::allocation::alloc_names;

fn server_with(name: &str, imports: &[&str], instantiate: Vec<Instantiate>) -> PackageKind {
    PackageKind::Server(Server {
        package_name: name.into(),
        module_name: common::MODULE.into(),
        name: "server".into(),
        id: String::new(),
        framework: Framework::Go,
        imports: common::names(imports),
        instantiate,
        allocation: vec![],
    })
}

fn shared_provider_graph() -> MemoryFrontend {
    MemoryFrontend::new()
        .with_delays(3)
        .add(
            "example.com/app/server",
            server_with("example.com/app/server", &["example.com/app/api", "example.com/app/admin"], vec![]),
        )
        .add(
            "example.com/app/api",
            node(
                NodeKind::Service,
                "example.com/app/api",
                Framework::Go,
                &[],
                vec![
                    inst("conn", "example.com/app/pool/Conn"),
                    inst("timeout", "Duration"),
                ],
            ),
        )
        .add(
            "example.com/app/admin",
            node(
                NodeKind::Service,
                "example.com/app/admin",
                Framework::Go,
                &[],
                vec![
                    inst("ro", "example.com/app/pool/ReadOnly"),
                    inst("audit", "example.com/app/audit/Log"),
                ],
            ),
        )
        .add(
            "example.com/app/pool",
            provider(
                "example.com/app/pool",
                &[Framework::Go],
                vec![inst("creds", "example.com/app/secrets/Store")],
            ),
        )
        .add(
            "example.com/app/secrets",
            node(NodeKind::Extension, "example.com/app/secrets", Framework::Unspecified, &[], vec![]),
        )
        .add("example.com/app/audit", provider("example.com/app/audit", &[Framework::Go], vec![]))
}

async fn sealed_allocation(frontend: MemoryFrontend) -> sealgraph_core::Result<Vec<sealgraph_core::types::Allocation>> {
    allocation_with(fixture(frontend)).await
}

/// Seals the server, then allocates against the frozen loader so that every
/// provider must already be part of the sealed closure.
async fn allocation_with(fx: common::Fixture) -> sealgraph_core::Result<Vec<sealgraph_core::types::Allocation>> {
    let mut sealed = Sealer::new(fx.loader.clone(), Arc::new(GraphConfig::default()))
        .seal(&"example.com/app/server".into())
        .await?;
    let frozen = fx.loader.seal();
    allocate(&frozen, &mut sealed).await?;
    Ok(sealed.server().map(|s| s.allocation.clone()).unwrap_or_default())
}

#[tokio::test]
async fn shared_provider_gets_one_instance_per_consumer() {
    let allocs = sealed_allocation(shared_provider_graph()).await.unwrap();

    // Sealed order: secrets, pool, api, audit, admin. pool allocates
    // secrets for itself ("0") before api and admin are visited.
    let api = allocs
        .iter()
        .find(|a| a.instance[0].instance_owner == "example.com/app/api")
        .unwrap();
    let admin = allocs
        .iter()
        .find(|a| a.instance[0].instance_owner == "example.com/app/admin")
        .unwrap();

    let api_pool = &api.instance[0];
    assert_eq!(api_pool.package_name, "example.com/app/pool");
    assert_eq!(api_pool.instantiated.len(), 1);
    assert_eq!(api_pool.instantiated[0].name, "conn");

    let admin_pool = admin
        .instance
        .iter()
        .find(|i| i.package_name == "example.com/app/pool")
        .unwrap();
    assert_eq!(admin_pool.instantiated[0].name, "ro");
    assert_eq!(api_pool.alloc_name, "1");
    assert_eq!(admin_pool.alloc_name, "4");

    let nested = &api_pool.downstream_allocation[0].instance[0];
    assert_eq!(nested.package_name, "example.com/app/secrets");
    assert_eq!(nested.instance_owner, "example.com/app/pool");
    assert_eq!(nested.alloc_name, "1.2");
}

#[tokio::test]
async fn names_are_unique_and_stable() {
    let first = sealed_allocation(shared_provider_graph()).await.unwrap();
    let second = sealed_allocation(shared_provider_graph()).await.unwrap();
    assert_eq!(first, second);

    let names = alloc_names(&first);
    let mut unique = names.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
    assert_eq!(names[0], "0");
}

#[tokio::test]
async fn server_statements_come_first() {
    let frontend = MemoryFrontend::new()
        .add(
            "example.com/app/server",
            server_with(
                "example.com/app/server",
                &["example.com/app/api"],
                vec![inst("tracer", "example.com/app/trace/Tracer")],
            ),
        )
        .add(
            "example.com/app/api",
            node(NodeKind::Service, "example.com/app/api", Framework::Go, &[], vec![inst("t", "example.com/app/trace/Tracer")]),
        )
        .add("example.com/app/trace", provider("example.com/app/trace", &[Framework::Go], vec![]));

    let allocs = sealed_allocation(frontend).await.unwrap();
    assert_eq!(allocs.len(), 2);
    assert_eq!(allocs[0].instance[0].instance_owner, "example.com/app/server");
    assert_eq!(allocs[0].instance[0].alloc_name, "0");
    assert_eq!(allocs[1].instance[0].instance_owner, "example.com/app/api");
    assert_eq!(allocs[1].instance[0].alloc_name, "1");
}

#[tokio::test]
async fn instantiation_cycle_is_rejected() {
    let frontend = MemoryFrontend::new()
        .add(
            "example.com/app/server",
            server_with("example.com/app/server", &[], vec![inst("a", "example.com/app/a/A")]),
        )
        .add(
            "example.com/app/a",
            provider("example.com/app/a", &[Framework::Go], vec![inst("b", "example.com/app/b/B")]),
        )
        .add(
            "example.com/app/b",
            node(NodeKind::Extension, "example.com/app/b", Framework::Unspecified, &[], vec![inst("a", "example.com/app/a/A")]),
        );

    let fx = fixture(frontend);
    let config = GraphConfig {
        cycles: sealgraph_core::CyclePolicy::Ignore,
        ..GraphConfig::default()
    };
    let mut sealed = Sealer::new(fx.loader.clone(), Arc::new(config))
        .seal(&"example.com/app/server".into())
        .await
        .unwrap();
    let err = allocate(&fx.loader.seal(), &mut sealed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);
    assert!(err.to_string().contains("instantiation cycle"), "{err}");
}

#[tokio::test]
async fn non_node_provider_is_rejected() {
    let frontend = MemoryFrontend::new()
        .add(
            "example.com/app/server",
            server_with("example.com/app/server", &["example.com/app/tool"], vec![inst("t", "example.com/app/tool/Tool")]),
        )
        .add("example.com/app/tool", binary("example.com/app/tool"));

    // Reference checks would reject the binary at load time.
    let fx = fixture_with_options(frontend, LoadOptions { load_references: false });
    let err = allocation_with(fx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);
    assert!(err.to_string().contains("not a node"), "{err}");
}

#[tokio::test]
async fn builtin_only_consumers_allocate_nothing() {
    let frontend = MemoryFrontend::new()
        .add("example.com/app/server", server_with("example.com/app/server", &["example.com/app/api"], vec![]))
        .add(
            "example.com/app/api",
            node(NodeKind::Service, "example.com/app/api", Framework::Go, &[], vec![inst("d", "Duration")]),
        );

    assert!(sealed_allocation(frontend).await.unwrap().is_empty());
}

#[tokio::test]
async fn server_providers_join_the_sealed_closure() {
    let frontend = MemoryFrontend::new()
        .add(
            "example.com/app/server",
            server_with("example.com/app/server", &[], vec![inst("p", "example.com/app/p/P")]),
        )
        .add("example.com/app/p", provider("example.com/app/p", &[Framework::Go], vec![]));

    let fx = fixture(frontend);
    let mut sealed = Sealer::new(fx.loader.clone(), Arc::new(GraphConfig::default()))
        .seal(&"example.com/app/server".into())
        .await
        .unwrap();
    assert!(sealed.entry.has_node(&"example.com/app/p".into()));

    allocate(&fx.loader.seal(), &mut sealed).await.unwrap();
    let allocs = &sealed.server().unwrap().allocation;
    assert_eq!(allocs.len(), 1);
    assert_eq!(allocs[0].instance[0].package_name, "example.com/app/p");
    assert_eq!(allocs[0].instance[0].alloc_name, "0");
}

#[tokio::test]
async fn server_providers_must_be_extensions() {
    let frontend = MemoryFrontend::new()
        .add(
            "example.com/app/server",
            server_with("example.com/app/server", &[], vec![inst("t", "example.com/app/tool/Tool")]),
        )
        .add("example.com/app/tool", binary("example.com/app/tool"));

    let err = sealed_allocation(frontend).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);
    assert!(err.to_string().contains("expected an extension"), "{err}");
}
