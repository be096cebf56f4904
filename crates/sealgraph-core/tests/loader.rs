mod common;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{MemoryFrontend, extension, fixture, inst, node, provider, service};
use sealgraph_core::types::{Framework, ModuleDependency, NodeKind};
use sealgraph_core::{
    ErrorKind, LoadOptions, LocalModule, ModuleFetcher, PackageLoader, Packages, Result,
    TomlFrontend, Workspace,
};
use tempfile::TempDir;

#[tokio::test]
async fn resolve_is_idempotent() {
    let fx = fixture(MemoryFrontend::new());
    let a = fx.loader.resolve(&"example.com/app/svc/api".into()).await.unwrap();
    let b = fx.loader.resolve(&"example.com/app/svc/api".into()).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.rel_path, "svc/api");
}

#[tokio::test]
async fn concurrent_first_loads_share_one_parse() {
    let fx = fixture(
        MemoryFrontend::new()
            .with_delays(20)
            .add("example.com/app/ext", extension("example.com/app/ext", &[])),
    );

    let mut set = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let loader = fx.loader.clone();
        set.spawn(async move { loader.load_by_name(&"example.com/app/ext".into()).await });
    }

    let mut loaded = Vec::new();
    while let Some(res) = set.join_next().await {
        loaded.push(res.unwrap().unwrap());
    }

    assert_eq!(fx.frontend.calls("example.com/app/ext"), 1);
    assert!(loaded.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[tokio::test]
async fn failed_load_is_shared_and_not_retried() {
    let fx = fixture(MemoryFrontend::new());
    for _ in 0..2 {
        let err = fx.loader.load_by_name(&"example.com/app/none".into()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }
    assert_eq!(fx.frontend.calls("example.com/app/none"), 1);
}

#[tokio::test]
async fn listing_mode_touches_nothing_else() {
    let fx = fixture(
        MemoryFrontend::new()
            .add(
                "example.com/app/api",
                node(
                    NodeKind::Service,
                    "example.com/app/api",
                    Framework::Go,
                    &[],
                    vec![inst("db", "example.com/app/db/Client")],
                ),
            )
            .add("example.com/app/db", provider("example.com/app/db", &[Framework::Go], vec![])),
    );

    let loc = fx.loader.resolve(&"example.com/app/api".into()).await.unwrap();
    fx.loader
        .load_package(&loc, &LoadOptions { load_references: false })
        .await
        .unwrap();
    assert_eq!(fx.frontend.calls("example.com/app/db"), 0);

    fx.loader.load_package(&loc, &LoadOptions::default()).await.unwrap();
    assert_eq!(fx.frontend.calls("example.com/app/db"), 1);
    assert_eq!(fx.frontend.calls("example.com/app/api"), 1);
}

#[tokio::test]
async fn referenced_service_is_rejected() {
    let fx = fixture(
        MemoryFrontend::new()
            .add(
                "example.com/app/api",
                node(
                    NodeKind::Service,
                    "example.com/app/api",
                    Framework::Go,
                    &[],
                    vec![inst("other", "example.com/app/other/Client")],
                ),
            )
            .add("example.com/app/other", service("example.com/app/other", Framework::Go, &[])),
    );

    let err = fx.loader.load_by_name(&"example.com/app/api".into()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);
    assert!(err.to_string().contains("expected an extension"), "{err}");
}

#[tokio::test]
async fn provider_must_support_consumer_framework() {
    let fx = fixture(
        MemoryFrontend::new()
            .add(
                "example.com/app/api",
                node(
                    NodeKind::Service,
                    "example.com/app/api",
                    Framework::Go,
                    &[],
                    vec![inst("db", "example.com/app/db/Client")],
                ),
            )
            .add("example.com/app/db", provider("example.com/app/db", &[Framework::Nodejs], vec![])),
    );

    let err = fx.loader.load_by_name(&"example.com/app/api".into()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadInput);
    let msg = err.to_string();
    for needle in ["example.com/app/api", "example.com/app/db", "GO"] {
        assert!(msg.contains(needle), "{needle} missing from {msg}");
    }

    let loc = fx.loader.resolve(&"example.com/app/api".into()).await.unwrap();
    fx.loader
        .load_package(&loc, &LoadOptions { load_references: false })
        .await
        .unwrap();
}

/// Hands out pre-populated directories instead of cloning.
struct StaticFetcher {
    root: std::path::PathBuf,
    calls: AtomicUsize,
}

#[async_trait]
impl ModuleFetcher for StaticFetcher {
    async fn download(&self, dep: &ModuleDependency) -> Result<LocalModule> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LocalModule {
            module_name: dep.module_name.clone(),
            abs_path: self.root.join(&dep.module_name).join(&dep.version),
            version: dep.version.clone(),
        })
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

async fn disk_loader(descriptor: &str, remote: &Path) -> (TempDir, Arc<StaticFetcher>, PackageLoader) {
    let ws = TempDir::new().unwrap();
    write(ws.path(), "workspace.toml", descriptor);
    let fetcher = Arc::new(StaticFetcher {
        root: remote.to_path_buf(),
        calls: AtomicUsize::new(0),
    });
    let workspace = Workspace::load(ws.path()).await.unwrap();
    let loader = PackageLoader::new(workspace, Arc::new(TomlFrontend)).with_fetcher(fetcher.clone());
    (ws, fetcher, loader)
}

#[tokio::test]
async fn loads_packages_from_fetched_modules() {
    let remote = TempDir::new().unwrap();
    write(remote.path(), "github.com/acme/lib/v1/workspace.toml", "module_name = \"github.com/acme/lib\"\n");
    write(remote.path(), "github.com/acme/lib/v1/ext/db/package.toml", "[extension]\nprovides = [\"go\"]\n");

    let (_ws, fetcher, loader) = disk_loader(
        "module_name = \"example.com/app\"\n\n[[dependency]]\nmodule_name = \"github.com/acme/lib\"\nversion = \"v1\"\n",
        remote.path(),
    )
    .await;

    let pkg = loader.load_by_name(&"github.com/acme/lib/ext/db".into()).await.unwrap();
    assert!(pkg.is_extension());
    assert!(pkg.location.module.is_external());
    assert_eq!(pkg.location.to_string(), "github.com/acme/lib/ext/db@v1");

    loader.load_by_name(&"github.com/acme/lib/ext/db".into()).await.unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    let sealed = loader.seal();
    assert_eq!(sealed.modules.len(), 2);
    let snap = sealed.sources.module("github.com/acme/lib").unwrap();
    assert!(snap.get("ext/db/package.toml").is_some());
}

#[tokio::test]
async fn fetched_module_with_wrong_name_is_internal() {
    let remote = TempDir::new().unwrap();
    write(remote.path(), "github.com/acme/lib/v1/workspace.toml", "module_name = \"github.com/acme/other\"\n");

    let (_ws, _fetcher, loader) = disk_loader(
        "module_name = \"example.com/app\"\n\n[[dependency]]\nmodule_name = \"github.com/acme/lib\"\nversion = \"v1\"\n",
        remote.path(),
    )
    .await;

    let err = loader.resolve(&"github.com/acme/lib/ext".into()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("github.com/acme/other"), "{err}");
}

#[tokio::test]
async fn undeclared_module_is_usage_error() {
    let remote = TempDir::new().unwrap();
    let (_ws, fetcher, loader) = disk_loader("module_name = \"example.com/app\"\n", remote.path()).await;

    let err = loader.resolve(&"github.com/nobody/pkg".into()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(err.to_string().contains("add a dependency entry to workspace.toml and retry"), "{err}");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}
