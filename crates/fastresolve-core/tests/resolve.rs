//! End-to-end resolution tests against real directory trees.

use async_trait::async_trait;
use bytes::Bytes;
use fastresolve_core::{FileSystem, OnlyPattern, OsFileSystem, Resolver, ResolverOptions};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

/// Filesystem recording how often each operation hits each path.
#[derive(Debug, Default)]
struct CountingFs {
    calls: Mutex<HashMap<(&'static str, PathBuf), usize>>,
}

impl CountingFs {
    fn record(&self, op: &'static str, path: &Path) {
        *self
            .calls
            .lock()
            .unwrap()
            .entry((op, path.to_path_buf()))
            .or_default() += 1;
    }

    fn total(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn max_per_path(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl FileSystem for CountingFs {
    async fn read(&self, path: &Path) -> io::Result<Bytes> {
        self.record("read", path);
        OsFileSystem.read(path).await
    }

    async fn is_file(&self, path: &Path) -> io::Result<bool> {
        self.record("is_file", path);
        OsFileSystem.is_file(path).await
    }

    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        self.record("canonicalize", path);
        OsFileSystem.canonicalize(path).await
    }
}

fn project() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    (dir, root)
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn collecting_resolver(options: ResolverOptions) -> (Resolver, Arc<Mutex<Vec<String>>>) {
    let warnings = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&warnings);
    let resolver = Resolver::builder(options)
        .on_warn(move |msg| sink.lock().unwrap().push(msg.to_string()))
        .build()
        .unwrap();
    (resolver, warnings)
}

#[tokio::test]
async fn test_no_importer_is_never_resolved() {
    let (_dir, root) = project();
    write(&root.join("main.js"), "");
    let resolver = Resolver::new(ResolverOptions::default()).unwrap();

    let absolute = root.join("main.js").to_string_lossy().into_owned();
    for spec in ["./main.js", "lodash", absolute.as_str()] {
        assert!(resolver.resolve(spec, None).await.is_none());
    }
}

#[tokio::test]
async fn test_virtual_marker_is_never_resolved() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    let resolver = Resolver::new(ResolverOptions::default()).unwrap();
    let importer = root.join("src/a.js");

    assert!(resolver.resolve("\0virtual", Some(&importer)).await.is_none());
    assert!(resolver.resolve("./a\0", Some(&importer)).await.is_none());
}

#[tokio::test]
async fn test_repeated_resolution_reuses_io() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    write(
        &root.join("node_modules/lodash/package.json"),
        r#"{"name": "lodash", "main": "lodash.js"}"#,
    );
    write(&root.join("node_modules/lodash/lodash.js"), "");

    let counting = Arc::new(CountingFs::default());
    let resolver = Resolver::builder(ResolverOptions::default())
        .file_system(Arc::clone(&counting) as Arc<dyn FileSystem>)
        .build()
        .unwrap();
    let importer = root.join("src/a.js");

    let first = resolver.resolve("lodash", Some(&importer)).await;
    let io_after_first = counting.total();
    let second = resolver.resolve("lodash", Some(&importer)).await;

    assert_eq!(first, Some(root.join("node_modules/lodash/lodash.js")));
    assert_eq!(first, second);
    assert_eq!(counting.total(), io_after_first);
    assert_eq!(counting.max_per_path(), 1);
}

#[tokio::test]
async fn test_concurrent_resolutions_share_io() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    write(
        &root.join("node_modules/react/package.json"),
        r#"{"main": "index.js"}"#,
    );
    write(&root.join("node_modules/react/index.js"), "");

    let counting = Arc::new(CountingFs::default());
    let resolver = Arc::new(
        Resolver::builder(ResolverOptions::default())
            .file_system(Arc::clone(&counting) as Arc<dyn FileSystem>)
            .build()
            .unwrap(),
    );
    let importer = root.join("src/a.js");

    let tasks = (0..8).map(|_| {
        let resolver = Arc::clone(&resolver);
        let importer = importer.clone();
        tokio::spawn(async move { resolver.resolve("react", Some(&importer)).await })
    });
    let results = futures::future::join_all(tasks).await;

    for result in results {
        assert_eq!(
            result.unwrap(),
            Some(root.join("node_modules/react/index.js"))
        );
    }
    assert_eq!(counting.max_per_path(), 1);
}

#[tokio::test]
async fn test_only_allow_list() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    write(&root.join("node_modules/foo/index.js"), "");
    write(&root.join("node_modules/bar/index.js"), "");
    let resolver = Resolver::new(
        ResolverOptions::default().with_only(vec![OnlyPattern::Regex {
            regex: "^foo$".to_string(),
        }]),
    )
    .unwrap();
    let importer = root.join("src/a.js");

    assert!(resolver.resolve("bar", Some(&importer)).await.is_none());
    assert_eq!(
        resolver.resolve("foo", Some(&importer)).await,
        Some(root.join("node_modules/foo/index.js"))
    );
}

#[tokio::test]
async fn test_jail_confinement() {
    let (_dir, root) = project();
    write(&root.join("project/src/a.js"), "");
    write(&root.join("project/src/inside.js"), "");
    write(&root.join("project/node_modules/dep/index.js"), "");
    let resolver =
        Resolver::new(ResolverOptions::default().with_jail(root.join("project/src/"))).unwrap();
    let importer = root.join("project/src/a.js");

    assert!(resolver.resolve("dep", Some(&importer)).await.is_none());
    assert_eq!(
        resolver.resolve("./inside", Some(&importer)).await,
        Some(root.join("project/src/inside.js"))
    );
}

#[tokio::test]
async fn test_jail_is_a_directory_boundary() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    write(&root.join("src-other/b.js"), "");
    let resolver = Resolver::new(ResolverOptions::default().with_jail(root.join("src"))).unwrap();

    assert!(resolver
        .resolve("../src-other/b", Some(&root.join("src/a.js")))
        .await
        .is_none());
}

#[tokio::test]
async fn test_builtin_preferred_by_default_with_one_warning() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    write(&root.join("src/b.js"), "");
    write(&root.join("node_modules/fs/index.js"), "");
    let (resolver, warnings) = collecting_resolver(ResolverOptions::default());

    assert!(resolver
        .resolve("fs", Some(&root.join("src/a.js")))
        .await
        .is_none());
    assert!(resolver
        .resolve("fs", Some(&root.join("src/b.js")))
        .await
        .is_none());

    let warnings = warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("preferring built-in module 'fs'"));
}

#[tokio::test]
async fn test_builtin_explicitly_preferred_is_silent() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    write(&root.join("node_modules/fs/index.js"), "");
    let (resolver, warnings) =
        collecting_resolver(ResolverOptions::default().with_prefer_builtins(true));

    assert!(resolver
        .resolve("fs", Some(&root.join("src/a.js")))
        .await
        .is_none());
    assert!(warnings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_local_package_when_builtins_not_preferred() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    write(&root.join("node_modules/fs/index.js"), "");
    let (resolver, warnings) =
        collecting_resolver(ResolverOptions::default().with_prefer_builtins(false));

    assert_eq!(
        resolver.resolve("fs", Some(&root.join("src/a.js"))).await,
        Some(root.join("node_modules/fs/index.js"))
    );
    assert!(warnings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_main_field_precedence() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    let pkg = root.join("node_modules/dual");
    write(
        &pkg.join("package.json"),
        r#"{"module": "mod.js", "main": "main.js"}"#,
    );
    write(&pkg.join("mod.js"), "export default 1;");
    write(&pkg.join("main.js"), "module.exports = 1;");
    let importer = root.join("src/a.js");

    let module_first =
        Resolver::new(ResolverOptions::default().with_main_fields(["module", "main"])).unwrap();
    assert_eq!(
        module_first.resolve("dual", Some(&importer)).await,
        Some(pkg.join("mod.js"))
    );

    let main_only = Resolver::new(ResolverOptions::default().with_main_fields(["main"])).unwrap();
    assert_eq!(
        main_only.resolve("dual", Some(&importer)).await,
        Some(pkg.join("main.js"))
    );
}

#[tokio::test]
async fn test_browser_false_yields_empty_module() {
    let (_dir, root) = project();
    let pkg = root.join("node_modules/pkg");
    write(
        &pkg.join("package.json"),
        r#"{"main": "index.js", "browser": {"./foo": false}}"#,
    );
    write(&pkg.join("index.js"), "");
    write(&pkg.join("foo.js"), "");
    write(&root.join("shims/empty.js"), "export default {};");

    let options = ResolverOptions {
        empty_module: Some(root.join("shims/empty.js")),
        ..ResolverOptions::default().with_main_fields(["browser", "module", "main"])
    };
    let resolver = Resolver::new(options).unwrap();

    assert_eq!(
        resolver.resolve("./foo", Some(&pkg.join("index.js"))).await,
        Some(root.join("shims/empty.js"))
    );
}

#[tokio::test]
async fn test_browser_false_for_missing_file_via_importer_cache() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    let pkg = root.join("node_modules/pkg");
    write(
        &pkg.join("package.json"),
        r#"{"main": "index.js", "browser": {"./foo": false}}"#,
    );
    write(&pkg.join("index.js"), "");

    let options = ResolverOptions {
        empty_module: Some(root.join("empty.js")),
        ..ResolverOptions::default().with_main_fields(["browser", "main"])
    };
    let resolver = Resolver::new(options).unwrap();

    let entry = resolver
        .resolve("pkg", Some(&root.join("src/a.js")))
        .await
        .unwrap();
    assert_eq!(
        resolver.resolve("./foo", Some(&entry)).await,
        Some(root.join("empty.js"))
    );

    // The importer cache is dropped with the other caches.
    resolver.invalidate_caches();
    assert!(resolver.resolve("./foo", Some(&entry)).await.is_none());
}

#[tokio::test]
async fn test_vendored_package_ignores_consumer_browser_map() {
    let (_dir, root) = project();
    write(&root.join("src/a.js"), "");
    write(
        &root.join("package.json"),
        r#"{"browser": {"./vendor/dep/util.js": "./shim.js"}}"#,
    );
    write(&root.join("shim.js"), "");
    write(&root.join("vendor/dep/index.js"), "");
    write(&root.join("vendor/dep/util.js"), "");

    let mut custom = serde_json::Map::new();
    custom.insert("moduleDirectory".into(), "vendor".into());
    let options = ResolverOptions {
        custom_resolve_options: custom,
        ..ResolverOptions::default().with_main_fields(["browser", "main"])
    };
    let resolver = Resolver::new(options).unwrap();

    let entry = resolver
        .resolve("dep", Some(&root.join("src/a.js")))
        .await
        .unwrap();
    assert_eq!(entry, root.join("vendor/dep/index.js"));
    assert_eq!(
        resolver.resolve("./util", Some(&entry)).await,
        Some(root.join("vendor/dep/util.js"))
    );
}

#[tokio::test]
async fn test_scoped_package_subpath() {
    let (_dir, root) = project();
    write(&root.join("project/src/a.js"), "");
    write(&root.join("project/node_modules/@scope/pkg/sub.js"), "");
    let resolver = Resolver::new(
        ResolverOptions::default().with_only(vec![OnlyPattern::Exact("@scope/pkg".to_string())]),
    )
    .unwrap();

    assert_eq!(
        resolver
            .resolve("@scope/pkg/sub", Some(&root.join("project/src/a.js")))
            .await,
        Some(root.join("project/node_modules/@scope/pkg/sub.js"))
    );
}

#[tokio::test]
async fn test_invalidate_observes_changed_contents() {
    let (_dir, root) = project();
    write(&root.join("a.js"), "");
    write(&root.join("lib.js"), "module.exports = {};");
    let resolver = Resolver::new(ResolverOptions::default().with_modules_only(true)).unwrap();
    let importer = root.join("a.js");

    assert!(resolver.resolve("./lib", Some(&importer)).await.is_none());

    write(&root.join("lib.js"), "export const answer = 42;");
    // Still served from cache.
    assert!(resolver.resolve("./lib", Some(&importer)).await.is_none());

    resolver.invalidate_caches();
    assert_eq!(
        resolver.resolve("./lib", Some(&importer)).await,
        Some(root.join("lib.js"))
    );
}

#[tokio::test]
async fn test_invalidate_observes_new_files() {
    let (_dir, root) = project();
    write(&root.join("a.js"), "");
    let resolver = Resolver::new(ResolverOptions::default()).unwrap();
    let importer = root.join("a.js");

    assert!(resolver.resolve("./later", Some(&importer)).await.is_none());
    write(&root.join("later.js"), "");
    resolver.invalidate_caches();
    assert_eq!(
        resolver.resolve("./later", Some(&importer)).await,
        Some(root.join("later.js"))
    );
}

#[test]
fn test_conflicting_options_fail_construction() {
    let options = ResolverOptions {
        main: Some(true),
        ..ResolverOptions::default().with_main_fields(["module"])
    };
    assert!(matches!(
        Resolver::new(options),
        Err(fastresolve_core::Error::ConflictingMainFields)
    ));
}
