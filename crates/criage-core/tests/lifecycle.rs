//! End-to-end lifecycle tests against a mocked registry serving real
//! `tar.zst` archives.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use criage_core::io::{ArchiveService, CreateArchive, TarArchiver};
use criage_core::ops::{
    BuildRequest, InstallOutcome, InstallRequest, PublishRequest, UpdateOutcome,
};
use criage_core::registry::RegistryError;
use criage_core::{Config, NullReporter, OpsError, PackageManager};
use criage_schema::{ArchiveFormat, PackageInfo, PackageMetadata, Platform, Repository};
use mockito::{Mock, Server, ServerGuard};
use serde_json::json;
use sha2::{Digest, Sha256};
use tempfile::{TempDir, tempdir};

/// Isolated install roots, cache and temp space.
struct TestContext {
    dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            dir: tempdir().expect("failed to create temp dir"),
        }
    }

    fn path(&self, sub: &str) -> PathBuf {
        self.dir.path().join(sub)
    }

    fn config(&self, repositories: Vec<Repository>) -> Config {
        Config {
            global_path: self.path("global"),
            local_path: self.path("local"),
            cache_path: self.path("cache"),
            temp_path: self.path("tmp"),
            repositories,
            ..Config::default()
        }
    }

    fn manager(&self, repositories: Vec<Repository>) -> PackageManager {
        PackageManager::new(self.config(repositories), Arc::new(NullReporter)).unwrap()
    }
}

fn manifest(name: &str, version: &str, extra: &str) -> String {
    format!("name = \"{name}\"\nversion = \"{version}\"\nfiles = [\"bin/*\", \"README.md\"]\n{extra}")
}

/// Pack a small package tree and return the archive bytes.
fn package_archive(manifest: &str) -> Vec<u8> {
    let src = tempdir().unwrap();
    fs::write(src.path().join("criage.toml"), manifest).unwrap();
    fs::create_dir_all(src.path().join("bin")).unwrap();
    fs::write(src.path().join("bin/tool"), "#!/bin/sh\necho tool\n").unwrap();
    fs::write(src.path().join("README.md"), "# fixture\n").unwrap();
    fs::write(src.path().join("notes.txt"), "not installed").unwrap();

    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("pkg.tar.zst");
    TarArchiver
        .create_with_metadata(&CreateArchive {
            source_dir: src.path(),
            output: &out,
            format: ArchiveFormat::TarZst,
            level: 3,
            include: &[],
            exclude: &[],
            metadata: &PackageMetadata::default(),
        })
        .unwrap();
    fs::read(out).unwrap()
}

fn checksum(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

fn package_body(name: &str, versions: &[(&str, &str)]) -> String {
    let platform = Platform::current();
    let versions: Vec<_> = versions
        .iter()
        .map(|(version, sum)| {
            json!({
                "version": version,
                "files": [{
                    "os": platform.os,
                    "arch": platform.arch,
                    "format": "tar.zst",
                    "filename": format!("{name}-{version}.tar.zst"),
                    "checksum": sum,
                }]
            })
        })
        .collect();
    json!({"success": true, "data": {"name": name, "versions": versions}}).to_string()
}

/// Serve `name` with one archive per `(version, manifest extra)`.
async fn serve(server: &mut ServerGuard, name: &str, versions: &[(&str, &str)]) -> Vec<Mock> {
    let mut mocks = Vec::new();
    let mut listed = Vec::new();
    for (version, extra) in versions {
        let bytes = package_archive(&manifest(name, version, extra));
        listed.push((*version, checksum(&bytes)));
        mocks.push(
            server
                .mock("GET", format!("/api/v1/download/{name}/{version}/{name}-{version}.tar.zst").as_str())
                .with_status(200)
                .with_body(bytes)
                .create_async()
                .await,
        );
    }
    let listed: Vec<(&str, &str)> = listed.iter().map(|(v, s)| (*v, s.as_str())).collect();
    mocks.push(
        server
            .mock("GET", format!("/api/v1/packages/{name}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(package_body(name, &listed))
            .create_async()
            .await,
    );
    mocks
}

fn read_record(info: &PackageInfo) -> PackageInfo {
    serde_json::from_str(&fs::read_to_string(info.record_path()).unwrap()).unwrap()
}

fn leftover_install_dirs(ctx: &TestContext) -> usize {
    fs::read_dir(ctx.path("tmp"))
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with("install_"))
                .count()
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn test_install_materializes_and_records() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let _mocks = serve(&mut server, "foo", &[("1.0.0", "description = \"Foo tool\"")]).await;
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    let outcome = pm.install(&InstallRequest::new("foo")).await.unwrap();
    let InstallOutcome::Installed(info) = outcome else {
        panic!("expected a fresh install");
    };

    assert_eq!(info.version, "1.0.0");
    assert_eq!(info.description, "Foo tool");
    assert_eq!(info.install_path, ctx.path("local").join("foo"));
    assert!(info.install_path.join("bin/tool").exists());
    assert!(info.install_path.join("README.md").exists());
    assert!(info.install_path.join("criage.toml").exists());
    assert!(!info.install_path.join("notes.txt").exists());
    assert!(info.size > 0);

    // On-disk record and in-memory entry agree.
    assert_eq!(read_record(&info), info);
    assert_eq!(pm.info("foo", false).unwrap(), info);

    // The downloaded archive and the scratch directory are gone.
    assert!(!ctx.path("cache").join("foo/1.0.0/foo-1.0.0.tar.zst").exists());
    assert_eq!(leftover_install_dirs(&ctx), 0);

    // A fresh manager sees the same package.
    let reloaded = ctx.manager(vec![]);
    assert_eq!(reloaded.info("foo", false).unwrap(), info);
}

#[tokio::test]
async fn test_reinstall_is_noop() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let bytes = package_archive(&manifest("foo", "1.0.0", ""));
    let sum = checksum(&bytes);
    let lookup = server
        .mock("GET", "/api/v1/packages/foo")
        .with_status(200)
        .with_body(package_body("foo", &[("1.0.0", &sum)]))
        .expect(1)
        .create_async()
        .await;
    let download = server
        .mock("GET", "/api/v1/download/foo/1.0.0/foo-1.0.0.tar.zst")
        .with_status(200)
        .with_body(bytes)
        .expect(1)
        .create_async()
        .await;
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    pm.install(&InstallRequest::new("foo")).await.unwrap();
    let again = pm.install(&InstallRequest::new("foo")).await.unwrap();
    assert!(matches!(again, InstallOutcome::AlreadyInstalled(_)));

    let pinned = InstallRequest {
        version: Some("1.0.0".into()),
        ..InstallRequest::new("foo")
    };
    assert!(matches!(
        pm.install(&pinned).await.unwrap(),
        InstallOutcome::AlreadyInstalled(_)
    ));

    lookup.assert_async().await;
    download.assert_async().await;
}

#[tokio::test]
async fn test_latest_version_is_last_listed() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let _mocks = serve(&mut server, "foo", &[("1.0.0", ""), ("1.1.0", ""), ("2.0.0", "")]).await;
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    let latest = pm.install(&InstallRequest::new("foo")).await.unwrap();
    assert_eq!(latest.info().version, "2.0.0");

    let pinned = InstallRequest {
        version: Some("1.1.0".into()),
        global: true,
        ..InstallRequest::new("foo")
    };
    let old = pm.install(&pinned).await.unwrap();
    assert_eq!(old.info().version, "1.1.0");
    assert_eq!(old.info().install_path, ctx.path("global").join("foo"));

    // Scopes are independent.
    assert_eq!(pm.info("foo", false).unwrap().version, "2.0.0");
    assert_eq!(pm.info("foo", true).unwrap().version, "1.1.0");
}

#[tokio::test]
async fn test_repositories_consulted_by_priority() {
    let ctx = TestContext::new();
    let mut high = Server::new_async().await;
    let mut mid = Server::new_async().await;
    let mut low = Server::new_async().await;

    let high_miss = high
        .mock("GET", "/api/v1/packages/foo")
        .with_status(404)
        .with_body("no such package")
        .expect(1)
        .create_async()
        .await;
    let _mid_mocks = serve(&mut mid, "foo", &[("3.0.0", "")]).await;
    let low_unused = low
        .mock("GET", "/api/v1/packages/foo")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let pm = ctx.manager(vec![
        Repository::new("low", &low.url(), 10),
        Repository::new("high", &high.url(), 50),
        Repository::new("mid", &mid.url(), 30),
    ]);
    let outcome = pm.install(&InstallRequest::new("foo")).await.unwrap();
    assert_eq!(outcome.info().version, "3.0.0");

    high_miss.assert_async().await;
    low_unused.assert_async().await;
}

#[tokio::test]
async fn test_missing_everywhere_is_not_found() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/api/v1/packages/ghost")
        .with_status(404)
        .with_body(r#"{"success": false, "error": "package not found"}"#)
        .create_async()
        .await;
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    let err = pm.install(&InstallRequest::new("ghost")).await.unwrap_err();
    match err {
        OpsError::Registry(RegistryError::NotFound { name, reason }) => {
            assert_eq!(name, "ghost");
            assert!(reason.contains("package not found"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(pm.store().is_empty());
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_nothing_behind() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let bytes = package_archive(&manifest("foo", "1.0.0", ""));
    let wrong = checksum(b"something else");
    let _lookup = server
        .mock("GET", "/api/v1/packages/foo")
        .with_status(200)
        .with_body(package_body("foo", &[("1.0.0", &wrong)]))
        .create_async()
        .await;
    let _download = server
        .mock("GET", "/api/v1/download/foo/1.0.0/foo-1.0.0.tar.zst")
        .with_status(200)
        .with_body(bytes)
        .create_async()
        .await;
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    let err = pm.install(&InstallRequest::new("foo")).await.unwrap_err();
    assert!(matches!(
        err.root_cause(),
        OpsError::Registry(RegistryError::ChecksumMismatch { .. })
    ));
    assert!(err.to_string().contains("download foo"), "{err}");
    let cached = ctx.path("cache").join("foo/1.0.0");
    assert_eq!(fs::read_dir(&cached).unwrap().count(), 0);
    assert!(!ctx.path("local").join("foo").exists());
}

#[tokio::test]
async fn test_failing_pre_install_hook_aborts_cleanly() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let hooks = "[hooks]\npre_install = [\"test -f criage.toml\", \"exit 3\"]\n";
    let _mocks = serve(&mut server, "foo", &[("1.0.0", hooks)]).await;
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    let err = pm.install(&InstallRequest::new("foo")).await.unwrap_err();
    assert!(matches!(err.root_cause(), OpsError::Hook(_)), "unexpected: {err:?}");
    assert!(err.to_string().contains("pre-install hooks of foo"), "{err}");
    assert!(err.to_string().contains("exit 3"));

    assert!(!ctx.path("local").join("foo").exists());
    assert!(pm.store().get("foo", false).is_none());
    assert!(!ctx.path("cache").join("foo/1.0.0/foo-1.0.0.tar.zst").exists());
    assert_eq!(leftover_install_dirs(&ctx), 0);
}

#[tokio::test]
async fn test_post_install_hook_failure_is_not_fatal() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let hooks = "[hooks]\npost_install = [\"touch installed.marker\", \"false\"]\n";
    let _mocks = serve(&mut server, "foo", &[("1.0.0", hooks)]).await;
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    let info = pm.install(&InstallRequest::new("foo")).await.unwrap();
    // Post-install hooks run inside the install directory.
    assert!(info.info().install_path.join("installed.marker").exists());
    assert!(pm.store().contains("foo"));
}

#[tokio::test]
async fn test_dependencies_installed_first() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let mut mocks = serve(&mut server, "lib", &[("0.3.0", ""), ("0.4.0", "")]).await;
    mocks.extend(serve(&mut server, "util", &[("1.0.0", ""), ("1.1.0", "")]).await);
    mocks.extend(serve(&mut server, "tool", &[("0.1.0", "")]).await);
    mocks.extend(
        serve(
            &mut server,
            "app",
            &[(
                "1.0.0",
                "[dependencies]\nlib = \"0.3.0\"\nutil = \"^1\"\n\n[dev_dependencies]\ntool = \"*\"\n",
            )],
        )
        .await,
    );
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    pm.install(&InstallRequest::new("app")).await.unwrap();
    let app = pm.info("app", false).unwrap();
    let lib = pm.info("lib", false).unwrap();
    // An exact requirement is honoured; a range takes the latest.
    assert_eq!(lib.version, "0.3.0");
    assert_eq!(pm.info("util", false).unwrap().version, "1.1.0");
    assert!(lib.install_date <= app.install_date);
    assert_eq!(app.dependencies.get("lib").map(String::as_str), Some("0.3.0"));
    // Dev dependencies only with `dev`.
    assert!(pm.info("tool", false).is_err());

    let dev = InstallRequest {
        force: true,
        dev: true,
        ..InstallRequest::new("app")
    };
    pm.install(&dev).await.unwrap();
    assert!(pm.info("tool", false).is_ok());
}

#[tokio::test]
async fn test_dependency_cycle_detected() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let mut mocks = serve(&mut server, "a", &[("1.0.0", "[dependencies]\nb = \"1.0.0\"\n")]).await;
    mocks.extend(serve(&mut server, "b", &[("1.0.0", "[dependencies]\na = \"*\"\n")]).await);
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    match pm.install(&InstallRequest::new("a")).await {
        Err(OpsError::DependencyCycle(chain)) => assert_eq!(chain, "a -> b -> a"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(pm.store().is_empty());
    assert_eq!(leftover_install_dirs(&ctx), 0);
}

#[tokio::test]
async fn test_uninstall_runs_hooks_and_removes_everything() {
    let ctx = TestContext::new();
    let markers = ctx.path("markers");
    fs::create_dir_all(&markers).unwrap();
    let hooks = format!(
        "[hooks]\npre_remove = [\"test -f criage.toml && touch {0}/pre\"]\npost_remove = [\"touch {0}/post\"]\n",
        markers.display()
    );
    let mut server = Server::new_async().await;
    let _mocks = serve(&mut server, "foo", &[("1.0.0", &hooks)]).await;
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    let installed = pm.install(&InstallRequest::new("foo")).await.unwrap();
    let path = installed.info().install_path.clone();

    let removed = pm.uninstall("foo", false, false).await.unwrap();
    assert_eq!(removed.version, "1.0.0");
    assert!(!path.exists());
    assert!(pm.info("foo", false).is_err());
    assert!(markers.join("pre").exists());
    assert!(markers.join("post").exists());

    // Nothing comes back on reload.
    assert!(ctx.manager(vec![]).store().is_empty());
}

#[tokio::test]
async fn test_uninstall_unknown_touches_nothing() {
    let ctx = TestContext::new();
    let pm = ctx.manager(vec![]);
    let bystander = ctx.path("local").join("bystander");
    fs::create_dir_all(&bystander).unwrap();
    fs::write(bystander.join("file"), "keep").unwrap();

    let err = pm.uninstall("bystander", false, true).await.unwrap_err();
    assert!(matches!(err, OpsError::NotInstalled(ref n) if n == "bystander"));
    assert_eq!(fs::read_to_string(bystander.join("file")).unwrap(), "keep");
}

#[tokio::test]
async fn test_update_moves_to_latest() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let _mocks = serve(&mut server, "foo", &[("1.0.0", ""), ("2.0.0", "")]).await;
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);

    let old = InstallRequest {
        version: Some("1.0.0".into()),
        ..InstallRequest::new("foo")
    };
    pm.install(&old).await.unwrap();

    let outdated = pm.list(false, true).await;
    assert_eq!(outdated.len(), 1);

    let outcome = pm.update("foo", false).await.unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            from: "1.0.0".into(),
            to: "2.0.0".into()
        }
    );
    let info = pm.info("foo", false).unwrap();
    assert_eq!(info.version, "2.0.0");
    assert_eq!(read_record(&info).version, "2.0.0");

    assert!(matches!(
        pm.update("foo", false).await.unwrap(),
        UpdateOutcome::UpToDate { .. }
    ));
    assert!(pm.list(false, true).await.is_empty());
    assert!(matches!(
        pm.update("bar", false).await,
        Err(OpsError::NotInstalled(_))
    ));
}

#[tokio::test]
async fn test_update_all_collects_failures() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let mut mocks = serve(&mut server, "good", &[("1.0.0", "")]).await;
    mocks.extend(serve(&mut server, "gone", &[("1.0.0", "")]).await);
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);
    pm.install(&InstallRequest::new("good")).await.unwrap();
    pm.install(&InstallRequest::new("gone")).await.unwrap();
    pm.close();

    // A registry that no longer knows "gone".
    let mut later = Server::new_async().await;
    let _good = serve(&mut later, "good", &[("1.0.0", "")]).await;
    let _gone = later
        .mock("GET", "/api/v1/packages/gone")
        .with_status(404)
        .create_async()
        .await;
    let pm = ctx.manager(vec![Repository::new("main", &later.url(), 1)]);

    let summary = pm.update_all().await;
    assert_eq!(summary.up_to_date.len(), 1);
    assert!(summary.updated.is_empty());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "gone");
    assert!(!summary.is_success());
}

#[tokio::test]
async fn test_list_is_scoped_and_sorted() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let mut mocks = Vec::new();
    for name in ["zeta", "alpha", "mid"] {
        mocks.extend(serve(&mut server, name, &[("1.0.0", "")]).await);
    }
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 1)]);
    for name in ["zeta", "alpha"] {
        pm.install(&InstallRequest::new(name)).await.unwrap();
    }
    let global = InstallRequest {
        global: true,
        ..InstallRequest::new("mid")
    };
    pm.install(&global).await.unwrap();

    let local: Vec<String> = pm
        .list(false, false)
        .await
        .into_iter()
        .map(|p| p.name.to_string())
        .collect();
    assert_eq!(local, vec!["alpha", "zeta"]);
    let global: Vec<String> = pm
        .list(true, false)
        .await
        .into_iter()
        .map(|p| p.name.to_string())
        .collect();
    assert_eq!(global, vec!["mid"]);
}

#[tokio::test]
async fn test_search_skips_failing_repository() {
    let ctx = TestContext::new();
    let mut good = Server::new_async().await;
    let mut bad = Server::new_async().await;
    let _hits = good
        .mock("GET", "/api/v1/search")
        .match_query(mockito::Matcher::UrlEncoded("q".into(), "json".into()))
        .with_status(200)
        .with_body(
            r#"{"success": true, "data": {"results": [
                {"name": "low", "version": "1.0.0", "score": 0.2},
                {"name": "high", "version": "1.0.0", "score": 0.9}
            ]}}"#,
        )
        .create_async()
        .await;
    let _broken = bad
        .mock("GET", "/api/v1/search")
        .match_query(mockito::Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let pm = ctx.manager(vec![
        Repository::new("broken", &bad.url(), 10),
        Repository::new("good", &good.url(), 1),
    ]);
    let results = pm.search("json").await;
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["high", "low"]);
    assert!(results.iter().all(|r| r.repository == "good"));
}

fn write_build_manifest(dir: &Path, script: &str) {
    fs::write(
        dir.join("criage-build.toml"),
        format!(
            "name = \"demo\"\nversion = \"1.0.0\"\nbuild_script = \"{script}\"\ninclude_files = [\"*\"]\nexclude_files = [\"*.log\"]\n"
        ),
    )
    .unwrap();
}

#[tokio::test]
async fn test_create_build_and_inspect() {
    let ctx = TestContext::new();
    let pm = ctx.manager(vec![]);

    let work = ctx.path("work");
    fs::create_dir_all(&work).unwrap();
    let root = pm
        .create_package(&work, "demo", "Jane Doe", "A demo package")
        .unwrap();
    assert!(root.join("README.md").exists());
    assert!(root.join("src").is_dir() && root.join("bin").is_dir() && root.join("docs").is_dir());
    assert!(pm.create_package(&work, "demo", "", "").is_err());

    write_build_manifest(&root, "echo built > bin/out.txt");
    fs::write(root.join("build.log"), "noise").unwrap();

    let out = pm
        .build(&BuildRequest {
            source_dir: root.clone(),
            ..BuildRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(out.path, root.join("demo-1.0.0.criage"));
    assert_eq!(out.format, ArchiveFormat::TarZst);
    assert!(root.join("bin/out.txt").exists());

    let meta = pm.archive_metadata(&out.path).await.unwrap();
    let manifest = meta.package_manifest.unwrap();
    assert_eq!(manifest.name, "demo");
    assert_eq!(manifest.author, "Jane Doe");
    assert_eq!(meta.build_manifest.unwrap().build_script, "echo built > bin/out.txt");
    assert_eq!(meta.compression_type, "tar.zst");

    let unpacked = tempdir().unwrap();
    TarArchiver
        .extract(&out.path, unpacked.path(), ArchiveFormat::TarZst)
        .unwrap();
    assert!(unpacked.path().join("bin/out.txt").exists());
    assert!(!unpacked.path().join("build.log").exists());
}

#[tokio::test]
async fn test_build_without_manifest_fails() {
    let ctx = TestContext::new();
    let pm = ctx.manager(vec![]);
    let empty = tempdir().unwrap();
    let err = pm
        .build(&BuildRequest {
            source_dir: empty.path().to_path_buf(),
            ..BuildRequest::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::ManifestNotFound(_)));
}

#[tokio::test]
async fn test_failing_build_script_is_terminal() {
    let ctx = TestContext::new();
    let pm = ctx.manager(vec![]);
    let work = ctx.path("work");
    fs::create_dir_all(&work).unwrap();
    let root = pm.create_package(&work, "demo", "", "").unwrap();
    write_build_manifest(&root, "exit 7");

    let err = pm
        .build(&BuildRequest {
            source_dir: root.clone(),
            ..BuildRequest::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::BuildScript(_)));
    assert!(!root.join("demo-1.0.0.criage").exists());
}

#[tokio::test]
async fn test_publish_uploads_and_cleans_up() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let upload = server
        .mock("POST", "/api/v1/upload")
        .match_header("authorization", "Bearer tok")
        .match_header(
            "content-type",
            mockito::Matcher::Regex("multipart/form-data".into()),
        )
        .with_status(201)
        .with_body(r#"{"success": true, "message": "uploaded"}"#)
        .expect(1)
        .create_async()
        .await;

    let mut configured = Repository::new("main", &server.url(), 1);
    configured.auth_token = Some("tok".into());
    let pm = ctx.manager(vec![configured]);

    let work = ctx.path("work");
    fs::create_dir_all(&work).unwrap();
    let root = pm.create_package(&work, "demo", "", "").unwrap();
    write_build_manifest(&root, "");

    let (name, version) = pm
        .publish(&PublishRequest {
            source_dir: root,
            ..PublishRequest::default()
        })
        .await
        .unwrap();
    assert_eq!((name.as_str(), version.as_str()), ("demo", "1.0.0"));
    upload.assert_async().await;
    assert!(!ctx.path("tmp").join("demo-1.0.0.tar.zst").exists());
}

#[tokio::test]
async fn test_publish_rejected_upload_is_terminal() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let _upload = server
        .mock("POST", "/api/v1/upload")
        .with_status(401)
        .create_async()
        .await;
    let pm = ctx.manager(vec![]);

    let work = ctx.path("work");
    fs::create_dir_all(&work).unwrap();
    let root = pm.create_package(&work, "demo", "", "").unwrap();
    write_build_manifest(&root, "");

    let err = pm
        .publish(&PublishRequest {
            source_dir: root,
            registry_url: Some(server.url()),
            token: Some("bad".into()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::Registry(RegistryError::Unauthorized)));
    assert!(!ctx.path("tmp").join("demo-1.0.0.tar.zst").exists());
}

#[tokio::test]
async fn test_repository_selection() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let _stats = server
        .mock("GET", "/api/v1/stats")
        .with_status(200)
        .with_body(r#"{"success": true, "data": {"totalPackages": 7}}"#)
        .create_async()
        .await;
    let pm = ctx.manager(vec![
        Repository::new("mirror", "http://127.0.0.1:9", 1),
        Repository::new("main", &server.url(), 5),
    ]);

    assert_eq!(pm.repository(None).unwrap().name, "main");
    assert_eq!(pm.repository(Some("mirror")).unwrap().priority, 1);
    assert_eq!(pm.repository(Some("https://elsewhere.example")).unwrap().name, "adhoc");
    assert!(matches!(
        pm.repository(Some("nope")),
        Err(OpsError::UnknownRepository(_))
    ));

    assert_eq!(pm.repository_stats(None).await.unwrap().total_packages, 7);
}

#[tokio::test]
async fn test_repository_queries() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let platform = Platform::current();
    let _mocks = vec![
        server
            .mock("GET", "/api/v1/")
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"name": "criage registry", "version": "1.2.0"}}"#)
            .create_async()
            .await,
        server
            .mock("GET", "/api/v1/packages")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("page".into(), "2".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "data": {
                        "packages": [{"name": "tool", "versions": []}],
                        "total": 6,
                        "page": 2,
                        "limit": 5,
                        "totalPages": 2
                    }
                })
                .to_string(),
            )
            .create_async()
            .await,
        server
            .mock("GET", "/api/v1/packages/tool/1.1.0")
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "data": {
                        "version": "1.1.0",
                        "files": [{
                            "os": platform.os,
                            "arch": platform.arch,
                            "format": "tar.zst",
                            "filename": "tool-1.1.0.tar.zst"
                        }]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await,
        server
            .mock("GET", "/api/v1/packages/tool/9.9.9")
            .with_status(404)
            .with_body(r#"{"success": false, "error": "version not found"}"#)
            .create_async()
            .await,
    ];
    let pm = ctx.manager(vec![Repository::new("main", &server.url(), 5)]);

    let info = pm.repository_info(Some("main")).await.unwrap();
    assert_eq!(info.0["name"], "criage registry");

    let listing = pm.repository_packages(None, 2, 5).await.unwrap();
    assert_eq!(listing.total, 6);
    assert_eq!(listing.total_pages, 2);
    assert_eq!(listing.packages[0].name, "tool");

    let entry = pm.package_version("tool", "1.1.0").await.unwrap();
    assert_eq!(entry.version, "1.1.0");
    assert!(entry.file_for(&platform.os, &platform.arch).is_some());

    let err = pm.package_version("tool", "9.9.9").await.unwrap_err();
    assert!(
        matches!(&err, OpsError::Registry(RegistryError::NotFound { name, .. }) if name == "tool@9.9.9"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_failed_update_keeps_previous_install() {
    let ctx = TestContext::new();
    let mut first = Server::new_async().await;
    let _old = serve(&mut first, "foo", &[("1.0.0", "")]).await;
    let pm = ctx.manager(vec![Repository::new("main", &first.url(), 1)]);
    let installed = pm.install(&InstallRequest::new("foo")).await.unwrap();
    let path = installed.info().install_path.clone();

    // 2.0.0 ships a file list that cannot be compiled.
    let broken = package_archive("name = \"foo\"\nversion = \"2.0.0\"\nfiles = [\"[bad\"]\n");
    let old_sum = checksum(&package_archive(&manifest("foo", "1.0.0", "")));
    let mut second = Server::new_async().await;
    let _mocks = vec![
        second
            .mock("GET", "/api/v1/packages/foo")
            .with_status(200)
            .with_body(package_body("foo", &[("1.0.0", &old_sum), ("2.0.0", &checksum(&broken))]))
            .create_async()
            .await,
        second
            .mock("GET", "/api/v1/download/foo/2.0.0/foo-2.0.0.tar.zst")
            .with_status(200)
            .with_body(broken)
            .create_async()
            .await,
    ];
    let pm = ctx.manager(vec![Repository::new("main", &second.url(), 1)]);

    let err = pm.update("foo", false).await.unwrap_err();
    assert!(err.to_string().contains("foo"), "{err}");
    assert!(err.to_string().contains("invalid file pattern"), "{err}");

    let info = pm.info("foo", false).unwrap();
    assert_eq!(info.version, "1.0.0");
    assert_eq!(read_record(&info).version, "1.0.0");
    assert!(path.join("bin/tool").exists());
    for entry in pm.store().snapshot(false) {
        assert!(entry.record_path().exists(), "{} has no record", entry.name);
    }
    assert_eq!(leftover_install_dirs(&ctx), 0);
}

#[tokio::test]
async fn test_install_error_names_package_and_step() {
    let ctx = TestContext::new();
    let mut server = Server::new_async().await;
    let _mocks = serve(&mut server, "foo", &[("1.0.0", "")]).await;
    fs::write(ctx.path("blocker"), "a regular file").unwrap();
    let config = Config {
        local_path: ctx.path("blocker/local"),
        ..ctx.config(vec![Repository::new("main", &server.url(), 1)])
    };
    let pm = PackageManager::new(config, Arc::new(NullReporter)).unwrap();

    let err = pm.install(&InstallRequest::new("foo")).await.unwrap_err();
    assert!(err.to_string().contains("install files of foo"), "{err}");
    assert!(matches!(err.root_cause(), OpsError::Io(_)), "unexpected: {err:?}");
    assert!(pm.store().is_empty());
    assert_eq!(leftover_install_dirs(&ctx), 0);
}
