// End-to-end runs of the sync engine against the in-memory bucket

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::tempdir;

use bucketsync::error::ErrorKind;
use bucketsync::sync::{
    build_local, ExcludePatterns, SyncEngine, SyncMode, SyncOptions, SyncPair, SyncState,
};

use super::common::{FakeConnector, MemoryBucket};

const REGIONS: &[&str] = &["us-east-1", "eu-west-1"];

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
}

fn local_digests(root: &Path) -> BTreeMap<String, String> {
    build_local(root)
        .unwrap()
        .iter()
        .map(|(p, d)| (p.to_string(), d.to_string()))
        .collect()
}

fn prefixed(prefix: &str, digests: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    digests
        .iter()
        .map(|(p, d)| (format!("{prefix}{p}"), d.clone()))
        .collect()
}

fn engine(source: &str, target: &str, connector: FakeConnector) -> SyncEngine {
    SyncEngine::new(SyncPair::new(source, target).with_concurrency(4), Arc::new(connector))
}

#[tokio::test]
async fn test_local_to_empty_bucket() {
    let dir = tempdir().unwrap();
    write_tree(
        dir.path(),
        &[("index.html", "<html>"), ("css/site.css", "body{}"), ("img/a/b/logo.png", "png")],
    );
    let bucket = Arc::new(MemoryBucket::new());
    let connector = FakeConnector::new(REGIONS).with_bucket("site", "eu-west-1", bucket.clone());
    let source = dir.path().to_string_lossy().to_string();

    let mut engine = engine(&source, "s3://site/www", connector);
    let report = engine.run().await.unwrap();

    assert_eq!(report.mode, SyncMode::DirToRemote);
    assert_eq!(report.transferred, 3);
    assert_eq!(report.bytes, 6 + 6 + 3);
    assert!(matches!(engine.state(), SyncState::Done(_)));
    assert_eq!(bucket.digests(), prefixed("www/", &local_digests(dir.path())));
    assert_eq!(bucket.object("www/index.html").unwrap().content_type, "text/html");
    assert_eq!(bucket.object("www/img/a/b/logo.png").unwrap().content_type, "image/png");
}

#[tokio::test]
async fn test_bucket_to_empty_directory() {
    let bucket = Arc::new(MemoryBucket::new());
    bucket.insert("backups/2024/db.sql", b"dump");
    bucket.insert("backups/notes.txt", b"notes");
    bucket.insert("elsewhere/skip.txt", b"no");
    let connector = FakeConnector::new(REGIONS).with_bucket("vault", "us-east-1", bucket.clone());
    let dir = tempdir().unwrap();
    let target = dir.path().to_string_lossy().to_string();

    let report = engine("s3://vault/backups", &target, connector).run().await.unwrap();

    assert_eq!(report.mode, SyncMode::RemoteToDir);
    assert_eq!(report.transferred, 2);
    assert_eq!(fs::read(dir.path().join("2024/db.sql")).unwrap(), b"dump");
    assert!(!dir.path().join("skip.txt").exists());

    let expected: BTreeMap<String, String> = bucket
        .digests()
        .into_iter()
        .filter_map(|(k, d)| k.strip_prefix("backups/").map(|p| (p.to_string(), d)))
        .collect();
    assert_eq!(local_digests(dir.path()), expected);
}

#[cfg(unix)]
#[tokio::test]
async fn test_downloaded_files_are_not_executable() {
    use std::os::unix::fs::PermissionsExt;

    let bucket = Arc::new(MemoryBucket::new());
    bucket.insert("bin/tool", b"#!/bin/sh");
    let connector = FakeConnector::new(REGIONS).with_bucket("b", "us-east-1", bucket);
    let dir = tempdir().unwrap();
    let target = dir.path().to_string_lossy().to_string();

    engine("s3://b", &target, connector).run().await.unwrap();

    let mode = fs::metadata(dir.path().join("bin/tool")).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0);
}

#[tokio::test]
async fn test_bucket_to_bucket() {
    let source = Arc::new(MemoryBucket::new());
    source.insert("data/a.json", b"{}");
    source.insert("data/nested/b.txt", b"b");
    let target = Arc::new(MemoryBucket::new());
    target.insert("mirror/a.json", b"{}");
    target.insert("mirror/stale.txt", b"keep me");
    let connector = FakeConnector::new(REGIONS)
        .with_bucket("src", "us-east-1", source.clone())
        .with_bucket("dst", "eu-west-1", target.clone());

    let report = engine("s3://src/data", "s3://dst/mirror", connector).run().await.unwrap();

    assert_eq!(report.mode, SyncMode::RemoteToRemote);
    // a.json already matches; only the nested file moves
    assert_eq!(report.planned, 1);
    assert_eq!(target.object("mirror/nested/b.txt").unwrap().data, b"b");
    assert_eq!(target.object("mirror/nested/b.txt").unwrap().content_type, "text/plain");
    // Target-only files are never removed
    assert!(target.object("mirror/stale.txt").is_some());
}

#[tokio::test]
async fn test_same_bucket_resolves_once() {
    let bucket = Arc::new(MemoryBucket::new());
    bucket.insert("live/x", b"x");
    let connector = Arc::new(FakeConnector::new(REGIONS).with_bucket("one", "eu-west-1", bucket.clone()));

    let mut engine = SyncEngine::new(SyncPair::new("s3://one/live", "s3://one/copy"), connector.clone());
    engine.run().await.unwrap();

    assert_eq!(connector.probed_regions(), vec!["us-east-1", "eu-west-1"]);
    assert_eq!(bucket.object("copy/x").unwrap().data, b"x");
}

#[tokio::test]
async fn test_second_run_transfers_nothing() {
    let dir = tempdir().unwrap();
    write_tree(dir.path(), &[("a", "1"), ("b/c", "2")]);
    let bucket = Arc::new(MemoryBucket::new());
    let source = dir.path().to_string_lossy().to_string();

    let connector = || FakeConnector::new(REGIONS).with_bucket("b", "us-east-1", bucket.clone());

    let first = engine(&source, "s3://b", connector()).run().await.unwrap();
    let puts = bucket.puts.load(Ordering::SeqCst);
    let second = engine(&source, "s3://b", connector()).run().await.unwrap();

    assert_eq!(first.transferred, 2);
    assert_eq!(second.planned, 0);
    assert_eq!(second.transferred, 0);
    assert_eq!(bucket.puts.load(Ordering::SeqCst), puts);
}

#[tokio::test]
async fn test_changed_file_is_resent() {
    let dir = tempdir().unwrap();
    write_tree(dir.path(), &[("same", "1"), ("edited", "old")]);
    let bucket = Arc::new(MemoryBucket::new());
    bucket.insert("same", b"1");
    bucket.insert("edited", b"new");
    let connector = FakeConnector::new(REGIONS).with_bucket("b", "us-east-1", bucket.clone());
    let source = dir.path().to_string_lossy().to_string();

    let report = engine(&source, "s3://b", connector).run().await.unwrap();

    assert_eq!(report.transferred, 1);
    assert_eq!(bucket.object("edited").unwrap().data, b"old");
}

#[tokio::test]
async fn test_dry_run_transfers_nothing() {
    let dir = tempdir().unwrap();
    write_tree(dir.path(), &[("a", "1"), ("b", "2")]);
    let bucket = Arc::new(MemoryBucket::new());
    let connector = FakeConnector::new(REGIONS).with_bucket("b", "us-east-1", bucket.clone());
    let source = dir.path().to_string_lossy().to_string();

    let options = SyncOptions {
        dry_run: true,
        ..Default::default()
    };
    let report = engine(&source, "s3://b", connector).with_options(options).run().await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.planned, 2);
    assert_eq!(report.transferred, 0);
    assert!(bucket.keys().is_empty());
}

#[tokio::test]
async fn test_excluded_files_stay_behind() {
    let dir = tempdir().unwrap();
    write_tree(dir.path(), &[("keep.txt", "k"), ("app.log", "l"), (".git/HEAD", "ref")]);
    let bucket = Arc::new(MemoryBucket::new());
    let connector = FakeConnector::new(REGIONS).with_bucket("b", "us-east-1", bucket.clone());
    let source = dir.path().to_string_lossy().to_string();

    let options = SyncOptions {
        exclude: ExcludePatterns::from_patterns(&["*.log", ".git"]).unwrap(),
        ..Default::default()
    };
    engine(&source, "s3://b", connector).with_options(options).run().await.unwrap();

    assert_eq!(bucket.keys(), vec!["keep.txt"]);
}

#[tokio::test]
async fn test_transfer_failure_fails_the_run() {
    let bucket = Arc::new(MemoryBucket::new());
    for i in 0..10 {
        bucket.insert(&format!("f{i}"), b"data");
    }
    bucket.fail_key("f4");
    let connector = FakeConnector::new(REGIONS).with_bucket("b", "us-east-1", bucket);
    let dir = tempdir().unwrap();
    let target = dir.path().to_string_lossy().to_string();

    let mut engine = engine("s3://b", &target, connector);
    let err = engine.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(matches!(engine.state(), SyncState::Failed(_)));
    assert!(!dir.path().join("f4").exists());
}

#[tokio::test]
async fn test_unknown_bucket_fails_before_listing() {
    let dir = tempdir().unwrap();
    let connector = FakeConnector::new(REGIONS);
    let source = dir.path().to_string_lossy().to_string();

    let err = engine(&source, "s3://missing", connector).run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_invalid_pairs_do_no_work() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let bucket = Arc::new(MemoryBucket::new());
    let connector = Arc::new(FakeConnector::new(REGIONS).with_bucket("b", "us-east-1", bucket));

    let local_a = a.path().to_string_lossy().to_string();
    let local_b = b.path().to_string_lossy().to_string();
    let missing = a.path().join("missing").to_string_lossy().to_string();

    for (source, target) in [
        (local_a.as_str(), local_b.as_str()),
        (missing.as_str(), "s3://b"),
        ("bucket-123", "s3://b"),
        ("s3://", local_b.as_str()),
    ] {
        let mut engine = SyncEngine::new(SyncPair::new(source, target), connector.clone());
        let err = engine.run().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{source} -> {target}");
    }

    assert!(connector.probes().is_empty());
}

#[tokio::test]
async fn test_keys_with_parent_components_stay_out_of_the_target() {
    let bucket = Arc::new(MemoryBucket::new());
    bucket.insert("sub/../../escaped.txt", b"outside");
    bucket.insert("sub/inside.txt", b"inside");
    let connector = FakeConnector::new(REGIONS).with_bucket("b", "us-east-1", bucket);
    let tmp = tempdir().unwrap();
    let target_dir = tmp.path().join("inner/target");
    fs::create_dir_all(&target_dir).unwrap();
    let target = target_dir.to_string_lossy().to_string();

    let report = engine("s3://b", &target, connector).run().await.unwrap();

    assert_eq!(report.transferred, 1);
    assert!(target_dir.join("sub/inside.txt").exists());
    assert!(!tmp.path().join("inner/escaped.txt").exists());
    assert!(!tmp.path().join("escaped.txt").exists());
}

#[tokio::test]
async fn test_single_object_reference_to_directory() {
    let bucket = Arc::new(MemoryBucket::new());
    bucket.insert("releases/test.tar.gz", b"tarball");
    bucket.insert("releases/test.tar.gz.sha256", b"sum");
    let dir = tempdir().unwrap();
    let target = dir.path().to_string_lossy().to_string();
    let connector = || FakeConnector::new(REGIONS).with_bucket("bucket", "us-east-1", bucket.clone());

    let first = engine("s3://bucket/releases/test.tar.gz", &target, connector())
        .run()
        .await
        .unwrap();
    let second = engine("s3://bucket/releases/test.tar.gz", &target, connector())
        .run()
        .await
        .unwrap();

    assert_eq!(first.transferred, 1);
    assert_eq!(fs::read(dir.path().join("test.tar.gz")).unwrap(), b"tarball");
    assert!(!dir.path().join("test.tar.gz.sha256").exists());
    assert_eq!(second.planned, 0);
}

#[tokio::test]
async fn test_single_object_reference_to_bucket() {
    let source = Arc::new(MemoryBucket::new());
    source.insert("test.tar.gz", b"tarball");
    let target = Arc::new(MemoryBucket::new());
    let connector = || {
        FakeConnector::new(REGIONS)
            .with_bucket("src", "us-east-1", source.clone())
            .with_bucket("dst", "eu-west-1", target.clone())
    };

    let first = engine("s3://src/test.tar.gz", "s3://dst/archive", connector()).run().await.unwrap();
    let second = engine("s3://src/test.tar.gz", "s3://dst/archive", connector()).run().await.unwrap();

    assert_eq!(first.transferred, 1);
    assert_eq!(target.keys(), vec!["archive/test.tar.gz"]);
    assert_eq!(second.planned, 0);
}

#[tokio::test]
async fn test_upload_beside_a_same_named_object() {
    let dir = tempdir().unwrap();
    write_tree(dir.path(), &[("report.csv", "a,b")]);
    let bucket = Arc::new(MemoryBucket::new());
    bucket.insert("report.csv", b"a,b");
    let connector = FakeConnector::new(REGIONS).with_bucket("b", "us-east-1", bucket.clone());
    let source = dir.path().to_string_lossy().to_string();

    // The object named by the prefix is not where report.csv uploads to
    let report = engine(&source, "s3://b/report.csv", connector).run().await.unwrap();

    assert_eq!(report.transferred, 1);
    assert!(bucket.object("report.csv/report.csv").is_some());
}
