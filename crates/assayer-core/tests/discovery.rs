//! Repository discovery over real directory trees.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use assayer_core::{CancellationToken, RepositoryLocator};

fn mkdirs(root: &Path, dirs: &[&str]) {
    for dir in dirs {
        std::fs::create_dir_all(root.join(dir)).unwrap();
    }
}

async fn discover(locator: RepositoryLocator) -> Vec<PathBuf> {
    let (mut rx, handle) = locator.spawn();
    let mut found = Vec::new();
    while let Some(record) = rx.recv().await {
        found.push(record.unwrap());
    }
    handle.await.unwrap();
    found
}

fn set(paths: &[&str]) -> BTreeSet<PathBuf> {
    paths.iter().map(PathBuf::from).collect()
}

/// outer/ is a repository that contains another one (outer/libs/inner).
fn nested_tree(root: &Path) {
    mkdirs(
        root,
        &[
            "outer/.git/refs",
            "outer/src",
            "outer/libs/inner/.git",
            "tools/cli/.git",
            "tools/docs",
            "notes/2024/draft",
        ],
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_non_nested_stops_at_first_repository() {
    let dir = tempfile::tempdir().unwrap();
    nested_tree(dir.path());

    let found = discover(RepositoryLocator::new(dir.path())).await;
    let unique: BTreeSet<PathBuf> = found.iter().cloned().collect();
    assert_eq!(unique.len(), found.len(), "duplicates in {found:?}");
    assert_eq!(unique, set(&["outer", "tools/cli"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_nested_finds_inner_repositories() {
    let dir = tempfile::tempdir().unwrap();
    nested_tree(dir.path());

    let found = discover(RepositoryLocator::new(dir.path()).nested(true)).await;
    let unique: BTreeSet<PathBuf> = found.iter().cloned().collect();
    assert_eq!(unique.len(), found.len(), "duplicates in {found:?}");
    assert_eq!(unique, set(&["outer", "outer/libs/inner", "tools/cli"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_root_repository_with_nested_children() {
    let dir = tempfile::tempdir().unwrap();
    mkdirs(dir.path(), &[".git", "vendor/dep/.git"]);

    let shallow = discover(RepositoryLocator::new(dir.path())).await;
    assert_eq!(shallow, vec![PathBuf::from(".")]);

    let nested: BTreeSet<PathBuf> = discover(RepositoryLocator::new(dir.path()).nested(true))
        .await
        .into_iter()
        .collect();
    assert_eq!(nested, set(&[".", "vendor/dep"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wide_tree_yields_each_repository_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut expected = BTreeSet::new();
    for group in 0..8 {
        for repo in 0..12 {
            let rel = format!("group{group}/sub/repo{repo}");
            mkdirs(dir.path(), &[&format!("{rel}/.git"), &format!("{rel}/src")]);
            expected.insert(PathBuf::from(rel));
        }
        mkdirs(dir.path(), &[&format!("group{group}/empty/deeper")]);
    }

    let found = discover(RepositoryLocator::new(dir.path()).capacity(3)).await;
    assert_eq!(found.len(), expected.len());
    assert_eq!(found.into_iter().collect::<BTreeSet<_>>(), expected);
}

#[tokio::test]
async fn test_tree_without_repositories_closes_empty() {
    let dir = tempfile::tempdir().unwrap();
    mkdirs(dir.path(), &["a/b/c", "d"]);
    std::fs::write(dir.path().join("a/file.txt"), "x").unwrap();

    let (mut rx, handle) = RepositoryLocator::new(dir.path()).spawn();
    assert!(rx.recv().await.is_none());
    let stats = handle.await.unwrap();
    assert_eq!(stats.repositories, 0);
    assert_eq!(stats.directories, 5);
}

#[tokio::test]
async fn test_dropping_receiver_ends_walk() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..50 {
        mkdirs(dir.path(), &[&format!("r{i}/.git")]);
    }
    let (rx, handle) = RepositoryLocator::new(dir.path())
        .capacity(1)
        .with_cancellation(CancellationToken::new())
        .spawn();
    drop(rx);
    // Must not hang on a full channel.
    handle.await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_directory_is_reported_and_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    mkdirs(dir.path(), &["open/repo/.git", "locked/hidden/.git"]);
    let locked = dir.path().join("locked");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
    // root ignores permission bits
    if std::fs::read_dir(&locked).is_ok() {
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let (mut rx, handle) = RepositoryLocator::new(dir.path()).spawn();
    let mut repositories = Vec::new();
    let mut errors = 0;
    while let Some(record) = rx.recv().await {
        match record {
            Ok(path) => repositories.push(path),
            Err(_) => errors += 1,
        }
    }
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(repositories, vec![PathBuf::from("open/repo")]);
    assert_eq!(errors, 1);
    assert_eq!(handle.await.unwrap().errors, 1);
}
