//! Scan pipeline tests: real directory discovery, in-memory repositories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assayer_core::fakes::{MemoryProvider, MemoryRepository};
use assayer_core::{
    AssayError, ChangeKind, CheckSelection, FileStatus, PathFilter, Response, ScanOptions,
    Scanner, Verdict, VerdictFamily,
};

type Build = fn(PathBuf) -> MemoryRepository;

/// Create `<root>/<repo>/.git` for each repo and register a fake for it.
fn workspace(repos: Vec<(&str, Build)>) -> (tempfile::TempDir, Arc<MemoryProvider>) {
    let dir = tempfile::tempdir().unwrap();
    let provider = MemoryProvider::new();
    for (rel, build) in repos {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.join(".git")).unwrap();
        provider.insert(build(path));
    }
    (dir, Arc::new(provider))
}

fn clean(path: PathBuf) -> MemoryRepository {
    MemoryRepository::new(path)
        .with_commit("c1", &[], "initial")
        .with_branch("main", "c1")
        .with_remote_branch("origin", "main", "c1")
}

fn untracked_and_stashed(path: PathBuf) -> MemoryRepository {
    clean(path)
        .with_status("scratch.txt", FileStatus::untracked())
        .with_stash("s1", "c1")
}

fn modified(path: PathBuf) -> MemoryRepository {
    clean(path).with_status(
        "src/main.rs",
        FileStatus::new(ChangeKind::Unmodified, ChangeKind::Modified),
    )
}

fn unpushed(path: PathBuf) -> MemoryRepository {
    MemoryRepository::new(path)
        .with_commit("c1", &[], "initial")
        .with_commit("c2", &["c1"], "local work")
        .with_branch("main", "c2")
        .with_remote_branch("origin", "main", "c1")
}

fn broken_status(path: PathBuf) -> MemoryRepository {
    untracked_and_stashed(path).failing_status("index.lock exists")
}

fn options(checks: CheckSelection, deep: bool) -> ScanOptions {
    ScanOptions {
        checks,
        deep,
        ..ScanOptions::default()
    }
}

/// Group successful verdicts by repository id.
fn by_repository(responses: &[Response]) -> BTreeMap<PathBuf, Vec<VerdictFamily>> {
    let mut grouped: BTreeMap<PathBuf, Vec<VerdictFamily>> = BTreeMap::new();
    for response in responses {
        let verdict = response.as_ref().unwrap();
        grouped
            .entry(verdict.repository().to_path_buf())
            .or_default()
            .push(verdict.family());
    }
    grouped
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shallow_scan_one_verdict_per_repository() {
    let (dir, provider) = workspace(vec![
        ("clean", clean as Build),
        ("team/dirty", untracked_and_stashed as Build),
        ("team/edited", modified as Build),
        ("unpushed", unpushed as Build),
    ]);
    let scanner = Scanner::new(provider, options(CheckSelection::all(), false));
    let (responses, summary) = scanner.start(dir.path()).collect().await.unwrap();

    assert_eq!(summary.repositories_found, 4);
    assert_eq!(summary.discovery_errors, 0);
    let grouped = by_repository(&responses);
    assert_eq!(grouped[Path::new("clean")], vec![VerdictFamily::Unmodified]);
    assert_eq!(grouped[Path::new("team/dirty")], vec![VerdictFamily::Untracked]);
    assert_eq!(grouped[Path::new("team/edited")], vec![VerdictFamily::Modified]);
    assert_eq!(grouped[Path::new("unpushed")], vec![VerdictFamily::RemoteBehind]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deep_scan_reports_every_match_in_priority_order() {
    let (dir, provider) = workspace(vec![("team/dirty", untracked_and_stashed as Build)]);
    let scanner = Scanner::new(provider, options(CheckSelection::all(), true));
    let (responses, _) = scanner.start(dir.path()).collect().await.unwrap();

    let grouped = by_repository(&responses);
    assert_eq!(
        grouped[Path::new("team/dirty")],
        vec![VerdictFamily::Untracked, VerdictFamily::Stashed]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unmodified_emitted_even_when_not_selected() {
    let (dir, provider) = workspace(vec![("clean", clean as Build)]);
    let scanner = Scanner::new(provider, ScanOptions::default());
    let (responses, _) = scanner.start(dir.path()).collect().await.unwrap();

    assert_eq!(responses.len(), 1);
    assert_eq!(
        responses[0].as_ref().unwrap(),
        &Verdict::Unmodified {
            repository: PathBuf::from("clean")
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_selection_limits_checkers() {
    let (dir, provider) = workspace(vec![("team/dirty", untracked_and_stashed as Build)]);
    let checks = CheckSelection::only(&[VerdictFamily::Stashed]);
    let scanner = Scanner::new(provider, options(checks, false));
    let (responses, _) = scanner.start(dir.path()).collect().await.unwrap();

    match responses[0].as_ref().unwrap() {
        Verdict::StashedChanges { base, .. } => assert_eq!(base.summary, "initial"),
        other => panic!("expected stash verdict, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_excluded_repositories_are_never_opened() {
    let (dir, provider) = workspace(vec![
        ("app", modified as Build),
        ("vendor/lib", modified as Build),
    ]);
    let filter: Arc<dyn PathFilter> =
        Arc::new(|path: &Path| path.components().any(|c| c.as_os_str() == "vendor"));
    let scanner = Scanner::with_exclusion(provider.clone(), ScanOptions::default(), filter);
    let (responses, summary) = scanner.start(dir.path()).collect().await.unwrap();

    assert_eq!(summary.repositories_found, 2);
    let grouped = by_repository(&responses);
    assert_eq!(grouped.keys().collect::<Vec<_>>(), vec![Path::new("app")]);
    assert_eq!(provider.opened(), vec![dir.path().join("app")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_open_failure_does_not_stop_siblings() {
    let (dir, provider) = workspace(vec![("good", modified as Build)]);
    std::fs::create_dir_all(dir.path().join("bogus/.git")).unwrap();
    let scanner = Scanner::new(provider, ScanOptions::default());
    let (responses, _) = scanner.start(dir.path()).collect().await.unwrap();

    assert_eq!(responses.len(), 2);
    let (errors, verdicts): (Vec<_>, Vec<_>) = responses.into_iter().partition(|r| r.is_err());
    match &errors[0] {
        Err(AssayError::Open { repository, .. }) => assert_eq!(repository, Path::new("bogus")),
        other => panic!("expected open error, got {other:?}"),
    }
    assert_eq!(
        verdicts[0].as_ref().unwrap().repository(),
        Path::new("good")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_error_ends_repository_in_deep_mode() {
    let (dir, provider) = workspace(vec![("broken", broken_status as Build)]);
    let scanner = Scanner::new(provider, options(CheckSelection::all(), true));
    let (responses, _) = scanner.start(dir.path()).collect().await.unwrap();

    assert_eq!(responses.len(), 1);
    assert!(matches!(responses[0], Err(AssayError::Status { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_nested_option_reaches_inner_repositories() {
    let (dir, provider) = workspace(vec![
        ("outer", clean as Build),
        ("outer/inner", modified as Build),
    ]);

    let flat = Scanner::new(provider.clone(), options(CheckSelection::all(), false));
    let (responses, _) = flat.start(dir.path()).collect().await.unwrap();
    assert_eq!(by_repository(&responses).len(), 1);

    let nested = Scanner::new(
        provider,
        ScanOptions {
            nested: true,
            ..options(CheckSelection::all(), false)
        },
    );
    let (responses, summary) = nested.start(dir.path()).collect().await.unwrap();
    assert_eq!(summary.repositories_found, 2);
    let grouped = by_repository(&responses);
    assert_eq!(grouped[Path::new("outer/inner")], vec![VerdictFamily::Modified]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_consumer_stopping_early_does_not_hang() {
    let repos: Vec<String> = (0..40).map(|i| format!("repo{i:02}")).collect();
    let (dir, provider) = workspace(
        repos
            .iter()
            .map(|r| (r.as_str(), modified as Build))
            .collect(),
    );
    let scanner = Scanner::new(
        provider,
        ScanOptions {
            channel_capacity: 1,
            ..ScanOptions::default()
        },
    );

    let mut scan = scanner.start(dir.path());
    let first = scan.recv().await.unwrap();
    assert!(first.is_ok());
    scan.cancel();
    let summary = scan.finish().await.unwrap();
    assert!(summary.repositories_found >= 1);
}
