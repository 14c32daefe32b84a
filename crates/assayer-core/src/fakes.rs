//! In-memory repository provider (testing only)
//!
//! `MemoryProvider` hands out `MemoryRepository` snapshots keyed by absolute
//! path. Repositories are assembled with builder methods; commit history is
//! an explicit parent graph so ancestry and missing-object behaviour can be
//! modelled without git.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::{Commit, CommitId, FileStatus, ProviderError, Reference, WorktreeStatus};
use crate::provider::{ProviderResult, References, Repository, RepositoryProvider};

// ---------------------------------------------------------------------------
// MemoryProvider
// ---------------------------------------------------------------------------

/// Provider backed by a `HashMap<path, MemoryRepository>`.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    repositories: Mutex<HashMap<PathBuf, MemoryRepository>>,
    opened: Mutex<Vec<PathBuf>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository under its workdir.
    pub fn insert(&self, repository: MemoryRepository) {
        let mut repositories = self.repositories.lock().unwrap();
        repositories.insert(repository.workdir.clone(), repository);
    }

    /// Builder form of [`MemoryProvider::insert`].
    pub fn with(self, repository: MemoryRepository) -> Self {
        self.insert(repository);
        self
    }

    /// Paths passed to `open`, in call order.
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl RepositoryProvider for MemoryProvider {
    fn open(&self, path: &Path) -> ProviderResult<Box<dyn Repository>> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        let repositories = self.repositories.lock().unwrap();
        repositories
            .get(path)
            .cloned()
            .map(|repo| Box::new(repo) as Box<dyn Repository>)
            .ok_or_else(|| ProviderError::NotARepository(path.to_path_buf()))
    }
}

// ---------------------------------------------------------------------------
// MemoryRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Failures {
    status: Option<String>,
    branches: Option<String>,
    references: Option<String>,
    reference_iteration: Option<String>,
    ancestry: Option<String>,
}

/// Snapshot of one repository's state.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    workdir: PathBuf,
    status: WorktreeStatus,
    branches: BTreeMap<String, CommitId>,
    references: Vec<Reference>,
    commits: HashMap<CommitId, Commit>,
    failures: Failures,
}

impl MemoryRepository {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, path: &str, status: FileStatus) -> Self {
        self.status.insert(path, status);
        self
    }

    /// Add a commit with the given parents.
    pub fn with_commit(mut self, id: &str, parents: &[&str], summary: &str) -> Self {
        let commit = Commit {
            id: CommitId::new(id),
            parents: parents.iter().map(|p| CommitId::new(*p)).collect(),
            summary: summary.to_string(),
        };
        self.commits.insert(commit.id.clone(), commit);
        self
    }

    /// Add a local branch (and its `refs/heads/` reference).
    pub fn with_branch(mut self, name: &str, id: &str) -> Self {
        self.branches.insert(name.to_string(), CommitId::new(id));
        self.with_reference(&format!("refs/heads/{name}"), id)
    }

    /// Add a remote-tracking reference `refs/remotes/<remote>/<name>`.
    pub fn with_remote_branch(self, remote: &str, name: &str, id: &str) -> Self {
        self.with_reference(&format!("refs/remotes/{remote}/{name}"), id)
    }

    pub fn with_reference(mut self, name: &str, id: &str) -> Self {
        self.references.push(Reference::new(name, CommitId::new(id)));
        self
    }

    /// Add a stash commit on top of `base` and point `refs/stash` at it.
    pub fn with_stash(self, stash_id: &str, base: &str) -> Self {
        self.with_commit(stash_id, &[base], "WIP on stash")
            .with_reference("refs/stash", stash_id)
    }

    pub fn failing_status(mut self, message: &str) -> Self {
        self.failures.status = Some(message.to_string());
        self
    }

    pub fn failing_branches(mut self, message: &str) -> Self {
        self.failures.branches = Some(message.to_string());
        self
    }

    pub fn failing_references(mut self, message: &str) -> Self {
        self.failures.references = Some(message.to_string());
        self
    }

    /// Yield an error after the last reference.
    pub fn failing_reference_iteration(mut self, message: &str) -> Self {
        self.failures.reference_iteration = Some(message.to_string());
        self
    }

    pub fn failing_ancestry(mut self, message: &str) -> Self {
        self.failures.ancestry = Some(message.to_string());
        self
    }
}

fn injected(command: &str, message: &str) -> ProviderError {
    ProviderError::Command {
        command: command.to_string(),
        stderr: message.to_string(),
    }
}

impl Repository for MemoryRepository {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn worktree_status(&self) -> ProviderResult<WorktreeStatus> {
        if let Some(message) = &self.failures.status {
            return Err(injected("status", message));
        }
        Ok(self.status.clone())
    }

    fn local_branches(&self) -> ProviderResult<BTreeMap<String, CommitId>> {
        if let Some(message) = &self.failures.branches {
            return Err(injected("for-each-ref refs/heads/", message));
        }
        Ok(self.branches.clone())
    }

    fn references(&self) -> ProviderResult<References<'_>> {
        if let Some(message) = &self.failures.references {
            return Err(injected("for-each-ref", message));
        }
        let trailing = self
            .failures
            .reference_iteration
            .as_deref()
            .map(|message| Err(injected("for-each-ref", message)));
        Ok(Box::new(
            self.references.iter().cloned().map(Ok).chain(trailing),
        ))
    }

    fn resolve_commit(&self, id: &CommitId) -> ProviderResult<Commit> {
        self.commits
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::ObjectNotFound(id.to_string()))
    }

    fn is_ancestor(&self, candidate: &Commit, commit: &Commit) -> ProviderResult<bool> {
        if let Some(message) = &self.failures.ancestry {
            return Err(injected("merge-base --is-ancestor", message));
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([commit.id.clone()]);
        while let Some(id) = queue.pop_front() {
            if id == candidate.id {
                return Ok(true);
            }
            if !seen.insert(id.clone()) {
                continue;
            }
            let current = self.resolve_commit(&id)?;
            queue.extend(current.parents);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> MemoryRepository {
        MemoryRepository::new("/repos/app")
            .with_commit("c1", &[], "initial")
            .with_commit("c2", &["c1"], "second")
            .with_commit("c3", &["c2"], "third")
    }

    #[test]
    fn test_open_unknown_path_is_not_a_repository() {
        let provider = MemoryProvider::new();
        let err = provider.open(Path::new("/nowhere")).err().unwrap();
        assert!(matches!(err, ProviderError::NotARepository(_)));
        assert_eq!(provider.opened(), vec![PathBuf::from("/nowhere")]);
    }

    #[test]
    fn test_is_ancestor_walks_parents() {
        let repo = history();
        let c1 = repo.resolve_commit(&CommitId::new("c1")).unwrap();
        let c3 = repo.resolve_commit(&CommitId::new("c3")).unwrap();
        assert!(repo.is_ancestor(&c1, &c3).unwrap());
        assert!(!repo.is_ancestor(&c3, &c1).unwrap());
        assert!(repo.is_ancestor(&c3, &c3).unwrap());
    }

    #[test]
    fn test_truncated_history_reports_missing_object() {
        let repo = MemoryRepository::new("/repos/shallow")
            .with_commit("c2", &["gone"], "grafted")
            .with_commit("other", &[], "unrelated");
        let c2 = repo.resolve_commit(&CommitId::new("c2")).unwrap();
        let other = repo.resolve_commit(&CommitId::new("other")).unwrap();
        let err = repo.is_ancestor(&other, &c2).unwrap_err();
        assert!(err.is_object_not_found());
    }

    #[test]
    fn test_branch_builder_adds_reference() {
        let repo = history()
            .with_branch("main", "c3")
            .with_remote_branch("origin", "main", "c2");
        let names: Vec<String> = repo
            .references()
            .unwrap()
            .map(|r| r.unwrap().name)
            .collect();
        assert_eq!(names, vec!["refs/heads/main", "refs/remotes/origin/main"]);
        assert_eq!(repo.local_branches().unwrap().len(), 1);
    }

    #[test]
    fn test_reference_iteration_failure_comes_last() {
        let repo = history()
            .with_branch("main", "c3")
            .failing_reference_iteration("pack corrupt");
        let items: Vec<_> = repo.references().unwrap().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
