//! Repository-state provider interface.
//!
//! The checkers never touch version-control internals directly. They ask a
//! [`Repository`] opened by a [`RepositoryProvider`] for:
//! - the worktree status (path → staging/worktree state)
//! - local branches and all references
//! - commit resolution, parents and ancestry
//!
//! [`crate::git::GitCli`] implements this by running `git`; in-memory fakes
//! live in [`crate::fakes`].

use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::{Commit, CommitId, ProviderError, Reference, WorktreeStatus};

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Lazily produced references. Dropping the iterator releases whatever
/// backs it.
pub type References<'a> = Box<dyn Iterator<Item = ProviderResult<Reference>> + Send + 'a>;

/// Opens repositories.
pub trait RepositoryProvider: Send + Sync {
    /// Open the repository rooted at `path` (absolute).
    fn open(&self, path: &Path) -> ProviderResult<Box<dyn Repository>>;
}

/// An opened repository.
pub trait Repository: Send {
    /// Absolute path of the worktree root.
    fn workdir(&self) -> &Path;

    /// Every path that differs from the last commit or is untracked.
    fn worktree_status(&self) -> ProviderResult<WorktreeStatus>;

    /// Local branch short name → commit.
    fn local_branches(&self) -> ProviderResult<BTreeMap<String, CommitId>>;

    /// All references (local branches, remote-tracking refs, tags, stash).
    fn references(&self) -> ProviderResult<References<'_>>;

    fn resolve_commit(&self, id: &CommitId) -> ProviderResult<Commit>;

    /// Parent number `index` (0-based) of `commit`.
    fn parent_commit(&self, commit: &Commit, index: usize) -> ProviderResult<Commit> {
        let parent = commit
            .parents
            .get(index)
            .ok_or_else(|| ProviderError::NoParent {
                commit: commit.id.clone(),
                index,
            })?;
        self.resolve_commit(parent)
    }

    /// Whether `candidate` is reachable by following parent links from
    /// `commit`. Fails with [`ProviderError::ObjectNotFound`] when history
    /// is incomplete.
    fn is_ancestor(&self, candidate: &Commit, commit: &Commit) -> ProviderResult<bool>;
}
