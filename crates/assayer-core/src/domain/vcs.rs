//! Value types describing repository state as reported by a provider.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Object id of a commit (hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form (first 8 chars).
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub id: CommitId,
    pub parents: Vec<CommitId>,
    /// First line of the commit message.
    pub summary: String,
}

/// A named reference pointing at a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Full name, e.g. `refs/remotes/origin/main`.
    pub name: String,
    pub target: CommitId,
}

const REMOTES_PREFIX: &str = "refs/remotes/";
const SHORT_PREFIXES: [&str; 4] = ["refs/heads/", REMOTES_PREFIX, "refs/tags/", "refs/"];

impl Reference {
    pub fn new(name: impl Into<String>, target: CommitId) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }

    /// Whether this is a remote-tracking reference.
    pub fn is_remote(&self) -> bool {
        self.name.starts_with(REMOTES_PREFIX)
    }

    /// Name with its namespace prefix removed (`origin/main` for
    /// `refs/remotes/origin/main`).
    pub fn short_name(&self) -> &str {
        SHORT_PREFIXES
            .iter()
            .find_map(|prefix| self.name.strip_prefix(prefix))
            .unwrap_or(&self.name)
    }
}

/// State of a path relative to the last commit or to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Unmodified,
    Untracked,
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    UpdatedButUnmerged,
}

impl ChangeKind {
    /// Whether the state represents a change to tracked content.
    pub fn is_change(self) -> bool {
        !matches!(self, ChangeKind::Unmodified | ChangeKind::Untracked)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Unmodified => "Unmodified",
            ChangeKind::Untracked => "Untracked",
            ChangeKind::Modified => "Modified",
            ChangeKind::Added => "Added",
            ChangeKind::Deleted => "Deleted",
            ChangeKind::Renamed => "Renamed",
            ChangeKind::Copied => "Copied",
            ChangeKind::UpdatedButUnmerged => "Updated But Unmerged",
        };
        f.write_str(label)
    }
}

/// Staging and worktree state of one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub staging: ChangeKind,
    pub worktree: ChangeKind,
}

impl FileStatus {
    pub fn new(staging: ChangeKind, worktree: ChangeKind) -> Self {
        Self { staging, worktree }
    }

    pub fn untracked() -> Self {
        Self::new(ChangeKind::Untracked, ChangeKind::Untracked)
    }

    pub fn is_untracked(&self) -> bool {
        self.worktree == ChangeKind::Untracked
    }
}

/// Worktree status: every path that differs from the last commit, keyed by
/// its `/`-separated path relative to the worktree root.
///
/// Iteration is in lexicographic path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    entries: BTreeMap<String, FileStatus>,
}

impl WorktreeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, status: FileStatus) {
        self.entries.insert(path.into(), status);
    }

    pub fn get(&self, path: &str) -> Option<&FileStatus> {
        self.entries.get(path)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FileStatus> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Into<String>> FromIterator<(P, FileStatus)> for WorktreeStatus {
    fn from_iter<I: IntoIterator<Item = (P, FileStatus)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(path, status)| (path.into(), status))
                .collect(),
        }
    }
}
