//! Classification outcomes produced by the checkers.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::error::AssayError;
use super::vcs::{ChangeKind, Commit};

/// One kind of uncompleted work found in a repository.
///
/// `repository` is the id of the repository the verdict was produced for
/// (its path relative to the scan root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// Nothing uncompleted was found.
    Unmodified { repository: PathBuf },

    /// Shallowest path that contains only untracked files.
    Untracked { repository: PathBuf, path: String },

    /// First changed tracked path, in the worktree or the index.
    Modified {
        repository: PathBuf,
        path: String,
        change: ChangeKind,
    },

    /// A stash exists; `base` is the commit it was created on.
    StashedChanges { repository: PathBuf, base: Commit },

    /// Local branch without a remote-tracking counterpart.
    LocalOnlyBranch { repository: PathBuf, branch: String },

    /// The remote has commits the local branch lacks.
    RemoteAhead {
        repository: PathBuf,
        local_branch: String,
        remote_ref: String,
    },

    /// The local branch has commits not yet pushed.
    RemoteBehind {
        repository: PathBuf,
        local_branch: String,
        remote_ref: String,
    },
}

impl Verdict {
    pub fn repository(&self) -> &Path {
        match self {
            Verdict::Unmodified { repository }
            | Verdict::Untracked { repository, .. }
            | Verdict::Modified { repository, .. }
            | Verdict::StashedChanges { repository, .. }
            | Verdict::LocalOnlyBranch { repository, .. }
            | Verdict::RemoteAhead { repository, .. }
            | Verdict::RemoteBehind { repository, .. } => repository,
        }
    }

    pub fn family(&self) -> VerdictFamily {
        match self {
            Verdict::Unmodified { .. } => VerdictFamily::Unmodified,
            Verdict::Untracked { .. } => VerdictFamily::Untracked,
            Verdict::Modified { .. } => VerdictFamily::Modified,
            Verdict::StashedChanges { .. } => VerdictFamily::Stashed,
            Verdict::LocalOnlyBranch { .. } => VerdictFamily::LocalOnlyBranch,
            Verdict::RemoteAhead { .. } => VerdictFamily::RemoteAhead,
            Verdict::RemoteBehind { .. } => VerdictFamily::RemoteBehind,
        }
    }
}

/// The verdict families a scan can be asked to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictFamily {
    Unmodified,
    Modified,
    Untracked,
    Stashed,
    RemoteAhead,
    RemoteBehind,
    LocalOnlyBranch,
}

impl VerdictFamily {
    pub const ALL: [VerdictFamily; 7] = [
        VerdictFamily::Unmodified,
        VerdictFamily::Untracked,
        VerdictFamily::Modified,
        VerdictFamily::LocalOnlyBranch,
        VerdictFamily::Stashed,
        VerdictFamily::RemoteAhead,
        VerdictFamily::RemoteBehind,
    ];

    /// Human-readable label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            VerdictFamily::Unmodified => "Unmodified",
            VerdictFamily::Modified => "Modified",
            VerdictFamily::Untracked => "Untracked",
            VerdictFamily::Stashed => "Stashed Changes",
            VerdictFamily::RemoteAhead => "Remote Ahead",
            VerdictFamily::RemoteBehind => "Remote Behind",
            VerdictFamily::LocalOnlyBranch => "Local Only Branch",
        }
    }
}

impl fmt::Display for VerdictFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Either one verdict or one fatal error for a repository.
pub type Response = std::result::Result<Verdict, AssayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vcs::CommitId;

    #[test]
    fn test_repository_accessor_covers_every_variant() {
        let repo = PathBuf::from("work/api");
        let verdicts = vec![
            Verdict::Unmodified {
                repository: repo.clone(),
            },
            Verdict::Untracked {
                repository: repo.clone(),
                path: "tmp".into(),
            },
            Verdict::Modified {
                repository: repo.clone(),
                path: "src/lib.rs".into(),
                change: ChangeKind::Modified,
            },
            Verdict::StashedChanges {
                repository: repo.clone(),
                base: Commit {
                    id: CommitId::new("abc"),
                    parents: vec![],
                    summary: "initial".into(),
                },
            },
            Verdict::LocalOnlyBranch {
                repository: repo.clone(),
                branch: "spike".into(),
            },
            Verdict::RemoteAhead {
                repository: repo.clone(),
                local_branch: "main".into(),
                remote_ref: "origin/main".into(),
            },
            Verdict::RemoteBehind {
                repository: repo.clone(),
                local_branch: "main".into(),
                remote_ref: "origin/main".into(),
            },
        ];
        for verdict in &verdicts {
            assert_eq!(verdict.repository(), repo.as_path());
        }
    }

    #[test]
    fn test_verdict_serializes_with_kind_tag() {
        let verdict = Verdict::Modified {
            repository: PathBuf::from("svc"),
            path: "a.txt".into(),
            change: ChangeKind::Added,
        };
        let value = serde_json::to_value(&verdict).unwrap();
        assert_eq!(value["kind"], "modified");
        assert_eq!(value["change"], "added");
        assert_eq!(value["repository"], "svc");
    }
}
