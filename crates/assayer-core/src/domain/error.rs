//! Error taxonomy for repository discovery and checking.

use std::fmt;
use std::path::{Path, PathBuf};

use super::vcs::CommitId;

/// Errors raised by a repository-state provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{} is not a git repository", .0.display())]
    NotARepository(PathBuf),

    /// The object database does not contain the requested object. Shallow
    /// and partial clones produce this while walking history.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("commit {commit} has no parent at index {index}")]
    NoParent { commit: CommitId, index: usize },

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("unexpected git output: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, ProviderError::ObjectNotFound(_))
    }
}

/// Which side of a local/remote branch pair a commit belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitSide {
    Local,
    Remote,
}

impl fmt::Display for CommitSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitSide::Local => f.write_str("local"),
            CommitSide::Remote => f.write_str("remote"),
        }
    }
}

/// Assayer errors.
///
/// Everything except [`AssayError::Discovery`] is fatal for the repository it
/// names and is reported as an error response.
#[derive(Debug, thiserror::Error)]
pub enum AssayError {
    #[error("cannot read directory {}: {source}", .path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error opening git repository {}: {source}", .repository.display())]
    Open {
        repository: PathBuf,
        #[source]
        source: ProviderError,
    },

    #[error("error checking repository status {}: {source}", .repository.display())]
    Status {
        repository: PathBuf,
        #[source]
        source: ProviderError,
    },

    #[error("cannot get branches for {}: {source}", .repository.display())]
    Branches {
        repository: PathBuf,
        #[source]
        source: ProviderError,
    },

    #[error("cannot get references for {}: {source}", .repository.display())]
    References {
        repository: PathBuf,
        #[source]
        source: ProviderError,
    },

    #[error(
        "{}: error while getting branch \"{branch}\" {side} commit: {source}",
        .repository.display()
    )]
    Commit {
        repository: PathBuf,
        branch: String,
        side: CommitSide,
        #[source]
        source: ProviderError,
    },

    #[error("{}: cannot resolve stash base: {source}", .repository.display())]
    Stash {
        repository: PathBuf,
        #[source]
        source: ProviderError,
    },

    #[error("unknown remote ref format \"{name}\" in repository {}", .repository.display())]
    MalformedRemoteRef { repository: PathBuf, name: String },

    #[error(
        "{}: error while checking {remote} and {local} ancestry: {source}",
        .repository.display()
    )]
    Ancestry {
        repository: PathBuf,
        remote: CommitId,
        local: CommitId,
        #[source]
        source: ProviderError,
    },

    #[error("{}: cannot walk untracked path \"{path}\": {source}", .repository.display())]
    UntrackedWalk {
        repository: PathBuf,
        path: String,
        #[source]
        source: walkdir::Error,
    },
}

impl AssayError {
    /// Repository the error belongs to, if it was raised while checking one.
    pub fn repository(&self) -> Option<&Path> {
        match self {
            AssayError::Discovery { .. } => None,
            AssayError::Open { repository, .. }
            | AssayError::Status { repository, .. }
            | AssayError::Branches { repository, .. }
            | AssayError::References { repository, .. }
            | AssayError::Commit { repository, .. }
            | AssayError::Stash { repository, .. }
            | AssayError::MalformedRemoteRef { repository, .. }
            | AssayError::Ancestry { repository, .. }
            | AssayError::UntrackedWalk { repository, .. } => Some(repository),
        }
    }
}

/// Result type for assayer operations.
pub type Result<T> = std::result::Result<T, AssayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_names_repository() {
        let err = AssayError::Open {
            repository: PathBuf::from("work/api"),
            source: ProviderError::NotARepository(PathBuf::from("/src/work/api")),
        };
        let msg = err.to_string();
        assert!(msg.contains("error opening git repository work/api"));
        assert!(msg.contains("not a git repository"));
        assert_eq!(err.repository(), Some(Path::new("work/api")));
    }

    #[test]
    fn test_malformed_remote_ref_display() {
        let err = AssayError::MalformedRemoteRef {
            repository: PathBuf::from("svc"),
            name: "orphan".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unknown remote ref format \"orphan\" in repository svc"
        );
    }

    #[test]
    fn test_commit_error_mentions_side() {
        let err = AssayError::Commit {
            repository: PathBuf::from("svc"),
            branch: "main".to_string(),
            side: CommitSide::Remote,
            source: ProviderError::ObjectNotFound("abc123".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"main\" remote commit"));
        assert!(msg.contains("abc123"));
    }

    #[test]
    fn test_discovery_error_has_no_repository() {
        let err = AssayError::Discovery {
            path: PathBuf::from("locked"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.repository().is_none());
        assert!(err.to_string().contains("cannot read directory locked"));
    }

    #[test]
    fn test_object_not_found_predicate() {
        assert!(ProviderError::ObjectNotFound("x".into()).is_object_not_found());
        assert!(!ProviderError::Parse("x".into()).is_object_not_found());
    }
}
