//! Domain model for Assayer.
//!
//! - `Verdict`: classification outcome for one repository
//! - `AssayError` / `ProviderError`: failure taxonomy
//! - value types for repository state (`CommitId`, `Reference`, `WorktreeStatus`)

pub mod error;
pub mod vcs;
pub mod verdict;

pub use error::{AssayError, CommitSide, ProviderError, Result};
pub use vcs::{ChangeKind, Commit, CommitId, FileStatus, Reference, WorktreeStatus};
pub use verdict::{Response, Verdict, VerdictFamily};
