//! Assayer Core Library
//!
//! Finds git repositories under a directory and reports the uncompleted work
//! in each: modified or untracked files, stashes, and branches that are
//! local-only or out of step with their remote.

pub mod cancel;
pub mod check;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod fakes;
pub mod git;
pub mod metrics;
pub mod provider;
pub mod scan;
pub mod telemetry;

pub use cancel::CancellationToken;
pub use check::{Assayer, BranchChecker, CheckContext, Checker, StashChecker, WorktreeChecker};
pub use config::{CheckSelection, PathFilter, ScanOptions, DEFAULT_CHANNEL_CAPACITY};
pub use discovery::{DiscoveryRecord, DiscoveryStats, RepositoryLocator};
pub use domain::{
    AssayError, ChangeKind, Commit, CommitId, CommitSide, FileStatus, ProviderError, Reference,
    Response, Result, Verdict, VerdictFamily, WorktreeStatus,
};
pub use git::GitCli;
pub use provider::{Repository, RepositoryProvider};
pub use scan::{Scan, ScanSummary, Scanner};

pub use metrics::METRICS;
pub use telemetry::init_tracing;

/// Assayer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
