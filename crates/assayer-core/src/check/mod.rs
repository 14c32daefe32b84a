//! Checkers and the per-repository orchestrator.
//!
//! A [`Checker`] inspects one opened repository and returns a lazy
//! iterator of [`Response`]s. Work happens only when the next item is
//! pulled; dropping the iterator stops the checker and releases whatever it
//! holds (reference iterators, cached status).
//!
//! [`Assayer`] owns the enabled checkers in fixed priority order
//! (worktree, stash, branch) and drives them for one repository at a time,
//! stopping after the first verdict unless `deep` is set.

mod branch;
mod stash;
mod worktree;

pub use branch::BranchChecker;
pub use stash::StashChecker;
pub use worktree::{collapse_untracked, WorktreeChecker};

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, debug_span};

use crate::cancel::CancellationToken;
use crate::config::{PathFilter, ScanOptions};
use crate::domain::{AssayError, Response, Verdict};
use crate::metrics::METRICS;
use crate::provider::{Repository, RepositoryProvider};

/// Lazily produced responses of one checker.
pub type Verdicts<'a> = Box<dyn Iterator<Item = Response> + 'a>;

/// What a checker knows about the repository it inspects.
#[derive(Debug, Clone)]
pub struct CheckContext {
    /// Repository id: its path relative to the scan root.
    pub repository: PathBuf,
    /// Absolute path of the repository root.
    pub path: PathBuf,
    pub cancel: CancellationToken,
}

impl CheckContext {
    pub fn new(
        repository: impl Into<PathBuf>,
        path: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            repository: repository.into(),
            path: path.into(),
            cancel,
        }
    }
}

/// Inspects a repository for one group of verdict families.
pub trait Checker: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Start inspecting `repo`. Every verdict carries `ctx.repository`.
    /// The returned iterator yields nothing more after an error.
    fn check<'a>(&'a self, ctx: &'a CheckContext, repo: &'a dyn Repository) -> Verdicts<'a>;
}

/// Runs the enabled checkers against repositories.
pub struct Assayer {
    provider: Arc<dyn RepositoryProvider>,
    checkers: Vec<Box<dyn Checker>>,
    exclude: Option<Arc<dyn PathFilter>>,
    deep: bool,
}

impl Assayer {
    /// Build an assayer with one checker per requested family group.
    pub fn new(provider: Arc<dyn RepositoryProvider>, options: &ScanOptions) -> Self {
        let checks = &options.checks;
        let mut checkers: Vec<Box<dyn Checker>> = Vec::new();
        if checks.wants_worktree() {
            checkers.push(Box::new(WorktreeChecker::new(
                checks.modified,
                checks.untracked,
            )));
        }
        if checks.stashed {
            checkers.push(Box::new(StashChecker));
        }
        if checks.wants_branches() {
            checkers.push(Box::new(BranchChecker::from_selection(checks)));
        }
        Self {
            provider,
            checkers,
            exclude: None,
            deep: options.deep,
        }
    }

    /// Skip repositories whose absolute path matches `filter`.
    pub fn with_exclusion(mut self, filter: Arc<dyn PathFilter>) -> Self {
        self.exclude = Some(filter);
        self
    }

    /// Names of the enabled checkers, in the order they run.
    pub fn checker_names(&self) -> Vec<&'static str> {
        self.checkers.iter().map(|c| c.name()).collect()
    }

    /// Inspect one repository, handing every response to `sink`.
    ///
    /// Returns `Break` when the sink asked to stop or the scan was
    /// cancelled; the caller should then stop feeding repositories.
    pub fn check_repository(
        &self,
        ctx: &CheckContext,
        sink: &mut dyn FnMut(Response) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let span = debug_span!("check", repository = %ctx.repository.display());
        let _enter = span.enter();

        if let Some(filter) = &self.exclude {
            if filter.is_excluded(&ctx.path) {
                METRICS.inc_repositories_excluded();
                debug!("repository excluded");
                return ControlFlow::Continue(());
            }
        }
        if ctx.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }

        METRICS.inc_repositories_checked();
        let repo = match self.provider.open(&ctx.path) {
            Ok(repo) => repo,
            Err(source) => {
                METRICS.inc_error_responses();
                return sink(Err(AssayError::Open {
                    repository: ctx.repository.clone(),
                    source,
                }));
            }
        };

        let mut emitted = false;
        for checker in &self.checkers {
            for response in checker.check(ctx, repo.as_ref()) {
                if ctx.cancel.is_cancelled() {
                    return ControlFlow::Break(());
                }
                let failed = response.is_err();
                if failed {
                    METRICS.inc_error_responses();
                } else {
                    METRICS.inc_verdicts();
                }
                emitted = true;
                if sink(response).is_break() {
                    return ControlFlow::Break(());
                }
                if failed || !self.deep {
                    debug!(checker = checker.name(), failed, "stopping early");
                    return ControlFlow::Continue(());
                }
            }
        }

        if ctx.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        if !emitted {
            METRICS.inc_verdicts();
            return sink(Ok(Verdict::Unmodified {
                repository: ctx.repository.clone(),
            }));
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn context(repository: &str, path: &str) -> CheckContext {
        CheckContext::new(repository, path, CancellationToken::new())
    }

    /// Drain a checker without stopping early.
    pub fn run(checker: &dyn Checker, ctx: &CheckContext, repo: &dyn Repository) -> Vec<Response> {
        checker.check(ctx, repo).collect()
    }
}
