//! Stash detection.

use tracing::debug;

use super::{CheckContext, Checker, Verdicts};
use crate::domain::{AssayError, ProviderError, Reference, Response, Verdict};
use crate::provider::Repository;

/// Full name of the stash reference.
pub const STASH_REF: &str = "refs/stash";

/// Reports the base commit of the repository's stash, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct StashChecker;

impl Checker for StashChecker {
    fn name(&self) -> &'static str {
        "stash"
    }

    fn check<'a>(&'a self, ctx: &'a CheckContext, repo: &'a dyn Repository) -> Verdicts<'a> {
        Box::new(StashVerdicts {
            ctx,
            repo,
            done: false,
        })
    }
}

struct StashVerdicts<'a> {
    ctx: &'a CheckContext,
    repo: &'a dyn Repository,
    done: bool,
}

impl StashVerdicts<'_> {
    fn references_error(&self, source: ProviderError) -> AssayError {
        AssayError::References {
            repository: self.ctx.repository.clone(),
            source,
        }
    }

    fn base(&self, stash: &Reference) -> Response {
        let base = self
            .repo
            .resolve_commit(&stash.target)
            .and_then(|commit| self.repo.parent_commit(&commit, 0))
            .map_err(|source| AssayError::Stash {
                repository: self.ctx.repository.clone(),
                source,
            })?;
        debug!(base = %base.id.short(), "stash found");
        Ok(Verdict::StashedChanges {
            repository: self.ctx.repository.clone(),
            base,
        })
    }
}

impl Iterator for StashVerdicts<'_> {
    type Item = Response;

    fn next(&mut self) -> Option<Response> {
        if self.done || self.ctx.cancel.is_cancelled() {
            return None;
        }
        // A single stash is modelled, so one pass over the references
        // finishes the checker.
        self.done = true;
        let references = match self.repo.references() {
            Ok(references) => references,
            Err(source) => return Some(Err(self.references_error(source))),
        };
        for item in references {
            if self.ctx.cancel.is_cancelled() {
                return None;
            }
            match item {
                Ok(reference) if reference.name == STASH_REF => return Some(self.base(&reference)),
                Ok(_) => {}
                Err(source) => return Some(Err(self.references_error(source))),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, run};
    use super::*;
    use crate::domain::CommitId;
    use crate::fakes::MemoryRepository;
    use std::path::PathBuf;

    fn repo() -> MemoryRepository {
        MemoryRepository::new("/src/app")
            .with_commit("c1", &[], "initial")
            .with_commit("c2", &["c1"], "add parser")
            .with_branch("main", "c2")
    }

    #[test]
    fn test_no_stash_yields_nothing() {
        let out = run(&StashChecker, &context("app", "/src/app"), &repo());
        assert!(out.is_empty());
    }

    #[test]
    fn test_stash_reports_first_parent() {
        let repo = repo().with_stash("s1", "c2");
        let out = run(&StashChecker, &context("app", "/src/app"), &repo);
        assert_eq!(out.len(), 1);
        match out[0].as_ref().unwrap() {
            Verdict::StashedChanges { repository, base } => {
                assert_eq!(repository, &PathBuf::from("app"));
                assert_eq!(base.id, CommitId::new("c2"));
                assert_eq!(base.summary, "add parser");
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn test_missing_stash_commit_is_stash_error() {
        let repo = repo().with_reference(STASH_REF, "dangling");
        let out = run(&StashChecker, &context("app", "/src/app"), &repo);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(AssayError::Stash { .. })));
    }

    #[test]
    fn test_reference_listing_failure() {
        let repo = repo().failing_references("refs unreadable");
        let out = run(&StashChecker, &context("app", "/src/app"), &repo);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(AssayError::References { .. })));
    }

    #[test]
    fn test_error_while_iterating_references() {
        let repo = repo().failing_reference_iteration("packed-refs corrupt");
        let out = run(&StashChecker, &context("app", "/src/app"), &repo);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(AssayError::References { .. })));
    }
}
