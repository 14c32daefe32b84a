//! Local/remote branch reconciliation.
//!
//! Every remote-tracking reference is paired with the local branch of the
//! same bare name. Pairs pointing at different commits are classified by
//! ancestry; local branches that never met a remote are reported last.

use std::collections::{btree_map, BTreeMap};

use tracing::debug;

use super::{CheckContext, Checker, Verdicts};
use crate::config::CheckSelection;
use crate::domain::{AssayError, Commit, CommitId, CommitSide, Reference, Response, Verdict};
use crate::provider::{References, Repository};

#[derive(Debug, Clone, Copy)]
pub struct BranchChecker {
    local_only: bool,
    remote_ahead: bool,
    remote_behind: bool,
}

impl BranchChecker {
    pub fn new(local_only: bool, remote_ahead: bool, remote_behind: bool) -> Self {
        Self {
            local_only,
            remote_ahead,
            remote_behind,
        }
    }

    pub fn from_selection(checks: &CheckSelection) -> Self {
        Self::new(
            checks.local_only_branch,
            checks.remote_ahead,
            checks.remote_behind,
        )
    }

    fn classifies_divergence(&self) -> bool {
        self.remote_ahead || self.remote_behind
    }
}

impl Checker for BranchChecker {
    fn name(&self) -> &'static str {
        "branch"
    }

    fn check<'a>(&'a self, ctx: &'a CheckContext, repo: &'a dyn Repository) -> Verdicts<'a> {
        Box::new(BranchVerdicts {
            checker: self,
            ctx,
            repo,
            phase: Phase::Start,
        })
    }
}

enum Phase<'a> {
    Start,
    Remotes {
        locals: BTreeMap<String, CommitId>,
        references: References<'a>,
    },
    LocalOnly(btree_map::IntoIter<String, CommitId>),
    Done,
}

struct BranchVerdicts<'a> {
    checker: &'a BranchChecker,
    ctx: &'a CheckContext,
    repo: &'a dyn Repository,
    phase: Phase<'a>,
}

impl<'a> BranchVerdicts<'a> {
    fn start(&self) -> Result<Phase<'a>, AssayError> {
        let repo = self.repo;
        let repository = &self.ctx.repository;
        let locals = repo
            .local_branches()
            .map_err(|source| AssayError::Branches {
                repository: repository.clone(),
                source,
            })?;
        let references = repo
            .references()
            .map_err(|source| AssayError::References {
                repository: repository.clone(),
                source,
            })?;
        debug!(local_branches = locals.len(), "branches loaded");
        Ok(Phase::Remotes { locals, references })
    }

    /// Match one reference against the local branches, removing the local
    /// branch it pairs with.
    fn reconcile(
        &self,
        locals: &mut BTreeMap<String, CommitId>,
        reference: &Reference,
    ) -> Result<Option<Verdict>, AssayError> {
        if !reference.is_remote() {
            return Ok(None);
        }
        let remote_ref = reference.short_name();
        let branch = match remote_ref.split_once('/') {
            Some((remote, branch)) if !remote.is_empty() && !branch.is_empty() => branch,
            _ => {
                return Err(AssayError::MalformedRemoteRef {
                    repository: self.ctx.repository.clone(),
                    name: remote_ref.to_string(),
                })
            }
        };
        let Some(local) = locals.remove(branch) else {
            return Ok(None);
        };
        if local == reference.target || !self.checker.classifies_divergence() {
            return Ok(None);
        }

        let remote_commit = self.resolve(branch, CommitSide::Remote, &reference.target)?;
        let local_commit = self.resolve(branch, CommitSide::Local, &local)?;
        let remote_is_ancestor = match self.repo.is_ancestor(&remote_commit, &local_commit) {
            Ok(is_ancestor) => is_ancestor,
            Err(err) if err.is_object_not_found() => {
                debug!(branch, error = %err, "incomplete history, treating remote as ahead");
                false
            }
            Err(source) => {
                return Err(AssayError::Ancestry {
                    repository: self.ctx.repository.clone(),
                    remote: remote_commit.id,
                    local: local_commit.id,
                    source,
                })
            }
        };

        let repository = self.ctx.repository.clone();
        let local_branch = branch.to_string();
        let remote_ref = remote_ref.to_string();
        let verdict = if remote_is_ancestor {
            self.checker.remote_behind.then_some(Verdict::RemoteBehind {
                repository,
                local_branch,
                remote_ref,
            })
        } else {
            self.checker.remote_ahead.then_some(Verdict::RemoteAhead {
                repository,
                local_branch,
                remote_ref,
            })
        };
        Ok(verdict)
    }

    fn resolve(&self, branch: &str, side: CommitSide, id: &CommitId) -> Result<Commit, AssayError> {
        self.repo
            .resolve_commit(id)
            .map_err(|source| AssayError::Commit {
                repository: self.ctx.repository.clone(),
                branch: branch.to_string(),
                side,
                source,
            })
    }
}

impl Iterator for BranchVerdicts<'_> {
    type Item = Response;

    fn next(&mut self) -> Option<Response> {
        loop {
            if self.ctx.cancel.is_cancelled() {
                self.phase = Phase::Done;
                return None;
            }
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Start => match self.start() {
                    Ok(phase) => self.phase = phase,
                    Err(err) => return Some(Err(err)),
                },
                Phase::Remotes {
                    mut locals,
                    mut references,
                } => match references.next() {
                    None => self.phase = Phase::LocalOnly(locals.into_iter()),
                    Some(Err(source)) => {
                        return Some(Err(AssayError::References {
                            repository: self.ctx.repository.clone(),
                            source,
                        }))
                    }
                    Some(Ok(reference)) => {
                        let outcome = self.reconcile(&mut locals, &reference);
                        match outcome {
                            Ok(verdict) => {
                                self.phase = Phase::Remotes { locals, references };
                                if let Some(verdict) = verdict {
                                    return Some(Ok(verdict));
                                }
                            }
                            Err(err) => return Some(Err(err)),
                        }
                    }
                },
                Phase::LocalOnly(mut remaining) => {
                    if !self.checker.local_only {
                        return None;
                    }
                    let (branch, _) = remaining.next()?;
                    self.phase = Phase::LocalOnly(remaining);
                    return Some(Ok(Verdict::LocalOnlyBranch {
                        repository: self.ctx.repository.clone(),
                        branch,
                    }));
                }
                Phase::Done => return None,
            }
        }
    }
}
