//! Modified and untracked file detection.

use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::{CheckContext, Checker, Verdicts};
use crate::cancel::CancellationToken;
use crate::domain::{AssayError, ChangeKind, FileStatus, Response, Verdict, WorktreeStatus};
use crate::git::MARKER_DIR;
use crate::provider::Repository;

/// Reports the first modified path, then the shallowest fully untracked
/// directory (or file).
#[derive(Debug, Clone, Copy)]
pub struct WorktreeChecker {
    modified: bool,
    untracked: bool,
}

impl WorktreeChecker {
    pub fn new(modified: bool, untracked: bool) -> Self {
        Self {
            modified,
            untracked,
        }
    }
}

impl Checker for WorktreeChecker {
    fn name(&self) -> &'static str {
        "worktree"
    }

    fn check<'a>(&'a self, ctx: &'a CheckContext, repo: &'a dyn Repository) -> Verdicts<'a> {
        Box::new(WorktreeVerdicts {
            checker: self,
            ctx,
            repo,
            status: None,
            stage: Stage::Modified,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Modified,
    Untracked,
    Done,
}

struct WorktreeVerdicts<'a> {
    checker: &'a WorktreeChecker,
    ctx: &'a CheckContext,
    repo: &'a dyn Repository,
    /// Loaded on first use and shared by both sub-checks.
    status: Option<WorktreeStatus>,
    stage: Stage,
}

impl WorktreeVerdicts<'_> {
    fn load_status(&mut self) -> Result<(), AssayError> {
        if self.status.is_none() {
            let status = self
                .repo
                .worktree_status()
                .map_err(|source| AssayError::Status {
                    repository: self.ctx.repository.clone(),
                    source,
                })?;
            debug!(entries = status.len(), "worktree status loaded");
            self.status = Some(status);
        }
        Ok(())
    }

    fn modified(&self, status: &WorktreeStatus) -> Option<Verdict> {
        let (path, change) = first_modified(status)?;
        Some(Verdict::Modified {
            repository: self.ctx.repository.clone(),
            path: path.to_string(),
            change,
        })
    }

    fn untracked(&self, status: &WorktreeStatus) -> Option<Response> {
        let (path, _) = status.iter().find(|(_, s)| s.is_untracked())?;
        let collapsed =
            collapse_untracked(self.repo.workdir(), status, path, &self.ctx.cancel).map_err(
                |source| AssayError::UntrackedWalk {
                    repository: self.ctx.repository.clone(),
                    path: path.clone(),
                    source,
                },
            );
        match collapsed {
            Ok(Some(path)) => Some(Ok(Verdict::Untracked {
                repository: self.ctx.repository.clone(),
                path,
            })),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl Iterator for WorktreeVerdicts<'_> {
    type Item = Response;

    fn next(&mut self) -> Option<Response> {
        loop {
            if self.ctx.cancel.is_cancelled() {
                self.stage = Stage::Done;
            }
            let stage = self.stage;
            let wanted = match stage {
                Stage::Modified => {
                    self.stage = Stage::Untracked;
                    self.checker.modified
                }
                Stage::Untracked => {
                    self.stage = Stage::Done;
                    self.checker.untracked
                }
                Stage::Done => return None,
            };
            if !wanted {
                continue;
            }
            if let Err(err) = self.load_status() {
                self.stage = Stage::Done;
                return Some(Err(err));
            }
            let status = self.status.as_ref()?;
            let found = match stage {
                Stage::Modified => self.modified(status).map(Ok),
                _ => self.untracked(status),
            };
            if let Some(response) = found {
                if response.is_err() {
                    self.stage = Stage::Done;
                }
                return Some(response);
            }
        }
    }
}

/// First entry (in path order) with a changed worktree state, falling back
/// to that entry's staging state.
fn first_modified(status: &WorktreeStatus) -> Option<(&str, ChangeKind)> {
    status.iter().find_map(|(path, file)| {
        if file.worktree.is_change() {
            Some((path.as_str(), file.worktree))
        } else if file.staging.is_change() {
            Some((path.as_str(), file.staging))
        } else {
            None
        }
    })
}

/// Shorten an untracked path to the shallowest directory that holds no
/// file git knows about.
///
/// Walks the subtree under the path's first component. Every file that is
/// not untracked pins the result at least one component below the point
/// where it diverges from `untracked`. Returns `Ok(None)` when cancelled.
pub fn collapse_untracked(
    workdir: &Path,
    status: &WorktreeStatus,
    untracked: &str,
    cancel: &CancellationToken,
) -> Result<Option<String>, walkdir::Error> {
    let components: Vec<&str> = untracked.split('/').collect();
    if components.len() == 1 {
        return Ok(Some(untracked.to_string()));
    }
    let deepest = components.len() - 1;

    let mut boundary = 0;
    let walker = WalkDir::new(workdir.join(components[0]))
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != MARKER_DIR);
    for entry in walker {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(workdir) else {
            continue;
        };
        let relative = slash_path(relative);
        if status.get(&relative).is_some_and(FileStatus::is_untracked) {
            continue;
        }
        let shared = relative
            .split('/')
            .zip(&components)
            .take_while(|(walked, wanted)| walked == *wanted)
            .count();
        boundary = boundary.max(shared.min(deepest));
        if boundary == deepest {
            break;
        }
    }
    Ok(Some(components[..=boundary].join("/")))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
