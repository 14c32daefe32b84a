//! Repository-state provider backed by the `git` executable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::trace;

use crate::domain::{
    ChangeKind, Commit, CommitId, FileStatus, ProviderError, Reference, WorktreeStatus,
};
use crate::provider::{ProviderResult, References, Repository, RepositoryProvider};

/// Name of the version-control marker directory.
pub const MARKER_DIR: &str = ".git";

/// stderr fragments git prints when an object is absent from the database.
const MISSING_OBJECT_MARKERS: [&str; 7] = [
    "bad object",
    "not a valid object",
    "not a valid commit",
    "unknown revision",
    "missing blob",
    "missing commit",
    "missing tree",
];

/// Read failures that count only when followed by an object id, e.g.
/// `error: Could not read 4b825dc6...` while walking a shallow history.
const UNREADABLE_OBJECT_MARKERS: [&str; 2] = ["could not read ", "unable to read "];

/// Opens repositories by shelling out to `git`.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for GitCli {
    fn open(&self, path: &Path) -> ProviderResult<Box<dyn Repository>> {
        if !path.join(MARKER_DIR).exists() {
            return Err(ProviderError::NotARepository(path.to_path_buf()));
        }
        let repo = GitRepository {
            workdir: path.to_path_buf(),
            program: self.program.clone(),
        };
        let output = repo.output(&["rev-parse", "--is-inside-work-tree"])?;
        if !output.status.success() || String::from_utf8_lossy(&output.stdout).trim() != "true" {
            return Err(ProviderError::NotARepository(path.to_path_buf()));
        }
        Ok(Box::new(repo))
    }
}

/// A worktree opened through [`GitCli`].
#[derive(Debug)]
pub struct GitRepository {
    workdir: PathBuf,
    program: PathBuf,
}

impl GitRepository {
    fn output(&self, args: &[&str]) -> ProviderResult<Output> {
        trace!(workdir = %self.workdir.display(), ?args, "running git");
        Command::new(&self.program)
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_OPTIONAL_LOCKS", "0")
            .env("LC_ALL", "C")
            .output()
            .map_err(ProviderError::from)
    }

    /// Run git and return stdout, failing on a non-zero exit.
    fn run(&self, args: &[&str]) -> ProviderResult<Vec<u8>> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(classify_failure(args, &output.stderr));
        }
        Ok(output.stdout)
    }

    fn run_text(&self, args: &[&str]) -> ProviderResult<String> {
        let stdout = self.run(args)?;
        String::from_utf8(stdout)
            .map_err(|e| ProviderError::Parse(format!("git {}: {e}", args.join(" "))))
    }
}

impl Repository for GitRepository {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn worktree_status(&self) -> ProviderResult<WorktreeStatus> {
        let raw = self.run(&["status", "--porcelain=v1", "-z", "--untracked-files=all"])?;
        parse_porcelain_status(&raw)
    }

    fn local_branches(&self) -> ProviderResult<BTreeMap<String, CommitId>> {
        let text = self.run_text(&[
            "for-each-ref",
            "--format=%(refname:strip=2)%00%(objectname)",
            "refs/heads/",
        ])?;
        text.lines()
            .filter(|line| !line.is_empty())
            .map(|line| -> ProviderResult<(String, CommitId)> {
                let (name, id) = line
                    .split_once('\0')
                    .ok_or_else(|| ProviderError::Parse(format!("branch line {line:?}")))?;
                Ok((name.to_string(), CommitId::new(id)))
            })
            .collect()
    }

    fn references(&self) -> ProviderResult<References<'_>> {
        let text = self.run_text(&[
            "for-each-ref",
            "--format=%(refname)%00%(objectname)%00%(symref)",
        ])?;
        let lines: Vec<String> = text
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok(Box::new(
            lines
                .into_iter()
                .filter_map(|line| parse_reference_line(&line).transpose()),
        ))
    }

    fn resolve_commit(&self, id: &CommitId) -> ProviderResult<Commit> {
        let rev = format!("{}^{{commit}}", id.as_str());
        let text = self.run_text(&["show", "-s", "--format=%H%x00%P%x00%s", &rev])?;
        parse_commit_line(text.trim_end_matches('\n'))
    }

    fn is_ancestor(&self, candidate: &Commit, commit: &Commit) -> ProviderResult<bool> {
        let args = [
            "merge-base",
            "--is-ancestor",
            candidate.id.as_str(),
            commit.id.as_str(),
        ];
        let output = self.output(&args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(classify_failure(&args, &output.stderr)),
        }
    }
}

fn classify_failure(args: &[&str], stderr: &[u8]) -> ProviderError {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    let lower = stderr.to_ascii_lowercase();
    if names_missing_object(&lower) {
        return ProviderError::ObjectNotFound(stderr);
    }
    ProviderError::Command {
        command: args.join(" "),
        stderr,
    }
}

fn names_missing_object(stderr: &str) -> bool {
    if MISSING_OBJECT_MARKERS.iter().any(|m| stderr.contains(m)) {
        return true;
    }
    UNREADABLE_OBJECT_MARKERS.iter().any(|marker| {
        stderr.match_indices(marker).any(|(at, _)| {
            let id: String = stderr[at + marker.len()..]
                .chars()
                .take_while(char::is_ascii_hexdigit)
                .collect();
            id.len() >= 7
        })
    })
}

/// Parse `git status --porcelain=v1 -z` output.
///
/// Each record is `XY <path>`; rename and copy records are followed by an
/// extra field holding the source path, which is skipped.
pub fn parse_porcelain_status(raw: &[u8]) -> ProviderResult<WorktreeStatus> {
    let mut status = WorktreeStatus::new();
    let mut fields = raw.split(|b| *b == 0).filter(|field| !field.is_empty());
    while let Some(record) = fields.next() {
        if record.len() < 4 || record[2] != b' ' {
            return Err(ProviderError::Parse(format!(
                "status record {:?}",
                String::from_utf8_lossy(record)
            )));
        }
        let (x, y) = (record[0], record[1]);
        if matches!(x, b'R' | b'C') || matches!(y, b'R' | b'C') {
            fields.next();
        }
        if x == b'!' {
            continue;
        }
        let path = String::from_utf8_lossy(&record[3..]);
        status.insert(path.trim_end_matches('/'), file_status(x, y));
    }
    Ok(status)
}

fn file_status(x: u8, y: u8) -> FileStatus {
    let unmerged = x == b'U' || y == b'U' || (x, y) == (b'D', b'D') || (x, y) == (b'A', b'A');
    if unmerged {
        return FileStatus::new(ChangeKind::UpdatedButUnmerged, ChangeKind::UpdatedButUnmerged);
    }
    FileStatus::new(change_kind(x), change_kind(y))
}

fn change_kind(code: u8) -> ChangeKind {
    match code {
        b' ' => ChangeKind::Unmodified,
        b'?' => ChangeKind::Untracked,
        b'A' => ChangeKind::Added,
        b'D' => ChangeKind::Deleted,
        b'R' => ChangeKind::Renamed,
        b'C' => ChangeKind::Copied,
        b'U' => ChangeKind::UpdatedButUnmerged,
        // M, T (type change) and anything newer git may add
        _ => ChangeKind::Modified,
    }
}

/// Parse one `%(refname)%00%(objectname)%00%(symref)` line. Symbolic refs
/// yield `None`.
fn parse_reference_line(line: &str) -> ProviderResult<Option<Reference>> {
    let mut parts = line.split('\0');
    let (Some(name), Some(id)) = (parts.next(), parts.next()) else {
        return Err(ProviderError::Parse(format!("reference line {line:?}")));
    };
    if parts.next().is_some_and(|symref| !symref.is_empty()) {
        return Ok(None);
    }
    Ok(Some(Reference::new(name, CommitId::new(id))))
}

fn parse_commit_line(line: &str) -> ProviderResult<Commit> {
    let mut parts = line.splitn(3, '\0');
    let (Some(id), Some(parents), summary) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ProviderError::Parse(format!("commit line {line:?}")));
    };
    if id.is_empty() {
        return Err(ProviderError::Parse(format!("commit line {line:?}")));
    }
    Ok(Commit {
        id: CommitId::new(id),
        parents: parents.split_whitespace().map(CommitId::new).collect(),
        summary: summary.unwrap_or_default().to_string(),
    })
}
