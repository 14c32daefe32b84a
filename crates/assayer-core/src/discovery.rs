//! Concurrent repository discovery.
//!
//! The locator lists every directory under a root in its own task. A
//! directory is a repository root when it holds a `.git` directory; roots
//! are sent (relative to the scan root, `.` for the root itself) into a
//! bounded channel as soon as they are seen.
//!
//! A single driver task owns the `JoinSet` of listing tasks and spawns the
//! children each listing returns. The channel closes when the driver's
//! `join_next()` runs dry, which happens exactly once and only after every
//! listing has finished.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::config::DEFAULT_CHANNEL_CAPACITY;
use crate::domain::AssayError;
use crate::git::MARKER_DIR;
use crate::metrics::METRICS;

/// A discovered repository id, or a directory that could not be listed.
pub type DiscoveryRecord = Result<PathBuf, AssayError>;

/// Totals of one discovery walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub directories: u64,
    pub repositories: u64,
    pub errors: u64,
}

/// Finds repositories under a root directory.
#[derive(Debug, Clone)]
pub struct RepositoryLocator {
    root: PathBuf,
    nested: bool,
    capacity: usize,
    cancel: CancellationToken,
}

impl RepositoryLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            nested: false,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            cancel: CancellationToken::new(),
        }
    }

    /// Keep descending below repository roots.
    pub fn nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    /// Capacity of the discovery channel.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Start walking on the current tokio runtime.
    ///
    /// Records arrive on the receiver until the walk completes. Dropping
    /// the receiver stops the walk.
    pub fn spawn(self) -> (mpsc::Receiver<DiscoveryRecord>, JoinHandle<DiscoveryStats>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let handle = tokio::spawn(self.drive(tx));
        (rx, handle)
    }

    async fn drive(self, tx: mpsc::Sender<DiscoveryRecord>) -> DiscoveryStats {
        let mut stats = DiscoveryStats::default();
        let mut tasks = JoinSet::new();
        tasks.spawn(visit(self.root.clone(), PathBuf::new(), self.nested, tx.clone()));

        while let Some(joined) = tasks.join_next().await {
            let listing = match joined {
                Ok(listing) => listing,
                Err(err) => {
                    warn!(error = %err, "directory listing task failed");
                    continue;
                }
            };
            stats.directories += 1;
            stats.repositories += u64::from(listing.repository);
            stats.errors += u64::from(listing.failed);

            if self.cancel.is_cancelled() || tx.is_closed() {
                continue;
            }
            for child in listing.children {
                tasks.spawn(visit(
                    self.root.join(&child),
                    child,
                    self.nested,
                    tx.clone(),
                ));
            }
        }

        debug!(
            directories = stats.directories,
            repositories = stats.repositories,
            errors = stats.errors,
            "discovery finished"
        );
        stats
    }
}

#[derive(Debug, Default)]
struct Listing {
    /// Subdirectories to visit, relative to the scan root.
    children: Vec<PathBuf>,
    repository: bool,
    failed: bool,
}

async fn visit(
    dir: PathBuf,
    relative: PathBuf,
    nested: bool,
    tx: mpsc::Sender<DiscoveryRecord>,
) -> Listing {
    METRICS.inc_directories_visited();
    let mut listing = Listing::default();

    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(source) => {
            report_failure(&tx, &dir, source).await;
            listing.failed = true;
            return listing;
        }
    };

    let mut names: Vec<OsString> = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                // DirEntry::file_type does not follow symlinks.
                match entry.file_type().await {
                    Ok(file_type) if file_type.is_dir() => names.push(entry.file_name()),
                    Ok(_) => {}
                    Err(err) => debug!(path = %entry.path().display(), error = %err, "skipping entry"),
                }
            }
            Ok(None) => break,
            Err(source) => {
                report_failure(&tx, &dir, source).await;
                listing.failed = true;
                break;
            }
        }
    }

    listing.repository = names.iter().any(|name| name == MARKER_DIR);
    if listing.repository {
        METRICS.inc_repositories_discovered();
        let id = if relative.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            relative.clone()
        };
        debug!(repository = %id.display(), "repository found");
        if tx.send(Ok(id)).await.is_err() {
            return listing;
        }
        if !nested {
            return listing;
        }
    }

    listing.children = names
        .into_iter()
        .filter(|name| name != MARKER_DIR)
        .map(|name| relative.join(name))
        .collect();
    listing
}

async fn report_failure(tx: &mpsc::Sender<DiscoveryRecord>, dir: &Path, source: std::io::Error) {
    METRICS.inc_discovery_errors();
    warn!(path = %dir.display(), error = %source, "cannot read directory");
    let _ = tx
        .send(Err(AssayError::Discovery {
            path: dir.to_path_buf(),
            source,
        }))
        .await;
}
