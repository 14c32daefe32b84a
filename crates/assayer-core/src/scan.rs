//! Scan pipeline: discovery feeding concurrent repository checks.
//!
//! ```text
//! RepositoryLocator --(discovery channel)--> driver --spawn_blocking--> workers
//!                                                                         |
//!                                   Scan::recv <--(bounded result channel)-+
//! ```
//!
//! The driver joins every worker before dropping the last result sender,
//! so the result stream closes once and loses nothing.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::check::{Assayer, CheckContext};
use crate::config::{PathFilter, ScanOptions};
use crate::discovery::RepositoryLocator;
use crate::domain::Response;
use crate::provider::RepositoryProvider;

/// Totals of one finished scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub repositories_found: u64,
    pub discovery_errors: u64,
    pub directories_visited: u64,
}

/// Configured scanner; one instance can run any number of scans.
pub struct Scanner {
    assayer: Arc<Assayer>,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(provider: Arc<dyn RepositoryProvider>, options: ScanOptions) -> Self {
        Self {
            assayer: Arc::new(Assayer::new(provider, &options)),
            options,
        }
    }

    /// Build with an exclusion filter applied to absolute repository paths.
    pub fn with_exclusion(
        provider: Arc<dyn RepositoryProvider>,
        options: ScanOptions,
        filter: Arc<dyn PathFilter>,
    ) -> Self {
        Self {
            assayer: Arc::new(Assayer::new(provider, &options).with_exclusion(filter)),
            options,
        }
    }

    /// Start scanning `root` on the current tokio runtime.
    pub fn start(&self, root: impl Into<PathBuf>) -> Scan {
        let root = root.into();
        let cancel = CancellationToken::new();
        let capacity = self.options.channel_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let locator = RepositoryLocator::new(root.clone())
            .nested(self.options.nested)
            .capacity(capacity)
            .with_cancellation(cancel.clone());

        info!(
            root = %root.display(),
            nested = self.options.nested,
            deep = self.options.deep,
            "scan started"
        );
        let handle = tokio::spawn(drive(
            Arc::clone(&self.assayer),
            root,
            locator,
            tx,
            cancel.clone(),
        ));
        Scan {
            responses: rx,
            cancel,
            handle,
        }
    }
}

/// A running scan.
pub struct Scan {
    responses: mpsc::Receiver<Response>,
    cancel: CancellationToken,
    handle: JoinHandle<ScanSummary>,
}

impl Scan {
    /// Next response, or `None` once every repository has been checked.
    pub async fn recv(&mut self) -> Option<Response> {
        self.responses.recv().await
    }

    /// Stop discovery and every in-flight check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop consuming and wait until every task of the scan has exited.
    pub async fn finish(self) -> Result<ScanSummary, JoinError> {
        let Scan { responses, handle, .. } = self;
        // Unblocks workers waiting on a full channel.
        drop(responses);
        handle.await
    }

    /// Drain every response, then finish.
    pub async fn collect(mut self) -> Result<(Vec<Response>, ScanSummary), JoinError> {
        let mut responses = Vec::new();
        while let Some(response) = self.recv().await {
            responses.push(response);
        }
        let summary = self.finish().await?;
        Ok((responses, summary))
    }
}

/// Absolute path of a repository id under `root`.
pub fn repository_path(root: &Path, repository: &Path) -> PathBuf {
    if repository == Path::new(".") {
        root.to_path_buf()
    } else {
        root.join(repository)
    }
}

async fn drive(
    assayer: Arc<Assayer>,
    root: PathBuf,
    locator: RepositoryLocator,
    tx: mpsc::Sender<Response>,
    cancel: CancellationToken,
) -> ScanSummary {
    let mut summary = ScanSummary::default();
    let (mut discovered, discovery) = locator.spawn();
    let mut workers = JoinSet::new();

    while let Some(record) = discovered.recv().await {
        if cancel.is_cancelled() || tx.is_closed() {
            cancel.cancel();
            break;
        }
        let repository = match record {
            Ok(repository) => repository,
            Err(_) => {
                // already logged by the locator
                summary.discovery_errors += 1;
                continue;
            }
        };
        summary.repositories_found += 1;

        let ctx = CheckContext::new(
            repository.clone(),
            repository_path(&root, &repository),
            cancel.clone(),
        );
        let assayer = Arc::clone(&assayer);
        let tx = tx.clone();
        workers.spawn_blocking(move || {
            assayer.check_repository(&ctx, &mut |response| match tx.blocking_send(response) {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            })
        });
    }
    drop(discovered);

    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            warn!(error = %err, "repository worker failed");
        }
    }
    match discovery.await {
        Ok(stats) => summary.directories_visited = stats.directories,
        Err(err) => warn!(error = %err, "discovery task failed"),
    }
    drop(tx);

    info!(
        repositories = summary.repositories_found,
        discovery_errors = summary.discovery_errors,
        directories = summary.directories_visited,
        cancelled = cancel.is_cancelled(),
        "scan finished"
    );
    summary
}
