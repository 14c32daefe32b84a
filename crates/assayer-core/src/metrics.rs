//! Global atomic counters for scan observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when a scan finishes).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    directories_visited: AtomicU64,
    repositories_discovered: AtomicU64,
    discovery_errors: AtomicU64,
    repositories_checked: AtomicU64,
    repositories_excluded: AtomicU64,
    verdicts_emitted: AtomicU64,
    error_responses: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            directories_visited: AtomicU64::new(0),
            repositories_discovered: AtomicU64::new(0),
            discovery_errors: AtomicU64::new(0),
            repositories_checked: AtomicU64::new(0),
            repositories_excluded: AtomicU64::new(0),
            verdicts_emitted: AtomicU64::new(0),
            error_responses: AtomicU64::new(0),
        }
    }

    pub fn inc_directories_visited(&self) {
        self.directories_visited.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "directories_visited", "counter incremented");
    }

    pub fn inc_repositories_discovered(&self) {
        self.repositories_discovered.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "repositories_discovered", "counter incremented");
    }

    pub fn inc_discovery_errors(&self) {
        self.discovery_errors.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "discovery_errors", "counter incremented");
    }

    pub fn inc_repositories_checked(&self) {
        self.repositories_checked.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "repositories_checked", "counter incremented");
    }

    pub fn inc_repositories_excluded(&self) {
        self.repositories_excluded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "repositories_excluded", "counter incremented");
    }

    pub fn inc_verdicts(&self) {
        self.verdicts_emitted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "verdicts_emitted", "counter incremented");
    }

    pub fn inc_error_responses(&self) {
        self.error_responses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "error_responses", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            directories_visited = self.directories_visited(),
            repositories_discovered = self.repositories_discovered(),
            discovery_errors = self.discovery_errors(),
            repositories_checked = self.repositories_checked(),
            repositories_excluded = self.repositories_excluded(),
            verdicts_emitted = self.verdicts_emitted(),
            error_responses = self.error_responses(),
        );
    }

    pub fn directories_visited(&self) -> u64 {
        self.directories_visited.load(Ordering::Relaxed)
    }

    pub fn repositories_discovered(&self) -> u64 {
        self.repositories_discovered.load(Ordering::Relaxed)
    }

    pub fn discovery_errors(&self) -> u64 {
        self.discovery_errors.load(Ordering::Relaxed)
    }

    pub fn repositories_checked(&self) -> u64 {
        self.repositories_checked.load(Ordering::Relaxed)
    }

    pub fn repositories_excluded(&self) -> u64 {
        self.repositories_excluded.load(Ordering::Relaxed)
    }

    pub fn verdicts_emitted(&self) -> u64 {
        self.verdicts_emitted.load(Ordering::Relaxed)
    }

    pub fn error_responses(&self) -> u64 {
        self.error_responses.load(Ordering::Relaxed)
    }
}
