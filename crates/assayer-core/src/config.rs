//! Scan configuration.

use std::path::Path;

use crate::domain::VerdictFamily;

/// Default capacity of the discovery and result queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Which verdict families to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSelection {
    pub unmodified: bool,
    pub modified: bool,
    pub untracked: bool,
    pub stashed: bool,
    pub remote_ahead: bool,
    pub remote_behind: bool,
    pub local_only_branch: bool,
}

impl CheckSelection {
    /// Every family, including unmodified repositories.
    pub fn all() -> Self {
        Self {
            unmodified: true,
            ..Self::default()
        }
    }

    /// No family selected.
    pub fn none() -> Self {
        Self {
            unmodified: false,
            modified: false,
            untracked: false,
            stashed: false,
            remote_ahead: false,
            remote_behind: false,
            local_only_branch: false,
        }
    }

    /// Select exactly the given families.
    pub fn only(families: &[VerdictFamily]) -> Self {
        let mut selection = Self::none();
        for family in families {
            selection.set(*family, true);
        }
        selection
    }

    pub fn is_enabled(&self, family: VerdictFamily) -> bool {
        match family {
            VerdictFamily::Unmodified => self.unmodified,
            VerdictFamily::Modified => self.modified,
            VerdictFamily::Untracked => self.untracked,
            VerdictFamily::Stashed => self.stashed,
            VerdictFamily::RemoteAhead => self.remote_ahead,
            VerdictFamily::RemoteBehind => self.remote_behind,
            VerdictFamily::LocalOnlyBranch => self.local_only_branch,
        }
    }

    pub fn set(&mut self, family: VerdictFamily, enabled: bool) {
        let flag = match family {
            VerdictFamily::Unmodified => &mut self.unmodified,
            VerdictFamily::Modified => &mut self.modified,
            VerdictFamily::Untracked => &mut self.untracked,
            VerdictFamily::Stashed => &mut self.stashed,
            VerdictFamily::RemoteAhead => &mut self.remote_ahead,
            VerdictFamily::RemoteBehind => &mut self.remote_behind,
            VerdictFamily::LocalOnlyBranch => &mut self.local_only_branch,
        };
        *flag = enabled;
    }

    pub fn wants_worktree(&self) -> bool {
        self.modified || self.untracked
    }

    pub fn wants_branches(&self) -> bool {
        self.local_only_branch || self.remote_ahead || self.remote_behind
    }
}

impl Default for CheckSelection {
    /// Everything except unmodified repositories.
    fn default() -> Self {
        Self {
            unmodified: false,
            modified: true,
            untracked: true,
            stashed: true,
            remote_ahead: true,
            remote_behind: true,
            local_only_branch: true,
        }
    }
}

/// Options for one scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub checks: CheckSelection,
    /// Keep descending into repositories found inside repositories.
    pub nested: bool,
    /// Report every match per repository instead of only the first.
    pub deep: bool,
    /// Capacity of the bounded discovery and result queues.
    pub channel_capacity: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            checks: CheckSelection::default(),
            nested: false,
            deep: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Decides which repositories are skipped, given their absolute path.
pub trait PathFilter: Send + Sync {
    fn is_excluded(&self, path: &Path) -> bool;
}

impl<F> PathFilter for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn is_excluded(&self, path: &Path) -> bool {
        self(path)
    }
}
