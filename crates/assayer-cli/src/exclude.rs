//! Glob-based repository exclusion.

use std::path::Path;

use anyhow::{Context, Result};
use assayer_core::PathFilter;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Excludes repositories whose absolute path matches any of the patterns.
///
/// `*` also matches path separators, so `*/vendor/*` skips every
/// repository below any `vendor` directory.
#[derive(Debug)]
pub struct GlobExclusion {
    set: GlobSet,
}

impl GlobExclusion {
    /// Compile `patterns`; `None` when there are none.
    pub fn compile(patterns: &[String]) -> Result<Option<Self>> {
        if patterns.is_empty() {
            return Ok(None);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(
                Glob::new(pattern).with_context(|| format!("exclude pattern is invalid: {pattern:?}"))?,
            );
        }
        let set = builder.build().context("cannot build exclude patterns")?;
        Ok(Some(Self { set }))
    }
}

impl PathFilter for GlobExclusion {
    fn is_excluded(&self, path: &Path) -> bool {
        self.set.is_match(path)
    }
}
