//! Unchanged-file lockout table (spec §4.4/§9, resolved Open Question:
//! "does the lockout decrement regardless of whether the path was
//! touched this iteration?" — yes; see DESIGN.md).
//!
//! When a READ/MODIFY edit against a path produces byte-identical output,
//! that path is locked out of further edits for a configured number of
//! iterations. The lockout still counts down on iterations where the
//! path is never touched at all, so a model that moves on to other files
//! and comes back later finds the lockout already partially or fully
//! expired rather than frozen at its original value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

/// In-memory countdown of remaining locked-out iterations per path.
#[derive(Debug, Default)]
pub struct LockoutTable {
    countdowns: HashMap<PathBuf, u32>,
}

impl LockoutTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a no-op edit against `path`, locking it out for
    /// `iterations` more iterations (overwriting any existing countdown).
    pub fn record_noop(&mut self, path: impl Into<PathBuf>, iterations: u32) {
        let path = path.into();
        debug!(path = %path.display(), iterations, "locking out path after no-op edit");
        self.countdowns.insert(path, iterations);
    }

    /// Returns the number of iterations remaining before `path` may be
    /// edited again, or `None` if it isn't locked out.
    pub fn remaining(&self, path: &Path) -> Option<u32> {
        self.countdowns.get(path).copied().filter(|&n| n > 0)
    }

    pub fn is_locked(&self, path: &Path) -> bool {
        self.remaining(path).is_some()
    }

    /// Immediately clears a lockout once an edit to `path` actually
    /// changes its content, so a later successful fix isn't still
    /// penalized for an earlier no-op.
    pub fn clear(&mut self, path: &Path) {
        self.countdowns.remove(path);
    }

    /// Advances every tracked path's countdown by one iteration,
    /// dropping entries that reach zero. Called once per control-loop
    /// iteration regardless of which paths were touched.
    pub fn tick(&mut self) {
        self.countdowns.retain(|_, n| {
            *n = n.saturating_sub(1);
            *n > 0
        });
    }

    pub fn len(&self) -> usize {
        self.countdowns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countdowns.is_empty()
    }
}
