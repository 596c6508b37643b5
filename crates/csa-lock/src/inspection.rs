//! Last-inspected-path-set guard (spec §4.4, resolved Open Question:
//! "what scope does the repeat-inspection check look back over?" — only
//! the immediately preceding INSPECT, not the whole history; see
//! DESIGN.md).
//!
//! An INSPECT action that names the exact same set of paths as the
//! iteration immediately before it is almost always the model re-reading
//! what it just read, with nothing new to learn. Order doesn't matter —
//! `[a, b]` and `[b, a]` count as the same set.

use std::collections::BTreeSet;

use csa_core::AppError;

#[derive(Debug, Default)]
pub struct InspectionGuard {
    last: Option<BTreeSet<String>>,
}

impl InspectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `paths` against the immediately preceding INSPECT's path
    /// set. Returns [`AppError::RepeatInspection`] on an exact repeat;
    /// otherwise records `paths` as the new "last inspected" set and
    /// returns `Ok`.
    pub fn check(&mut self, paths: &[String]) -> Result<(), AppError> {
        let set: BTreeSet<String> = paths.iter().cloned().collect();
        if self.last.as_ref() == Some(&set) {
            return Err(AppError::RepeatInspection);
        }
        self.last = Some(set);
        Ok(())
    }
}
