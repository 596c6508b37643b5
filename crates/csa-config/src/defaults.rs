//! Layered runtime defaults (spec §10): built-in constants, overridable
//! by `devlm.env`, overridable again by CLI flags.
//!
//! Most of these values already exist as crate-local constants next to
//! the code they govern (`csa_process::DEFAULT_RUN_TIMEOUT_SECS`,
//! `csa_session::ROLLING_WINDOW`, ...); [`RuntimeDefaults`] is the
//! operator-facing merge of those same numbers with any `devlm.env`
//! override, for the binary to thread through instead of reaching for
//! the crate constants directly.

use std::collections::HashMap;

/// Foreground command timeout, in seconds (spec §4.2: absolute wall-clock
/// deadline, not an idle timeout).
pub const RUN_TIMEOUT_SECS: u64 = 600;
/// Iterations between history-brief regenerations.
pub const HISTORY_BRIEF_CADENCE: u64 = 10;
/// Iterations a path stays locked out after a no-op edit.
pub const LOCKOUT_ITERATIONS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeDefaults {
    pub run_timeout_secs: u64,
    pub history_brief_cadence: u64,
    pub lockout_iterations: u32,
}

impl Default for RuntimeDefaults {
    fn default() -> Self {
        Self {
            run_timeout_secs: RUN_TIMEOUT_SECS,
            history_brief_cadence: HISTORY_BRIEF_CADENCE,
            lockout_iterations: LOCKOUT_ITERATIONS,
        }
    }
}

impl RuntimeDefaults {
    /// Applies `devlm.env` overrides (`RUN_TIMEOUT_SECS`,
    /// `HISTORY_BRIEF_CADENCE`, `LOCKOUT_ITERATIONS`) on top of the
    /// built-in defaults. Unparseable or absent values fall back silently
    /// to the prior value.
    pub fn with_env_overrides(mut self, vars: &HashMap<String, String>) -> Self {
        if let Some(v) = vars.get("RUN_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.run_timeout_secs = v;
        }
        if let Some(v) = vars.get("HISTORY_BRIEF_CADENCE").and_then(|v| v.parse().ok()) {
            self.history_brief_cadence = v;
        }
        if let Some(v) = vars.get("LOCKOUT_ITERATIONS").and_then(|v| v.parse().ok()) {
            self.lockout_iterations = v;
        }
        self
    }
}
