//! SIGINT handling (spec §4.6, §5 "Cancellation", §7 "Operator
//! interrupts"): the first SIGINT does not cancel the current iteration —
//! it only sets a flag so the control loop can capture a free-form
//! suggestion and fold it into the next prompt. The second SIGINT kills
//! every supervised process and exits immediately, from wherever the
//! process happens to be.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use csa_process::Supervisor;
use tracing::warn;

/// Shared interrupt state, written by the background listener task and
/// read by the control loop.
#[derive(Default)]
pub struct SigintState {
    count: AtomicU32,
}

impl SigintState {
    /// `true` exactly once per first SIGINT, until consumed.
    pub fn has_pending_interrupt(&self) -> bool {
        self.count.load(Ordering::SeqCst) >= 1
    }

    /// Clears the pending-interrupt flag after the loop has captured the
    /// operator's suggestion for it.
    pub fn clear(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

/// Spawns the background task that listens for `Ctrl-C`. The first signal
/// sets the shared flag; the second kills every supervised process and
/// exits the process.
pub fn spawn_listener(supervisor: Arc<Supervisor>) -> Arc<SigintState> {
    let state = Arc::new(SigintState::default());
    let listener_state = Arc::clone(&state);

    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("failed to listen for SIGINT; interrupt handling disabled");
                return;
            }
            let previous = listener_state.count.fetch_add(1, Ordering::SeqCst);
            if previous >= 1 {
                warn!("second SIGINT received, terminating all supervised processes");
                supervisor.kill_all().await;
                std::process::exit(1);
            }
        }
    });

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_has_no_pending_interrupt() {
        let state = SigintState::default();
        assert!(!state.has_pending_interrupt());
    }

    #[test]
    fn test_clear_resets_pending_interrupt() {
        let state = SigintState::default();
        state.count.store(1, Ordering::SeqCst);
        assert!(state.has_pending_interrupt());
        state.clear();
        assert!(!state.has_pending_interrupt());
    }
}
