//! Persisted session state for the control loop: the append-only
//! iteration log and the periodic history brief (spec §4.4).

pub mod history_brief;
pub mod iteration;

pub use history_brief::{
    due_for_regeneration, regenerate_if_due, BriefSummarizer, HistoryBrief, BRIEF_LOOKBACK,
    DEFAULT_BRIEF_CADENCE,
};
pub use iteration::{IterationRecord, IterationStore, MAX_OUTPUT_CHARS, ROLLING_WINDOW};
