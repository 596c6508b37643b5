//! Periodic history-brief regeneration (spec §4.4 "History brief").
//!
//! Every [`DEFAULT_BRIEF_CADENCE`] iterations the control loop asks a
//! secondary LLM call to compress the last 30 iteration records plus the
//! prior brief into a short bullet list of key events, keeping the
//! prompt from re-growing linearly with session length. The LLM call
//! itself lives in the binary crate (it needs a `Transport`); this crate
//! owns the schema, the cadence decision, and the fallback-on-failure
//! rule.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::iteration::IterationRecord;

/// How many iteration records are handed to the summarizer alongside the
/// prior brief.
pub const BRIEF_LOOKBACK: usize = 30;
/// Default cadence, in iterations, between brief regenerations.
pub const DEFAULT_BRIEF_CADENCE: u64 = 10;

/// The strict JSON schema a history-brief LLM call must return.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryBrief {
    pub key_events: Vec<String>,
}

impl HistoryBrief {
    /// Parses a model reply against the `{"key_events": [...]}` schema.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Returns whether iteration `seq` should trigger a brief regeneration.
/// `seq` is 1-based; iteration 0 (before any action) never triggers.
pub fn due_for_regeneration(seq: u64, cadence: u64) -> bool {
    cadence > 0 && seq > 0 && seq.is_multiple_of(cadence)
}

/// Implemented by the binary crate's LLM-call wiring; kept here so
/// `csa-session` can own the regeneration policy without depending on
/// `csa-executor`.
#[async_trait]
pub trait BriefSummarizer {
    async fn summarize(
        &self,
        records: &[IterationRecord],
        prior_brief: Option<&HistoryBrief>,
        user_notes: &str,
    ) -> anyhow::Result<HistoryBrief>;
}

/// Regenerates the brief if `seq` is due, falling back to `prior` on any
/// summarizer failure (transport error or malformed JSON) rather than
/// ever clearing the brief outright.
pub async fn regenerate_if_due(
    summarizer: &dyn BriefSummarizer,
    seq: u64,
    cadence: u64,
    records: &[IterationRecord],
    prior: Option<&HistoryBrief>,
    user_notes: &str,
) -> Option<HistoryBrief> {
    if !due_for_regeneration(seq, cadence) {
        return None;
    }

    let lookback = &records[records.len().saturating_sub(BRIEF_LOOKBACK)..];
    match summarizer.summarize(lookback, prior, user_notes).await {
        Ok(brief) => Some(brief),
        Err(e) => {
            tracing::warn!(error = %e, "history brief regeneration failed, keeping prior brief");
            prior.cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csa_core::ActionTag;

    struct FailingSummarizer;

    #[async_trait]
    impl BriefSummarizer for FailingSummarizer {
        async fn summarize(
            &self,
            _records: &[IterationRecord],
            _prior_brief: Option<&HistoryBrief>,
            _user_notes: &str,
        ) -> anyhow::Result<HistoryBrief> {
            anyhow::bail!("transport down")
        }
    }

    struct OkSummarizer;

    #[async_trait]
    impl BriefSummarizer for OkSummarizer {
        async fn summarize(
            &self,
            _records: &[IterationRecord],
            _prior_brief: Option<&HistoryBrief>,
            _user_notes: &str,
        ) -> anyhow::Result<HistoryBrief> {
            Ok(HistoryBrief { key_events: vec!["did a thing".to_string()] })
        }
    }

    #[test]
    fn test_due_for_regeneration_at_multiples() {
        assert!(due_for_regeneration(10, 10));
        assert!(due_for_regeneration(20, 10));
        assert!(!due_for_regeneration(11, 10));
        assert!(!due_for_regeneration(0, 10));
    }

    #[test]
    fn test_parse_valid_brief() {
        let brief = HistoryBrief::parse(r#"{"key_events": ["a", "b"]}"#).unwrap();
        assert_eq!(brief.key_events, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_parse_malformed_brief_errors() {
        assert!(HistoryBrief::parse("not json").is_err());
    }

    #[tokio::test]
    async fn test_regenerate_if_due_skips_when_not_due() {
        let records = vec![IterationRecord::new(1, ActionTag::Done, true)];
        let result = regenerate_if_due(&OkSummarizer, 3, 10, &records, None, "").await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_regenerate_if_due_falls_back_to_prior_on_failure() {
        let records = vec![IterationRecord::new(10, ActionTag::Done, true)];
        let prior = HistoryBrief { key_events: vec!["earlier event".to_string()] };
        let result = regenerate_if_due(&FailingSummarizer, 10, 10, &records, Some(&prior), "").await;
        assert_eq!(result, Some(prior));
    }

    #[tokio::test]
    async fn test_regenerate_if_due_returns_new_brief_on_success() {
        let records = vec![IterationRecord::new(10, ActionTag::Done, true)];
        let result = regenerate_if_due(&OkSummarizer, 10, 10, &records, None, "").await;
        assert_eq!(result.unwrap().key_events, vec!["did a thing".to_string()]);
    }
}
