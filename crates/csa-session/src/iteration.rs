//! The append-only iteration log the control loop writes one record to
//! per action (spec §4.4 "Iteration store").

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csa_core::ActionTag;
use serde::{Deserialize, Serialize};

/// Output captured from an action is truncated to this many characters
/// before being stored, so a single noisy RUN can't blow out the prompt
/// budget of every iteration that follows it.
pub const MAX_OUTPUT_CHARS: usize = 12_000;

/// Number of most-recent records fed back into the prompt verbatim
/// (spec §4.4 "rolling window").
pub const ROLLING_WINDOW: usize = 20;

/// One executed action and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub action: ActionTag,
    pub goal: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub secondary_analysis: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub user_interjection: Option<String>,
}

impl IterationRecord {
    pub fn new(seq: u64, action: ActionTag, success: bool) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            action,
            goal: None,
            reason: None,
            output: None,
            success,
            secondary_analysis: None,
            error: None,
            user_interjection: None,
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches captured output, truncating to [`MAX_OUTPUT_CHARS`].
    pub fn with_output(mut self, output: &str) -> Self {
        self.output = Some(truncate_chars(output, MAX_OUTPUT_CHARS));
        self
    }

    pub fn with_secondary_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.secondary_analysis = Some(analysis.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_user_interjection(mut self, note: impl Into<String>) -> Self {
        self.user_interjection = Some(note.into());
        self
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut truncated: String = s.chars().take(max).collect();
        truncated.push_str("\n...[truncated]");
        truncated
    }
}

/// Append-only JSONL log of every [`IterationRecord`] in a session, with
/// an in-memory mirror for cheap rolling-window and history-brief reads.
pub struct IterationStore {
    path: PathBuf,
    records: Vec<IterationRecord>,
}

impl IterationStore {
    /// Opens (or creates) the iteration log at `path`, replaying any
    /// existing records into memory.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let file = File::open(&path)?;
            BufReader::new(file)
                .lines()
                .map(|line| -> anyhow::Result<IterationRecord> { Ok(serde_json::from_str(&line?)?) })
                .collect::<anyhow::Result<Vec<_>>>()?
        } else {
            Vec::new()
        };
        Ok(Self { path, records })
    }

    /// Appends `record` to the on-disk log and the in-memory mirror.
    pub fn append(&mut self, record: IterationRecord) -> anyhow::Result<()> {
        let line = serde_json::to_string(&record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        self.records.push(record);
        Ok(())
    }

    pub fn all(&self) -> &[IterationRecord] {
        &self.records
    }

    /// The last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> &[IterationRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// The standard rolling window used in prompt assembly.
    pub fn rolling_window(&self) -> &[IterationRecord] {
        self.recent(ROLLING_WINDOW)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
