use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// LLM provider backing the transport layer, selected with `--source`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderSource {
    /// Hosted chat API (single model id, direct API key auth).
    Anthropic,
    /// Vendor-gateway API (project id + region auth, response continuation).
    Gcloud,
    /// OpenAI-compatible endpoint (configurable base URL + model).
    Openai,
}

impl ProviderSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Gcloud => "gcloud",
            Self::Openai => "openai",
        }
    }
}

impl std::fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// File-edit engine mode, selected with `--write-mode`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Model returns the full new file content; engine diffs and writes if changed.
    Direct,
    /// Model returns line-addressed ADD/REMOVE/MODIFY commands (default).
    #[default]
    Diff,
}

/// Agent run mode, selected with `--mode` (required).
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Run the control loop against an existing project checkout.
    Test,
    /// One-shot project scaffold generation (external collaborator; not part of the core loop).
    Generate,
}

/// The tagged action a model reply selects. One per loop iteration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ActionTag {
    /// `RUN: <cmd>` — foreground, allow-listed, with environment check.
    Run { command: String },
    /// `INDEF: <cmd>` — background, supervised.
    Indef { command: String },
    /// `CHECK: <cmd>` — tail a running background command.
    Check { command: String },
    /// `RESTART: <cmd>` — kill and relaunch a known background command.
    Restart { command: String },
    /// `RAW: <cmd>` — foreground with mandatory human approval.
    Raw { command: String },
    /// `INSPECT: p1,p2,...` — read up to 4 paths, ask the model to analyse.
    Inspect { paths: Vec<String> },
    /// `READ: p1..p4; MODIFY: pk` — read up to 4 files, edit one of them.
    ReadModify {
        read_paths: Vec<String>,
        modify_path: String,
    },
    /// `CHAT: <text>` — human interjection, no side effects.
    Chat { text: String },
    /// `DONE` — terminate the loop.
    Done,
}

impl ActionTag {
    /// The tag string as it appears at the head of a model reply (spec §4.5).
    pub fn tag_str(&self) -> &'static str {
        match self {
            Self::Run { .. } => "RUN",
            Self::Indef { .. } => "INDEF",
            Self::Check { .. } => "CHECK",
            Self::Restart { .. } => "RESTART",
            Self::Raw { .. } => "RAW",
            Self::Inspect { .. } => "INSPECT",
            Self::ReadModify { .. } => "READ/MODIFY",
            Self::Chat { .. } => "CHAT",
            Self::Done => "DONE",
        }
    }

    /// Whether this action should trigger the secondary analysis LLM call
    /// described in spec §4.5 ("Post-action... secondary LLM call").
    pub fn wants_secondary_analysis(&self) -> bool {
        matches!(
            self,
            Self::Run { .. } | Self::Check { .. } | Self::Inspect { .. } | Self::ReadModify { .. }
        )
    }
}

/// One of the three line-addressed edit command kinds (spec §4.3).
/// A single batch must be homogeneous across this enum (same-kind rule).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditCommandKind {
    Add,
    Remove,
    Modify,
}

impl EditCommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Modify => "MODIFY",
        }
    }
}

impl std::fmt::Display for EditCommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
