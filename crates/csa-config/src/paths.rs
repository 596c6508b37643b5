//! Agent-home path layout (spec §6 "Persisted state layout", §3 "Agent
//! home"): a `.devlm/` subtree rooted at the project path, never at an
//! XDG user-config directory — the agent's state belongs to the project
//! it's working on, the same way the donor's `.csa/` project config does.

use std::path::{Path, PathBuf};

use chrono::Utc;

/// The agent-home directory name under the project root.
pub const AGENT_HOME_DIR: &str = ".devlm";

/// Resolved paths for one project's agent home.
#[derive(Debug, Clone)]
pub struct AgentHome {
    root: PathBuf,
}

impl AgentHome {
    pub fn new(project_path: impl AsRef<Path>) -> Self {
        Self { root: project_path.as_ref().join(AGENT_HOME_DIR) }
    }

    /// Creates the agent-home subtree (`actions/`, `briefs/`,
    /// `debug/prompts/`, `debug/responses/`) if missing. Never purges
    /// anything already present.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.actions_dir())?;
        std::fs::create_dir_all(self.briefs_dir())?;
        std::fs::create_dir_all(self.debug_prompts_dir())?;
        std::fs::create_dir_all(self.debug_responses_dir())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_structure_path(&self) -> PathBuf {
        self.root.join("project_structure.json")
    }

    pub fn technical_brief_path(&self) -> PathBuf {
        self.root.join("project_technical_brief.json")
    }

    pub fn test_progress_path(&self) -> PathBuf {
        self.root.join("test_progress.json")
    }

    pub fn chat_notes_path(&self) -> PathBuf {
        self.root.join("chat.txt")
    }

    pub fn actions_dir(&self) -> PathBuf {
        self.root.join("actions")
    }

    pub fn briefs_dir(&self) -> PathBuf {
        self.root.join("briefs")
    }

    pub fn debug_prompts_dir(&self) -> PathBuf {
        self.root.join("debug").join("prompts")
    }

    pub fn debug_responses_dir(&self) -> PathBuf {
        self.root.join("debug").join("responses")
    }

    /// This session's iteration log path, timestamped at session start.
    pub fn session_action_log_path(&self, session_started_at: chrono::DateTime<Utc>) -> PathBuf {
        self.actions_dir().join(format!(
            "action_history_{}.json",
            session_started_at.format("%Y%m%dT%H%M%SZ")
        ))
    }

    /// This session's rolling history-brief path, timestamped at session start.
    pub fn session_brief_path(&self, session_started_at: chrono::DateTime<Utc>) -> PathBuf {
        self.briefs_dir().join(format!(
            "history_brief_{}.json",
            session_started_at.format("%Y%m%dT%H%M%SZ")
        ))
    }
}
