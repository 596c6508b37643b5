//! Command-line arguments (spec §6 "CLI").

use clap::Parser;
use csa_core::{ProviderSource, RunMode, WriteMode};

/// devlm: an autonomous coding-agent control loop.
#[derive(Parser, Debug, Clone)]
#[command(name = "devlm", version, about = "Autonomous coding-agent control loop")]
pub struct Cli {
    /// Operating mode: `test` drives an existing project, `generate` scaffolds a new one.
    #[arg(long, value_enum)]
    pub mode: RunMode,

    /// Enables the browser-driver-backed UI testing add-on.
    #[arg(long)]
    pub frontend: bool,

    /// Model name passed through to the selected provider.
    #[arg(long)]
    pub model: Option<String>,

    /// LLM provider.
    #[arg(long, value_enum, default_value_t = ProviderSource::Anthropic)]
    pub source: ProviderSource,

    /// API key for the hosted-chat or OpenAI-compatible provider.
    #[arg(long)]
    pub api_key: Option<String>,

    /// Cloud project id, required for the `gcloud` provider.
    #[arg(long)]
    pub project_id: Option<String>,

    /// Cloud region, required for the `gcloud` provider.
    #[arg(long)]
    pub region: Option<String>,

    /// Base URL for an OpenAI-compatible server.
    #[arg(long)]
    pub server: Option<String>,

    /// Project working directory.
    #[arg(long, default_value = ".")]
    pub project_path: String,

    /// Task description; skips the interactive task prompt when given.
    #[arg(long)]
    pub task: Option<String>,

    /// File-edit mode: whole-file rewrite vs. line-addressed diff commands.
    #[arg(long, value_enum, default_value_t = WriteMode::Diff)]
    pub write_mode: WriteMode,

    /// Dumps every assembled prompt and raw response under `debug/`.
    #[arg(long)]
    pub debug_prompt: bool,

    /// Increases log verbosity; repeatable (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_required_mode() {
        let cli = Cli::parse_from(["devlm", "--mode", "test"]);
        assert_eq!(cli.mode, RunMode::Test);
        assert_eq!(cli.write_mode, WriteMode::Diff);
        assert_eq!(cli.source, ProviderSource::Anthropic);
        assert_eq!(cli.project_path, ".");
    }

    #[test]
    fn test_missing_mode_is_rejected() {
        let result = Cli::try_parse_from(["devlm"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parses_full_gcloud_invocation() {
        let cli = Cli::parse_from([
            "devlm",
            "--mode",
            "generate",
            "--source",
            "gcloud",
            "--project-id",
            "my-proj",
            "--region",
            "us-central1",
            "--write-mode",
            "direct",
            "--task",
            "build a todo app",
        ]);
        assert_eq!(cli.mode, RunMode::Generate);
        assert_eq!(cli.source, ProviderSource::Gcloud);
        assert_eq!(cli.project_id.as_deref(), Some("my-proj"));
        assert_eq!(cli.write_mode, WriteMode::Direct);
        assert_eq!(cli.task.as_deref(), Some("build a todo app"));
    }

    #[test]
    fn test_verbose_flag_counts_repetitions() {
        let cli = Cli::parse_from(["devlm", "--mode", "test", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
