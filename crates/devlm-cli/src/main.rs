//! `devlm`: the autonomous coding-agent control loop (spec §4.6).
//!
//! Assembles a prompt from project state, sends it to the configured LLM
//! transport, parses the reply into one [`csa_core::ActionTag`], dispatches
//! it, and records the outcome — forever, until `DONE` or an operator
//! double `Ctrl-C`.

mod cli;
mod dispatcher;
mod prompt;
mod reply;
mod signals;
mod snapshot;

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use csa_config::{AgentHome, Cli, RuntimeDefaults};
use csa_core::{ActionTag, AppError, ProviderSource, RunMode, TransportErrorKind};
use csa_executor::{HostedChatTransport, OpenAiCompatTransport, Transport, VendorGatewayTransport};
use csa_hooks::{confirm, CommandPolicy};
use csa_lock::{InspectionGuard, LockoutTable};
use csa_process::Supervisor;
use csa_scheduler::SuggestionTracker;
use csa_session::{
    regenerate_if_due, BriefSummarizer, HistoryBrief, IterationRecord, IterationStore,
};
use tracing::{info, warn};

use dispatcher::{secondary_analysis, DispatchContext};
use prompt::{ProcessStatus, PromptContext};

/// How many trailing characters of a background process's buffered
/// output are folded into the prompt each iteration (spec §4.6).
const PROCESS_TAIL_CHARS: usize = 3_000;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let project_path = PathBuf::from(&cli.project_path);
    if !project_path.is_dir() {
        bail!("project path '{}' is not a directory", project_path.display());
    }

    let agent_home = AgentHome::new(&project_path);
    agent_home.ensure().context("failed to create agent-home directory")?;

    let env_vars = csa_config::load_env_file(&project_path)?;
    let defaults = RuntimeDefaults::default().with_env_overrides(&env_vars);

    if cli.mode == RunMode::Generate {
        println!(
            "generate mode scaffolds a project from scratch and hands off to an external \
             collaborator once the skeleton exists; devlm's control loop below only drives \
             an existing project. Re-run with --mode test once the skeleton is in place."
        );
        return Ok(());
    }

    let transport = build_transport(&cli).await?;
    let supervisor = Arc::new(Supervisor::new());
    let sigint_state = signals::spawn_listener(Arc::clone(&supervisor));

    let session_started_at = Utc::now();
    let mut store = IterationStore::open(agent_home.session_action_log_path(session_started_at))?;
    let brief_path = agent_home.session_brief_path(session_started_at);
    let mut history_brief: Option<HistoryBrief> = load_brief(&brief_path);

    let mut lockouts = LockoutTable::new();
    let mut inspection_guard = InspectionGuard::new();
    let mut suggestions = SuggestionTracker::new();
    let policy = CommandPolicy::default();

    let task = match &cli.task {
        Some(task) => task.clone(),
        None => prompt_for_task()?,
    };

    let snapshot_cache = agent_home.project_structure_path();
    let mut notes_mtime: Option<std::time::SystemTime> = None;
    let mut tracked_commands: HashSet<String> = HashSet::new();
    let mut last_action_modified_file = false;
    let mut previous_diff: Option<String> = None;
    let mut previous_analysis: Option<String> = None;
    let mut operator_interrupt: Option<String> = None;
    let mut global_error_banner: Option<String> = None;
    let mut seq: u64 = 0;
    let mut session_just_started = true;

    let summarizer = TransportBriefSummarizer { transport: transport.as_ref() };

    info!(project = %project_path.display(), mode = ?cli.mode, "starting control loop for task: {task}");

    'main: loop {
        let directory_snapshot = snapshot::load_or_regenerate(&project_path, &snapshot_cache)?;
        let directory_tree = snapshot::render_tree(&directory_snapshot);
        let project_summary = read_project_summary(&project_path);

        let user_notes = read_notes_with_pause(&agent_home.chat_notes_path(), &mut notes_mtime)?;

        let mut process_statuses = Vec::new();
        let mut still_running = HashSet::new();
        for command in &tracked_commands {
            if let Ok(report) = supervisor.check(command).await {
                if report.running {
                    still_running.insert(command.clone());
                }
                process_statuses.push(ProcessStatus {
                    command: command.clone(),
                    running: report.running,
                    tail: tail_chars(&report.recent_output, PROCESS_TAIL_CHARS),
                });
            }
        }
        tracked_commands = still_running;

        if let Some(fresh) = regenerate_if_due(
            &summarizer,
            seq,
            defaults.history_brief_cadence,
            store.all(),
            history_brief.as_ref(),
            &user_notes,
        )
        .await
        {
            history_brief = Some(fresh);
            save_brief(&brief_path, history_brief.as_ref());
        }

        if sigint_state.has_pending_interrupt() {
            operator_interrupt = Some(prompt_for_suggestion()?);
            sigint_state.clear();
        }

        let ctx = PromptContext {
            project_summary: &project_summary,
            directory_tree: &directory_tree,
            user_notes: &user_notes,
            history_brief: history_brief.as_ref(),
            recent_records: store.rolling_window(),
            process_statuses: &process_statuses,
            file_modified_last_iteration: last_action_modified_file,
            session_just_started,
            operator_interrupt: operator_interrupt.as_deref(),
            previous_action_analysis: previous_analysis.as_deref(),
            previous_action_diff: previous_diff.as_deref(),
            global_error_banner: global_error_banner.as_deref(),
        };
        let prompt_text = if seq == 0 {
            format!("Task: {task}\n\n{}", prompt::assemble(&ctx))
        } else {
            prompt::assemble(&ctx)
        };

        let response = loop {
            match transport.generate(&prompt_text, 4000).await {
                Ok(reply) => break reply,
                Err(AppError::Transport { kind: TransportErrorKind::InsufficientQuota, message }) => {
                    eprintln!("LLM quota exhausted: {message}");
                    let retry = confirm("Retry now that quota may have refreshed?").unwrap_or(false);
                    if !retry {
                        supervisor.kill_all().await;
                        bail!("stopping: operator declined to continue after quota exhaustion");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "LLM transport call failed");
                    let record = IterationRecord::new(seq + 1, ActionTag::Chat { text: String::new() }, false)
                        .with_error(e.to_string());
                    store.append(record)?;
                    global_error_banner = Some(format!("Previous iteration failed to reach the model: {e}"));
                    seq += 1;
                    session_just_started = false;
                    operator_interrupt = None;
                    continue 'main;
                }
            }
        };

        let parsed = match reply::parse_reply(&response) {
            Some(parsed) => parsed,
            None => {
                warn!("model reply had no ACTION: line, recording as a format error");
                let record = IterationRecord::new(seq + 1, ActionTag::Chat { text: String::new() }, false)
                    .with_error("malformed model reply: missing ACTION: line")
                    .with_output(&response);
                store.append(record)?;
                global_error_banner = Some("Previous reply was malformed: missing ACTION: line.".to_string());
                seq += 1;
                session_just_started = false;
                operator_interrupt = None;
                continue 'main;
            }
        };

        if matches!(parsed.action, ActionTag::Done) {
            seq += 1;
            let mut record = IterationRecord::new(seq, parsed.action.clone(), true);
            if let Some(goal) = &parsed.goal {
                record = record.with_goal(goal.clone());
            }
            if let Some(reason) = &parsed.reason {
                record = record.with_reason(reason.clone());
            }
            store.append(record)?;
            info!("model issued DONE, terminating control loop");
            break;
        }

        if let ActionTag::Indef { command } | ActionTag::Restart { command } = &parsed.action {
            tracked_commands.insert(command.clone());
        }

        let mut dispatch_ctx = DispatchContext {
            project_path: &project_path,
            write_mode: cli.write_mode,
            transport: transport.as_ref(),
            supervisor: &supervisor,
            policy: &policy,
            suggestions: &mut suggestions,
            lockouts: &mut lockouts,
            inspection_guard: &mut inspection_guard,
            run_timeout_secs: defaults.run_timeout_secs,
            lockout_iterations: defaults.lockout_iterations,
        };
        let outcome = dispatcher::dispatch(&parsed.action, &mut dispatch_ctx).await;

        let modified_file = matches!(&parsed.action, ActionTag::ReadModify { .. }) && outcome.success;
        let diff = if modified_file { outcome.output.clone() } else { None };

        let analysis = if parsed.action.wants_secondary_analysis() {
            secondary_analysis(transport.as_ref(), &prompt_text, outcome.output.as_deref().unwrap_or_default()).await
        } else {
            None
        };

        seq += 1;
        let mut record = IterationRecord::new(seq, parsed.action.clone(), outcome.success);
        if let Some(goal) = &parsed.goal {
            record = record.with_goal(goal.clone());
        }
        if let Some(reason) = &parsed.reason {
            record = record.with_reason(reason.clone());
        }
        if let Some(output) = &outcome.output {
            record = record.with_output(output);
        }
        if let Some(error) = &outcome.error {
            record = record.with_error(error.clone());
        }
        if let Some(analysis) = &analysis {
            record = record.with_secondary_analysis(analysis.clone());
        }
        if let Some(interrupt) = &operator_interrupt {
            record = record.with_user_interjection(interrupt.clone());
        }
        store.append(record)?;

        last_action_modified_file = modified_file;
        previous_diff = diff;
        previous_analysis = analysis;
        global_error_banner = None;
        operator_interrupt = None;
        session_just_started = false;
        lockouts.tick();

        if outcome.terminate {
            break;
        }
    }

    supervisor.kill_all().await;
    Ok(())
}

/// Builds the configured LLM transport from CLI flags (spec §4.1, §6).
async fn build_transport(cli: &Cli) -> Result<Box<dyn Transport>> {
    match cli.source {
        ProviderSource::Anthropic => {
            let api_key = cli
                .api_key
                .clone()
                .context("--api-key is required for the anthropic source")?;
            let model = cli.model.clone().unwrap_or_else(|| "claude-sonnet-4-20250514".to_string());
            Ok(Box::new(HostedChatTransport::new(api_key, model)))
        }
        ProviderSource::Gcloud => {
            let project_id = cli
                .project_id
                .clone()
                .context("--project-id is required for the gcloud source")?;
            let region = cli.region.clone().context("--region is required for the gcloud source")?;
            let model = cli.model.clone().unwrap_or_else(|| "gemini-1.5-pro".to_string());
            let access_token = fetch_gcloud_access_token()?;
            Ok(Box::new(VendorGatewayTransport::new(access_token, project_id, region, model)))
        }
        ProviderSource::Openai => {
            let api_key = cli
                .api_key
                .clone()
                .context("--api-key is required for the openai source")?;
            let server = cli.server.clone().context("--server is required for the openai source")?;
            let model = cli.model.clone().unwrap_or_else(|| "gpt-4o".to_string());
            Ok(Box::new(OpenAiCompatTransport::new(api_key, model, server)))
        }
    }
}

/// Shells out to `gcloud auth print-access-token` rather than pulling in a
/// Google Cloud SDK crate the rest of the workspace has no other use for.
fn fetch_gcloud_access_token() -> Result<String> {
    let output = std::process::Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .context("failed to invoke `gcloud auth print-access-token`; is the gcloud CLI installed and authenticated?")?;
    if !output.status.success() {
        bail!(
            "gcloud auth print-access-token failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

fn prompt_for_task() -> Result<String> {
    print!("What would you like the agent to do? ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let line = line.trim();
    if line.eq_ignore_ascii_case("exit") {
        std::process::exit(0);
    }
    Ok(line.to_string())
}

fn prompt_for_suggestion() -> Result<String> {
    eprintln!("\nInterrupt received. Type a suggestion for the next iteration (Enter for none):");
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Pauses for an operator acknowledgement when `chat.txt` changed since
/// the last time it was read (spec §4.6 "Notes").
fn read_notes_with_pause(path: &Path, last_mtime: &mut Option<std::time::SystemTime>) -> Result<String> {
    if !path.exists() {
        std::fs::write(path, "")?;
    }
    let mtime = std::fs::metadata(path)?.modified()?;
    let changed = last_mtime.is_some_and(|prev| mtime > prev);
    if changed {
        eprintln!("Notes file changed since last read. Press Enter to continue...");
        let mut discard = String::new();
        io::stdin().read_line(&mut discard)?;
    }
    *last_mtime = Some(mtime);
    Ok(std::fs::read_to_string(path)?)
}

/// Reads the free-text project summary at the project root, if one
/// exists (spec §4.7 "Project summary").
fn read_project_summary(project_path: &Path) -> String {
    std::fs::read_to_string(project_path.join("project_summary.md")).unwrap_or_default()
}

fn load_brief(path: &Path) -> Option<HistoryBrief> {
    let content = std::fs::read_to_string(path).ok()?;
    HistoryBrief::parse(&content).ok()
}

fn save_brief(path: &Path, brief: Option<&HistoryBrief>) {
    let Some(brief) = brief else { return };
    if let Ok(json) = serde_json::to_string_pretty(brief) {
        if let Err(e) = std::fs::write(path, json) {
            warn!(error = %e, "failed to persist history brief");
        }
    }
}

/// Returns the last `max_chars` characters across all buffered output
/// lines, joined with newlines (spec §4.6 "last-3,000 chars tail").
fn tail_chars(lines: &[String], max_chars: usize) -> String {
    let joined = lines.join("\n");
    if joined.chars().count() <= max_chars {
        return joined;
    }
    let chars: Vec<char> = joined.chars().collect();
    let start = chars.len() - max_chars;
    chars[start..].iter().collect()
}

/// Wires the history-brief regeneration policy in `csa-session` to a
/// concrete transport, asking for a strict `{"key_events": [...]}` reply.
struct TransportBriefSummarizer<'a> {
    transport: &'a dyn Transport,
}

#[async_trait]
impl BriefSummarizer for TransportBriefSummarizer<'_> {
    async fn summarize(
        &self,
        records: &[IterationRecord],
        prior_brief: Option<&HistoryBrief>,
        user_notes: &str,
    ) -> Result<HistoryBrief> {
        let records_json = serde_json::to_string(records)?;
        let prior_json = prior_brief.map(serde_json::to_string).transpose()?.unwrap_or_else(|| "null".to_string());
        let prompt = format!(
            "Summarize the key events from these iteration records into a short bullet list. \
             Reply with strictly valid JSON matching {{\"key_events\": [\"...\"]}} and nothing else.\n\n\
             Prior brief: {prior_json}\n\nUser notes: {user_notes}\n\nRecords:\n{records_json}"
        );
        let reply = self.transport.generate(&prompt, 500).await?;
        Ok(HistoryBrief::parse(reply.trim())?)
    }
}
