//! Action dispatcher (spec §4.5): routes a parsed [`ActionTag`] to the
//! subsystem that executes it and builds the outcome fields the control
//! loop folds into the iteration record.

use std::path::Path;

use anyhow::Result;
use csa_core::{ActionTag, AppError, WriteMode};
use csa_executor::Transport;
use csa_hooks::{check_environment, confirm, CommandPolicy, PolicyDecision};
use csa_lock::{InspectionGuard, LockoutTable};
use csa_process::{compound::split_compound_command, run_and_capture_with_timeout, Supervisor};
use csa_scheduler::SuggestionTracker;
use tracing::warn;

/// Max bytes read per file for an `INSPECT` action (spec §4.5).
const INSPECT_TRUNCATE_CHARS: usize = 20_000;

/// Everything the dispatcher needs that outlives a single action.
pub struct DispatchContext<'a> {
    pub project_path: &'a Path,
    pub write_mode: WriteMode,
    pub transport: &'a dyn Transport,
    pub supervisor: &'a Supervisor,
    pub policy: &'a CommandPolicy,
    pub suggestions: &'a mut SuggestionTracker,
    pub lockouts: &'a mut LockoutTable,
    pub inspection_guard: &'a mut InspectionGuard,
    /// `RUN` foreground idle-output timeout, in seconds (spec §10 layered
    /// defaults; overridable via `devlm.env`).
    pub run_timeout_secs: u64,
    /// Iterations a path stays locked out after a no-op edit (spec §3, §8;
    /// overridable via `devlm.env`).
    pub lockout_iterations: u32,
}

/// Outcome of dispatching one action: the text fed back as the iteration
/// record's `output`, whether it counts as a success, and an optional
/// error string (spec §3 "Iteration record").
pub struct DispatchOutcome {
    pub output: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    /// Set when `DONE` was dispatched; the control loop should stop.
    pub terminate: bool,
}

impl DispatchOutcome {
    fn ok(output: impl Into<String>) -> Self {
        Self { output: Some(output.into()), success: true, error: None, terminate: false }
    }

    fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self { output: Some(error.clone()), success: false, error: Some(error), terminate: false }
    }
}

pub async fn dispatch(action: &ActionTag, ctx: &mut DispatchContext<'_>) -> DispatchOutcome {
    match action {
        ActionTag::Run { command } => run(command, ctx).await,
        ActionTag::Indef { command } => indef(command, ctx).await,
        ActionTag::Check { command } => check(command, ctx).await,
        ActionTag::Restart { command } => restart(command, ctx).await,
        ActionTag::Raw { command } => raw(command, ctx).await,
        ActionTag::Inspect { paths } => inspect(paths, ctx),
        ActionTag::ReadModify { read_paths, modify_path } => {
            read_modify(read_paths, modify_path, ctx).await
        }
        ActionTag::Chat { text } => DispatchOutcome::ok(format!("Operator interjection noted: {text}")),
        ActionTag::Done => DispatchOutcome { output: None, success: true, error: None, terminate: true },
    }
}

async fn run(command: &str, ctx: &mut DispatchContext<'_>) -> DispatchOutcome {
    let split = split_compound_command(command);
    let leading_token = csa_hooks::leading_token(&split.command);

    match ctx.policy.classify(command) {
        PolicyDecision::NotAllowListed => {
            return DispatchOutcome::failed(format!(
                "'{command}' is not on the RUN allow-list; use RAW if this is intentional"
            ));
        }
        PolicyDecision::ApprovalRequired => {
            let approved = confirm(&format!("Approve running '{command}'? [y/N] ")).unwrap_or(false);
            if !approved {
                return DispatchOutcome::failed(format!("operator declined to approve '{command}'"));
            }
        }
        PolicyDecision::Allowed => {}
    }

    if let Some(hint) = ctx.suggestions.check_run(command) {
        return DispatchOutcome::ok(hint);
    }

    if !check_environment(leading_token) {
        return DispatchOutcome::failed(format!(
            "environment check failed for '{leading_token}'; is it installed and on PATH?"
        ));
    }

    execute_foreground(command, ctx).await
}

async fn raw(command: &str, ctx: &mut DispatchContext<'_>) -> DispatchOutcome {
    let approved = confirm(&format!("Approve running RAW command '{command}'? [y/N] ")).unwrap_or(false);
    if !approved {
        return DispatchOutcome::failed(format!("operator declined to approve RAW command '{command}'"));
    }
    execute_foreground(command, ctx).await
}

async fn execute_foreground(command: &str, ctx: &mut DispatchContext<'_>) -> DispatchOutcome {
    let split = split_compound_command(command);
    let cwd = match &split.cwd {
        Some(dir) => ctx.project_path.join(dir),
        None => ctx.project_path.to_path_buf(),
    };
    let cmd = csa_process::build_command(&[split.command.clone()], Some(&cwd));

    match run_and_capture_with_timeout(cmd, None, std::time::Duration::from_secs(ctx.run_timeout_secs)).await
    {
        Ok(result) if result.exit_code == 0 => DispatchOutcome::ok(result.output),
        Ok(result) => DispatchOutcome {
            output: Some(result.output.clone()),
            success: false,
            error: Some(format!("exit code {}: {}", result.exit_code, result.summary)),
            terminate: false,
        },
        Err(e) => DispatchOutcome::failed(format!("failed to run '{command}': {e}")),
    }
}

async fn indef(command: &str, ctx: &mut DispatchContext<'_>) -> DispatchOutcome {
    match ctx.supervisor.start(command).await {
        Ok(()) => DispatchOutcome::ok(format!("'{command}' started in the background")),
        Err(e) => DispatchOutcome::failed(format!("failed to start '{command}': {e}")),
    }
}

async fn check(command: &str, ctx: &mut DispatchContext<'_>) -> DispatchOutcome {
    match ctx.supervisor.check(command).await {
        Ok(report) => {
            let status = if report.running { "running" } else { "exited" };
            let tail = report.recent_output.join("\n");
            DispatchOutcome::ok(format!(
                "'{command}' is {status} (uptime {}s)\n{tail}",
                report.uptime.as_secs()
            ))
        }
        Err(AppError::NoSuchProcess(cmd)) => {
            DispatchOutcome::failed(format!("no supervisor entry matches '{cmd}'"))
        }
        Err(e) => DispatchOutcome::failed(e.to_string()),
    }
}

async fn restart(command: &str, ctx: &mut DispatchContext<'_>) -> DispatchOutcome {
    match ctx.supervisor.restart(command).await {
        Ok(()) => DispatchOutcome::ok(format!("'{command}' restarted")),
        Err(e) => DispatchOutcome::failed(format!("failed to restart '{command}': {e}")),
    }
}

fn inspect(paths: &[String], ctx: &mut DispatchContext<'_>) -> DispatchOutcome {
    if let Err(e) = ctx.inspection_guard.check(paths) {
        return DispatchOutcome::failed(e.to_string());
    }

    let mut out = String::new();
    for path in paths {
        let full = ctx.project_path.join(path);
        out.push_str(&format!("--- {path} ---\n"));
        match std::fs::read_to_string(&full) {
            Ok(content) => out.push_str(&numbered_and_truncated(&content)),
            Err(e) => out.push_str(&format!("[error reading {path}: {e}]\n")),
        }
        out.push('\n');
    }
    DispatchOutcome::ok(out)
}

fn numbered_and_truncated(content: &str) -> String {
    let truncated: String = content.chars().take(INSPECT_TRUNCATE_CHARS).collect();
    let was_truncated = truncated.len() < content.len();
    let mut out: String = truncated
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>5} | {line}\n", i + 1))
        .collect();
    if was_truncated {
        out.push_str("...[truncated]\n");
    }
    out
}

async fn read_modify(
    read_paths: &[String],
    modify_path: &str,
    ctx: &mut DispatchContext<'_>,
) -> DispatchOutcome {
    let modify_full = ctx.project_path.join(modify_path);

    if let Some(remaining) = ctx.lockouts.remaining(&modify_full) {
        return DispatchOutcome::failed(format!(
            "'{modify_path}' is locked out for {remaining} more iteration(s) after a no-op edit"
        ));
    }

    let mut inspected = String::new();
    for path in read_paths {
        let full = ctx.project_path.join(path);
        inspected.push_str(&format!("--- {path} ---\n"));
        match std::fs::read_to_string(&full) {
            Ok(content) => inspected.push_str(&numbered_and_truncated(&content)),
            Err(_) if path == modify_path => {
                let create = confirm(&format!("'{modify_path}' does not exist. Create it? [y/N] "))
                    .unwrap_or(false);
                if !create {
                    return DispatchOutcome::failed(format!("'{modify_path}' not found and operator declined to create it"));
                }
                inspected.push_str("[new file]\n");
            }
            Err(e) => return DispatchOutcome::failed(format!("failed to read '{path}': {e}")),
        }
        inspected.push('\n');
    }

    let original = std::fs::read_to_string(&modify_full).unwrap_or_default();

    let prompt = format!(
        "Based on the following file contents, propose changes to {modify_path}:\n\n{inspected}"
    );
    let reply = match ctx.transport.generate(&prompt, 4000).await {
        Ok(r) => r,
        Err(e) => return DispatchOutcome::failed(format!("LLM call for edit proposal failed: {e}")),
    };

    let result = csa_edit::process_file_modification(ctx.write_mode, &original, &reply);

    if !result.changed {
        ctx.lockouts.record_noop(modify_full.clone(), ctx.lockout_iterations);
        return DispatchOutcome::ok(result.summary);
    }

    if let Err(e) = std::fs::write(&modify_full, &result.content) {
        return DispatchOutcome::failed(format!("failed to write '{modify_path}': {e}"));
    }
    ctx.lockouts.clear(&modify_full);
    DispatchOutcome::ok(result.summary)
}

/// Runs the secondary analysis LLM call for actions that want one (spec
/// §4.5 "post-action secondary LLM call"), capped to a short summary.
pub async fn secondary_analysis(
    transport: &dyn Transport,
    primary_prompt: &str,
    captured_output: &str,
) -> Option<String> {
    let prompt = format!(
        "Primary prompt:\n{primary_prompt}\n\nAction output:\n{captured_output}\n\n\
         In 100 words or fewer, analyse whether this action succeeded and what it implies for the next step."
    );
    match transport.generate(&prompt, 300).await {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "secondary analysis call failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_and_truncated_adds_line_numbers() {
        let out = numbered_and_truncated("a\nb\nc");
        assert!(out.contains("    1 | a"));
        assert!(out.contains("    3 | c"));
    }

    #[test]
    fn test_numbered_and_truncated_marks_truncation() {
        let long = "x".repeat(INSPECT_TRUNCATE_CHARS + 500);
        let out = numbered_and_truncated(&long);
        assert!(out.contains("truncated"));
    }

    #[test]
    fn test_dispatch_outcome_ok_is_success() {
        let outcome = DispatchOutcome::ok("done");
        assert!(outcome.success);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_dispatch_outcome_failed_carries_error() {
        let outcome = DispatchOutcome::failed("boom");
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("boom"));
    }
}
