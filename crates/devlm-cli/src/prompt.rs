//! Prompt assembler (spec §4.7): builds the single string handed to
//! `Transport::generate` each iteration, in the stable field order the
//! spec names. Each optional block is omitted entirely when empty.

use csa_session::{HistoryBrief, IterationRecord};

/// Canonical directives the model must follow, reproduced bit-exact every
/// iteration (spec §6 "Action language... must be preserved bit-exact").
const DIRECTIVES: &str = "\
Directives:
- Never change code for environmental reasons without explicit instruction.
- After any code change, restart the affected process before declaring success.
- Never repeat the exact same action as the immediately preceding iteration.
- Prefer INDEF over RUN for commands that start a long-running server.
- State ACTION, GOAL, and REASON before any chain-of-thought.";

const ACTION_CATALOGUE: &str = "\
Actions:
  RUN: <cmd>              foreground, allow-listed, with environment check
  INDEF: <cmd>             background, supervised
  CHECK: <cmd>             tail output of a running background command
  RESTART: <cmd>           kill and relaunch a known background command
  RAW: <cmd>               foreground with mandatory human approval
  INSPECT: p1,p2,...       read up to 4 paths (numbered lines) and analyse
  READ: p1..p4; MODIFY: pk read up to 4 files, edit pk
  CHAT: <text>             human interjection, no side effects
  DONE                     terminate the loop

Reply format, in order:
ACTION: <tag>[: <argument>]
GOAL: <free text>
REASON: <free text>
<CoT>
...
</CoT>";

/// Running-process status fed into the prompt for each supervised
/// background entry.
pub struct ProcessStatus {
    pub command: String,
    pub running: bool,
    pub tail: String,
}

/// Everything the control loop knows at the top of one iteration, handed
/// to [`assemble`] to build the prompt text.
pub struct PromptContext<'a> {
    pub project_summary: &'a str,
    pub directory_tree: &'a str,
    pub user_notes: &'a str,
    pub history_brief: Option<&'a HistoryBrief>,
    pub recent_records: &'a [IterationRecord],
    pub process_statuses: &'a [ProcessStatus],
    pub file_modified_last_iteration: bool,
    pub session_just_started: bool,
    pub operator_interrupt: Option<&'a str>,
    pub previous_action_analysis: Option<&'a str>,
    pub previous_action_diff: Option<&'a str>,
    pub global_error_banner: Option<&'a str>,
}

/// Produces the stable-order prompt string described in spec §4.7.
pub fn assemble(ctx: &PromptContext) -> String {
    let mut out = String::new();

    push_block(&mut out, "Project summary", ctx.project_summary);
    push_block(&mut out, "Project directory tree (whitelisted)", ctx.directory_tree);
    push_block(&mut out, "User notes", ctx.user_notes);

    if let Some(brief) = ctx.history_brief {
        if !brief.key_events.is_empty() {
            let events = brief.key_events.iter().map(|e| format!("- {e}")).collect::<Vec<_>>().join("\n");
            push_block(&mut out, "History brief (key events)", &events);
        }
    }

    if !ctx.recent_records.is_empty() {
        let json = serde_json::to_string_pretty(ctx.recent_records).unwrap_or_default();
        push_block(&mut out, "Recent iterations (JSON)", &json);
    }

    if !ctx.process_statuses.is_empty() {
        let statuses = ctx
            .process_statuses
            .iter()
            .map(|p| format!("- {} [{}]", p.command, if p.running { "running" } else { "exited" }))
            .collect::<Vec<_>>()
            .join("\n");
        push_block(&mut out, "Running processes", &statuses);

        let tails = ctx
            .process_statuses
            .iter()
            .filter(|p| !p.tail.is_empty())
            .map(|p| format!("--- {} ---\n{}", p.command, p.tail))
            .collect::<Vec<_>>()
            .join("\n\n");
        if !tails.is_empty() {
            push_block(&mut out, "Running process output tails", &tails);
        }
    }

    if ctx.file_modified_last_iteration {
        push_block(&mut out, "Note", "A file was modified in the previous iteration.");
    }

    if ctx.session_just_started {
        push_block(&mut out, "Note", "This is the first iteration of a new session.");
    }

    push_block(&mut out, "Directives", DIRECTIVES);
    push_block(&mut out, "Action catalogue", ACTION_CATALOGUE);

    if let Some(text) = ctx.operator_interrupt {
        push_block(&mut out, "Operator interrupt", text);
    }
    if let Some(text) = ctx.previous_action_analysis {
        push_block(&mut out, "Previous action analysis", text);
    }
    if let Some(diff) = ctx.previous_action_diff {
        push_block(&mut out, "Previous action diff", diff);
    }
    if let Some(banner) = ctx.global_error_banner {
        push_block(&mut out, "Global error", banner);
    }

    out
}

fn push_block(out: &mut String, title: &str, body: &str) {
    if body.trim().is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str("## ");
    out.push_str(title);
    out.push_str("\n");
    out.push_str(body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use csa_core::ActionTag;

    fn empty_ctx() -> PromptContext<'static> {
        PromptContext {
            project_summary: "",
            directory_tree: "",
            user_notes: "",
            history_brief: None,
            recent_records: &[],
            process_statuses: &[],
            file_modified_last_iteration: false,
            session_just_started: false,
            operator_interrupt: None,
            previous_action_analysis: None,
            previous_action_diff: None,
            global_error_banner: None,
        }
    }

    #[test]
    fn test_empty_optional_blocks_are_omitted() {
        let prompt = assemble(&empty_ctx());
        assert!(!prompt.contains("Operator interrupt"));
        assert!(!prompt.contains("Previous action analysis"));
        assert!(!prompt.contains("Global error"));
        assert!(prompt.contains("Directives"));
        assert!(prompt.contains("Action catalogue"));
    }

    #[test]
    fn test_directives_and_catalogue_are_always_present() {
        let prompt = assemble(&empty_ctx());
        assert!(prompt.to_lowercase().contains("never repeat the exact same action"));
        assert!(prompt.contains("DONE"));
    }

    #[test]
    fn test_optional_blocks_appear_when_present() {
        let mut ctx = empty_ctx();
        ctx.operator_interrupt = Some("please hurry");
        ctx.global_error_banner = Some("prompt truncated");
        let prompt = assemble(&ctx);
        assert!(prompt.contains("please hurry"));
        assert!(prompt.contains("prompt truncated"));
    }

    #[test]
    fn test_history_brief_with_events_renders() {
        let mut ctx = empty_ctx();
        let brief = HistoryBrief { key_events: vec!["wired up the api".to_string()] };
        ctx.history_brief = Some(&brief);
        let prompt = assemble(&ctx);
        assert!(prompt.contains("wired up the api"));
    }

    #[test]
    fn test_empty_history_brief_is_omitted() {
        let mut ctx = empty_ctx();
        let brief = HistoryBrief { key_events: vec![] };
        ctx.history_brief = Some(&brief);
        let prompt = assemble(&ctx);
        assert!(!prompt.contains("History brief"));
    }

    #[test]
    fn test_recent_records_rendered_as_json() {
        let mut ctx = empty_ctx();
        let records = vec![IterationRecord::new(1, ActionTag::Done, true)];
        ctx.recent_records = &records;
        let prompt = assemble(&ctx);
        assert!(prompt.contains("Recent iterations"));
        assert!(prompt.contains("\"seq\""));
    }

    #[test]
    fn test_process_statuses_rendered() {
        let mut ctx = empty_ctx();
        let statuses = vec![ProcessStatus {
            command: "npm run dev".to_string(),
            running: true,
            tail: "server listening on :3000".to_string(),
        }];
        ctx.process_statuses = &statuses;
        let prompt = assemble(&ctx);
        assert!(prompt.contains("npm run dev"));
        assert!(prompt.contains("server listening"));
    }

    #[test]
    fn test_session_started_marker_only_when_set() {
        let mut ctx = empty_ctx();
        ctx.session_just_started = true;
        let prompt = assemble(&ctx);
        assert!(prompt.contains("first iteration"));
    }
}
