//! Parses a model reply into an [`ActionTag`] plus the echoed goal/reason
//! strings (spec §4.5): `ACTION:`, `GOAL:`, `REASON:`, `<CoT>...</CoT>`, in
//! that order. Only `ACTION:` is required; everything else degrades to
//! `None` rather than failing the whole parse.

use csa_core::ActionTag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub action: ActionTag,
    pub goal: Option<String>,
    pub reason: Option<String>,
}

/// Returns `None` if the reply has no `ACTION:` line — the caller records
/// this as a format error and continues the loop, per spec §4.5 "Invalid
/// action".
pub fn parse_reply(reply: &str) -> Option<ParsedReply> {
    let action_line = find_tagged_line(reply, "ACTION:")?;
    let action = parse_action_tag(&action_line)?;
    let goal = find_tagged_line(reply, "GOAL:");
    let reason = find_tagged_line(reply, "REASON:");
    Some(ParsedReply { action, goal, reason })
}

fn find_tagged_line(reply: &str, tag: &str) -> Option<String> {
    for line in reply.lines() {
        let trimmed = line.trim_start();
        if trimmed.len() >= tag.len() && trimmed[..tag.len()].eq_ignore_ascii_case(tag) {
            let rest = trimmed[tag.len()..].trim();
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

/// Parses the string after `ACTION:` against the tag table in spec §4.5.
fn parse_action_tag(action_body: &str) -> Option<ActionTag> {
    let (tag, arg) = match action_body.split_once(':') {
        Some((tag, arg)) => (tag.trim(), arg.trim()),
        None => (action_body.trim(), ""),
    };
    let tag_upper = tag.to_ascii_uppercase();

    match tag_upper.as_str() {
        "RUN" if !arg.is_empty() => Some(ActionTag::Run { command: arg.to_string() }),
        "INDEF" if !arg.is_empty() => Some(ActionTag::Indef { command: arg.to_string() }),
        "CHECK" if !arg.is_empty() => Some(ActionTag::Check { command: arg.to_string() }),
        "RESTART" if !arg.is_empty() => Some(ActionTag::Restart { command: arg.to_string() }),
        "RAW" if !arg.is_empty() => Some(ActionTag::Raw { command: arg.to_string() }),
        "INSPECT" if !arg.is_empty() => {
            let paths = split_paths(arg);
            if paths.is_empty() || paths.len() > 4 {
                None
            } else {
                Some(ActionTag::Inspect { paths })
            }
        }
        "READ" if !arg.is_empty() => parse_read_modify(arg),
        "CHAT" => Some(ActionTag::Chat { text: arg.to_string() }),
        "DONE" => Some(ActionTag::Done),
        _ => None,
    }
}

/// `READ: p1,p2; MODIFY: pk` — `arg` is everything after the `READ:`
/// label, i.e. `"p1,p2; MODIFY: pk"`.
fn parse_read_modify(arg: &str) -> Option<ActionTag> {
    let (read_part, modify_part) = arg.split_once(';')?;
    let read_paths = split_paths(read_part);
    if read_paths.is_empty() || read_paths.len() > 4 {
        return None;
    }

    let modify_part = modify_part.trim();
    let modify_idx = modify_part.to_ascii_uppercase().find("MODIFY")?;
    let modify_path = modify_part[modify_idx + "MODIFY".len()..]
        .trim_start_matches(':')
        .trim()
        .to_string();
    if modify_path.is_empty() || !read_paths.contains(&modify_path) {
        return None;
    }

    Some(ActionTag::ReadModify { read_paths, modify_path })
}

fn split_paths(arg: &str) -> Vec<String> {
    arg.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_run_with_goal_and_reason() {
        let reply = "ACTION: RUN: go test ./...\nGOAL: verify tests pass\nREASON: just edited parser.go\n<CoT>\nthinking\n</CoT>";
        let parsed = parse_reply(reply).unwrap();
        assert_eq!(parsed.action, ActionTag::Run { command: "go test ./...".to_string() });
        assert_eq!(parsed.goal.as_deref(), Some("verify tests pass"));
        assert_eq!(parsed.reason.as_deref(), Some("just edited parser.go"));
    }

    #[test]
    fn test_parses_done() {
        let parsed = parse_reply("ACTION: DONE\nGOAL: finished\n").unwrap();
        assert_eq!(parsed.action, ActionTag::Done);
    }

    #[test]
    fn test_parses_chat() {
        let parsed = parse_reply("ACTION: CHAT: what should I name this?").unwrap();
        assert_eq!(parsed.action, ActionTag::Chat { text: "what should I name this?".to_string() });
    }

    #[test]
    fn test_parses_inspect_multiple_paths() {
        let parsed = parse_reply("ACTION: INSPECT: src/a.rs, src/b.rs").unwrap();
        assert_eq!(
            parsed.action,
            ActionTag::Inspect { paths: vec!["src/a.rs".to_string(), "src/b.rs".to_string()] }
        );
    }

    #[test]
    fn test_rejects_inspect_over_four_paths() {
        let reply = "ACTION: INSPECT: a.rs,b.rs,c.rs,d.rs,e.rs";
        assert!(parse_reply(reply).is_none());
    }

    #[test]
    fn test_parses_read_modify() {
        let reply = "ACTION: READ: a.rs,b.rs; MODIFY: a.rs";
        let parsed = parse_reply(reply).unwrap();
        assert_eq!(
            parsed.action,
            ActionTag::ReadModify {
                read_paths: vec!["a.rs".to_string(), "b.rs".to_string()],
                modify_path: "a.rs".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_read_modify_target_not_in_read_set() {
        let reply = "ACTION: READ: a.rs,b.rs; MODIFY: c.rs";
        assert!(parse_reply(reply).is_none());
    }

    #[test]
    fn test_missing_action_line_returns_none() {
        assert!(parse_reply("GOAL: do something\nREASON: because\n").is_none());
    }

    #[test]
    fn test_action_tag_is_case_insensitive() {
        let parsed = parse_reply("action: run: ls -la").unwrap();
        assert_eq!(parsed.action, ActionTag::Run { command: "ls -la".to_string() });
    }
}
