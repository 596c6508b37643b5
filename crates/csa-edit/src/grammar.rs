//! Parses line-addressed edit commands out of free-form model text
//! (spec §4.3, §6 "Edit command syntax").
//!
//! ```text
//! ADD    <line>:                <CONTENT_START>payload<CONTENT_END>
//! REMOVE <line>[-<line>]
//! MODIFY <line>[-<line>]:       <CONTENT_START>payload<CONTENT_END>
//! ```
//!
//! `<CONTENT_START>` / `<CONTENT_END>` are literal delimiter markers; a
//! payload may span many physical lines.

use csa_core::EditCommandKind;

pub const CONTENT_START: &str = "<CONTENT_START>";
pub const CONTENT_END: &str = "<CONTENT_END>";

/// One parsed edit command, with 1-based line numbers referring to
/// positions in the *original* file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    Add { after_line: usize, content: String },
    Remove { start: usize, end: usize },
    Modify { start: usize, end: usize, content: String },
}

impl EditCommand {
    pub fn kind(&self) -> EditCommandKind {
        match self {
            Self::Add { .. } => EditCommandKind::Add,
            Self::Remove { .. } => EditCommandKind::Remove,
            Self::Modify { .. } => EditCommandKind::Modify,
        }
    }

    /// The original-file line used to order commands before application.
    pub fn anchor_line(&self) -> usize {
        match self {
            Self::Add { after_line, .. } => *after_line,
            Self::Remove { start, .. } | Self::Modify { start, .. } => *start,
        }
    }
}

/// Error returned when no command parsed at all.
pub const NO_VALID_COMMANDS: &str = "Error: No valid modification commands found.";

/// Error returned when a batch mixes more than one [`EditCommandKind`].
pub const MIXED_KINDS: &str = "Cannot mix different command types";

/// Parse a model reply into a homogeneous batch of edit commands.
///
/// Returns `Err` with a human-readable message in two cases: the batch is
/// empty (no syntactically valid command found), or the batch mixes more
/// than one command kind. Individual malformed headers (missing
/// `<CONTENT_START>`/`<CONTENT_END>`, unparsable line numbers) are silently
/// skipped rather than aborting the whole parse, mirroring the reference
/// behaviour of tolerating prose around the commands.
pub fn parse_edit_commands(reply: &str) -> Result<Vec<EditCommand>, String> {
    let commands = scan_commands(reply);

    if commands.is_empty() {
        return Err(NO_VALID_COMMANDS.to_string());
    }

    let first_kind = commands[0].kind();
    if commands.iter().any(|c| c.kind() != first_kind) {
        return Err(format!("{MIXED_KINDS}: batch must be ADD-only, REMOVE-only, or MODIFY-only"));
    }

    Ok(commands)
}

fn scan_commands(reply: &str) -> Vec<EditCommand> {
    let mut out = Vec::new();
    let mut pos = 0usize;

    while pos < reply.len() {
        let Some(header) = next_header(reply, pos) else {
            break;
        };

        match header.kind {
            EditCommandKind::Remove => {
                out.push(EditCommand::Remove {
                    start: header.start,
                    end: header.end.unwrap_or(header.start),
                });
                pos = header.header_end;
            }
            EditCommandKind::Add | EditCommandKind::Modify => {
                let rest = &reply[header.header_end..];
                if let Some(rest_after_colon) = rest.strip_prefix(':') {
                    if let Some(after_marker) = rest_after_colon
                        .trim_start()
                        .strip_prefix(CONTENT_START)
                    {
                        if let Some(end_rel) = after_marker.find(CONTENT_END) {
                            let content = after_marker[..end_rel].to_string();
                            pos = header.header_end
                                + (rest.len() - rest_after_colon.len())
                                + (rest_after_colon.len() - after_marker.len())
                                + end_rel
                                + CONTENT_END.len();
                            if header.kind == EditCommandKind::Add {
                                out.push(EditCommand::Add {
                                    after_line: header.start,
                                    content,
                                });
                            } else {
                                out.push(EditCommand::Modify {
                                    start: header.start,
                                    end: header.end.unwrap_or(header.start),
                                    content,
                                });
                            }
                            continue;
                        }
                    }
                }
                // Missing CONTENT_START or CONTENT_END: skip this header,
                // resume scanning right after it so surrounding prose
                // doesn't hide a later, well-formed command.
                pos = header.header_end;
            }
        }
    }

    out
}

struct Header {
    kind: EditCommandKind,
    start: usize,
    end: Option<usize>,
    header_end: usize,
}

/// Finds the next `ADD|REMOVE|MODIFY <n>[-<m>]` header at or after `from`,
/// anchored to the start of a line.
fn next_header(text: &str, from: usize) -> Option<Header> {
    let mut search_from = from;
    loop {
        let rel_nl = text[search_from..].find('\n');
        let line_start = if search_from == 0 || text.as_bytes().get(search_from.wrapping_sub(1)) == Some(&b'\n')
        {
            search_from
        } else {
            // Advance to the next line start.
            match rel_nl {
                Some(nl) => search_from + nl + 1,
                None => return None,
            }
        };
        if line_start >= text.len() {
            return None;
        }

        if let Some(h) = try_parse_header_at(text, line_start) {
            return Some(h);
        }

        match text[line_start..].find('\n') {
            Some(nl) => search_from = line_start + nl + 1,
            None => return None,
        }
    }
}

fn try_parse_header_at(text: &str, line_start: usize) -> Option<Header> {
    let line_end = text[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(text.len());
    let line = &text[line_start..line_end];
    let trimmed = line.trim_start();
    let leading_ws = line.len() - trimmed.len();

    let (kind, keyword_len) = if let Some(rest) = trimmed.strip_prefix("ADD") {
        (EditCommandKind::Add, trimmed.len() - rest.len())
    } else if let Some(rest) = trimmed.strip_prefix("REMOVE") {
        (EditCommandKind::Remove, trimmed.len() - rest.len())
    } else if let Some(rest) = trimmed.strip_prefix("MODIFY") {
        (EditCommandKind::Modify, trimmed.len() - rest.len())
    } else {
        return None;
    };

    let after_keyword = &trimmed[keyword_len..];
    let after_ws = after_keyword.trim_start();
    let had_separator = after_ws.len() != after_keyword.len();
    if !had_separator && after_keyword.chars().next().is_none_or(|c| !c.is_ascii_digit()) {
        return None;
    }

    let digits_start_offset = after_keyword.len() - after_ws.len();
    let (start_num, mut cursor) = take_number(after_ws)?;
    let mut end_num = None;
    if cursor.starts_with('-') {
        let (n, rest) = take_number(&cursor[1..])?;
        end_num = Some(n);
        cursor = rest;
    }

    let abs_header_end =
        line_start + leading_ws + keyword_len + digits_start_offset + (after_ws.len() - cursor.len());

    Some(Header {
        kind,
        start: start_num,
        end: end_num,
        header_end: abs_header_end,
    })
}

fn take_number(s: &str) -> Option<(usize, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let n: usize = s[..end].parse().ok()?;
    Some((n, &s[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_add_command() {
        let reply = "ADD 2:<CONTENT_START>    print(\"How are you?\")\n    print(\"I am fine\")<CONTENT_END>";
        let commands = parse_edit_commands(reply).unwrap();
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            EditCommand::Add { after_line, content } => {
                assert_eq!(*after_line, 2);
                assert!(content.contains("How are you?"));
            }
            _ => panic!("expected Add"),
        }
    }

    #[test]
    fn test_multiple_add_commands() {
        let reply = "ADD 1:<CONTENT_START>    print(\"First\")<CONTENT_END>\nADD 3:<CONTENT_START>    print(\"Second\")<CONTENT_END>";
        let commands = parse_edit_commands(reply).unwrap();
        assert_eq!(commands.len(), 2);
    }

    #[test]
    fn test_single_remove_command_range() {
        let commands = parse_edit_commands("REMOVE 2-3").unwrap();
        assert_eq!(commands, vec![EditCommand::Remove { start: 2, end: 3 }]);
    }

    #[test]
    fn test_single_remove_command_single_line() {
        let commands = parse_edit_commands("REMOVE 2").unwrap();
        assert_eq!(commands, vec![EditCommand::Remove { start: 2, end: 2 }]);
    }

    #[test]
    fn test_multiple_remove_commands() {
        let commands = parse_edit_commands("REMOVE 1-2\nREMOVE 4-5").unwrap();
        assert_eq!(commands.len(), 2);
    }

    #[test]
    fn test_single_modify_command() {
        let reply = "MODIFY 2-2:<CONTENT_START>    print(\"Modified Hello\")<CONTENT_END>";
        let commands = parse_edit_commands(reply).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].kind(), EditCommandKind::Modify);
    }

    #[test]
    fn test_modify_with_single_line_number() {
        let reply = "MODIFY 2:<CONTENT_START>    print(\"x\")<CONTENT_END>";
        let commands = parse_edit_commands(reply).unwrap();
        match &commands[0] {
            EditCommand::Modify { start, end, .. } => {
                assert_eq!(*start, 2);
                assert_eq!(*end, 2);
            }
            _ => panic!("expected Modify"),
        }
    }

    #[test]
    fn test_mixed_commands_rejected() {
        let reply = "ADD 1:<CONTENT_START>    print(\"First\")<CONTENT_END>\nREMOVE 3-4";
        let err = parse_edit_commands(reply).unwrap_err();
        assert!(err.contains(MIXED_KINDS));
    }

    #[test]
    fn test_empty_reply_has_no_commands() {
        let err = parse_edit_commands("").unwrap_err();
        assert_eq!(err, NO_VALID_COMMANDS);
    }

    #[test]
    fn test_invalid_command_keyword() {
        let err = parse_edit_commands("INVALID 1-2").unwrap_err();
        assert_eq!(err, NO_VALID_COMMANDS);
    }

    #[test]
    fn test_missing_content_start_is_skipped() {
        let reply = "ADD 1:print('test')<CONTENT_END>";
        let err = parse_edit_commands(reply).unwrap_err();
        assert_eq!(err, NO_VALID_COMMANDS);
    }

    #[test]
    fn test_missing_content_end_is_skipped() {
        let reply = "ADD 1:<CONTENT_START>print('test')";
        let err = parse_edit_commands(reply).unwrap_err();
        assert_eq!(err, NO_VALID_COMMANDS);
    }

    #[test]
    fn test_multiline_content() {
        let reply = "ADD 1:<CONTENT_START>def setup():\n    print(\"Setting up\")\n    return True<CONTENT_END>";
        let commands = parse_edit_commands(reply).unwrap();
        match &commands[0] {
            EditCommand::Add { content, .. } => {
                assert!(content.contains("def setup():"));
                assert!(content.contains("return True"));
            }
            _ => panic!("expected Add"),
        }
    }

    #[test]
    fn test_commands_embedded_in_prose() {
        let reply = "I'll use the MODIFY keyword to fix this:\n\nMODIFY 1-4:<CONTENT_START>def hello_world():\n    print(\"Hello World\")\n\nif __name__ == \"__main__\":\n    hello_world()<CONTENT_END>\n\nThese changes improve style.";
        let commands = parse_edit_commands(reply).unwrap();
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            EditCommand::Modify { start, end, .. } => {
                assert_eq!(*start, 1);
                assert_eq!(*end, 4);
            }
            _ => panic!("expected Modify"),
        }
    }
}
