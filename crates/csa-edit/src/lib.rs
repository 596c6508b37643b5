//! File-edit engine (spec §4.3): parses a model reply into line-addressed
//! edit commands and applies them to a file's content, or takes a direct
//! full-file rewrite, producing the content to persist plus a summary for
//! the next prompt.

pub mod apply;
pub mod grammar;

pub use apply::{apply_direct_write, apply_edit_commands, ApplyResult};
pub use grammar::{parse_edit_commands, EditCommand};

use csa_core::WriteMode;

/// Top-level entry point used by the action dispatcher: given the
/// model's raw reply body for a READ/MODIFY action and the current
/// on-disk content of the file being modified, produces the new content
/// and a summary line, honoring the session's configured write mode.
///
/// In [`WriteMode::Diff`] the reply is parsed as an ADD/REMOVE/MODIFY
/// batch; a malformed or mixed-kind batch leaves `original` untouched and
/// the summary carries the rejection reason. In [`WriteMode::Direct`] the
/// reply body is the full new file content verbatim.
pub fn process_file_modification(
    write_mode: WriteMode,
    original: &str,
    reply_body: &str,
) -> ApplyResult {
    match write_mode {
        WriteMode::Direct => apply_direct_write(original, reply_body),
        WriteMode::Diff => match parse_edit_commands(reply_body) {
            Ok(commands) => apply_edit_commands(original, &commands),
            Err(message) => ApplyResult {
                content: original.to_string(),
                summary: message,
                changed: false,
            },
        },
    }
}
