//! Splits a `cd <dir> && <command>` compound command into a working
//! directory override and the remaining command (spec §4.2, RUN/INDEF
//! "compound command" note).
//!
//! Only a single leading `cd` is recognized; anything else is passed
//! through to the shell untouched, since `/bin/sh -c` already understands
//! `&&` chains natively.

use std::path::PathBuf;

/// A command with an optional working-directory override extracted from a
/// leading `cd <dir> &&` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitCommand {
    pub cwd: Option<PathBuf>,
    pub command: String,
}

/// Split `raw` into an optional `cd` target and the remaining command.
///
/// `cd foo && go test ./...` becomes `cwd = Some("foo")`, `command = "go
/// test ./..."`. Anything not matching `cd <path> &&` is returned
/// unmodified with `cwd = None`.
pub fn split_compound_command(raw: &str) -> SplitCommand {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("cd ") else {
        return SplitCommand { cwd: None, command: trimmed.to_string() };
    };

    let Some(sep_idx) = rest.find("&&") else {
        return SplitCommand { cwd: None, command: trimmed.to_string() };
    };

    let dir = rest[..sep_idx].trim();
    let remainder = rest[sep_idx + 2..].trim();
    if dir.is_empty() || remainder.is_empty() {
        return SplitCommand { cwd: None, command: trimmed.to_string() };
    }

    let dir = dir.trim_matches(|c| c == '"' || c == '\'');

    SplitCommand {
        cwd: Some(PathBuf::from(dir)),
        command: remainder.to_string(),
    }
}
