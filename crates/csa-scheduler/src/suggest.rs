//! Heuristic that nudges the model toward INDEF instead of RUN for
//! commands that look like long-running servers (spec §4.2/§4.6: the
//! first RUN of a server-shaped command is intercepted — the dispatcher
//! does not execute it, only returns the suggestion to use INDEF; a
//! second RUN of the same command proceeds normally).

use std::collections::HashMap;

const SERVER_LIKE_PATTERNS: &[&str] = &[
    "runserver",
    "go run",
    "npm start",
    "npm run dev",
    "yarn dev",
    "flask run",
    "uvicorn",
    "gunicorn",
    "rails server",
    "rails s",
    "python -m http.server",
    "cargo run",
    "watch",
    "--watch",
    "serve",
];

/// One command's suggestion state: once a command has been suggested as
/// indefinite, it is never suggested again even if re-run under RUN,
/// since repeating the hint adds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionState {
    SuggestedIndef,
    NotIndefinite,
}

/// Tracks which commands have already received the INDEF suggestion this
/// session, keyed by a normalized command string.
#[derive(Default)]
pub struct SuggestionTracker {
    seen: HashMap<String, SuggestionState>,
}

impl SuggestionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called before a RUN action executes `command`. Returns `Some(hint)`
    /// the first time a server-shaped command is seen — the caller must
    /// intercept and not execute, returning the hint as the action's
    /// output instead. Returns `None` afterward, or for commands that
    /// don't match the heuristic, in which case the caller executes
    /// normally.
    pub fn check_run(&mut self, command: &str) -> Option<String> {
        let key = normalize(command);
        if self.seen.contains_key(&key) {
            return None;
        }

        if looks_server_like(&key) {
            self.seen.insert(key, SuggestionState::SuggestedIndef);
            Some(format!(
                "Note: '{command}' looks like a long-running process. Consider using INDEF \
                 instead of RUN so it keeps running in the background."
            ))
        } else {
            self.seen.insert(key, SuggestionState::NotIndefinite);
            None
        }
    }
}

fn normalize(command: &str) -> String {
    command.trim().to_ascii_lowercase()
}

fn looks_server_like(normalized_command: &str) -> bool {
    SERVER_LIKE_PATTERNS
        .iter()
        .any(|pattern| normalized_command.contains(pattern))
}
