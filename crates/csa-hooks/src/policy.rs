//! The static allow-list / approval-required gate for `RUN` commands
//! (spec §4.2, §4.5, Non-goals: "a static allow-list plus human approval
//! for sensitive prefixes").

/// Whether a command may run unattended, needs operator sign-off, or is
/// outright refused for the `RUN` path (the model should use `RAW`
/// instead, which always asks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    ApprovalRequired,
    NotAllowListed,
}

/// Static prefix sets gating foreground execution.
///
/// `allow_prefixes` matches the reference agent's `ALLOWED_COMMANDS`
/// list; `approval_prefixes` covers destructive operations the
/// reference left to a blanket "human approval for sensitive prefixes"
/// Non-goal without naming specific commands, so this set is this
/// implementation's own judgment call (recorded in DESIGN.md).
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    pub allow_prefixes: Vec<String>,
    pub approval_prefixes: Vec<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            allow_prefixes: [
                "python", "go run", "go test", "docker build", "docker run", "pip install",
                "go mod tidy", "cargo build", "cargo test", "cargo run", "npm install", "npm test",
                "npm run",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            approval_prefixes: [
                "rm ", "rm -", "sudo ", "git push --force", "git push -f", "docker system prune",
                "docker rm", "docker rmi", "kill -9",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl CommandPolicy {
    /// Classifies `command` for the `RUN` dispatch path. Approval takes
    /// precedence over plain allow-listing: a command matching both an
    /// allow prefix and an approval prefix still asks.
    pub fn classify(&self, command: &str) -> PolicyDecision {
        let trimmed = command.trim();
        if self.approval_prefixes.iter().any(|p| trimmed.starts_with(p.as_str())) {
            tracing::debug!(command = %trimmed, "command matches an approval-required prefix");
            return PolicyDecision::ApprovalRequired;
        }
        if self.allow_prefixes.iter().any(|p| trimmed.starts_with(p.as_str())) {
            return PolicyDecision::Allowed;
        }
        tracing::debug!(command = %trimmed, "command is not allow-listed");
        PolicyDecision::NotAllowListed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_listed_command_is_allowed() {
        let policy = CommandPolicy::default();
        assert_eq!(policy.classify("go test ./..."), PolicyDecision::Allowed);
    }

    #[test]
    fn test_unknown_command_is_not_allow_listed() {
        let policy = CommandPolicy::default();
        assert_eq!(policy.classify("curl https://example.com"), PolicyDecision::NotAllowListed);
    }

    #[test]
    fn test_approval_prefix_wins_over_allow_prefix() {
        let mut policy = CommandPolicy::default();
        policy.allow_prefixes.push("rm -rf build".to_string());
        assert_eq!(policy.classify("rm -rf build"), PolicyDecision::ApprovalRequired);
    }

    #[test]
    fn test_approval_required_for_sudo() {
        let policy = CommandPolicy::default();
        assert_eq!(policy.classify("sudo apt-get install foo"), PolicyDecision::ApprovalRequired);
    }

    #[test]
    fn test_classify_trims_leading_whitespace() {
        let policy = CommandPolicy::default();
        assert_eq!(policy.classify("  go run main.go"), PolicyDecision::Allowed);
    }
}
