/// Typed errors shared across the agent crates (spec §7).
///
/// Transport failures carry the provider's error kind verbatim so the
/// control loop can decide whether to retry, pause for an operator
/// acknowledgement, or give up.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("LLM transport error ({kind}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("edit batch rejected: {0}")]
    InvalidEditBatch(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("malformed model reply: missing ACTION: line")]
    MalformedReply,

    #[error("path '{0}' is locked out for {1} more iteration(s) after a no-op edit")]
    PathLockedOut(String, u32),

    #[error("refusing to inspect the same path set as the immediately preceding iteration")]
    RepeatInspection,

    #[error("no supervisor entry matches command '{0}'")]
    NoSuchProcess(String),

    #[error("prompt exceeded {0} characters and was truncated")]
    PromptTruncated(usize),
}

/// Provider-agnostic transport failure kind (spec §4.1 "Fails with").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    RateLimit,
    Overloaded,
    InvalidRequest,
    InsufficientQuota,
    Connection,
    Internal,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RateLimit => "rate_limit",
            Self::Overloaded => "overloaded",
            Self::InvalidRequest => "invalid_request",
            Self::InsufficientQuota => "insufficient_quota",
            Self::Connection => "connection",
            Self::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_transport() {
        let err = AppError::Transport {
            kind: TransportErrorKind::RateLimit,
            message: "try again in 12 seconds".into(),
        };
        assert_eq!(
            err.to_string(),
            "LLM transport error (rate_limit): try again in 12 seconds"
        );
    }

    #[test]
    fn test_display_command_failed() {
        let err = AppError::CommandFailed("exit code 1".into());
        assert_eq!(err.to_string(), "command execution failed: exit code 1");
    }

    #[test]
    fn test_display_invalid_edit_batch() {
        let err = AppError::InvalidEditBatch("Cannot mix different command types".into());
        assert_eq!(
            err.to_string(),
            "edit batch rejected: Cannot mix different command types"
        );
    }

    #[test]
    fn test_display_path_locked_out() {
        let err = AppError::PathLockedOut("src/main.rs".into(), 2);
        assert_eq!(
            err.to_string(),
            "path 'src/main.rs' is locked out for 2 more iteration(s) after a no-op edit"
        );
    }

    #[test]
    fn test_display_repeat_inspection() {
        let err = AppError::RepeatInspection;
        assert_eq!(
            err.to_string(),
            "refusing to inspect the same path set as the immediately preceding iteration"
        );
    }

    #[test]
    fn test_transport_error_kind_display_all() {
        assert_eq!(TransportErrorKind::RateLimit.to_string(), "rate_limit");
        assert_eq!(TransportErrorKind::Overloaded.to_string(), "overloaded");
        assert_eq!(
            TransportErrorKind::InvalidRequest.to_string(),
            "invalid_request"
        );
        assert_eq!(
            TransportErrorKind::InsufficientQuota.to_string(),
            "insufficient_quota"
        );
        assert_eq!(TransportErrorKind::Connection.to_string(), "connection");
        assert_eq!(TransportErrorKind::Internal.to_string(), "internal");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppError>();
    }
}
