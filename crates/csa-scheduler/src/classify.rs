//! Classifies an LLM provider's HTTP status and response body into a
//! [`TransportErrorKind`], and parses the provider's suggested retry wait
//! out of the response body (spec §4.1 "Fails with").
//!
//! Grounded in the original prototype's `retry_on_overload` handling:
//! status code first, body substring as a fallback for providers that
//! return 200 with an error envelope or a non-standard code.

use csa_core::TransportErrorKind;

/// Default wait, in seconds, when a rate-limit response doesn't name one.
pub const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 60;

/// Classify a failed response into a transport error kind.
pub fn classify(status: u16, body: &str) -> TransportErrorKind {
    let lower = body.to_ascii_lowercase();
    match status {
        429 => TransportErrorKind::RateLimit,
        529 | 503 => TransportErrorKind::Overloaded,
        400 => TransportErrorKind::InvalidRequest,
        401 | 403 => TransportErrorKind::InsufficientQuota,
        _ if lower.contains("resource_exhausted") || lower.contains("quota") => {
            TransportErrorKind::InsufficientQuota
        }
        _ if lower.contains("overloaded") => TransportErrorKind::Overloaded,
        _ if lower.contains("try again in") => TransportErrorKind::RateLimit,
        500..=599 => TransportErrorKind::Internal,
        _ => TransportErrorKind::Connection,
    }
}

/// Parse a "try again in N second(s)" style hint out of a response body.
/// Falls back to [`DEFAULT_RATE_LIMIT_WAIT_SECS`] when no number is found.
pub fn parse_retry_after_body(body: &str) -> u64 {
    let lower = body.to_ascii_lowercase();
    let Some(marker_idx) = lower.find("try again in") else {
        return DEFAULT_RATE_LIMIT_WAIT_SECS;
    };

    let after = &body[marker_idx + "try again in".len()..];
    let digits: String = after
        .chars()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS)
}

/// Parse a standard `Retry-After` header value: either an integer seconds
/// count, or an HTTP-date (not supported here; treated as absent).
pub fn parse_retry_after_header(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_429_is_rate_limit() {
        assert_eq!(classify(429, ""), TransportErrorKind::RateLimit);
    }

    #[test]
    fn test_classify_529_is_overloaded() {
        assert_eq!(classify(529, ""), TransportErrorKind::Overloaded);
    }

    #[test]
    fn test_classify_400_is_invalid_request() {
        assert_eq!(classify(400, ""), TransportErrorKind::InvalidRequest);
    }

    #[test]
    fn test_classify_403_is_insufficient_quota() {
        assert_eq!(classify(403, ""), TransportErrorKind::InsufficientQuota);
    }

    #[test]
    fn test_classify_body_quota_fallback() {
        assert_eq!(
            classify(200, "RESOURCE_EXHAUSTED: quota exceeded"),
            TransportErrorKind::InsufficientQuota
        );
    }

    #[test]
    fn test_classify_body_overloaded_fallback() {
        assert_eq!(
            classify(200, "the model is currently overloaded"),
            TransportErrorKind::Overloaded
        );
    }

    #[test]
    fn test_classify_5xx_is_internal() {
        assert_eq!(classify(502, ""), TransportErrorKind::Internal);
    }

    #[test]
    fn test_classify_unknown_is_connection() {
        assert_eq!(classify(999, "garbled"), TransportErrorKind::Connection);
    }

    #[test]
    fn test_parse_retry_after_body_explicit_seconds() {
        let wait = parse_retry_after_body("Rate limited. Please try again in 12 seconds.");
        assert_eq!(wait, 12);
    }

    #[test]
    fn test_parse_retry_after_body_defaults_when_absent() {
        let wait = parse_retry_after_body("no timing hint here");
        assert_eq!(wait, DEFAULT_RATE_LIMIT_WAIT_SECS);
    }

    #[test]
    fn test_parse_retry_after_header_seconds() {
        assert_eq!(parse_retry_after_header("30"), Some(30));
    }

    #[test]
    fn test_parse_retry_after_header_garbage() {
        assert_eq!(parse_retry_after_header("Wed, 21 Oct"), None);
    }
}
