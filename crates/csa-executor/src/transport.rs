//! LLM transport implementations (spec §4.1). Each variant wraps a
//! provider's HTTP API behind the same `generate(prompt) -> String`
//! surface; retry/backoff timing comes from [`csa_scheduler::backoff`],
//! error classification from [`csa_scheduler::classify`].

use async_trait::async_trait;
use csa_core::{AppError, TransportErrorKind};
use csa_scheduler::{classify, exponential_backoff, parse_retry_after_body, vendor_gateway_backoff};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Hard cap on prompt length sent to any provider (spec §4.1 "Prompt cap").
pub const MAX_PROMPT_CHARS: usize = 200_000;

/// Literal delimiters the vendor-gateway transport uses to ask for more of
/// a truncated response.
pub const CONTINUATION_START: &str = "<<<START>>>";
pub const CONTINUATION_END: &str = "<<<END>>>";
/// Max number of continuation round-trips before giving up and returning
/// whatever was assembled so far.
const MAX_CONTINUATIONS: usize = 3;

const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Truncates `prompt` to [`MAX_PROMPT_CHARS`], preferring to drop from the
/// front so the most recent instructions (which sit at the end of the
/// assembled prompt) survive.
pub fn truncate_prompt(prompt: &str) -> (String, bool) {
    if prompt.chars().count() <= MAX_PROMPT_CHARS {
        return (prompt.to_string(), false);
    }
    let chars: Vec<char> = prompt.chars().collect();
    let start = chars.len() - MAX_PROMPT_CHARS;
    (chars[start..].iter().collect(), true)
}

/// A provider-agnostic LLM transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `prompt` and returns the model's full text reply.
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String, AppError>;
}

fn is_retryable(kind: TransportErrorKind) -> bool {
    matches!(
        kind,
        TransportErrorKind::RateLimit | TransportErrorKind::Overloaded | TransportErrorKind::Internal | TransportErrorKind::Connection
    )
}

/// Anthropic-style hosted chat API (`/v1/messages`).
pub struct HostedChatTransport {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl HostedChatTransport {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self { client: reqwest::Client::new(), api_key, model, base_url }
    }
}

#[async_trait]
impl Transport for HostedChatTransport {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String, AppError> {
        let (prompt, truncated) = truncate_prompt(prompt);
        if truncated {
            warn!(cap = MAX_PROMPT_CHARS, "prompt truncated before sending to hosted chat transport");
        }

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            let response = self
                .client
                .post(&self.base_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&json!({
                    "model": self.model,
                    "max_tokens": max_output_tokens,
                    "messages": [{"role": "user", "content": prompt}],
                }))
                .send()
                .await
                .map_err(|e| AppError::Transport {
                    kind: TransportErrorKind::Connection,
                    message: e.to_string(),
                })?;

            let status = response.status().as_u16();
            if response.status().is_success() {
                let body: serde_json::Value = response.json().await.map_err(|e| AppError::Transport {
                    kind: TransportErrorKind::Internal,
                    message: format!("failed to parse response body: {e}"),
                })?;
                return extract_hosted_chat_text(&body);
            }

            let body_text = response.text().await.unwrap_or_default();
            let kind = classify(status, &body_text);
            if is_retryable(kind) && attempt + 1 < MAX_RETRY_ATTEMPTS {
                let wait = Duration::from_secs(parse_retry_after_body(&body_text));
                debug!(attempt, wait_secs = wait.as_secs(), "retrying hosted chat transport");
                tokio::time::sleep(wait).await;
                continue;
            }
            return Err(AppError::Transport { kind, message: body_text });
        }

        Err(AppError::Transport {
            kind: TransportErrorKind::Internal,
            message: "exhausted retry attempts".to_string(),
        })
    }
}

fn extract_hosted_chat_text(body: &serde_json::Value) -> Result<String, AppError> {
    body["content"]
        .as_array()
        .and_then(|blocks| blocks.first())
        .and_then(|block| block["text"].as_str())
        .map(str::to_string)
        .ok_or(AppError::MalformedReply)
}

/// Vertex-AI/gcloud-style gateway transport. Uses a slower, longer-lived
/// doubling backoff and the response-continuation protocol since this
/// provider truncates long completions rather than erroring.
pub struct VendorGatewayTransport {
    client: reqwest::Client,
    model: String,
    project_id: String,
    region: String,
    access_token: String,
}

impl VendorGatewayTransport {
    pub fn new(access_token: String, project_id: String, region: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            model,
            project_id,
            region,
            access_token,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{}-aiplatform.googleapis.com/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.region, self.project_id, self.region, self.model
        )
    }

    async fn generate_once(&self, prompt: &str, max_output_tokens: u32) -> Result<(String, bool), AppError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.access_token)
            .json(&json!({
                "contents": [{"role": "user", "parts": [{"text": prompt}]}],
                "generationConfig": {"maxOutputTokens": max_output_tokens},
            }))
            .send()
            .await
            .map_err(|e| AppError::Transport {
                kind: TransportErrorKind::Connection,
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(AppError::Transport { kind: classify(status, &body_text), message: body_text });
        }

        let body: serde_json::Value = response.json().await.map_err(|e| AppError::Transport {
            kind: TransportErrorKind::Internal,
            message: format!("failed to parse response body: {e}"),
        })?;

        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or(AppError::MalformedReply)?
            .to_string();
        let finish_reason = body["candidates"][0]["finishReason"].as_str().unwrap_or("STOP");
        Ok((text, finish_reason == "MAX_TOKENS"))
    }
}

#[async_trait]
impl Transport for VendorGatewayTransport {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String, AppError> {
        let (prompt, truncated) = truncate_prompt(prompt);
        if truncated {
            warn!(cap = MAX_PROMPT_CHARS, "prompt truncated before sending to vendor gateway transport");
        }

        let mut assembled = String::new();
        let mut next_prompt = prompt;
        let mut attempt = 0u32;

        for round in 0..=MAX_CONTINUATIONS {
            let result = loop {
                match self.generate_once(&next_prompt, max_output_tokens).await {
                    Ok(r) => break Ok(r),
                    Err(AppError::Transport { kind, message }) if is_retryable(kind) && attempt + 1 < MAX_RETRY_ATTEMPTS => {
                        let wait = vendor_gateway_backoff(attempt, Duration::from_secs(600));
                        warn!(attempt, wait_secs = wait.as_secs(), kind = %kind, "retrying vendor gateway transport");
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                    }
                    Err(e) => break Err(e),
                }
            };

            let (text, truncated_by_tokens) = result?;
            assembled.push_str(&text);

            if !truncated_by_tokens || round == MAX_CONTINUATIONS {
                break;
            }
            next_prompt = format!(
                "Continue your previous reply exactly where it left off. Wrap the continuation \
                 between {CONTINUATION_START} and {CONTINUATION_END} with no other text.\n\n\
                 Previous partial reply:\n{assembled}"
            );
        }

        Ok(strip_continuation_markers(&assembled))
    }
}

fn strip_continuation_markers(text: &str) -> String {
    let mut out = text.to_string();
    if let Some(start) = out.find(CONTINUATION_START) {
        out.replace_range(start..start + CONTINUATION_START.len(), "");
    }
    if let Some(end) = out.find(CONTINUATION_END) {
        out.replace_range(end..end + CONTINUATION_END.len(), "");
    }
    out
}

/// Any OpenAI-chat-compatible endpoint (self-hosted or third-party),
/// configurable by base URL and model name.
pub struct OpenAiCompatTransport {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiCompatTransport {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self { client: reqwest::Client::new(), api_key, model, base_url }
    }
}

#[async_trait]
impl Transport for OpenAiCompatTransport {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String, AppError> {
        let (prompt, truncated) = truncate_prompt(prompt);
        if truncated {
            warn!(cap = MAX_PROMPT_CHARS, "prompt truncated before sending to OpenAI-compatible transport");
        }

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            let response = self
                .client
                .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "max_tokens": max_output_tokens,
                    "messages": [{"role": "user", "content": prompt}],
                }))
                .send()
                .await
                .map_err(|e| AppError::Transport {
                    kind: TransportErrorKind::Connection,
                    message: e.to_string(),
                })?;

            let status = response.status().as_u16();
            if response.status().is_success() {
                let body: serde_json::Value = response.json().await.map_err(|e| AppError::Transport {
                    kind: TransportErrorKind::Internal,
                    message: format!("failed to parse response body: {e}"),
                })?;
                return body["choices"][0]["message"]["content"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or(AppError::MalformedReply);
            }

            let body_text = response.text().await.unwrap_or_default();
            let kind = classify(status, &body_text);
            if is_retryable(kind) && attempt + 1 < MAX_RETRY_ATTEMPTS {
                let wait = exponential_backoff(Duration::from_secs(2), attempt, Duration::from_secs(120));
                debug!(attempt, wait_secs = wait.as_secs(), "retrying OpenAI-compatible transport");
                tokio::time::sleep(wait).await;
                continue;
            }
            return Err(AppError::Transport { kind, message: body_text });
        }

        Err(AppError::Transport {
            kind: TransportErrorKind::Internal,
            message: "exhausted retry attempts".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_prompt_under_cap_is_untouched() {
        let (p, truncated) = truncate_prompt("short prompt");
        assert_eq!(p, "short prompt");
        assert!(!truncated);
    }

    #[test]
    fn test_truncate_prompt_over_cap_keeps_tail() {
        let long = "a".repeat(MAX_PROMPT_CHARS + 500);
        let (p, truncated) = truncate_prompt(&long);
        assert!(truncated);
        assert_eq!(p.chars().count(), MAX_PROMPT_CHARS);
    }

    #[test]
    fn test_extract_hosted_chat_text() {
        let body = json!({"content": [{"type": "text", "text": "hello"}]});
        assert_eq!(extract_hosted_chat_text(&body).unwrap(), "hello");
    }

    #[test]
    fn test_extract_hosted_chat_text_missing_field_is_malformed() {
        let body = json!({"content": []});
        assert!(matches!(extract_hosted_chat_text(&body), Err(AppError::MalformedReply)));
    }

    #[test]
    fn test_strip_continuation_markers() {
        let text = format!("{CONTINUATION_START}hello world{CONTINUATION_END}");
        assert_eq!(strip_continuation_markers(&text), "hello world");
    }

    #[test]
    fn test_strip_continuation_markers_noop_without_markers() {
        assert_eq!(strip_continuation_markers("plain text"), "plain text");
    }

    #[test]
    fn test_is_retryable_kinds() {
        assert!(is_retryable(TransportErrorKind::RateLimit));
        assert!(is_retryable(TransportErrorKind::Overloaded));
        assert!(!is_retryable(TransportErrorKind::InvalidRequest));
        assert!(!is_retryable(TransportErrorKind::InsufficientQuota));
    }

    #[tokio::test]
    async fn test_hosted_chat_transport_success() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "ok"}]
            })))
            .mount(&server)
            .await;

        let transport = HostedChatTransport::with_base_url(
            "test-key".into(),
            "test-model".into(),
            format!("{}/v1/messages", server.uri()),
        );
        let reply = transport.generate("hi", 100).await.unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn test_hosted_chat_transport_propagates_invalid_request() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let transport = HostedChatTransport::with_base_url(
            "test-key".into(),
            "test-model".into(),
            format!("{}/v1/messages", server.uri()),
        );
        let err = transport.generate("hi", 100).await.unwrap_err();
        match err {
            AppError::Transport { kind, .. } => assert_eq!(kind, TransportErrorKind::InvalidRequest),
            _ => panic!("expected Transport error"),
        }
    }
}
