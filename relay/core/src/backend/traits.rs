//! Provider Client Traits
//!
//! The single seam between the router and the wire. A [`ProviderClient`]
//! turns `(prompt, kind)` into response text or a [`ProviderError`]; the
//! router never sees provider-specific shapes.

use std::time::Duration;

use async_trait::async_trait;

use crate::registry::RequestKind;

/// Text returned when a provider answers successfully with no content
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response generated.";

/// System instruction sent with completion requests
pub const COMPLETION_SYSTEM_PROMPT: &str = "You are a code completion engine. \
Continue the code exactly where it stops. Reply with the continuation only: \
no explanation, no markdown fences, no repetition of the existing code.";

/// Sampling temperature for completion requests
pub const COMPLETION_TEMPERATURE: f32 = 0.2;

/// Token ceiling for completion requests
pub const COMPLETION_MAX_TOKENS: u32 = 256;

// ============================================================================
// Provider Error
// ============================================================================

/// Failure from a single provider call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Non-success HTTP status, or an error object in a success body
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Provider error code or type, when present
        code: Option<String>,
        /// Provider error message (or raw body)
        message: String,
    },

    /// Connection, DNS or TLS failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The attempt ran out of time
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Remote endpoint has no credential
    #[error("no credential configured for endpoint '{0}'")]
    MissingCredential(String),

    /// Endpoint cannot be turned into a client
    #[error("invalid endpoint configuration: {0}")]
    Configuration(String),

    /// Success status with an unparseable body
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Human-readable message, without the status prefix
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Provider error code, if any
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// HTTP status, if the failure came from an HTTP response
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an error from a non-success response body.
    ///
    /// Understands the `{"error": {"message", "code", "type", "status"}}`
    /// shape shared by OpenAI, OpenRouter and Gemini. Anything else keeps the
    /// raw body as the message.
    #[must_use]
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let error = parsed.as_ref().and_then(|v| v.get("error"));

        match error {
            Some(error) => Self::from_error_object(status, error),
            None => Self::Http {
                status,
                code: None,
                message: body.trim().to_string(),
            },
        }
    }

    /// Build an error from a provider `error` object
    #[must_use]
    pub fn from_error_object(status: u16, error: &serde_json::Value) -> Self {
        if let Some(text) = error.as_str() {
            return Self::Http {
                status,
                code: None,
                message: text.to_string(),
            };
        }

        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();

        // Gemini puts the symbolic code in `status`; OpenAI in `code` or `type`.
        let code = ["status", "code", "type"].iter().find_map(|key| {
            error.get(*key).and_then(|v| match v {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        });

        let message = match (message.is_empty(), error.get("metadata")) {
            (false, Some(meta)) => format!("{message} ({meta})"),
            (false, None) => message,
            (true, _) => error.to_string(),
        };

        Self::Http {
            status,
            code,
            message,
        }
    }
}

// Client-level timeouts map to Transport; Timeout is the router's per-attempt limit.
impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

// ============================================================================
// Request Framing
// ============================================================================

/// Provider-neutral request, framed for its kind
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderRequest {
    /// User prompt (or code prefix for completions)
    pub prompt: String,
    /// Request kind
    pub kind: RequestKind,
    /// System instruction
    pub system: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Response token ceiling
    pub max_tokens: Option<u32>,
}

impl ProviderRequest {
    /// Frame `prompt` for `kind`.
    ///
    /// Conversational prompts go out bare. Completion prompts carry the
    /// completion instruction with low temperature and a short token ceiling.
    pub fn framed(prompt: impl Into<String>, kind: RequestKind) -> Self {
        let request = Self {
            prompt: prompt.into(),
            kind,
            system: None,
            temperature: None,
            max_tokens: None,
        };

        match kind {
            RequestKind::Conversational => request,
            RequestKind::Completion => request
                .with_system(COMPLETION_SYSTEM_PROMPT)
                .with_temperature(COMPLETION_TEMPERATURE)
                .with_max_tokens(COMPLETION_MAX_TOKENS),
        }
    }

    /// Set the system instruction
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Replace blank provider output with [`NO_RESPONSE_PLACEHOLDER`]
#[must_use]
pub fn non_empty_or_placeholder(text: Option<&str>) -> String {
    match text {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => NO_RESPONSE_PLACEHOLDER.to_string(),
    }
}

// ============================================================================
// Provider Client
// ============================================================================

/// One provider call per `send`, no retries.
///
/// Implement this trait to add a wire protocol.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name for logs (e.g., "OpenRouter")
    fn name(&self) -> &str;

    /// Send `prompt` framed for `kind` and return the response text
    async fn send(&self, prompt: &str, kind: RequestKind) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_completion_framing() {
        let request = ProviderRequest::framed("fn main() {", RequestKind::Completion);
        assert_eq!(request.system.as_deref(), Some(COMPLETION_SYSTEM_PROMPT));
        assert_eq!(request.temperature, Some(COMPLETION_TEMPERATURE));
        assert_eq!(request.max_tokens, Some(COMPLETION_MAX_TOKENS));

        let chat = ProviderRequest::framed("hi", RequestKind::Conversational);
        assert_eq!(chat.system, None);
        assert_eq!(chat.temperature, None);
    }

    #[test]
    fn test_openai_error_body() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let error = ProviderError::from_response_body(429, body);

        assert_eq!(error.status(), Some(429));
        assert_eq!(error.code(), Some("insufficient_quota"));
        assert_eq!(error.message(), "You exceeded your current quota");
    }

    #[test]
    fn test_gemini_error_body_prefers_status() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded for metric","status":"RESOURCE_EXHAUSTED"}}"#;
        let error = ProviderError::from_response_body(429, body);
        assert_eq!(error.code(), Some("RESOURCE_EXHAUSTED"));
    }

    #[test]
    fn test_openrouter_numeric_code_and_metadata() {
        let body = r#"{"error":{"code":429,"message":"Provider returned error","metadata":{"raw":"free-models-per-day"}}}"#;
        let error = ProviderError::from_response_body(429, body);

        assert_eq!(error.code(), Some("429"));
        assert!(error.message().contains("free-models-per-day"));
    }

    #[test]
    fn test_plain_text_error_body() {
        let error = ProviderError::from_response_body(502, "  Bad Gateway\n");
        assert_eq!(error.message(), "Bad Gateway");
        assert_eq!(error.code(), None);
    }

    #[tokio::test]
    async fn test_client_timeout_is_transport_error() {
        // Accepts the connection in the backlog and never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let err = client.post(&url).send().await.unwrap_err();
        assert!(err.is_timeout());

        let error = ProviderError::from(err);
        assert!(matches!(error, ProviderError::Transport(_)), "{error:?}");
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(non_empty_or_placeholder(None), NO_RESPONSE_PLACEHOLDER);
        assert_eq!(non_empty_or_placeholder(Some("  ")), NO_RESPONSE_PLACEHOLDER);
        assert_eq!(non_empty_or_placeholder(Some("ok")), "ok");
    }
}
