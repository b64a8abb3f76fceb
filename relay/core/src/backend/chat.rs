//! Chat-Completions Client
//!
//! The `POST {base}/chat/completions` wire shape spoken by OpenAI, Ollama's
//! OpenAI-compatible surface, OpenRouter and most self-hosted servers.

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

use super::traits::{non_empty_or_placeholder, ProviderClient, ProviderError, ProviderRequest};
use crate::registry::{ProviderEndpoint, ProviderKind, RequestKind};

/// Client for chat-completions compatible endpoints
#[derive(Clone, Debug)]
pub struct ChatCompletionsClient {
    provider: ProviderKind,
    base_url: String,
    model: String,
    credential: Option<String>,
    extra_headers: Vec<(HeaderName, HeaderValue)>,
    http_client: reqwest::Client,
}

impl ChatCompletionsClient {
    /// Create a client for `endpoint` sharing `http_client`'s pool
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint has no base URL, or a remote endpoint
    /// has no credential.
    pub fn new(
        endpoint: &ProviderEndpoint,
        http_client: reqwest::Client,
    ) -> Result<Self, ProviderError> {
        let base_url = endpoint.base_url().ok_or_else(|| {
            ProviderError::Configuration(format!(
                "endpoint '{}' needs endpoint_url for provider {}",
                endpoint.name, endpoint.provider_kind
            ))
        })?;

        let credential = Some(endpoint.credential.trim().to_string()).filter(|c| !c.is_empty());
        if credential.is_none() && !endpoint.provider_kind.is_local() {
            return Err(ProviderError::MissingCredential(endpoint.name.clone()));
        }

        Ok(Self {
            provider: endpoint.provider_kind,
            base_url,
            model: endpoint.model.clone(),
            credential,
            extra_headers: Vec::new(),
            http_client,
        })
    }

    /// Add a header sent with every request
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ProviderError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProviderError::Configuration(format!("header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ProviderError::Configuration(format!("header value for {name}: {e}")))?;
        self.extra_headers.push((name, value));
        Ok(self)
    }

    fn generate_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the HTTP request without sending it
    ///
    /// # Errors
    ///
    /// Returns an error if reqwest rejects the request (invalid URL).
    pub fn build_request(
        &self,
        prompt: &str,
        kind: RequestKind,
    ) -> Result<reqwest::Request, ProviderError> {
        let body = build_chat_body(&self.model, &ProviderRequest::framed(prompt, kind));

        let mut builder = self.http_client.post(self.generate_url()).json(&body);
        if let Some(credential) = &self.credential {
            builder = builder.bearer_auth(credential);
        }
        for (name, value) in &self.extra_headers {
            builder = builder.header(name.clone(), value.clone());
        }

        builder
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))
    }
}

#[async_trait]
impl ProviderClient for ChatCompletionsClient {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn send(&self, prompt: &str, kind: RequestKind) -> Result<String, ProviderError> {
        let request = self.build_request(prompt, kind)?;
        let response = self.http_client.execute(request).await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::from_response_body(status.as_u16(), &body));
        }

        parse_chat_response(status.as_u16(), &body)
    }
}

/// JSON body for a chat-completions call
#[must_use]
pub fn build_chat_body(model: &str, request: &ProviderRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(serde_json::json!({ "role": "system", "content": system }));
    }
    messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": false,
    });

    if let Some(temperature) = request.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }

    body
}

/// Extract `choices[0].message.content` from a success body.
///
/// A body carrying an `error` object and no choices is treated as a failure;
/// OpenRouter reports upstream rate limits that way with a 200 status.
///
/// # Errors
///
/// Returns an error for non-JSON bodies or embedded error objects.
pub fn parse_chat_response(status: u16, body: &str) -> Result<String, ProviderError> {
    let data: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("{e}: {}", truncate(body))))?;

    let first_choice = data
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first());

    if first_choice.is_none() {
        if let Some(error) = data.get("error") {
            return Err(ProviderError::from_error_object(status, error));
        }
    }

    let content = first_choice
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str());

    Ok(non_empty_or_placeholder(content))
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::traits::{COMPLETION_MAX_TOKENS, NO_RESPONSE_PLACEHOLDER};
    use pretty_assertions::assert_eq;

    fn body_json(request: &reqwest::Request) -> serde_json::Value {
        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_chat_body_conversational() {
        let body = build_chat_body(
            "gpt-4o-mini",
            &ProviderRequest::framed("hello", RequestKind::Conversational),
        );

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_chat_body_completion_has_system_prompt() {
        let body = build_chat_body(
            "m",
            &ProviderRequest::framed("let x = ", RequestKind::Completion),
        );

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "let x = ");
        assert_eq!(body["max_tokens"], COMPLETION_MAX_TOKENS);
        assert!(body["temperature"].as_f64().unwrap() < 0.3);
    }

    #[test]
    fn test_parse_success() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hi there"}}]}"#;
        assert_eq!(parse_chat_response(200, body).unwrap(), "Hi there");
    }

    #[test]
    fn test_parse_empty_content_gives_placeholder() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(parse_chat_response(200, body).unwrap(), NO_RESPONSE_PLACEHOLDER);

        let body = r#"{"choices":[]}"#;
        assert_eq!(parse_chat_response(200, body).unwrap(), NO_RESPONSE_PLACEHOLDER);
    }

    #[test]
    fn test_parse_embedded_error() {
        let body = r#"{"error":{"message":"Rate limit exceeded","code":429}}"#;
        let error = parse_chat_response(200, body).unwrap_err();
        assert_eq!(error.code(), Some("429"));
        assert_eq!(error.message(), "Rate limit exceeded");
    }

    #[test]
    fn test_parse_garbage_is_invalid_response() {
        assert!(matches!(
            parse_chat_response(200, "<html>"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_remote_endpoint_requires_credential() {
        let endpoint = ProviderEndpoint::new("o", ProviderKind::OpenAi, "gpt-4o-mini");
        assert!(matches!(
            ChatCompletionsClient::new(&endpoint, reqwest::Client::new()),
            Err(ProviderError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_custom_endpoint_requires_url() {
        let endpoint =
            ProviderEndpoint::new("c", ProviderKind::Custom, "m").with_credential("key");
        assert!(matches!(
            ChatCompletionsClient::new(&endpoint, reqwest::Client::new()),
            Err(ProviderError::Configuration(_))
        ));
    }

    #[test]
    fn test_local_request_has_no_auth() {
        let endpoint = ProviderEndpoint::new("local", ProviderKind::Ollama, "qwen2.5-coder");
        let client = ChatCompletionsClient::new(&endpoint, reqwest::Client::new()).unwrap();
        let request = client
            .build_request("hi", RequestKind::Conversational)
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "http://localhost:11434/v1/chat/completions"
        );
        assert!(request.headers().get("authorization").is_none());
        assert_eq!(body_json(&request)["model"], "qwen2.5-coder");
    }

    #[test]
    fn test_remote_request_has_bearer() {
        let endpoint =
            ProviderEndpoint::new("o", ProviderKind::OpenAi, "gpt-4o-mini").with_credential("sk-1");
        let client = ChatCompletionsClient::new(&endpoint, reqwest::Client::new()).unwrap();
        let request = client.build_request("hi", RequestKind::Completion).unwrap();

        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer sk-1"
        );
    }
}
