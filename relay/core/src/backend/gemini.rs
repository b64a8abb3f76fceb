//! Gemini Client
//!
//! Google's native `generateContent` API. The key travels as a query
//! parameter and the system instruction has its own top-level field.

use async_trait::async_trait;

use super::traits::{non_empty_or_placeholder, ProviderClient, ProviderError, ProviderRequest};
use crate::registry::{ProviderEndpoint, RequestKind};

/// Gemini `generateContent` client
#[derive(Clone, Debug)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client for `endpoint`
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint has no credential.
    pub fn new(
        endpoint: &ProviderEndpoint,
        http_client: reqwest::Client,
    ) -> Result<Self, ProviderError> {
        let api_key = endpoint.credential.trim();
        if api_key.is_empty() {
            return Err(ProviderError::MissingCredential(endpoint.name.clone()));
        }

        let base_url = endpoint.base_url().ok_or_else(|| {
            ProviderError::Configuration(format!("endpoint '{}' has no base URL", endpoint.name))
        })?;

        Ok(Self {
            base_url,
            model: endpoint.model.trim_start_matches("models/").to_string(),
            api_key: api_key.to_string(),
            http_client,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Build the HTTP request without sending it
    ///
    /// # Errors
    ///
    /// Returns an error if reqwest rejects the request.
    pub fn build_request(
        &self,
        prompt: &str,
        kind: RequestKind,
    ) -> Result<reqwest::Request, ProviderError> {
        let body = build_gemini_body(&ProviderRequest::framed(prompt, kind));
        self.http_client
            .post(self.generate_url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn send(&self, prompt: &str, kind: RequestKind) -> Result<String, ProviderError> {
        let request = self.build_request(prompt, kind)?;
        let response = self.http_client.execute(request).await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::from_response_body(status.as_u16(), &body));
        }

        parse_gemini_response(&body)
    }
}

/// JSON body for `generateContent`
#[must_use]
pub fn build_gemini_body(request: &ProviderRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt }],
        }],
    });

    if let Some(system) = &request.system {
        body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system }] });
    }

    let mut generation = serde_json::Map::new();
    if let Some(temperature) = request.temperature {
        generation.insert("temperature".into(), serde_json::json!(temperature));
    }
    if let Some(max_tokens) = request.max_tokens {
        generation.insert("maxOutputTokens".into(), serde_json::json!(max_tokens));
    }
    if !generation.is_empty() {
        body["generationConfig"] = serde_json::Value::Object(generation);
    }

    body
}

/// Concatenate the text parts of the first candidate
///
/// # Errors
///
/// Returns an error if the body is not JSON.
pub fn parse_gemini_response(body: &str) -> Result<String, ProviderError> {
    let data: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    let text: String = data
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    Ok(non_empty_or_placeholder(Some(&text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::traits::NO_RESPONSE_PLACEHOLDER;
    use crate::registry::ProviderKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_url_carries_key() {
        let endpoint = ProviderEndpoint::new("gem", ProviderKind::Gemini, "gemini-2.0-flash")
            .with_credential("AIza-test");
        let client = GeminiClient::new(&endpoint, reqwest::Client::new()).unwrap();
        let request = client
            .build_request("hi", RequestKind::Conversational)
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent?key=AIza-test"
        );
        assert!(request.headers().get("authorization").is_none());
    }

    #[test]
    fn test_completion_body() {
        let body = build_gemini_body(&ProviderRequest::framed("x = ", RequestKind::Completion));
        assert!(body["systemInstruction"]["parts"][0]["text"].is_string());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "x = ");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn test_chat_body_has_no_generation_config() {
        let body = build_gemini_body(&ProviderRequest::framed("hi", RequestKind::Conversational));
        assert!(body.get("generationConfig").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello"},{"text":", world"}]}}]}"#;
        assert_eq!(parse_gemini_response(body).unwrap(), "Hello, world");
    }

    #[test]
    fn test_parse_blocked_prompt_gives_placeholder() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert_eq!(parse_gemini_response(body).unwrap(), NO_RESPONSE_PLACEHOLDER);
    }

    #[test]
    fn test_missing_key() {
        let endpoint = ProviderEndpoint::new("gem", ProviderKind::Gemini, "gemini-2.0-flash");
        assert!(matches!(
            GeminiClient::new(&endpoint, reqwest::Client::new()),
            Err(ProviderError::MissingCredential(_))
        ));
    }
}
