//! OpenRouter Client
//!
//! OpenRouter speaks chat-completions over the chosen model identifier, plus
//! two attribution headers it uses to identify the calling application.

use async_trait::async_trait;

use super::chat::ChatCompletionsClient;
use super::traits::{ProviderClient, ProviderError};
use crate::registry::{ProviderEndpoint, RequestKind};

/// `HTTP-Referer` value sent to OpenRouter
pub const DEFAULT_REFERER: &str = "http://localhost";

/// `X-Title` value sent to OpenRouter
pub const DEFAULT_TITLE: &str = "Relay";

/// OpenRouter aggregator client
#[derive(Clone, Debug)]
pub struct OpenRouterClient {
    inner: ChatCompletionsClient,
}

impl OpenRouterClient {
    /// Create a client with the default attribution headers
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint has no credential.
    pub fn new(
        endpoint: &ProviderEndpoint,
        http_client: reqwest::Client,
    ) -> Result<Self, ProviderError> {
        Self::with_attribution(endpoint, http_client, DEFAULT_REFERER, DEFAULT_TITLE)
    }

    /// Create a client with custom attribution headers
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint has no credential or a header value
    /// is invalid.
    pub fn with_attribution(
        endpoint: &ProviderEndpoint,
        http_client: reqwest::Client,
        referer: &str,
        title: &str,
    ) -> Result<Self, ProviderError> {
        let inner = ChatCompletionsClient::new(endpoint, http_client)?
            .with_header("HTTP-Referer", referer)?
            .with_header("X-Title", title)?;
        Ok(Self { inner })
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
        self.inner.build_request(prompt, kind)
    }
}

#[async_trait]
impl ProviderClient for OpenRouterClient {
    fn name(&self) -> &str {
        "OpenRouter"
    }

    async fn send(&self, prompt: &str, kind: RequestKind) -> Result<String, ProviderError> {
        self.inner.send(prompt, kind).await
    }
}
