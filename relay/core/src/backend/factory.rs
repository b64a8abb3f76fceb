//! Client Factory
//!
//! Maps an endpoint's provider kind to a concrete [`ProviderClient`]. The
//! router asks for a fresh client per attempt, so no state leaks between
//! attempts or requests.

use std::time::Duration;

use super::chat::ChatCompletionsClient;
use super::gemini::GeminiClient;
use super::openrouter::OpenRouterClient;
use super::traits::{ProviderClient, ProviderError};
use crate::registry::{ProviderEndpoint, ProviderKind};

/// Connect timeout for outbound provider connections
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds a provider client for an endpoint
pub trait ClientFactory: Send + Sync {
    /// Create a client for one attempt against `endpoint`
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is misconfigured (no URL, no key).
    fn create(&self, endpoint: &ProviderEndpoint) -> Result<Box<dyn ProviderClient>, ProviderError>;
}

/// Factory producing real HTTP clients
#[derive(Clone, Debug)]
pub struct HttpClientFactory {
    http_client: reqwest::Client,
}

impl HttpClientFactory {
    /// Create a factory with its own connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        Ok(Self { http_client })
    }

    /// Create a factory around an existing reqwest client
    #[must_use]
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(&self, endpoint: &ProviderEndpoint) -> Result<Box<dyn ProviderClient>, ProviderError> {
        let http_client = self.http_client.clone();
        let client: Box<dyn ProviderClient> = match endpoint.provider_kind {
            ProviderKind::OpenRouter => Box::new(OpenRouterClient::new(endpoint, http_client)?),
            ProviderKind::Gemini => Box::new(GeminiClient::new(endpoint, http_client)?),
            ProviderKind::OpenAi | ProviderKind::Ollama | ProviderKind::Custom => {
                Box::new(ChatCompletionsClient::new(endpoint, http_client)?)
            }
        };
        Ok(client)
    }
}
