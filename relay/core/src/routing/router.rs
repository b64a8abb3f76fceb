//! Request Router
//!
//! Sends one prompt through the candidate list until an endpoint answers.
//!
//! # Flow
//!
//! ```text
//! route(prompt, kind)
//!     |
//!     v
//! registry.candidates(kind) ── empty ──> NoEligibleEndpoints
//!     |
//!     v
//! for endpoint in candidates (priority order):
//!     cancelled? ──────────────────────> Cancelled
//!     factory.create(endpoint)
//!     timeout(send(prompt, kind))
//!       Ok(text)  ── cancelled? ───────> Cancelled
//!                 └────────────────────> RouteOutcome
//!       Err(e)    ── classify ─┬─ policy advances ──> next endpoint
//!                              └─ policy stops ─────> EndpointFailed
//!     |
//!     v
//! AllEndpointsExhausted { attempts }
//! ```
//!
//! Attempts are strictly sequential. Each endpoint is tried at most once per
//! request and every attempt gets a fresh client. A router built with
//! [`RequestRouter::from_registry`] reads its timeout and policy from the
//! registry at the start of each route.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use super::cancel::CancellationFlag;
use super::policy::{classify_failure, FailureClassification, RouterConfig};
use crate::backend::{ClientFactory, ProviderError};
use crate::registry::{ModelRegistry, ProviderEndpoint, RequestKind};

// ============================================================================
// Outcomes
// ============================================================================

/// A successful route
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Response text (placeholder when the provider returned nothing)
    pub text: String,
    /// Name of the endpoint that answered
    pub endpoint_used: String,
    /// Failed attempts before the successful one
    pub failed_attempts: Vec<AttemptFailure>,
}

/// One failed attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptFailure {
    /// Endpoint name
    pub endpoint: String,
    /// Quota or other
    pub classification: FailureClassification,
    /// Provider error message
    pub reason: String,
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.endpoint, self.classification, self.reason)
    }
}

/// Route failure surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// No endpoint is enabled, credentialed and matching the kind
    #[error(
        "No model endpoint is available for {kind} requests. \
         Add an endpoint with an API key, or enable a local model."
    )]
    NoEligibleEndpoints {
        /// Requested kind
        kind: RequestKind,
    },

    /// Every candidate was tried and failed
    #[error(
        "All {} model endpoints failed or are out of quota. \
         Wait for the quota to reset or configure another endpoint. Last error: {}",
        .attempts.len(),
        last_reason(.attempts)
    )]
    AllEndpointsExhausted {
        /// Every attempt in order
        attempts: Vec<AttemptFailure>,
    },

    /// A non-quota failure under the quota-only policy
    #[error("Model endpoint '{endpoint}' failed: {reason}")]
    EndpointFailed {
        /// Endpoint name
        endpoint: String,
        /// Provider error message
        reason: String,
        /// Attempts up to and including this one
        attempts: Vec<AttemptFailure>,
    },

    /// The host cancelled the request
    #[error("Request cancelled")]
    Cancelled,
}

fn last_reason(attempts: &[AttemptFailure]) -> &str {
    attempts.last().map_or("none", |a| a.reason.as_str())
}

impl RouterError {
    /// Attempts made before the route gave up
    #[must_use]
    pub fn attempts(&self) -> &[AttemptFailure] {
        match self {
            Self::AllEndpointsExhausted { attempts } | Self::EndpointFailed { attempts, .. } => {
                attempts
            }
            Self::NoEligibleEndpoints { .. } | Self::Cancelled => &[],
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Priority-ordered, quota-aware request router
pub struct RequestRouter {
    registry: Arc<ModelRegistry>,
    factory: Arc<dyn ClientFactory>,
    /// Fixed config, or `None` to follow the registry's settings
    config: Option<RouterConfig>,
}

impl RequestRouter {
    /// Create a router with explicit config
    pub fn new(
        registry: Arc<ModelRegistry>,
        factory: Arc<dyn ClientFactory>,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            factory,
            config: Some(config),
        }
    }

    /// Create a router that follows the registry's effective settings,
    /// including changes picked up by a later [`ModelRegistry::refresh`]
    pub fn from_registry(registry: Arc<ModelRegistry>, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            registry,
            factory,
            config: None,
        }
    }

    /// Configuration the next route will use
    #[must_use]
    pub fn config(&self) -> RouterConfig {
        self.config
            .unwrap_or_else(|| RouterConfig::from(&self.registry.settings()))
    }

    /// Route `prompt` to the first endpoint that answers
    ///
    /// # Errors
    ///
    /// See [`RouterError`].
    pub async fn route(&self, prompt: &str, kind: RequestKind) -> Result<RouteOutcome, RouterError> {
        self.route_with_cancel(prompt, kind, &CancellationFlag::new())
            .await
    }

    /// Route with a cancellation flag checked between attempts
    ///
    /// # Errors
    ///
    /// See [`RouterError`].
    pub async fn route_with_cancel(
        &self,
        prompt: &str,
        kind: RequestKind,
        cancel: &CancellationFlag,
    ) -> Result<RouteOutcome, RouterError> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("route", %request_id, %kind);
        self.route_inner(prompt, kind, cancel).instrument(span).await
    }

    async fn route_inner(
        &self,
        prompt: &str,
        kind: RequestKind,
        cancel: &CancellationFlag,
    ) -> Result<RouteOutcome, RouterError> {
        let config = self.config();
        let candidates = self.registry.candidates(kind);
        if candidates.is_empty() {
            tracing::warn!("No eligible endpoints");
            return Err(RouterError::NoEligibleEndpoints { kind });
        }

        tracing::debug!(candidates = candidates.len(), "Routing request");
        let mut attempts: Vec<AttemptFailure> = Vec::new();

        for endpoint in &candidates {
            if cancel.is_cancelled() {
                tracing::info!(tried = attempts.len(), "Route cancelled");
                return Err(RouterError::Cancelled);
            }

            let start = Instant::now();
            match self
                .attempt(endpoint, prompt, kind, config.request_timeout)
                .await
            {
                Ok(text) => {
                    if cancel.is_cancelled() {
                        tracing::info!(endpoint = %endpoint.name, "Route cancelled after response");
                        return Err(RouterError::Cancelled);
                    }
                    tracing::info!(
                        endpoint = %endpoint.name,
                        model = %endpoint.model,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        fallbacks = attempts.len(),
                        "Request served"
                    );
                    return Ok(RouteOutcome {
                        text,
                        endpoint_used: endpoint.name.clone(),
                        failed_attempts: attempts,
                    });
                }
                Err(error) => {
                    let classification = classify_failure(endpoint, &error);
                    let failure = AttemptFailure {
                        endpoint: endpoint.name.clone(),
                        classification,
                        reason: error.to_string(),
                    };

                    tracing::warn!(
                        endpoint = %endpoint.name,
                        %classification,
                        reason = %error,
                        "Attempt failed"
                    );

                    attempts.push(failure);

                    if !config.fallback_policy.advances_on(classification) {
                        return Err(RouterError::EndpointFailed {
                            endpoint: endpoint.name.clone(),
                            reason: error.to_string(),
                            attempts,
                        });
                    }
                }
            }
        }

        tracing::error!(attempts = attempts.len(), "All endpoints exhausted");
        Err(RouterError::AllEndpointsExhausted { attempts })
    }

    async fn attempt(
        &self,
        endpoint: &ProviderEndpoint,
        prompt: &str,
        kind: RequestKind,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let client = self.factory.create(endpoint)?;
        tracing::debug!(
            endpoint = %endpoint.name,
            provider = client.name(),
            model = %endpoint.model,
            "Attempting endpoint"
        );

        match tokio::time::timeout(timeout, client.send(prompt, kind)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        }
    }
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
