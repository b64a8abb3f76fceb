//! Fallback Policy
//!
//! Decides what the router does after an attempt fails, and which failures
//! count as quota exhaustion.
//!
//! # Classification
//!
//! ```text
//! ProviderError ──> [message, code]
//!                         |
//!                         v
//!        any contains (case-insensitive) any signature?
//!                 |                     |
//!                yes                    no
//!                 v                     v
//!          QuotaExceeded           OtherFailure
//! ```
//!
//! Signatures are the endpoint's configured list plus, for OpenRouter
//! endpoints, [`OPENROUTER_QUOTA_SIGNATURES`]. Both classes advance to the
//! next candidate under the default policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::ProviderError;
use crate::config::EffectiveSettings;
use crate::registry::{ProviderEndpoint, ProviderKind};

/// Error text OpenRouter uses for exhausted free-tier and credit quotas
pub const OPENROUTER_QUOTA_SIGNATURES: &[&str] = &[
    "rate limit",
    "rate-limited",
    "rate_limit",
    "quota",
    "429",
    "too many requests",
    "insufficient credits",
    "free-models-per-day",
];

// ============================================================================
// Failure Classification
// ============================================================================

/// Outcome class of a failed attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureClassification {
    /// The error matched one of the endpoint's quota signatures
    QuotaExceeded,
    /// Anything else: network, auth, server error, timeout, malformed reply
    OtherFailure,
}

impl FailureClassification {
    /// Whether this is a quota failure
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded)
    }
}

impl std::fmt::Display for FailureClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded => write!(f, "quota exceeded"),
            Self::OtherFailure => write!(f, "failed"),
        }
    }
}

/// Every signature that applies to `endpoint`, blanks removed
#[must_use]
pub fn quota_signatures_for(endpoint: &ProviderEndpoint) -> Vec<String> {
    let builtin: &[&str] = match endpoint.provider_kind {
        ProviderKind::OpenRouter => OPENROUTER_QUOTA_SIGNATURES,
        _ => &[],
    };

    endpoint
        .quota_signatures
        .iter()
        .map(String::as_str)
        .chain(builtin.iter().copied())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Classify a failed attempt against `endpoint`
#[must_use]
pub fn classify_failure(endpoint: &ProviderEndpoint, error: &ProviderError) -> FailureClassification {
    let signatures = quota_signatures_for(endpoint);
    if signatures.is_empty() {
        return FailureClassification::OtherFailure;
    }

    let mut haystacks = vec![error.message().to_lowercase()];
    if let Some(code) = error.code() {
        haystacks.push(code.to_lowercase());
    }

    let matched = haystacks
        .iter()
        .any(|text| signatures.iter().any(|sig| text.contains(sig.as_str())));

    if matched {
        FailureClassification::QuotaExceeded
    } else {
        FailureClassification::OtherFailure
    }
}

// ============================================================================
// Fallback Policy
// ============================================================================

/// What to do after a non-quota failure
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Advance to the next candidate on any failure
    #[default]
    AdvanceOnAnyFailure,
    /// Advance only on quota failures; stop on anything else
    QuotaOnly,
}

impl FallbackPolicy {
    /// Whether the router moves on after a failure of this class
    #[must_use]
    pub fn advances_on(&self, classification: FailureClassification) -> bool {
        match self {
            Self::AdvanceOnAnyFailure => true,
            Self::QuotaOnly => classification.is_quota(),
        }
    }

    /// Config-file spelling
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdvanceOnAnyFailure => "advance_on_any_failure",
            Self::QuotaOnly => "quota_only",
        }
    }
}

impl std::fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised fallback policy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown fallback policy '{0}' (expected advance_on_any_failure or quota_only)")]
pub struct ParsePolicyError(String);

impl std::str::FromStr for FallbackPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "advance_on_any_failure" | "any" | "advance" => Ok(Self::AdvanceOnAnyFailure),
            "quota_only" | "quota" => Ok(Self::QuotaOnly),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

// ============================================================================
// Router Config
// ============================================================================

/// Router tuning taken from effective settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouterConfig {
    /// Per-attempt timeout; expiry counts as an ordinary failure
    pub request_timeout: Duration,
    /// Behaviour after a non-quota failure
    pub fallback_policy: FallbackPolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::from(&EffectiveSettings::default())
    }
}

impl From<&EffectiveSettings> for RouterConfig {
    fn from(settings: &EffectiveSettings) -> Self {
        Self {
            request_timeout: settings.request_timeout,
            fallback_policy: settings.fallback_policy,
        }
    }
}

impl RouterConfig {
    /// Override the per-attempt timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the fallback policy
    #[must_use]
    pub fn with_fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, code: Option<&str>, message: &str) -> ProviderError {
        ProviderError::Http {
            status,
            code: code.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_signature_match_is_case_insensitive() {
        let endpoint = ProviderEndpoint::new("g", ProviderKind::Gemini, "m")
            .with_quota_signatures(["Resource_Exhausted"]);

        let error = http(400, None, "resource_exhausted: try later");
        assert_eq!(
            classify_failure(&endpoint, &error),
            FailureClassification::QuotaExceeded
        );
    }

    #[test]
    fn test_signature_matches_code() {
        let endpoint = ProviderEndpoint::new("o", ProviderKind::OpenAi, "m")
            .with_quota_signatures(["insufficient_quota"]);

        let error = http(403, Some("insufficient_quota"), "You exceeded your plan");
        assert!(classify_failure(&endpoint, &error).is_quota());
    }

    #[test]
    fn test_no_signatures_is_other_failure() {
        let endpoint = ProviderEndpoint::new("o", ProviderKind::OpenAi, "m");
        let error = http(429, Some("rate_limit_exceeded"), "Rate limit reached");
        assert_eq!(
            classify_failure(&endpoint, &error),
            FailureClassification::OtherFailure
        );
    }

    #[test]
    fn test_blank_signature_never_matches() {
        let endpoint =
            ProviderEndpoint::new("o", ProviderKind::OpenAi, "m").with_quota_signatures(["", "  "]);
        let error = ProviderError::Transport("connection refused".into());
        assert_eq!(
            classify_failure(&endpoint, &error),
            FailureClassification::OtherFailure
        );
    }

    #[test]
    fn test_openrouter_builtin_signatures() {
        let endpoint = ProviderEndpoint::new("or", ProviderKind::OpenRouter, "m");

        let rate = http(429, Some("429"), "Provider returned error");
        assert!(classify_failure(&endpoint, &rate).is_quota());

        let too_many = http(429, None, "Too Many Requests");
        assert!(classify_failure(&endpoint, &too_many).is_quota());

        let daily = http(
            400,
            None,
            "Rate limit exceeded: free-models-per-day. Add 10 credits",
        );
        assert!(classify_failure(&endpoint, &daily).is_quota());

        let server = http(502, None, "Bad gateway");
        assert!(!classify_failure(&endpoint, &server).is_quota());
    }

    #[test]
    fn test_http_status_is_not_matched() {
        let endpoint =
            ProviderEndpoint::new("o", ProviderKind::OpenAi, "m").with_quota_signatures(["50"]);

        let error = http(502, None, "bad gateway");
        assert_eq!(
            classify_failure(&endpoint, &error),
            FailureClassification::OtherFailure
        );

        let bare = http(429, None, "");
        let openrouter = ProviderEndpoint::new("or", ProviderKind::OpenRouter, "m");
        assert!(!classify_failure(&openrouter, &bare).is_quota());
    }

    #[test]
    fn test_policy_advances() {
        use FailureClassification::*;
        assert!(FallbackPolicy::AdvanceOnAnyFailure.advances_on(OtherFailure));
        assert!(FallbackPolicy::AdvanceOnAnyFailure.advances_on(QuotaExceeded));
        assert!(FallbackPolicy::QuotaOnly.advances_on(QuotaExceeded));
        assert!(!FallbackPolicy::QuotaOnly.advances_on(OtherFailure));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "quota-only".parse::<FallbackPolicy>().unwrap(),
            FallbackPolicy::QuotaOnly
        );
        assert_eq!(
            "Advance_On_Any_Failure".parse::<FallbackPolicy>().unwrap(),
            FallbackPolicy::AdvanceOnAnyFailure
        );
        assert!("sometimes".parse::<FallbackPolicy>().is_err());
    }
}
