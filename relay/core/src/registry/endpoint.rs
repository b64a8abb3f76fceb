//! Provider Endpoints
//!
//! The configured targets the router can send requests to. An endpoint is a
//! (provider, model, credential) tuple plus the routing metadata that decides
//! when it is eligible: priority, enablement, request-type affinity and the
//! error signatures that mark a failure as quota exhaustion.

use serde::{Deserialize, Serialize};

/// Priority assigned to endpoints that do not specify one.
pub const DEFAULT_PRIORITY: i32 = 100;

// ============================================================================
// Request Kind
// ============================================================================

/// The two request shapes the router serves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Open-ended chat prompt from the sidebar
    Conversational,
    /// Short code continuation for inline suggestions
    Completion,
}

impl RequestKind {
    /// Short label used in logs and CLI output
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversational => "chat",
            Self::Completion => "completion",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Provider Kind
// ============================================================================

/// Wire protocol family of an endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// First-party chat-completions API (OpenAI)
    #[serde(alias = "openai-compatible")]
    OpenAi,
    /// OpenRouter aggregator
    OpenRouter,
    /// Local Ollama server through its OpenAI-compatible surface
    Ollama,
    /// Google Gemini native `generateContent` API
    Gemini,
    /// Any other chat-completions compatible server
    Custom,
}

impl ProviderKind {
    /// Base URL used when the endpoint does not override it.
    ///
    /// `Custom` has no sensible default; callers must supply `endpoint_url`.
    #[must_use]
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Self::Ollama => Some("http://localhost:11434/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            Self::Custom => None,
        }
    }

    /// Local providers run without a credential
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Ollama)
    }

    /// Display name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::OpenRouter => "OpenRouter",
            Self::Ollama => "Ollama",
            Self::Gemini => "Gemini",
            Self::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Request Type Affinity
// ============================================================================

/// Which request kinds an endpoint may serve
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestAffinity {
    /// Conversational requests only
    #[serde(alias = "conversational")]
    Chat,
    /// Completion requests only
    Completion,
    /// Either kind (also used when the setting is absent)
    #[default]
    #[serde(alias = "any")]
    Both,
}

impl RequestAffinity {
    /// Whether a request of `kind` may use an endpoint with this affinity
    #[must_use]
    pub fn allows(&self, kind: RequestKind) -> bool {
        match self {
            Self::Both => true,
            Self::Chat => kind == RequestKind::Conversational,
            Self::Completion => kind == RequestKind::Completion,
        }
    }
}

// ============================================================================
// Provider Endpoint
// ============================================================================

/// One configured model endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    /// Unique name; the merge key for configuration updates
    pub name: String,

    /// Wire protocol family
    #[serde(rename = "provider")]
    pub provider_kind: ProviderKind,

    /// Provider-specific model identifier
    pub model: String,

    /// API key (blank for local providers)
    #[serde(default)]
    pub credential: String,

    /// Base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    /// Lower is tried first
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Disabled endpoints are never candidates
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Request kinds this endpoint serves
    #[serde(default, rename = "request_type")]
    pub affinity: RequestAffinity,

    /// Case-insensitive substrings marking an error as quota exhaustion
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quota_signatures: Vec<String>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_enabled() -> bool {
    true
}

impl ProviderEndpoint {
    /// Create an enabled endpoint with default priority and no credential
    pub fn new(
        name: impl Into<String>,
        provider_kind: ProviderKind,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider_kind,
            model: model.into(),
            credential: String::new(),
            endpoint_url: None,
            priority: DEFAULT_PRIORITY,
            enabled: true,
            affinity: RequestAffinity::Both,
            quota_signatures: Vec::new(),
        }
    }

    /// Set the credential
    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    /// Set the priority
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set enablement
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Restrict to a request kind
    #[must_use]
    pub fn with_affinity(mut self, affinity: RequestAffinity) -> Self {
        self.affinity = affinity;
        self
    }

    /// Override the base URL
    #[must_use]
    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Set quota signatures
    #[must_use]
    pub fn with_quota_signatures<I, S>(mut self, signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quota_signatures = signatures.into_iter().map(Into::into).collect();
        self
    }

    /// True when the credential is usable, or the provider needs none
    #[must_use]
    pub fn has_valid_credential(&self) -> bool {
        self.provider_kind.is_local() || !self.credential.trim().is_empty()
    }

    /// Candidate rule: enabled, credentialed (unless local), matching affinity
    #[must_use]
    pub fn is_eligible_for(&self, kind: RequestKind) -> bool {
        self.enabled && self.has_valid_credential() && self.affinity.allows(kind)
    }

    /// Effective base URL, trailing slash removed
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        self.endpoint_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.provider_kind.default_base_url())
            .map(|url| url.trim().trim_end_matches('/').to_string())
    }
}
