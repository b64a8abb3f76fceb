//! Scoped Settings
//!
//! Settings live in up to three TOML files, one per scope:
//!
//! - Global: `$XDG_CONFIG_HOME/relay/settings.toml` (typically `~/.config/relay/settings.toml`)
//! - Workspace: `<workspace>/.relay/settings.toml`
//! - Folder: `<folder>/.relay/settings.toml`
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. Folder scope, then workspace scope, then global scope
//! 4. Default values
//!
//! Scope merging is a pure function ([`merge_layers`]): the most specific
//! scope that sets a field wins. The model list is replaced wholesale, never
//! concatenated across scopes.
//!
//! # Example Configuration
//!
//! ```toml
//! [completion]
//! enabled = true
//! max_suggestion_chars = 400
//!
//! [routing]
//! request_timeout_ms = 20000
//! fallback_policy = "advance_on_any_failure"
//!
//! [[models]]
//! name = "openrouter-qwen-coder"
//! provider = "openrouter"
//! model = "qwen/qwen3-coder:free"
//! credential = "sk-or-..."
//! priority = 1
//! quota_signatures = ["free-models-per-day"]
//! ```

mod store;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ProviderEndpoint;
use crate::routing::FallbackPolicy;

pub use store::{InMemorySettingsStore, SettingsStore, TomlSettingsStore};

/// Default inline suggestion cap in characters
pub const DEFAULT_MAX_SUGGESTION_CHARS: usize = 500;

/// Default per-attempt provider timeout
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading or writing settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a settings file
    #[error("Failed to read settings file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to write a settings file
    #[error("Failed to write settings file at {path}: {source}")]
    WriteError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML settings: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("Failed to serialize TOML settings: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// The requested scope has no backing location
    #[error("Settings scope {0} is not available")]
    ScopeUnavailable(ConfigScope),
}

// =============================================================================
// Scopes and Sources
// =============================================================================

/// A configuration layer, ordered from most global to most specific
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    /// Per-user settings
    Global,
    /// Settings of the open workspace
    Workspace,
    /// Settings of one folder inside the workspace
    Folder,
}

impl ConfigScope {
    /// All scopes, most global first
    pub const ALL: [ConfigScope; 3] = [Self::Global, Self::Workspace, Self::Folder];
}

impl std::fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Workspace => write!(f, "workspace"),
            Self::Folder => write!(f, "folder"),
        }
    }
}

/// Tracks where the effective configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from a settings file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "settings file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Layer Structures
// =============================================================================

/// Completion section of a settings layer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionToml {
    /// Whether inline completion is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Maximum suggestion length in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_suggestion_chars: Option<usize>,
}

/// Routing section of a settings layer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingToml {
    /// Per-attempt provider timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// Whether non-quota failures advance to the next endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_policy: Option<FallbackPolicy>,
}

/// One scope's settings file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsLayer {
    /// Completion configuration section
    pub completion: CompletionToml,

    /// Routing configuration section
    pub routing: RoutingToml,

    /// Endpoint list; `None` means this scope does not set it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<ProviderEndpoint>>,
}

impl SettingsLayer {
    /// Layer that only sets the model list
    #[must_use]
    pub fn with_models(models: Vec<ProviderEndpoint>) -> Self {
        Self {
            models: Some(models),
            ..Default::default()
        }
    }
}

/// Per-scope view of the settings, before merging
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopedSettings {
    /// Global layer, if present
    pub global: Option<SettingsLayer>,
    /// Workspace layer, if present
    pub workspace: Option<SettingsLayer>,
    /// Folder layer, if present
    pub folder: Option<SettingsLayer>,
}

impl ScopedSettings {
    /// Layer for a scope
    #[must_use]
    pub fn layer(&self, scope: ConfigScope) -> Option<&SettingsLayer> {
        match scope {
            ConfigScope::Global => self.global.as_ref(),
            ConfigScope::Workspace => self.workspace.as_ref(),
            ConfigScope::Folder => self.folder.as_ref(),
        }
    }

    /// Mutable slot for a scope
    pub fn layer_mut(&mut self, scope: ConfigScope) -> &mut Option<SettingsLayer> {
        match scope {
            ConfigScope::Global => &mut self.global,
            ConfigScope::Workspace => &mut self.workspace,
            ConfigScope::Folder => &mut self.folder,
        }
    }

    /// Models set at exactly this scope
    #[must_use]
    pub fn models_at(&self, scope: ConfigScope) -> Option<&Vec<ProviderEndpoint>> {
        self.layer(scope).and_then(|l| l.models.as_ref())
    }

    /// Most specific scope that sets the model list (the one that wins the merge)
    #[must_use]
    pub fn models_scope(&self) -> Option<ConfigScope> {
        ConfigScope::ALL
            .into_iter()
            .rev()
            .find(|scope| self.models_at(*scope).is_some())
    }

    /// Merge all scopes into the effective settings
    #[must_use]
    pub fn effective(&self) -> EffectiveSettings {
        merge_layers(
            self.global.as_ref(),
            self.workspace.as_ref(),
            self.folder.as_ref(),
        )
    }
}

// =============================================================================
// Effective Settings
// =============================================================================

/// Settings after scope merging and overrides
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectiveSettings {
    /// Effective endpoint list
    pub models: Vec<ProviderEndpoint>,

    /// Whether inline completion is enabled
    pub completion_enabled: bool,

    /// Maximum suggestion length in characters
    pub max_suggestion_chars: usize,

    /// Per-attempt provider timeout
    pub request_timeout: Duration,

    /// Fallback behaviour on non-quota failures
    pub fallback_policy: FallbackPolicy,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            completion_enabled: true,
            max_suggestion_chars: DEFAULT_MAX_SUGGESTION_CHARS,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            fallback_policy: FallbackPolicy::default(),
            source: ConfigSource::Default,
        }
    }
}

impl EffectiveSettings {
    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }
}

/// Merge scope layers, most specific wins field by field.
///
/// Pure: no I/O and no environment lookups.
#[must_use]
pub fn merge_layers(
    global: Option<&SettingsLayer>,
    workspace: Option<&SettingsLayer>,
    folder: Option<&SettingsLayer>,
) -> EffectiveSettings {
    let mut settings = EffectiveSettings::default();

    for layer in [global, workspace, folder].into_iter().flatten() {
        settings.source = ConfigSource::File;

        if let Some(models) = &layer.models {
            settings.models.clone_from(models);
        }
        if let Some(enabled) = layer.completion.enabled {
            settings.completion_enabled = enabled;
        }
        if let Some(max) = layer.completion.max_suggestion_chars {
            settings.max_suggestion_chars = max;
        }
        if let Some(ms) = layer.routing.request_timeout_ms {
            settings.request_timeout = Duration::from_millis(ms);
        }
        if let Some(policy) = layer.routing.fallback_policy {
            settings.fallback_policy = policy;
        }
    }

    settings
}

// =============================================================================
// Paths and File I/O
// =============================================================================

/// Default global settings path
///
/// Returns `$XDG_CONFIG_HOME/relay/settings.toml` or
/// `~/.config/relay/settings.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_global_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("relay").join("settings.toml"))
}

/// Settings path for a workspace or folder root
#[must_use]
pub fn scope_settings_path(root: &Path) -> PathBuf {
    root.join(".relay").join("settings.toml")
}

/// Load one layer. A missing file is `Ok(None)`, not an error.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_layer_from_path(path: &Path) -> Result<Option<SettingsLayer>, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Settings file not found");
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let layer: SettingsLayer = toml::from_str(&content)?;

    tracing::debug!(path = %path.display(), "Loaded settings layer");
    Ok(Some(layer))
}

/// Write one layer, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_layer_to_path(path: &Path, layer: &SettingsLayer) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(layer)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    tracing::info!(path = %path.display(), "Wrote settings layer");
    Ok(())
}

// =============================================================================
// Environment Overrides
// =============================================================================

/// Apply `RELAY_*` environment overrides from the process environment
pub fn apply_env_overrides(settings: &mut EffectiveSettings) {
    apply_env_with(settings, |key| std::env::var(key).ok());
}

/// Apply environment overrides using a custom variable lookup
pub fn apply_env_with<F>(settings: &mut EffectiveSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(timeout) = lookup("RELAY_REQUEST_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            settings.request_timeout = Duration::from_millis(ms);
            settings.source = ConfigSource::Env;
        }
    }
    if let Some(enabled) = lookup("RELAY_COMPLETION_ENABLED") {
        settings.completion_enabled = enabled != "0" && enabled.to_lowercase() != "false";
        settings.source = ConfigSource::Env;
    }
    if let Some(policy) = lookup("RELAY_FALLBACK_POLICY") {
        match policy.parse::<FallbackPolicy>() {
            Ok(policy) => {
                settings.fallback_policy = policy;
                settings.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring RELAY_FALLBACK_POLICY"),
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to effective settings
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Per-attempt timeout override (milliseconds)
    pub request_timeout_ms: Option<u64>,

    /// Fallback policy override
    pub fallback_policy: Option<FallbackPolicy>,

    /// Completion enablement override
    pub completion_enabled: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout override
    #[must_use]
    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = Some(ms);
        self
    }

    /// Set fallback policy override
    #[must_use]
    pub fn with_fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback_policy = Some(policy);
        self
    }

    /// Set completion enablement override
    #[must_use]
    pub fn with_completion_enabled(mut self, enabled: bool) -> Self {
        self.completion_enabled = Some(enabled);
        self
    }

    /// Apply overrides to effective settings
    pub fn apply(&self, settings: &mut EffectiveSettings) {
        if self.request_timeout_ms.is_some()
            || self.fallback_policy.is_some()
            || self.completion_enabled.is_some()
        {
            settings.source = ConfigSource::Cli;
        }

        if let Some(ms) = self.request_timeout_ms {
            settings.request_timeout = Duration::from_millis(ms);
        }
        if let Some(policy) = self.fallback_policy {
            settings.fallback_policy = policy;
        }
        if let Some(enabled) = self.completion_enabled {
            settings.completion_enabled = enabled;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
