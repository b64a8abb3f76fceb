//! Settings Stores
//!
//! Backing storage for scoped settings. The registry only sees the
//! [`SettingsStore`] trait, so the host (CLI, editor binding, tests) decides
//! where each scope lives.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{
    default_global_settings_path, load_layer_from_path, save_layer_to_path, scope_settings_path,
    ConfigError, ConfigScope, ScopedSettings, SettingsLayer,
};
use crate::registry::ProviderEndpoint;

/// Per-scope settings storage
pub trait SettingsStore: Send + Sync {
    /// Read every available scope
    ///
    /// # Errors
    ///
    /// Returns an error if any present layer cannot be read or parsed.
    fn inspect(&self) -> Result<ScopedSettings, ConfigError>;

    /// Scopes that have a backing location, most global first
    fn available_scopes(&self) -> Vec<ConfigScope>;

    /// Replace the model list at `scope`, leaving other sections untouched
    ///
    /// # Errors
    ///
    /// Returns an error if the scope is unavailable or the write fails.
    fn write_models(
        &self,
        scope: ConfigScope,
        models: &[ProviderEndpoint],
    ) -> Result<(), ConfigError>;

    /// Most global scope that can be written to
    fn most_global_scope(&self) -> Option<ConfigScope> {
        self.available_scopes().into_iter().min()
    }
}

// ============================================================================
// TOML File Store
// ============================================================================

/// Settings stored as one TOML file per scope
#[derive(Clone, Debug, Default)]
pub struct TomlSettingsStore {
    global: Option<PathBuf>,
    workspace: Option<PathBuf>,
    folder: Option<PathBuf>,
}

impl TomlSettingsStore {
    /// Store with an explicit global settings file and no other scopes
    #[must_use]
    pub fn new(global: Option<PathBuf>) -> Self {
        Self {
            global,
            workspace: None,
            folder: None,
        }
    }

    /// Store rooted at the XDG config directory
    #[must_use]
    pub fn from_default_locations() -> Self {
        Self::new(default_global_settings_path())
    }

    /// Add a workspace scope rooted at `root`
    #[must_use]
    pub fn with_workspace(mut self, root: &Path) -> Self {
        self.workspace = Some(scope_settings_path(root));
        self
    }

    /// Add a folder scope rooted at `root`
    #[must_use]
    pub fn with_folder(mut self, root: &Path) -> Self {
        self.folder = Some(scope_settings_path(root));
        self
    }

    /// File backing a scope
    #[must_use]
    pub fn path_for(&self, scope: ConfigScope) -> Option<&Path> {
        match scope {
            ConfigScope::Global => self.global.as_deref(),
            ConfigScope::Workspace => self.workspace.as_deref(),
            ConfigScope::Folder => self.folder.as_deref(),
        }
    }

    fn load(&self, scope: ConfigScope) -> Result<Option<SettingsLayer>, ConfigError> {
        match self.path_for(scope) {
            Some(path) => load_layer_from_path(path),
            None => Ok(None),
        }
    }
}

impl SettingsStore for TomlSettingsStore {
    fn inspect(&self) -> Result<ScopedSettings, ConfigError> {
        Ok(ScopedSettings {
            global: self.load(ConfigScope::Global)?,
            workspace: self.load(ConfigScope::Workspace)?,
            folder: self.load(ConfigScope::Folder)?,
        })
    }

    fn available_scopes(&self) -> Vec<ConfigScope> {
        ConfigScope::ALL
            .into_iter()
            .filter(|scope| self.path_for(*scope).is_some())
            .collect()
    }

    fn write_models(
        &self,
        scope: ConfigScope,
        models: &[ProviderEndpoint],
    ) -> Result<(), ConfigError> {
        let path = self
            .path_for(scope)
            .ok_or(ConfigError::ScopeUnavailable(scope))?;

        let mut layer = load_layer_from_path(path)?.unwrap_or_default();
        layer.models = Some(models.to_vec());
        save_layer_to_path(path, &layer)
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Settings held in memory, for embedding hosts that own persistence
#[derive(Debug)]
pub struct InMemorySettingsStore {
    settings: Mutex<ScopedSettings>,
    scopes: Vec<ConfigScope>,
}

impl InMemorySettingsStore {
    /// Empty store exposing all three scopes
    #[must_use]
    pub fn new() -> Self {
        Self::with_scopes(ScopedSettings::default(), ConfigScope::ALL.to_vec())
    }

    /// Store with initial layers and a restricted set of writable scopes
    #[must_use]
    pub fn with_scopes(settings: ScopedSettings, mut scopes: Vec<ConfigScope>) -> Self {
        scopes.sort();
        scopes.dedup();
        Self {
            settings: Mutex::new(settings),
            scopes,
        }
    }

    /// Store whose global scope holds `models`
    #[must_use]
    pub fn with_global_models(models: Vec<ProviderEndpoint>) -> Self {
        let settings = ScopedSettings {
            global: Some(SettingsLayer::with_models(models)),
            ..Default::default()
        };
        Self::with_scopes(settings, ConfigScope::ALL.to_vec())
    }

    /// Replace a whole layer, as an external settings edit would
    pub fn set_layer(&self, scope: ConfigScope, layer: Option<SettingsLayer>) {
        *self.settings.lock().layer_mut(scope) = layer;
    }
}

impl Default for InMemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn inspect(&self) -> Result<ScopedSettings, ConfigError> {
        Ok(self.settings.lock().clone())
    }

    fn available_scopes(&self) -> Vec<ConfigScope> {
        self.scopes.clone()
    }

    fn write_models(
        &self,
        scope: ConfigScope,
        models: &[ProviderEndpoint],
    ) -> Result<(), ConfigError> {
        if !self.scopes.contains(&scope) {
            return Err(ConfigError::ScopeUnavailable(scope));
        }

        let mut settings = self.settings.lock();
        settings
            .layer_mut(scope)
            .get_or_insert_with(SettingsLayer::default)
            .models = Some(models.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProviderKind;
    use tempfile::TempDir;

    #[test]
    fn test_toml_store_scopes() {
        let dir = TempDir::new().unwrap();
        let store = TomlSettingsStore::new(None).with_workspace(dir.path());

        assert_eq!(store.available_scopes(), vec![ConfigScope::Workspace]);
        assert_eq!(store.most_global_scope(), Some(ConfigScope::Workspace));
        assert!(matches!(
            store.write_models(ConfigScope::Global, &[]),
            Err(ConfigError::ScopeUnavailable(ConfigScope::Global))
        ));
    }

    #[test]
    fn test_toml_store_write_preserves_other_sections() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("settings.toml");
        std::fs::write(&global, "[completion]\nmax_suggestion_chars = 42\n").unwrap();

        let store = TomlSettingsStore::new(Some(global));
        let models = vec![ProviderEndpoint::new("local", ProviderKind::Ollama, "llama3")];
        store.write_models(ConfigScope::Global, &models).unwrap();

        let scoped = store.inspect().unwrap();
        let layer = scoped.global.unwrap();
        assert_eq!(layer.completion.max_suggestion_chars, Some(42));
        assert_eq!(layer.models, Some(models));
        assert!(scoped.workspace.is_none());
    }

    #[test]
    fn test_memory_store_restricted_scopes() {
        let store = InMemorySettingsStore::with_scopes(
            ScopedSettings::default(),
            vec![ConfigScope::Folder, ConfigScope::Workspace],
        );

        assert_eq!(store.most_global_scope(), Some(ConfigScope::Workspace));
        assert!(store.write_models(ConfigScope::Global, &[]).is_err());

        store.write_models(ConfigScope::Folder, &[]).unwrap();
        assert_eq!(
            store.inspect().unwrap().models_scope(),
            Some(ConfigScope::Folder)
        );
    }
}
