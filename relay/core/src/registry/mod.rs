//! Model Registry
//!
//! Holds the configured endpoint list and answers "which endpoints may serve
//! a request of kind K, and in what order?".
//!
//! # Candidate Resolution
//!
//! ```text
//! all_endpoints()
//!       |
//!       v
//! filter: enabled && credential (local exempt) && affinity matches
//!       |
//!       v
//! stable sort by priority (ascending, ties keep configured order)
//!       |
//!       v
//! candidates(kind)
//! ```
//!
//! The registry never propagates configuration failures: a store that cannot
//! be read yields an empty snapshot and a logged warning.

mod defaults;
mod endpoint;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{
    apply_env_overrides, ConfigOverrides, ConfigScope, EffectiveSettings, SettingsStore,
};

pub use defaults::{builtin_endpoints, merge_missing_defaults};
pub use endpoint::{
    ProviderEndpoint, ProviderKind, RequestAffinity, RequestKind, DEFAULT_PRIORITY,
};

/// Result of [`ModelRegistry::ensure_defaults_seeded`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedOutcome {
    /// No scope had endpoints; the defaults were written to `scope`
    Seeded {
        /// Scope that received the defaults
        scope: ConfigScope,
        /// Number of endpoints written
        count: usize,
    },
    /// Missing defaults were appended to the list at `scope`
    Merged {
        /// Scope whose list was extended
        scope: ConfigScope,
        /// Number of defaults appended
        added: usize,
    },
    /// Every default was already present
    Unchanged,
    /// The store could not be read or written (already logged)
    Failed,
}

struct Snapshot {
    endpoints: Vec<ProviderEndpoint>,
    settings: EffectiveSettings,
}

/// Authoritative endpoint list backed by a [`SettingsStore`]
pub struct ModelRegistry {
    store: Arc<dyn SettingsStore>,
    overrides: ConfigOverrides,
    read_env: bool,
    snapshot: RwLock<Snapshot>,
}

impl ModelRegistry {
    /// Load the registry from `store` with no environment or CLI overrides
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self::with_overrides(store, ConfigOverrides::new(), false)
    }

    /// Load the registry, applying `RELAY_*` variables (when `read_env`) and
    /// then `overrides` on every refresh
    pub fn with_overrides(
        store: Arc<dyn SettingsStore>,
        overrides: ConfigOverrides,
        read_env: bool,
    ) -> Self {
        let registry = Self {
            store,
            overrides,
            read_env,
            snapshot: RwLock::new(Snapshot {
                endpoints: Vec::new(),
                settings: EffectiveSettings::default(),
            }),
        };
        registry.refresh();
        registry
    }

    /// Re-read the store and replace the snapshot wholesale
    pub fn refresh(&self) {
        let mut settings = match self.store.inspect() {
            Ok(scoped) => scoped.effective(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read model settings, no endpoints available");
                EffectiveSettings::default()
            }
        };

        if self.read_env {
            apply_env_overrides(&mut settings);
        }
        self.overrides.apply(&mut settings);

        let endpoints = dedupe_by_name(std::mem::take(&mut settings.models));
        tracing::debug!(
            endpoints = endpoints.len(),
            source = %settings.source(),
            "Model registry refreshed"
        );

        let mut snapshot = self.snapshot.write();
        snapshot.endpoints = endpoints;
        snapshot.settings = settings;
    }

    /// Replace the endpoint list from an external configuration update.
    ///
    /// The list is written to the scope that currently wins the merge (or the
    /// most global scope when none defines one), so a later refresh or seed
    /// sees the same endpoints. A failed write is logged and the in-memory
    /// list is still replaced.
    pub fn apply_update(&self, endpoints: Vec<ProviderEndpoint>) {
        let endpoints = dedupe_by_name(endpoints);

        let target = match self.store.inspect() {
            Ok(scoped) => scoped
                .models_scope()
                .or_else(|| self.store.most_global_scope()),
            Err(e) => {
                tracing::warn!(error = %e, "Settings unreadable, endpoint update kept in memory only");
                None
            }
        };
        if let Some(scope) = target {
            if let Err(e) = self.store.write_models(scope, &endpoints) {
                tracing::warn!(%scope, error = %e, "Failed to persist endpoint update");
            }
        }

        tracing::info!(endpoints = endpoints.len(), ?target, "Applied endpoint update");
        self.snapshot.write().endpoints = endpoints;
    }

    /// Every configured endpoint, including disabled ones
    #[must_use]
    pub fn all_endpoints(&self) -> Vec<ProviderEndpoint> {
        self.snapshot.read().endpoints.clone()
    }

    /// Eligible endpoints for `kind`, lowest priority value first.
    ///
    /// Equal priorities keep their configured order.
    #[must_use]
    pub fn candidates(&self, kind: RequestKind) -> Vec<ProviderEndpoint> {
        let mut candidates: Vec<ProviderEndpoint> = self
            .snapshot
            .read()
            .endpoints
            .iter()
            .filter(|e| e.is_eligible_for(kind))
            .cloned()
            .collect();

        candidates.sort_by_key(|e| e.priority);
        candidates
    }

    /// Effective non-endpoint settings (completion flag, timeouts, policy)
    #[must_use]
    pub fn settings(&self) -> EffectiveSettings {
        let snapshot = self.snapshot.read();
        let mut settings = snapshot.settings.clone();
        settings.models.clone_from(&snapshot.endpoints);
        settings
    }

    /// Whether inline completion is enabled
    #[must_use]
    pub fn completion_enabled(&self) -> bool {
        self.snapshot.read().settings.completion_enabled
    }

    /// Seed or top up the built-in endpoints.
    ///
    /// With no endpoint list at any scope, the defaults are written to the
    /// most global available scope. Otherwise defaults missing by name are
    /// appended to the list at the scope that currently wins the merge. User
    /// entries are never modified. Running this twice changes nothing the
    /// second time.
    pub fn ensure_defaults_seeded(&self) -> SeedOutcome {
        let outcome = self.seed_with(&builtin_endpoints());
        if matches!(outcome, SeedOutcome::Seeded { .. } | SeedOutcome::Merged { .. }) {
            self.refresh();
        }
        outcome
    }

    fn seed_with(&self, defaults: &[ProviderEndpoint]) -> SeedOutcome {
        let scoped = match self.store.inspect() {
            Ok(scoped) => scoped,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot seed default endpoints, settings unreadable");
                return SeedOutcome::Failed;
            }
        };

        let Some(scope) = scoped.models_scope() else {
            let Some(scope) = self.store.most_global_scope() else {
                tracing::warn!("Cannot seed default endpoints, no writable settings scope");
                return SeedOutcome::Failed;
            };
            return match self.store.write_models(scope, defaults) {
                Ok(()) => {
                    tracing::info!(%scope, count = defaults.len(), "Seeded default endpoints");
                    SeedOutcome::Seeded {
                        scope,
                        count: defaults.len(),
                    }
                }
                Err(e) => {
                    tracing::warn!(%scope, error = %e, "Failed to seed default endpoints");
                    SeedOutcome::Failed
                }
            };
        };

        let existing = scoped.models_at(scope).map(Vec::as_slice).unwrap_or_default();
        let (merged, added) = merge_missing_defaults(existing, defaults);
        if added == 0 {
            return SeedOutcome::Unchanged;
        }

        match self.store.write_models(scope, &merged) {
            Ok(()) => {
                tracing::info!(%scope, added, "Merged missing default endpoints");
                SeedOutcome::Merged { scope, added }
            }
            Err(e) => {
                tracing::warn!(%scope, error = %e, "Failed to merge default endpoints");
                SeedOutcome::Failed
            }
        }
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.read();
        f.debug_struct("ModelRegistry")
            .field("endpoints", &snapshot.endpoints.len())
            .field("read_env", &self.read_env)
            .finish()
    }
}

/// Keep the first endpoint for each name
fn dedupe_by_name(endpoints: Vec<ProviderEndpoint>) -> Vec<ProviderEndpoint> {
    let mut seen = HashSet::new();
    endpoints
        .into_iter()
        .filter(|e| {
            let fresh = seen.insert(e.name.clone());
            if !fresh {
                tracing::warn!(name = %e.name, "Duplicate endpoint name, keeping first");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InMemorySettingsStore, ScopedSettings, SettingsLayer};
    use pretty_assertions::assert_eq;

    fn registry_with(models: Vec<ProviderEndpoint>) -> ModelRegistry {
        ModelRegistry::new(Arc::new(InMemorySettingsStore::with_global_models(models)))
    }

    fn names(endpoints: &[ProviderEndpoint]) -> Vec<&str> {
        endpoints.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_candidates_sorted_and_filtered() {
        let registry = registry_with(vec![
            ProviderEndpoint::new("late", ProviderKind::OpenAi, "m")
                .with_credential("k")
                .with_priority(9),
            ProviderEndpoint::new("disabled", ProviderKind::OpenAi, "m")
                .with_credential("k")
                .with_priority(0)
                .with_enabled(false),
            ProviderEndpoint::new("no-key", ProviderKind::Gemini, "m").with_priority(1),
            ProviderEndpoint::new("local", ProviderKind::Ollama, "m").with_priority(5),
            ProviderEndpoint::new("completion-only", ProviderKind::OpenRouter, "m")
                .with_credential("k")
                .with_priority(2)
                .with_affinity(RequestAffinity::Completion),
            ProviderEndpoint::new("early", ProviderKind::OpenAi, "m")
                .with_credential("k")
                .with_priority(3),
        ]);

        assert_eq!(
            names(&registry.candidates(RequestKind::Conversational)),
            vec!["early", "local", "late"]
        );
        assert_eq!(
            names(&registry.candidates(RequestKind::Completion)),
            vec!["completion-only", "early", "local", "late"]
        );
        assert_eq!(registry.all_endpoints().len(), 6);
    }

    #[test]
    fn test_equal_priorities_keep_configured_order() {
        let registry = registry_with(
            ["c", "a", "b"]
                .into_iter()
                .map(|n| ProviderEndpoint::new(n, ProviderKind::Ollama, "m").with_priority(1))
                .collect(),
        );

        assert_eq!(
            names(&registry.candidates(RequestKind::Conversational)),
            vec!["c", "a", "b"]
        );
    }

    #[test]
    fn test_single_disabled_endpoint_yields_no_candidates() {
        let registry = registry_with(vec![ProviderEndpoint::new("A", ProviderKind::OpenAi, "m")
            .with_credential("k")
            .with_priority(5)
            .with_enabled(false)]);

        assert!(registry.candidates(RequestKind::Conversational).is_empty());
        assert_eq!(registry.all_endpoints().len(), 1);
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let registry = registry_with(vec![
            ProviderEndpoint::new("dup", ProviderKind::Ollama, "first"),
            ProviderEndpoint::new("dup", ProviderKind::Ollama, "second"),
        ]);

        let all = registry.all_endpoints();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].model, "first");
    }

    #[test]
    fn test_apply_update_replaces_wholesale() {
        let registry = registry_with(vec![ProviderEndpoint::new(
            "old",
            ProviderKind::Ollama,
            "m",
        )]);

        registry.apply_update(vec![ProviderEndpoint::new("new", ProviderKind::Ollama, "m")]);
        assert_eq!(names(&registry.all_endpoints()), vec!["new"]);

        registry.refresh();
        assert_eq!(names(&registry.all_endpoints()), vec!["new"]);
    }

    #[test]
    fn test_apply_update_survives_later_seeding() {
        let store = Arc::new(InMemorySettingsStore::new());
        let registry = ModelRegistry::new(store.clone());

        registry.apply_update(vec![ProviderEndpoint::new("mine", ProviderKind::Ollama, "m")]);
        assert_eq!(
            store.inspect().unwrap().models_scope(),
            Some(ConfigScope::Global)
        );

        assert_eq!(
            registry.ensure_defaults_seeded(),
            SeedOutcome::Merged {
                scope: ConfigScope::Global,
                added: builtin_endpoints().len(),
            }
        );

        let all = registry.all_endpoints();
        assert_eq!(all.len(), builtin_endpoints().len() + 1);
        assert_eq!(all[0].name, "mine");
    }

    #[test]
    fn test_apply_update_writes_to_effective_scope() {
        let store = Arc::new(InMemorySettingsStore::new());
        store.set_layer(
            ConfigScope::Workspace,
            Some(SettingsLayer::with_models(vec![ProviderEndpoint::new(
                "old",
                ProviderKind::Ollama,
                "m",
            )])),
        );
        let registry = ModelRegistry::new(store.clone());

        registry.apply_update(vec![ProviderEndpoint::new("new", ProviderKind::Ollama, "m")]);

        let scoped = store.inspect().unwrap();
        assert!(scoped.global.is_none());
        assert_eq!(
            names(scoped.models_at(ConfigScope::Workspace).unwrap()),
            vec!["new"]
        );
    }

    #[test]
    fn test_seed_into_most_global_scope() {
        let store = Arc::new(InMemorySettingsStore::new());
        let registry = ModelRegistry::new(store.clone());
        assert!(registry.all_endpoints().is_empty());

        let outcome = registry.ensure_defaults_seeded();
        assert_eq!(
            outcome,
            SeedOutcome::Seeded {
                scope: ConfigScope::Global,
                count: builtin_endpoints().len(),
            }
        );
        assert_eq!(registry.all_endpoints(), builtin_endpoints());
        assert_eq!(
            store.inspect().unwrap().models_scope(),
            Some(ConfigScope::Global)
        );
    }

    #[test]
    fn test_seed_without_global_scope_uses_workspace() {
        let store = Arc::new(InMemorySettingsStore::with_scopes(
            ScopedSettings::default(),
            vec![ConfigScope::Workspace, ConfigScope::Folder],
        ));
        let registry = ModelRegistry::new(store);

        assert!(matches!(
            registry.ensure_defaults_seeded(),
            SeedOutcome::Seeded {
                scope: ConfigScope::Workspace,
                ..
            }
        ));
    }

    #[test]
    fn test_seed_merges_into_effective_scope() {
        let user = ProviderEndpoint::new("openrouter-qwen-coder", ProviderKind::OpenRouter, "x")
            .with_credential("user-key");
        let store = Arc::new(InMemorySettingsStore::new());
        store.set_layer(
            ConfigScope::Workspace,
            Some(SettingsLayer::with_models(vec![user.clone()])),
        );
        let registry = ModelRegistry::new(store.clone());

        let outcome = registry.ensure_defaults_seeded();
        assert_eq!(
            outcome,
            SeedOutcome::Merged {
                scope: ConfigScope::Workspace,
                added: builtin_endpoints().len() - 1,
            }
        );

        let all = registry.all_endpoints();
        assert_eq!(all[0], user);
        assert!(store.inspect().unwrap().global.is_none());
    }

    #[test]
    fn test_seed_idempotent() {
        let store = Arc::new(InMemorySettingsStore::new());
        let registry = ModelRegistry::new(store.clone());

        registry.ensure_defaults_seeded();
        let once = store.inspect().unwrap();
        let after_once = registry.all_endpoints();

        assert_eq!(registry.ensure_defaults_seeded(), SeedOutcome::Unchanged);
        assert_eq!(store.inspect().unwrap(), once);
        assert_eq!(registry.all_endpoints(), after_once);
    }

    #[test]
    fn test_unreadable_store_degrades_to_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[[models]\nbroken").unwrap();

        let store = Arc::new(crate::config::TomlSettingsStore::new(Some(path)));
        let registry = ModelRegistry::new(store);

        assert!(registry.all_endpoints().is_empty());
        assert!(registry.candidates(RequestKind::Completion).is_empty());
        assert_eq!(registry.ensure_defaults_seeded(), SeedOutcome::Failed);
    }

    #[test]
    fn test_overrides_applied_on_refresh() {
        let store = Arc::new(InMemorySettingsStore::new());
        let registry = ModelRegistry::with_overrides(
            store,
            ConfigOverrides::new().with_completion_enabled(false),
            false,
        );
        assert!(!registry.completion_enabled());
    }
}
