//! Relay Core - Multi-Provider Model Routing
//!
//! This crate decides which configured language-model endpoint serves a chat
//! or code-completion request, and falls back across endpoints when one is
//! out of quota or failing. It has no UI dependencies; an editor extension,
//! the `relay` CLI, or a test harness drives it through the same API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 Hosts (CLI, editor binding)                   │
//! │      chat sidebar ──┐                 ┌── inline completion   │
//! └─────────────────────┼─────────────────┼───────────────────────┘
//!                       │ route(prompt,   │ CompletionService
//!                       │       kind)     │   ::suggest
//! ┌─────────────────────┼─────────────────┼───────────────────────┐
//! │                     v   RELAY CORE    v                       │
//! │  ┌──────────────────────────────────────────────────────────┐ │
//! │  │ RequestRouter: candidates -> attempt -> classify -> next │ │
//! │  └──────┬───────────────────────────────────────┬───────────┘ │
//! │         │                                       │             │
//! │  ┌──────┴───────┐   ┌───────────────┐   ┌───────┴──────────┐  │
//! │  │ModelRegistry │<--│ SettingsStore │   │ ProviderClient   │  │
//! │  │ (candidates) │   │ (scoped TOML) │   │ OpenAI/OpenRouter│  │
//! │  └──────────────┘   └───────────────┘   │ Gemini/Ollama    │  │
//! │                                         └──────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use relay_core::{
//!     HttpClientFactory, ModelRegistry, RequestKind, RequestRouter, TomlSettingsStore,
//! };
//!
//! let store = Arc::new(TomlSettingsStore::from_default_locations());
//! let registry = Arc::new(ModelRegistry::new(store));
//! registry.ensure_defaults_seeded();
//!
//! let factory = Arc::new(HttpClientFactory::new()?);
//! let router = RequestRouter::from_registry(registry, factory);
//!
//! let outcome = router.route("Explain lifetimes", RequestKind::Conversational).await?;
//! println!("[{}] {}", outcome.endpoint_used, outcome.text);
//! ```
//!
//! # Module Overview
//!
//! - [`registry`]: Endpoint model, candidate resolution, default seeding
//! - [`routing`]: Fallback loop, quota classification, cancellation
//! - [`backend`]: Provider wire clients and the client factory
//! - [`config`]: Scoped settings, merge, environment and CLI overrides
//! - [`history`]: Persistent chat log
//! - [`completion`]: Inline suggestion post-processing

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod completion;
pub mod config;
pub mod history;
pub mod registry;
pub mod routing;

// Registry exports
pub use registry::{
    builtin_endpoints, ModelRegistry, ProviderEndpoint, ProviderKind, RequestAffinity,
    RequestKind, SeedOutcome,
};

// Routing exports
pub use routing::{
    AttemptFailure, CancellationFlag, FailureClassification, FallbackPolicy, RequestRouter,
    RouteOutcome, RouterConfig, RouterError,
};

// Backend exports
pub use backend::{ClientFactory, HttpClientFactory, ProviderClient, ProviderError};

// Config exports
pub use config::{
    ConfigError, ConfigOverrides, ConfigScope, ConfigSource, EffectiveSettings,
    InMemorySettingsStore, SettingsStore, TomlSettingsStore,
};

pub use completion::{CompletionContext, CompletionService, Suggestion};
pub use history::{ChatHistory, ChatRole, ChatTurn, HistoryError};
