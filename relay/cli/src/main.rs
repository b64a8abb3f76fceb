//! Relay CLI - Command-line surface for the model router
//!
//! Drives the router the way an editor extension would: chat prompts,
//! inline completions, endpoint listing, default seeding and chat history.
//!
//! # Usage
//!
//! ```bash
//! # Ask a question through the fallback chain
//! relay ask "How do I reverse a Vec in place?"
//!
//! # Complete code read from stdin
//! printf 'fn fib(n: u64) -> u64 {\n' | relay complete --language rust
//!
//! # Show candidates for completion requests
//! relay models --kind completion
//!
//! # Workspace-scoped settings, stop on non-quota failures
//! relay --workspace . --quota-only ask "hi"
//!
//! # Verbose logging
//! RELAY_LOG_LEVEL=debug relay ask "hi"
//! ```
//!
//! # Signals
//!
//! - `SIGINT`: Cancel the in-progress request

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use relay_core::config::default_global_settings_path;
use relay_core::{
    CancellationFlag, ChatHistory, ChatTurn, CompletionContext, CompletionService,
    ConfigOverrides, FallbackPolicy, HttpClientFactory, ModelRegistry, RequestKind,
    RequestRouter, RouteOutcome, RouterError, SeedOutcome, SettingsStore, TomlSettingsStore,
};

/// Relay - Route prompts across model providers with quota-aware fallback
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Global settings file (defaults to ~/.config/relay/settings.toml)
    #[arg(short = 'c', long, env = "RELAY_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Workspace root whose .relay/settings.toml overrides global settings
    #[arg(short = 'w', long, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Folder root whose .relay/settings.toml overrides workspace settings
    #[arg(short = 'f', long, value_name = "DIR")]
    folder: Option<PathBuf>,

    /// Per-attempt provider timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Stop on the first non-quota failure instead of trying the next endpoint
    #[arg(long)]
    quota_only: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "RELAY_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a chat prompt
    Ask {
        /// Prompt text (joined with spaces)
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,

        /// Do not record the exchange in chat history
        #[arg(long)]
        no_history: bool,
    },

    /// Suggest a completion for code before the cursor
    Complete {
        /// Text before the cursor (read from stdin when absent)
        #[arg(long, value_name = "TEXT")]
        before: Option<String>,

        /// Editor language id
        #[arg(long)]
        language: Option<String>,
    },

    /// List configured endpoints
    Models {
        /// Only show candidates for this request kind, in routing order
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Write the built-in endpoints into settings if missing
    Seed,

    /// Show chat history
    History {
        /// Delete all history
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Chat,
    Completion,
}

impl From<KindArg> for RequestKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Chat => RequestKind::Conversational,
            KindArg::Completion => RequestKind::Completion,
        }
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("relay={level},relay_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn build_store(args: &Args) -> TomlSettingsStore {
    let global = args.config.clone().or_else(default_global_settings_path);
    let mut store = TomlSettingsStore::new(global);
    if let Some(workspace) = &args.workspace {
        store = store.with_workspace(workspace);
    }
    if let Some(folder) = &args.folder {
        store = store.with_folder(folder);
    }
    store
}

fn build_overrides(args: &Args) -> ConfigOverrides {
    let mut overrides = ConfigOverrides::new();
    if let Some(ms) = args.timeout_ms {
        overrides = overrides.with_request_timeout_ms(ms);
    }
    if args.quota_only {
        overrides = overrides.with_fallback_policy(FallbackPolicy::QuotaOnly);
    }
    overrides
}

fn open_history() -> Result<ChatHistory> {
    let path = ChatHistory::default_path().context("Cannot determine data directory for history")?;
    ChatHistory::open(&path).with_context(|| format!("Failed to open history at {}", path.display()))
}

/// Run a route, cancelling it on Ctrl-C
async fn route_until_interrupted<F>(
    cancel: &CancellationFlag,
    route: F,
) -> Result<RouteOutcome, RouterError>
where
    F: std::future::Future<Output = Result<RouteOutcome, RouterError>>,
{
    tokio::select! {
        result = route => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            info!("Interrupted, request cancelled");
            Err(RouterError::Cancelled)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let store = Arc::new(build_store(&args));
    debug!(scopes = ?store.available_scopes(), "Settings scopes");
    let registry = Arc::new(ModelRegistry::with_overrides(
        store,
        build_overrides(&args),
        true,
    ));

    if !matches!(args.command, Command::Seed) {
        registry.ensure_defaults_seeded();
    }

    let factory =
        Arc::new(HttpClientFactory::new().context("Failed to initialise HTTP client")?);
    let router = Arc::new(RequestRouter::from_registry(registry.clone(), factory));
    let cancel = CancellationFlag::new();

    match args.command {
        Command::Ask { prompt, no_history } => {
            let prompt = prompt.join(" ");
            let outcome = route_until_interrupted(
                &cancel,
                router.route_with_cancel(&prompt, RequestKind::Conversational, &cancel),
            )
            .await?;

            println!("{}", outcome.text);
            eprintln!("-- {}", outcome.endpoint_used);

            if !no_history {
                let mut history = open_history()?;
                history.append(ChatTurn::user(prompt))?;
                history.append(ChatTurn::assistant(outcome.text, outcome.endpoint_used))?;
            }
        }

        Command::Complete { before, language } => {
            let before = match before {
                Some(text) => text,
                None => {
                    let mut text = String::new();
                    std::io::stdin()
                        .read_to_string(&mut text)
                        .context("Failed to read code from stdin")?;
                    text
                }
            };

            let mut context = CompletionContext::new(before);
            if let Some(language) = language {
                context = context.with_language(language);
            }

            let service = CompletionService::new(registry, router);
            let suggestion = tokio::select! {
                result = service.suggest_with_cancel(&context, &cancel) => result?,
                _ = tokio::signal::ctrl_c() => {
                    cancel.cancel();
                    return Err(RouterError::Cancelled.into());
                }
            };

            match suggestion {
                Some(suggestion) => {
                    print!("{}", suggestion.text);
                    eprintln!("\n-- {}", suggestion.endpoint_used);
                }
                None => eprintln!("No suggestion"),
            }
        }

        Command::Models { kind } => {
            let endpoints = match kind {
                Some(kind) => registry.candidates(kind.into()),
                None => registry.all_endpoints(),
            };

            if endpoints.is_empty() {
                println!("No endpoints");
            }
            for endpoint in endpoints {
                let status = if !endpoint.enabled {
                    "disabled"
                } else if !endpoint.has_valid_credential() {
                    "no key"
                } else {
                    "ready"
                };
                println!(
                    "{:>4}  {:<24} {:<10} {:<28} {:?}  {}",
                    endpoint.priority,
                    endpoint.name,
                    endpoint.provider_kind,
                    endpoint.model,
                    endpoint.affinity,
                    status
                );
            }
        }

        Command::History { clear } => {
            let mut history = open_history()?;
            if clear {
                history.clear()?;
                println!("History cleared");
            } else {
                for turn in history.turns() {
                    let who = match (&turn.role, &turn.endpoint) {
                        (_, Some(endpoint)) => endpoint.clone(),
                        (role, None) => format!("{role:?}").to_lowercase(),
                    };
                    println!(
                        "[{}] {who}: {}",
                        turn.timestamp.format("%Y-%m-%d %H:%M"),
                        turn.content
                    );
                }
            }
        }

        Command::Seed => match registry.ensure_defaults_seeded() {
            SeedOutcome::Seeded { scope, count } => {
                println!("Wrote {count} default endpoints to {scope} settings");
            }
            SeedOutcome::Merged { scope, added } => {
                println!("Added {added} missing default endpoints to {scope} settings");
            }
            SeedOutcome::Unchanged => println!("All default endpoints already configured"),
            SeedOutcome::Failed => anyhow::bail!("Failed to seed default endpoints (see log)"),
        },
    }

    Ok(())
}
