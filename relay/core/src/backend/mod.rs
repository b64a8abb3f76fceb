//! Provider Backends
//!
//! Wire clients for each provider family behind the [`ProviderClient`] trait.
//!
//! # Available Clients
//!
//! - **ChatCompletionsClient**: OpenAI, Ollama (`/v1`), custom compatible servers
//! - **OpenRouterClient**: chat-completions plus attribution headers
//! - **GeminiClient**: native `generateContent`
//!
//! # Usage
//!
//! ```ignore
//! use relay_core::backend::{ClientFactory, HttpClientFactory};
//!
//! let factory = HttpClientFactory::new()?;
//! let client = factory.create(&endpoint)?;
//! let text = client.send("Hello!", RequestKind::Conversational).await?;
//! ```

mod chat;
mod factory;
mod gemini;
mod openrouter;
mod traits;

pub use chat::{build_chat_body, parse_chat_response, ChatCompletionsClient};
pub use factory::{ClientFactory, HttpClientFactory, DEFAULT_CONNECT_TIMEOUT};
pub use gemini::{build_gemini_body, parse_gemini_response, GeminiClient};
pub use openrouter::{OpenRouterClient, DEFAULT_REFERER, DEFAULT_TITLE};
pub use traits::{
    non_empty_or_placeholder, ProviderClient, ProviderError, ProviderRequest,
    COMPLETION_MAX_TOKENS, COMPLETION_SYSTEM_PROMPT, COMPLETION_TEMPERATURE,
    NO_RESPONSE_PLACEHOLDER,
};
