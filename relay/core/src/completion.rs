//! Inline Completion
//!
//! Turns router output into an inline suggestion: the model often echoes the
//! code it was given, wraps its answer in a markdown fence, or runs long.
//!
//! ```text
//! route(before_cursor, Completion)
//!     -> strip_code_fences
//!     -> strip_duplicate_prefix
//!     -> truncate_chars(max_suggestion_chars)
//!     -> None if empty
//! ```

use std::sync::Arc;

use crate::backend::NO_RESPONSE_PLACEHOLDER;
use crate::registry::{ModelRegistry, RequestKind};
use crate::routing::{CancellationFlag, RequestRouter, RouterError};

/// Text around the cursor
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompletionContext {
    /// Document text before the cursor
    pub before_cursor: String,
    /// Editor language id, if known
    pub language: Option<String>,
}

impl CompletionContext {
    /// Context with only the text before the cursor
    pub fn new(before_cursor: impl Into<String>) -> Self {
        Self {
            before_cursor: before_cursor.into(),
            language: None,
        }
    }

    /// Set the language id
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    fn prompt(&self) -> String {
        match &self.language {
            Some(language) => format!("Language: {language}\n\n{}", self.before_cursor),
            None => self.before_cursor.clone(),
        }
    }
}

/// A processed suggestion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suggestion {
    /// Text to insert at the cursor
    pub text: String,
    /// Endpoint that produced it
    pub endpoint_used: String,
}

/// Remove the longest prefix of `suggestion` that repeats the end of
/// `before_cursor`
#[must_use]
pub fn strip_duplicate_prefix<'a>(suggestion: &'a str, before_cursor: &str) -> &'a str {
    let boundaries = suggestion
        .char_indices()
        .map(|(i, _)| i)
        .skip(1)
        .chain(std::iter::once(suggestion.len()))
        .filter(|&i| i <= before_cursor.len());

    let mut overlap = 0;
    for end in boundaries {
        if before_cursor.ends_with(&suggestion[..end]) {
            overlap = end;
        }
    }
    &suggestion[overlap..]
}

/// Cut `text` to at most `max` characters
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices()
        .nth(max)
        .map_or(text, |(index, _)| &text[..index])
}

/// Unwrap a reply fenced as ```lang ... ```
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (language tag) line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim_end_matches('\n'),
        None => body,
    }
}

/// Routes completion requests and post-processes the reply
pub struct CompletionService {
    registry: Arc<ModelRegistry>,
    router: Arc<RequestRouter>,
}

impl CompletionService {
    /// Create a service over a shared registry and router
    pub fn new(registry: Arc<ModelRegistry>, router: Arc<RequestRouter>) -> Self {
        Self { registry, router }
    }

    /// Suggest text to insert at the cursor.
    ///
    /// Returns `Ok(None)` when completion is disabled or nothing useful came
    /// back.
    ///
    /// # Errors
    ///
    /// Propagates routing failures.
    pub async fn suggest(
        &self,
        context: &CompletionContext,
    ) -> Result<Option<Suggestion>, RouterError> {
        self.suggest_with_cancel(context, &CancellationFlag::new())
            .await
    }

    /// [`suggest`](Self::suggest) with a cancellation flag
    ///
    /// # Errors
    ///
    /// Propagates routing failures.
    pub async fn suggest_with_cancel(
        &self,
        context: &CompletionContext,
        cancel: &CancellationFlag,
    ) -> Result<Option<Suggestion>, RouterError> {
        let settings = self.registry.settings();
        if !settings.completion_enabled {
            tracing::debug!("Completion disabled, skipping");
            return Ok(None);
        }
        if context.before_cursor.trim().is_empty() {
            return Ok(None);
        }

        let outcome = self
            .router
            .route_with_cancel(&context.prompt(), RequestKind::Completion, cancel)
            .await?;

        if outcome.text == NO_RESPONSE_PLACEHOLDER {
            return Ok(None);
        }

        let text = strip_code_fences(&outcome.text);
        let text = strip_duplicate_prefix(text, &context.before_cursor);
        let text = truncate_chars(text, settings.max_suggestion_chars);

        if text.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(Suggestion {
            text: text.to_string(),
            endpoint_used: outcome.endpoint_used,
        }))
    }
}
