//! Chat History
//!
//! A single global conversation log persisted as JSON. The router returns
//! `(text, endpoint_used)`; the host appends both turns here.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Turns kept before the oldest are dropped
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Errors reading or writing the history file
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Failed to read the history file
    #[error("Failed to read history file {path}: {source}")]
    ReadError {
        /// Path that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the history file
    #[error("Failed to write history file {path}: {source}")]
    WriteError {
        /// Path that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// History file is not valid JSON
    #[error("Failed to parse history: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Who produced a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person at the keyboard
    User,
    /// A model response
    Assistant,
    /// Host-injected notice (errors, status)
    System,
}

/// One entry in the conversation log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Author
    pub role: ChatRole,
    /// Text
    pub content: String,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
    /// Endpoint that produced an assistant turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ChatTurn {
    /// A user turn stamped now
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content, None)
    }

    /// An assistant turn stamped now
    pub fn assistant(content: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content, Some(endpoint.into()))
    }

    /// A system turn stamped now
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content, None)
    }

    fn new(role: ChatRole, content: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            endpoint,
        }
    }
}

/// Persistent, capped conversation log
#[derive(Debug)]
pub struct ChatHistory {
    path: PathBuf,
    limit: usize,
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    /// `$XDG_DATA_HOME/relay/history.json`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("relay").join("history.json"))
    }

    /// Load the history at `path`; a missing file is an empty history
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        let turns = if path.exists() {
            let content =
                std::fs::read_to_string(&path).map_err(|source| HistoryError::ReadError {
                    path: path.clone(),
                    source,
                })?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), turns = turns.len(), "Loaded chat history");
        Ok(Self {
            path,
            limit: DEFAULT_HISTORY_LIMIT,
            turns,
        })
    }

    /// Set the turn cap (minimum 1); excess turns are dropped on next append
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Append a turn, drop the oldest beyond the cap, and persist
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn append(&mut self, turn: ChatTurn) -> Result<(), HistoryError> {
        self.turns.push(turn);
        if self.turns.len() > self.limit {
            let excess = self.turns.len() - self.limit;
            self.turns.drain(..excess);
        }
        self.save()
    }

    /// Remove every turn and persist
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.turns.clear();
        tracing::info!(path = %self.path.display(), "Cleared chat history");
        self.save()
    }

    fn save(&self) -> Result<(), HistoryError> {
        let write_err = |source| HistoryError::WriteError {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(&self.turns)?;
        std::fs::write(&self.path, content).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let history = ChatHistory::open(dir.path().join("history.json")).unwrap();
        assert!(history.turns().is_empty());
    }

    #[test]
    fn test_append_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("history.json");

        let mut history = ChatHistory::open(&path).unwrap();
        history.append(ChatTurn::user("hi")).unwrap();
        history
            .append(ChatTurn::assistant("hello", "openrouter-qwen-coder"))
            .unwrap();

        let reloaded = ChatHistory::open(&path).unwrap();
        assert_eq!(reloaded.turns(), history.turns());
        assert_eq!(
            reloaded.turns()[1].endpoint.as_deref(),
            Some("openrouter-qwen-coder")
        );
        assert_eq!(reloaded.turns()[0].role, ChatRole::User);
    }

    #[test]
    fn test_cap_drops_oldest() {
        let dir = TempDir::new().unwrap();
        let mut history = ChatHistory::open(dir.path().join("h.json"))
            .unwrap()
            .with_limit(3);

        for i in 0..5 {
            history.append(ChatTurn::user(format!("m{i}"))).unwrap();
        }

        let contents: Vec<_> = history.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("h.json");
        let mut history = ChatHistory::open(&path).unwrap();
        history.append(ChatTurn::system("note")).unwrap();
        history.clear().unwrap();

        assert!(ChatHistory::open(&path).unwrap().turns().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("h.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            ChatHistory::open(&path),
            Err(HistoryError::ParseError(_))
        ));
    }
}
