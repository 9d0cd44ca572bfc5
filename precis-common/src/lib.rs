//! Common types and utilities shared across Precis crates.
//!
//! This crate defines the content model handed between the orchestrator, the
//! extractors and the remote API client, the error taxonomy every boundary
//! converts into UI messages, and observability helpers. It is intentionally
//! lightweight so that all crates can depend on it.
//!
//! # Overview
//!
//! - [`Article`]: Normalized `{title, content, url}` record produced by an extractor
//! - [`Turn`] / [`ConversationHistory`]: Role-tagged chat turns resent on every call
//! - [`TabRef`], [`TabId`], [`WindowId`]: Browser handles the orchestrator works with
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`PrecisError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use precis_common::{Role, Turn};
//!
//! let turn = Turn::user("What is the main argument?");
//! assert_eq!(turn.role, Role::User);
//! assert_eq!(turn.text(), "What is the main argument?");
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Readable content extracted from a page, video transcript or PDF.
///
/// Produced once per extraction cycle and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub url: String,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            url: url.into(),
        }
    }
}

/// Author of a conversation turn, as the provider names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One message of a conversation: `{role, parts: [{text}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::with_role(Role::Model, text)
    }

    fn with_role(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part { text: text.into() }],
        }
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Append-only history owned by the UI surface and resent on every chat call.
pub type ConversationHistory = Vec<Turn>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// The browser tab that triggered an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRef {
    pub id: TabId,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub window_id: Option<WindowId>,
}

/// Error types used across the Precis system.
///
/// Every variant is caught at the boundary where it occurs and converted into
/// a titled message for the UI surface; see [`PrecisError::title`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PrecisError {
    /// A required setting (usually the API key) is missing or invalid.
    #[error("{0}")]
    Configuration(String),

    /// Script injection failed. `tab_closed` failures are benign.
    #[error("{message}")]
    Injection { tab_closed: bool, message: String },

    /// An extractor could not produce readable content.
    #[error("{message}")]
    Extraction { title: String, message: String },

    /// Chat, fact-check or claims were requested with no current article.
    #[error("{0}")]
    ContextMissing(String),

    /// Network failure or non-success response from the provider.
    #[error("{0}")]
    Transport(String),

    /// The provider declined to answer on content-safety grounds.
    #[error("The response was blocked by the provider's safety filters.")]
    SafetyBlock,

    /// The provider invoked a tool but produced no text.
    #[error("The model used a tool but returned no text. Please try rephrasing your question.")]
    ToolOnlyResponse,

    /// Claims output could not be parsed as a JSON array of strings.
    #[error("The model returned claims in an unexpected format: {0}")]
    MalformedResponse(String),

    /// A success response without any usable text.
    #[error("Could not read the model response: {0}")]
    Parse(String),

    /// Persisted settings could not be read or written.
    #[error("Settings storage failed: {0}")]
    Storage(String),
}

impl PrecisError {
    /// Title shown above the message in the UI.
    pub fn title(&self) -> &str {
        match self {
            PrecisError::Configuration(_) => "Configuration Error",
            PrecisError::Injection { .. } => "Injection Failed",
            PrecisError::Extraction { title, .. } => title,
            PrecisError::ContextMissing(_) => "Content Not Found",
            PrecisError::Transport(_) => "API Error",
            PrecisError::SafetyBlock => "Content Blocked",
            PrecisError::ToolOnlyResponse => "No Answer",
            PrecisError::MalformedResponse(_) => "Unexpected Response",
            PrecisError::Parse(_) => "API Error",
            PrecisError::Storage(_) => "Storage Error",
        }
    }

    /// Failures that are logged but never surfaced to the user.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            PrecisError::Injection {
                tab_closed: true,
                ..
            }
        )
    }
}

/// Convenient alias for results that use [`PrecisError`].
pub type Result<T> = std::result::Result<T, PrecisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_serializes_in_provider_shape() {
        let turn = Turn::model("Okay.");
        let v = serde_json::to_value(&turn).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"role": "model", "parts": [{"text": "Okay."}]})
        );
    }

    #[test]
    fn tab_ref_reads_camel_case() {
        let tab: TabRef = serde_json::from_str(
            r#"{"id": 7, "url": "https://example.com", "windowId": 3}"#,
        )
        .unwrap();
        assert_eq!(tab.id, TabId(7));
        assert_eq!(tab.window_id, Some(WindowId(3)));
        assert!(tab.title.is_none());
    }

    #[test]
    fn only_closed_tab_injection_is_benign() {
        let closed = PrecisError::Injection {
            tab_closed: true,
            message: "No tab with id: 4".into(),
        };
        let denied = PrecisError::Injection {
            tab_closed: false,
            message: "Cannot access a chrome:// URL".into(),
        };
        assert!(closed.is_benign());
        assert!(!denied.is_benign());
        assert!(!PrecisError::SafetyBlock.is_benign());
    }

    #[test]
    fn extraction_title_comes_from_extractor() {
        let err = PrecisError::Extraction {
            title: "Transcript Failed".into(),
            message: "no captions".into(),
        };
        assert_eq!(err.title(), "Transcript Failed");
        assert_eq!(err.to_string(), "no captions");
    }
}
