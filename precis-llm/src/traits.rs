use async_trait::async_trait;
use precis_common::{Article, Result, Turn};

/// Credentials and model for a single call, read fresh from settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAccess {
    pub api_key: String,
    pub model: String,
}

impl ModelAccess {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

/// How far the model may look beyond the article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KnowledgeMode {
    /// Answers come from the article text only.
    #[default]
    ArticleOnly,
    /// Article first, with server-side web search enabled.
    Hybrid,
}

impl KnowledgeMode {
    /// Maps the UI's `useGeneralKnowledge` / `internetAccess` flag.
    pub fn from_flag(use_general_knowledge: bool) -> Self {
        if use_general_knowledge {
            KnowledgeMode::Hybrid
        } else {
            KnowledgeMode::ArticleOnly
        }
    }

    pub fn uses_web_search(&self) -> bool {
        matches!(self, KnowledgeMode::Hybrid)
    }
}

/// The four calls the orchestrator makes, used to pick normalization rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Summarize,
    Chat,
    FactCheck,
    ExtractClaims,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Summarize => "summarize",
            Operation::Chat => "chat",
            Operation::FactCheck => "fact_check",
            Operation::ExtractClaims => "extract_claims",
        }
    }
}

/// Remote assistant used by the orchestrator.
///
/// Every method is a single request with no retries; failures come back as
/// typed [`precis_common::PrecisError`] values for the caller to relay.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn summarize(&self, access: &ModelAccess, article: &Article) -> Result<String>;

    /// `history` is the full conversation owned by the UI surface.
    async fn chat(
        &self,
        access: &ModelAccess,
        history: &[Turn],
        article: &Article,
        mode: KnowledgeMode,
    ) -> Result<String>;

    async fn fact_check(
        &self,
        access: &ModelAccess,
        article: &Article,
        mode: KnowledgeMode,
    ) -> Result<String>;

    /// Checkable claims found in the article; an empty list is a valid answer.
    async fn extract_claims(&self, access: &ModelAccess, article: &Article)
        -> Result<Vec<String>>;
}
