//! Remote assistant integration for Precis.
//!
//! This crate exposes the [`traits::AssistantClient`] interface the
//! orchestrator calls, the Gemini implementation in [`gemini`], the prompt
//! builders and the tolerant claims parser.
//!
//! # Examples
//! ```no_run
//! use precis_common::{Article, Result};
//! use precis_llm::gemini::GeminiClient;
//! use precis_llm::traits::{AssistantClient, ModelAccess};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let client = GeminiClient::new(precis_llm::DEFAULT_GEMINI_ENDPOINT, Duration::from_secs(60))
//!     .expect("valid endpoint");
//! let access = ModelAccess::new("my-key", "gemini-flash-lite-latest");
//! let article = Article::new("Title", "Body text", "https://example.com");
//! let summary = client.summarize(&access, &article).await?;
//! assert!(!summary.is_empty());
//! # Ok(())
//! # }
//! ```
pub mod claims;
pub mod gemini;
pub mod prompts;
pub mod traits;

pub use gemini::GeminiClient;
pub use traits::{AssistantClient, KnowledgeMode, ModelAccess, Operation};

pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
