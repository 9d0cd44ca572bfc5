//! Actors and state behind the Precis host.
//!
//! The [`orchestrator::Orchestrator`] owns session state and settings and is
//! the only component that talks to the assistant client; UI messages leave
//! through the [`delivery::Notifier`], browser work goes through
//! [`ports::BrowserPort`].
pub mod actor;
pub mod builder;
pub mod delivery;
pub mod orchestrator;
pub mod ports;
pub mod session;
pub mod settings;
pub mod system;

use precis_common::{Article, ConversationHistory, PrecisError, TabRef, WindowId};
use precis_extract::ExtractorReport;
use serde::{Deserialize, Serialize};
use settings::{Settings, SettingsPatch};
use tokio::sync::oneshot;

/// Messages pushed to whichever UI surface is listening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum UiMessage {
    ShowLoading,
    ApiKeyRequired,
    ShowSelectionPrompt { article: Article },
    DisplaySummary { title: String, summary: String },
    DisplayError { title: String, message: String },
    DisplayChatResponse { message: String },
    DisplayChatError { message: String },
    DisplayFactCheckReport { report: String },
    DisplayFactCheckError { message: String },
    DisplayClaims { claims: Vec<String> },
    DisplayClaimsError { message: String },
}

impl UiMessage {
    pub fn action(&self) -> &'static str {
        match self {
            UiMessage::ShowLoading => "showLoading",
            UiMessage::ApiKeyRequired => "apiKeyRequired",
            UiMessage::ShowSelectionPrompt { .. } => "showSelectionPrompt",
            UiMessage::DisplaySummary { .. } => "displaySummary",
            UiMessage::DisplayError { .. } => "displayError",
            UiMessage::DisplayChatResponse { .. } => "displayChatResponse",
            UiMessage::DisplayChatError { .. } => "displayChatError",
            UiMessage::DisplayFactCheckReport { .. } => "displayFactCheckReport",
            UiMessage::DisplayFactCheckError { .. } => "displayFactCheckError",
            UiMessage::DisplayClaims { .. } => "displayClaims",
            UiMessage::DisplayClaimsError { .. } => "displayClaimsError",
        }
    }

    /// Full-view error with the error's own title.
    pub fn error(err: &PrecisError) -> Self {
        UiMessage::DisplayError {
            title: err.title().to_string(),
            message: err.to_string(),
        }
    }
}

/// What the "deep search" button needs: a prompt to paste and where to paste it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepSearch {
    pub prompt: String,
    pub url: String,
}

/// Result of a detached assistant call.
#[derive(Debug)]
pub enum Outcome {
    Summary {
        title: String,
        result: precis_common::Result<String>,
    },
    Chat(precis_common::Result<String>),
    FactCheck(precis_common::Result<String>),
    Claims(precis_common::Result<Vec<String>>),
}

pub enum OrchestratorMsg {
    /// Toolbar click or context-menu entry on `tab`.
    StartExtraction { tab: TabRef },
    /// An extractor finished, or the user confirmed a selection.
    ExtractorReported(ExtractorReport),
    Chat {
        history: ConversationHistory,
        use_general_knowledge: bool,
    },
    FactCheck,
    ExtractClaims,
    WindowClosed { window: WindowId },
    EndSession,
    GetCurrentArticle {
        reply: oneshot::Sender<Option<Article>>,
    },
    GetSettings {
        reply: oneshot::Sender<precis_common::Result<Settings>>,
    },
    UpdateSettings {
        patch: SettingsPatch,
        reply: oneshot::Sender<precis_common::Result<Settings>>,
    },
    PrepareDeepSearch {
        reply: oneshot::Sender<precis_common::Result<DeepSearch>>,
    },
    /// A detached assistant call issued under `generation` has finished.
    Completed { generation: u64, outcome: Outcome },
}

impl OrchestratorMsg {
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorMsg::StartExtraction { .. } => "start_extraction",
            OrchestratorMsg::ExtractorReported(_) => "extractor_reported",
            OrchestratorMsg::Chat { .. } => "chat",
            OrchestratorMsg::FactCheck => "fact_check",
            OrchestratorMsg::ExtractClaims => "extract_claims",
            OrchestratorMsg::WindowClosed { .. } => "window_closed",
            OrchestratorMsg::EndSession => "end_session",
            OrchestratorMsg::GetCurrentArticle { .. } => "get_current_article",
            OrchestratorMsg::GetSettings { .. } => "get_settings",
            OrchestratorMsg::UpdateSettings { .. } => "update_settings",
            OrchestratorMsg::PrepareDeepSearch { .. } => "prepare_deep_search",
            OrchestratorMsg::Completed { .. } => "completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ui_messages_use_action_tags() {
        let v = serde_json::to_value(UiMessage::ShowLoading).unwrap();
        assert_eq!(v, json!({"action": "showLoading"}));

        let v = serde_json::to_value(UiMessage::DisplayClaims {
            claims: vec!["a".into()],
        })
        .unwrap();
        assert_eq!(v, json!({"action": "displayClaims", "claims": ["a"]}));
    }

    #[test]
    fn action_matches_serialized_tag() {
        let samples = [
            UiMessage::ShowLoading,
            UiMessage::ApiKeyRequired,
            UiMessage::ShowSelectionPrompt {
                article: Article::new("t", "c", "u"),
            },
            UiMessage::DisplaySummary {
                title: "t".into(),
                summary: "s".into(),
            },
            UiMessage::DisplayError {
                title: "t".into(),
                message: "m".into(),
            },
            UiMessage::DisplayChatResponse { message: "m".into() },
            UiMessage::DisplayChatError { message: "m".into() },
            UiMessage::DisplayFactCheckReport { report: "r".into() },
            UiMessage::DisplayFactCheckError { message: "m".into() },
            UiMessage::DisplayClaims { claims: vec![] },
            UiMessage::DisplayClaimsError { message: "m".into() },
        ];
        for msg in samples {
            let v = serde_json::to_value(&msg).unwrap();
            assert_eq!(v["action"], msg.action());
        }
    }
}
