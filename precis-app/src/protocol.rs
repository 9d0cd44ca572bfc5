//! JSON messages exchanged with the browser shim.
//!
//! Inbound frames are browser events, extractor reports, UI requests and
//! replies to our own commands, all tagged by `action`. Outbound frames are
//! host commands (carrying an `id`) and answers to UI queries.
use precis_actors::settings::SettingsPatch;
use precis_actors::UiMessage;
use precis_common::{Article, ConversationHistory, PrecisError, TabId, TabRef, WindowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context menu entry that starts a summary.
pub const SUMMARIZE_MENU_ID: &str = "summarize-article";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Inbound {
    ActionClicked {
        tab: TabRef,
    },
    ContextMenuClicked {
        menu_item_id: String,
        tab: TabRef,
    },
    WindowRemoved {
        window_id: WindowId,
    },
    /// The UI surface went away for good.
    SessionEnded,
    /// An extractor finished, or the user confirmed a selection.
    Summarize {
        article: Article,
    },
    /// An extractor gave up.
    DisplayError {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    ChatWithPage {
        history: ConversationHistory,
        #[serde(default)]
        internet_access: bool,
    },
    FactCheckArticle,
    ExtractClaims,
    GetSettings {
        id: u64,
    },
    UpdateSettings {
        id: u64,
        patch: SettingsPatch,
    },
    GetCurrentArticle {
        id: u64,
    },
    PrepareDeepSearch {
        id: u64,
    },
    Reply {
        reply_to: u64,
        ok: bool,
        #[serde(default)]
        value: Option<Value>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
}

/// What a frame that failed to parse as [`Inbound`] still owes the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// A query the UI is waiting on; answer `id` with an error response.
    Query { id: u64 },
    Chat,
    FactCheck,
    Claims,
    /// Nobody is waiting for an answer.
    Unanswerable,
}

impl Rejected {
    pub fn classify(frame: &[u8]) -> Self {
        let Ok(value) = serde_json::from_slice::<Value>(frame) else {
            return Rejected::Unanswerable;
        };
        let id = value.get("id").and_then(Value::as_u64);
        match (value.get("action").and_then(Value::as_str), id) {
            (
                Some("getSettings" | "updateSettings" | "getCurrentArticle" | "prepareDeepSearch"),
                Some(id),
            ) => Rejected::Query { id },
            (Some("chatWithPage"), _) => Rejected::Chat,
            (Some("factCheckArticle"), _) => Rejected::FactCheck,
            (Some("extractClaims"), _) => Rejected::Claims,
            _ => Rejected::Unanswerable,
        }
    }
}

/// The shim's answer to one [`HostCommand`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub ok: bool,
    pub value: Option<Value>,
    pub error: Option<String>,
    pub code: Option<String>,
}

impl CommandReply {
    /// Shorthand for the reason a command failed.
    pub fn failure(&self) -> String {
        match (&self.code, &self.error) {
            (Some(code), Some(error)) => format!("{code}: {error}"),
            (None, Some(error)) => error.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "command failed".to_string(),
        }
    }
}

/// Work the host asks the browser shim to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "action",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum HostCommand {
    FindSurface,
    OpenSurface { tab: TabRef },
    FocusSurface { window_id: WindowId },
    Inject { tab_id: TabId, files: Vec<String> },
    ReadSelection { tab_id: TabId },
    Deliver { message: UiMessage },
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::FindSurface => "findSurface",
            HostCommand::OpenSurface { .. } => "openSurface",
            HostCommand::FocusSurface { .. } => "focusSurface",
            HostCommand::Inject { .. } => "inject",
            HostCommand::ReadSelection { .. } => "readSelection",
            HostCommand::Deliver { .. } => "deliver",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommandEnvelope<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub command: &'a HostCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub title: String,
    pub message: String,
}

/// Answer to a UI query, matched by `replyTo`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    action: &'static str,
    pub reply_to: u64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl QueryResponse {
    pub fn ok(reply_to: u64, value: Value) -> Self {
        Self {
            action: "response",
            reply_to,
            ok: true,
            value: Some(value),
            error: None,
        }
    }

    pub fn err(reply_to: u64, err: &PrecisError) -> Self {
        Self {
            action: "response",
            reply_to,
            ok: false,
            value: None,
            error: Some(ErrorBody {
                title: err.title().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use precis_common::Role;
    use serde_json::json;

    #[test]
    fn parses_browser_events() {
        let msg: Inbound = serde_json::from_value(json!({
            "action": "contextMenuClicked",
            "menuItemId": "summarize-article",
            "tab": {"id": 4, "url": "https://x.com/a", "windowId": 2}
        }))
        .unwrap();
        assert_eq!(
            msg,
            Inbound::ContextMenuClicked {
                menu_item_id: SUMMARIZE_MENU_ID.into(),
                tab: TabRef {
                    id: TabId(4),
                    url: "https://x.com/a".into(),
                    title: None,
                    window_id: Some(WindowId(2)),
                },
            }
        );

        let msg: Inbound =
            serde_json::from_value(json!({"action": "windowRemoved", "windowId": 9})).unwrap();
        assert_eq!(msg, Inbound::WindowRemoved { window_id: WindowId(9) });
    }

    #[test]
    fn parses_chat_with_history() {
        let msg: Inbound = serde_json::from_value(json!({
            "action": "chatWithPage",
            "history": [
                {"role": "user", "parts": [{"text": "why?"}]},
                {"role": "model", "parts": [{"text": "because"}]},
                {"role": "user", "parts": [{"text": "sure?"}]}
            ],
            "internetAccess": true
        }))
        .unwrap();
        let Inbound::ChatWithPage {
            history,
            internet_access,
        } = msg
        else {
            panic!("wrong variant");
        };
        assert!(internet_access);
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role, Role::Model);
    }

    #[test]
    fn internet_access_defaults_off() {
        let msg: Inbound =
            serde_json::from_value(json!({"action": "chatWithPage", "history": []})).unwrap();
        assert_eq!(
            msg,
            Inbound::ChatWithPage {
                history: vec![],
                internet_access: false
            }
        );
    }

    #[test]
    fn parses_extractor_failure_without_text() {
        let msg: Inbound = serde_json::from_value(json!({"action": "displayError"})).unwrap();
        assert_eq!(
            msg,
            Inbound::DisplayError {
                title: None,
                message: None
            }
        );
    }

    #[test]
    fn parses_replies() {
        let msg: Inbound = serde_json::from_value(json!({
            "action": "reply", "replyTo": 12, "ok": false,
            "error": "No tab with id: 3.", "code": "tabClosed"
        }))
        .unwrap();
        let Inbound::Reply {
            reply_to,
            ok,
            value,
            error,
            code,
        } = msg
        else {
            panic!("wrong variant");
        };
        assert_eq!(reply_to, 12);
        let reply = CommandReply {
            ok,
            value,
            error,
            code,
        };
        assert!(!reply.ok);
        assert_eq!(reply.value, None);
        assert_eq!(reply.failure(), "tabClosed: No tab with id: 3.");
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_value::<Inbound>(json!({"action": "selfDestruct"})).is_err());
    }

    #[test]
    fn rejected_frames_are_classified_by_action() {
        let classify = |v: Value| Rejected::classify(&serde_json::to_vec(&v).unwrap());
        assert_eq!(
            classify(json!({"action": "updateSettings", "id": 5, "patch": {"textSizeIndex": 300}})),
            Rejected::Query { id: 5 }
        );
        assert_eq!(
            classify(json!({"action": "getSettings", "id": "five"})),
            Rejected::Unanswerable
        );
        assert_eq!(
            classify(json!({"action": "chatWithPage", "history": [{"role": "system"}]})),
            Rejected::Chat
        );
        assert_eq!(classify(json!({"action": "factCheckArticle"})), Rejected::FactCheck);
        assert_eq!(classify(json!({"action": "extractClaims"})), Rejected::Claims);
        assert_eq!(classify(json!({"action": "selfDestruct", "id": 1})), Rejected::Unanswerable);
        assert_eq!(Rejected::classify(b"{not json"), Rejected::Unanswerable);
    }

    #[test]
    fn commands_carry_id_and_action() {
        let cmd = HostCommand::Inject {
            tab_id: TabId(3),
            files: vec!["content.js".into()],
        };
        let v = serde_json::to_value(CommandEnvelope {
            id: 7,
            command: &cmd,
        })
        .unwrap();
        assert_eq!(
            v,
            json!({"id": 7, "action": "inject", "tabId": 3, "files": ["content.js"]})
        );
        assert_eq!(v["action"], cmd.name());

        let v = serde_json::to_value(CommandEnvelope {
            id: 8,
            command: &HostCommand::Deliver {
                message: UiMessage::ShowLoading,
            },
        })
        .unwrap();
        assert_eq!(
            v,
            json!({"id": 8, "action": "deliver", "message": {"action": "showLoading"}})
        );
    }

    #[test]
    fn query_responses() {
        let v = serde_json::to_value(QueryResponse::ok(3, json!({"a": 1}))).unwrap();
        assert_eq!(
            v,
            json!({"action": "response", "replyTo": 3, "ok": true, "value": {"a": 1}})
        );

        let err = PrecisError::ContextMissing("Article content/URL not found.".into());
        let v = serde_json::to_value(QueryResponse::err(4, &err)).unwrap();
        assert_eq!(
            v,
            json!({
                "action": "response", "replyTo": 4, "ok": false,
                "error": {"title": "Content Not Found", "message": "Article content/URL not found."}
            })
        );
    }
}
