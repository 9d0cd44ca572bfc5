use crate::claims::parse_claims;
use crate::prompts;
use crate::traits::{AssistantClient, KnowledgeMode, ModelAccess, Operation};
use async_trait::async_trait;
use precis_common::{Article, PrecisError, Result, Turn};
use precis_http::{Auth, HttpClient, HttpError, RequestOpts};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::{Duration, Instant};

/// Shown when the provider cannot be reached or gives no reason.
pub const GENERIC_TRANSPORT_MESSAGE: &str = "Network error: could not reach the API.";
/// Shown when a response has neither candidates nor a block reason.
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid API response.";

const SAFETY_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];
const TOOL_FINISH_REASONS: &[&str] = &[
    "MALFORMED_FUNCTION_CALL",
    "UNEXPECTED_TOOL_CALL",
    "TOO_MANY_TOOL_CALLS",
];

#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

impl GenerateContentRequest {
    pub fn new(contents: Vec<Turn>, mode: KnowledgeMode) -> Self {
        Self {
            contents,
            tools: mode
                .uses_web_search()
                .then(|| vec![Tool::google_search()]),
        }
    }
}

/// Serializes as `{"google_search": {}}`.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
struct GoogleSearch {}

impl Tool {
    pub fn google_search() -> Self {
        Self {
            google_search: GoogleSearch {},
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateContentResponse {
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
    /// Some proxies return an error object with a 200 status.
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CandidateContent {
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponsePart {
    pub text: Option<String>,
    pub function_call: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiErrorBody {
    pub code: Option<i64>,
    pub message: Option<String>,
    pub status: Option<String>,
}

/// Map a decoded provider payload onto text or a typed failure.
///
/// All "which field might be missing" decisions live here.
pub fn normalize_response(resp: GenerateContentResponse, op: Operation) -> Result<String> {
    if let Some(err) = resp.error {
        let message = err
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| GENERIC_TRANSPORT_MESSAGE.to_string());
        return Err(PrecisError::Transport(message));
    }

    let Some(candidate) = resp.candidates.into_iter().next() else {
        let blocked = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .is_some_and(|r| !r.is_empty());
        return Err(if blocked {
            PrecisError::SafetyBlock
        } else {
            PrecisError::Transport(INVALID_RESPONSE_MESSAGE.to_string())
        });
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    if let Some(text) = parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .find(|t| !t.trim().is_empty())
    {
        return Ok(text.to_string());
    }

    let finish = candidate.finish_reason.as_deref().unwrap_or("");
    if SAFETY_FINISH_REASONS.contains(&finish) {
        return Err(PrecisError::SafetyBlock);
    }
    if op == Operation::Chat
        && (TOOL_FINISH_REASONS.contains(&finish) || parts.iter().any(|p| p.function_call.is_some()))
    {
        return Err(PrecisError::ToolOnlyResponse);
    }

    Err(PrecisError::Parse(format!(
        "no text in response (finish reason: {})",
        if finish.is_empty() { "none" } else { finish }
    )))
}

fn transport_error(err: HttpError) -> PrecisError {
    match err {
        HttpError::Api { message, .. } => PrecisError::Transport(
            message.unwrap_or_else(|| GENERIC_TRANSPORT_MESSAGE.to_string()),
        ),
        HttpError::Decode(..) => PrecisError::Transport(INVALID_RESPONSE_MESSAGE.to_string()),
        HttpError::Url(e) => PrecisError::Configuration(format!("Invalid API endpoint: {e}")),
        HttpError::Network(_) | HttpError::Build(_) => {
            PrecisError::Transport(GENERIC_TRANSPORT_MESSAGE.to_string())
        }
    }
}

/// Google Gemini `generateContent` client.
///
/// Holds no credentials; each call receives a [`ModelAccess`] read from
/// settings so key or model changes apply immediately.
#[derive(Clone)]
pub struct GeminiClient {
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(endpoint: &str, timeout: Duration) -> std::result::Result<Self, HttpError> {
        let http = HttpClient::new(endpoint)?
            .with_timeout(timeout)
            .with_retries(0);
        Ok(Self { http })
    }

    async fn generate(
        &self,
        access: &ModelAccess,
        request: &GenerateContentRequest,
        op: Operation,
    ) -> Result<String> {
        let api_key = access.api_key.trim();
        if api_key.is_empty() {
            return Err(PrecisError::Configuration(
                "Gemini API key is not set.".to_string(),
            ));
        }
        let model = access.model.trim().trim_start_matches("models/");
        let path = format!("models/{model}:generateContent");
        let opts = RequestOpts {
            auth: Some(Auth::Query {
                name: "key",
                value: Cow::Borrowed(api_key),
            }),
            ..RequestOpts::default()
        };

        tracing::info!(
            operation = op.as_str(),
            model,
            turns = request.contents.len(),
            web_search = request.tools.is_some(),
            "gemini.request"
        );
        let started = Instant::now();

        let outcome = match self
            .http
            .post_json::<_, GenerateContentResponse>(&path, request, opts)
            .await
        {
            Ok(resp) => normalize_response(resp, op),
            Err(e) => {
                tracing::warn!(operation = op.as_str(), error = %e, "gemini.transport_error");
                Err(transport_error(e))
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(text) => tracing::info!(
                operation = op.as_str(),
                elapsed_ms,
                chars = text.len(),
                "gemini.response"
            ),
            Err(e) => tracing::warn!(
                operation = op.as_str(),
                elapsed_ms,
                kind = e.title(),
                error = %e,
                "gemini.failed"
            ),
        }
        outcome
    }
}

#[async_trait]
impl AssistantClient for GeminiClient {
    async fn summarize(&self, access: &ModelAccess, article: &Article) -> Result<String> {
        let request = GenerateContentRequest::new(
            vec![Turn::user(prompts::summarize(article))],
            KnowledgeMode::ArticleOnly,
        );
        self.generate(access, &request, Operation::Summarize).await
    }

    async fn chat(
        &self,
        access: &ModelAccess,
        history: &[Turn],
        article: &Article,
        mode: KnowledgeMode,
    ) -> Result<String> {
        let mut contents = Vec::with_capacity(history.len() + 2);
        contents.push(Turn::user(prompts::chat_system_context(article, mode)));
        contents.push(Turn::model(prompts::chat_opening_line(mode)));
        contents.extend(history.iter().cloned());

        let request = GenerateContentRequest::new(contents, mode);
        self.generate(access, &request, Operation::Chat).await
    }

    async fn fact_check(
        &self,
        access: &ModelAccess,
        article: &Article,
        mode: KnowledgeMode,
    ) -> Result<String> {
        let request = GenerateContentRequest::new(
            vec![Turn::user(prompts::fact_check(article, mode))],
            mode,
        );
        self.generate(access, &request, Operation::FactCheck).await
    }

    async fn extract_claims(
        &self,
        access: &ModelAccess,
        article: &Article,
    ) -> Result<Vec<String>> {
        let request = GenerateContentRequest::new(
            vec![Turn::user(prompts::extract_claims(article))],
            KnowledgeMode::ArticleOnly,
        );
        let raw = self
            .generate(access, &request, Operation::ExtractClaims)
            .await?;
        let claims = parse_claims(&raw)?;
        tracing::debug!(count = claims.len(), "gemini.claims_parsed");
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(v).expect("response shape")
    }

    const ALL_OPS: [Operation; 4] = [
        Operation::Summarize,
        Operation::Chat,
        Operation::FactCheck,
        Operation::ExtractClaims,
    ];

    #[test]
    fn first_non_empty_text_part_wins() {
        let resp = decode(json!({
            "candidates": [{
                "content": {"parts": [{"text": "  "}, {"text": "Hello"}, {"text": "later"}]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(normalize_response(resp, Operation::Summarize).unwrap(), "Hello");
    }

    #[test]
    fn safety_finish_reason_blocks_every_operation() {
        for op in ALL_OPS {
            let resp = decode(json!({
                "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
            }));
            assert_eq!(normalize_response(resp, op), Err(PrecisError::SafetyBlock));
        }
    }

    #[test]
    fn candidate_without_content_still_reports_safety() {
        let resp = decode(json!({"candidates": [{"finishReason": "PROHIBITED_CONTENT"}]}));
        assert_eq!(
            normalize_response(resp, Operation::FactCheck),
            Err(PrecisError::SafetyBlock)
        );
    }

    #[test]
    fn prompt_block_without_candidates_is_safety() {
        let resp = decode(json!({"promptFeedback": {"blockReason": "OTHER"}}));
        assert_eq!(
            normalize_response(resp, Operation::Summarize),
            Err(PrecisError::SafetyBlock)
        );
    }

    #[test]
    fn empty_payload_is_invalid_response() {
        let resp = decode(json!({}));
        assert_eq!(
            normalize_response(resp, Operation::Chat),
            Err(PrecisError::Transport(INVALID_RESPONSE_MESSAGE.into()))
        );
    }

    #[test]
    fn function_call_without_text_is_tool_only_for_chat() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"functionCall": {"name": "google_search", "args": {}}}]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            normalize_response(decode(body.clone()), Operation::Chat),
            Err(PrecisError::ToolOnlyResponse)
        );
        assert!(matches!(
            normalize_response(decode(body), Operation::FactCheck),
            Err(PrecisError::Parse(_))
        ));
    }

    #[test]
    fn tool_finish_reason_is_tool_only_for_chat() {
        let resp = decode(json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "MALFORMED_FUNCTION_CALL"}]
        }));
        assert_eq!(
            normalize_response(resp, Operation::Chat),
            Err(PrecisError::ToolOnlyResponse)
        );
    }

    #[test]
    fn stop_without_text_is_parse_error() {
        let resp = decode(json!({"candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]}));
        match normalize_response(resp, Operation::Summarize) {
            Err(PrecisError::Parse(msg)) => assert!(msg.contains("MAX_TOKENS")),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn error_body_in_success_is_transport() {
        let resp = decode(json!({"error": {"code": 400, "message": "Model not found"}}));
        assert_eq!(
            normalize_response(resp, Operation::Summarize),
            Err(PrecisError::Transport("Model not found".into()))
        );
    }

    #[test]
    fn hybrid_requests_enable_google_search() {
        let req = GenerateContentRequest::new(vec![Turn::user("q")], KnowledgeMode::Hybrid);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["tools"], json!([{"google_search": {}}]));

        let strict = GenerateContentRequest::new(vec![Turn::user("q")], KnowledgeMode::ArticleOnly);
        let v = serde_json::to_value(&strict).unwrap();
        assert!(v.get("tools").is_none());
    }
}
