//! Minimal JSON-over-HTTP client with safe logging and optional retries.
//!
//! - Request options: headers, `Auth`, query params, timeout, retries
//! - Secret query params (`key`, `token`, ...) are redacted in every log line
//! - Retries 429/5xx with exponential backoff when a retry budget is given;
//!   the default budget is zero, callers opt in per client or per request
//! - Provider error bodies are mined for a human-readable message
//!
//! Example:
//! ```no_run
//! # async fn demo() -> Result<(), precis_http::HttpError> {
//! let client = precis_http::HttpClient::new("https://api.example.com/v1")?;
//! let got: serde_json::Value = client
//!     .post_json("items", &serde_json::json!({"q": 1}), precis_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

const SECRET_PARAMS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "token",
    "secret",
];

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {}", .message.as_deref().unwrap_or("<no message>"))]
    Api {
        status: StatusCode,
        /// Message found in the provider's error body, if any.
        message: Option<String>,
        request_id: String,
    },
}

impl HttpError {
    /// The provider-supplied message for API errors.
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            HttpError::Api { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Authentication strategies supported by the client.
///
/// ```
/// use precis_http::Auth;
/// use std::borrow::Cow;
///
/// let auth = Auth::Query { name: "key", value: Cow::Borrowed("secret") };
/// assert!(matches!(auth, Auth::Query { name: "key", .. }));
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Custom header, e.g. `x-goog-api-key`.
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    /// Auth via query param, e.g. `?key=...`.
    Query { name: &'a str, value: Cow<'a, str> },
    None,
}

/// Per-request tuning knobs.
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL. Relative paths passed to
    /// the request helpers are resolved below it.
    ///
    /// ```no_run
    /// use precis_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com/v1")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(30));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let mut base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(30),
            max_retries: 0,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// POST a JSON body and decode a JSON response.
    ///
    /// Network failures, 429 and 5xx are retried up to the request's (or
    /// the client's) retry budget; anything else fails on the first answer.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self
            .base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))?;
        let body = serde_json::to_vec(body)
            .map_err(|e| HttpError::Build(format!("body serialization failed: {e}")))?;
        let call = Call {
            id: format!("r{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed)),
            url,
            body,
            timeout: opts.timeout.unwrap_or(self.default_timeout),
            retries: opts.retries.unwrap_or(self.max_retries),
            opts,
        };

        let mut attempt = 0usize;
        let (status, request_id, bytes) = loop {
            let reason = match self.send_once(&call, attempt).await {
                Ok((status, request_id, bytes))
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() =>
                {
                    if attempt >= call.retries {
                        break (status, request_id, bytes);
                    }
                    status.to_string()
                }
                Ok(answer) => break answer,
                Err(message) if attempt < call.retries => message,
                Err(message) => {
                    tracing::warn!(req_id = %call.id, attempts = attempt + 1, %message, "http.network_error");
                    return Err(HttpError::Network(message));
                }
            };
            attempt += 1;
            let delay = backoff(attempt);
            tracing::warn!(
                req_id = %call.id,
                attempt,
                %reason,
                backoff_ms = delay.as_millis() as u64,
                "http.retrying"
            );
            sleep(delay).await;
        };

        let snippet = snip_body(&bytes);
        tracing::trace!(req_id = %call.id, body_snippet = %snippet, "http.response.body");
        if status.is_success() {
            return serde_json::from_slice(&bytes).map_err(|e| {
                tracing::warn!(req_id = %call.id, error = %e, body_snippet = %snippet, "http.decode_error");
                HttpError::Decode(e.to_string(), snippet)
            });
        }

        let message = extract_error_message(&bytes);
        tracing::warn!(
            req_id = %call.id,
            %status,
            message = ?message,
            x_request_id = %request_id,
            "http.error"
        );
        Err(HttpError::Api {
            status,
            message,
            request_id,
        })
    }

    /// One round trip. `Err` carries a transport failure message.
    async fn send_once(
        &self,
        call: &Call<'_>,
        attempt: usize,
    ) -> Result<(StatusCode, String, Vec<u8>), String> {
        let mut query: Vec<(&str, &str)> = call
            .opts
            .query
            .iter()
            .flatten()
            .map(|(k, v)| (*k, v.as_ref()))
            .collect();
        let mut rb = self
            .inner
            .post(call.url.clone())
            .timeout(call.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(call.body.clone());
        if let Some(headers) = &call.opts.headers {
            rb = rb.headers(headers.clone());
        }
        let auth_kind = match &call.opts.auth {
            Some(Auth::Header { name, value }) => {
                rb = rb.header(name, value);
                "header"
            }
            Some(Auth::Query { name, value }) => {
                query.push((*name, value.as_ref()));
                "query"
            }
            Some(Auth::None) | None => "none",
        };
        if !query.is_empty() {
            rb = rb.query(&query);
        }

        tracing::debug!(
            req_id = %call.id,
            attempt = attempt + 1,
            url = %format!("{}{}", call.url.host_str().unwrap_or("-"), call.url.path()),
            query = ?redact_query(&query),
            auth_kind,
            body_len = call.body.len(),
            "http.request"
        );
        let started = Instant::now();
        let resp = rb.send().await.map_err(|e| e.to_string())?;
        let status = resp.status();
        let request_id = resp
            .headers()
            .get("x-request-id")
            .or_else(|| resp.headers().get("x-goog-request-id"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();
        let bytes = resp.bytes().await.map_err(|e| e.to_string())?;
        tracing::debug!(
            req_id = %call.id,
            %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            body_len = bytes.len(),
            "http.response"
        );
        Ok((status, request_id, bytes.to_vec()))
    }
}

/// Everything fixed across the attempts of one request.
struct Call<'a> {
    id: String,
    url: Url,
    body: Vec<u8>,
    timeout: Duration,
    retries: usize,
    opts: RequestOpts<'a>,
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.min(6) - 1)))
}

/// Pull a human-readable message out of a provider error body.
///
/// Understands `{"error": {"message": ...}}` (Google/OpenAI style),
/// `{"error": "..."}` and `{"message": "..."}`.
fn extract_error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let candidates = [
        value.pointer("/error/message"),
        value.get("error").filter(|v| v.is_string()),
        value.get("message"),
        value.get("detail"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn redact_query(query: &[(&str, &str)]) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(k, v)| {
            let secret = SECRET_PARAMS.contains(&k.to_ascii_lowercase().as_str());
            (
                (*k).to_string(),
                if secret {
                    "<redacted>".to_string()
                } else {
                    (*v).to_string()
                },
            )
        })
        .collect()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut cut = 500;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_error_message_is_extracted() {
        let body = br#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("API key not valid.")
        );
    }

    #[test]
    fn plain_error_string_is_extracted() {
        assert_eq!(
            extract_error_message(br#"{"error": "quota"}"#).as_deref(),
            Some("quota")
        );
    }

    #[test]
    fn non_json_body_has_no_message() {
        assert_eq!(extract_error_message(b"<html>502 Bad Gateway</html>"), None);
        assert_eq!(extract_error_message(br#"{"error": {"code": 500}}"#), None);
    }

    #[test]
    fn secret_params_are_redacted() {
        let redacted = redact_query(&[("key", "abc"), ("alt", "json")]);
        assert_eq!(redacted[0], ("key".into(), "<redacted>".into()));
        assert_eq!(redacted[1], ("alt".into(), "json".into()));
    }

    #[test]
    fn base_gains_trailing_slash() {
        let client = HttpClient::new("https://example.com/v1beta").unwrap();
        assert_eq!(client.base().as_str(), "https://example.com/v1beta/");
        let joined = client.base().join("models/m:generateContent").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://example.com/v1beta/models/m:generateContent"
        );
    }
}
