use std::borrow::Cow;
use std::time::Duration;

use precis_http::{Auth, HttpClient, HttpError, RequestOpts};
use reqwest::StatusCode;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn key_auth(value: &str) -> RequestOpts<'_> {
    RequestOpts {
        auth: Some(Auth::Query {
            name: "key",
            value: Cow::Borrowed(value),
        }),
        ..RequestOpts::default()
    }
}

#[tokio::test]
async fn posts_body_with_query_key_and_decodes_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/m:generateContent"))
        .and(query_param("key", "sekret"))
        .and(body_partial_json(json!({"contents": [{"role": "user"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/v1beta", server.uri())).unwrap();
    let got: Value = client
        .post_json(
            "models/m:generateContent",
            &json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]}),
            key_auth("sekret"),
        )
        .await
        .expect("request succeeds");

    assert_eq!(got, json!({"ok": true}));
}

#[tokio::test]
async fn api_error_carries_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/m:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid. Please pass a valid API key."}
        })))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .post_json::<_, Value>("models/m:generateContent", &json!({}), key_auth("bad"))
        .await
        .unwrap_err();

    match &err {
        HttpError::Api {
            status, message, ..
        } => {
            assert_eq!(*status, StatusCode::BAD_REQUEST);
            assert_eq!(
                message.as_deref(),
                Some("API key not valid. Please pass a valid API key.")
            );
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert!(err.provider_message().is_some());
}

#[tokio::test]
async fn server_errors_are_not_retried_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .post_json::<_, Value>("x", &json!({}), RequestOpts::default())
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::Api { message: None, .. }));
}

#[tokio::test]
async fn retries_when_budget_is_given() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"n": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(1);
    let got: Value = client
        .post_json("x", &json!({}), RequestOpts::default())
        .await
        .expect("second attempt succeeds");
    assert_eq!(got["n"], 2);
}

#[tokio::test]
async fn undecodable_success_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .post_json::<_, Value>("x", &json!({}), RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Decode(_, snippet) => assert_eq!(snippet, "not json"),
        other => panic!("expected Decode, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let client = HttpClient::new("http://127.0.0.1:9")
        .unwrap()
        .with_timeout(Duration::from_secs(2));
    let err = client
        .post_json::<_, Value>("x", &json!({}), RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Network(_)));
}
