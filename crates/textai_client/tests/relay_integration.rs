//! Integration tests for both relay modes against mocked upstreams.
//! `run_query` must always come back with displayable text.

use serde_json::json;
use textai_client::{
    run_query, DirectRelay, GeminiClient, ProviderSettings, ProxiedRelay, QueryRelay, RelayError,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GEMINI_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn proxied(server: &MockServer) -> ProxiedRelay {
    ProxiedRelay::new(format!("{}/api/generate", server.uri())).unwrap()
}

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

// ---------------------------------------------------------------------------
// Proxied mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn proxied_success_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "prompt": "ping" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "hello" })))
        .expect(1)
        .mount(&server)
        .await;

    let relay = proxied(&server);
    assert_eq!(run_query(&relay, "ping").await, "hello");
}

#[tokio::test]
async fn proxied_error_body_is_prefixed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })))
        .mount(&server)
        .await;

    let relay = proxied(&server);
    assert_eq!(
        relay.query("ping").await,
        Err(RelayError::Upstream {
            status: 500,
            message: "boom".into()
        })
    );
    assert_eq!(run_query(&relay, "ping").await, "Error: boom");
}

#[tokio::test]
async fn proxied_status_without_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let relay = proxied(&server);
    assert_eq!(
        run_query(&relay, "ping").await,
        "Error: Request failed with status 502"
    );
}

#[tokio::test]
async fn proxied_malformed_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let relay = proxied(&server);
    let text = run_query(&relay, "ping").await;
    assert!(text.starts_with("Error: Malformed response"), "got {text}");
}

#[tokio::test]
async fn proxied_success_without_text_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "hello" })))
        .mount(&server)
        .await;

    let relay = proxied(&server);
    assert!(matches!(
        relay.query("ping").await,
        Err(RelayError::Malformed(_))
    ));
}

#[tokio::test]
async fn proxied_connection_refused_is_text() {
    // Bind then drop to get a port with nothing listening.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let relay = ProxiedRelay::new(format!("http://127.0.0.1:{port}/api/generate")).unwrap();

    let result = relay.query("ping").await;
    assert!(matches!(result, Err(RelayError::Transport(_))), "got {result:?}");
    assert!(run_query(&relay, "ping").await.starts_with("Error:"));
}

// ---------------------------------------------------------------------------
// Direct mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_without_credential_names_it() {
    let settings = ProviderSettings {
        api_key: None,
        model: "gemini-2.5-flash".into(),
        base_url: "http://127.0.0.1:9".into(),
    };
    let relay = DirectRelay::new(&settings);

    let text = run_query(&relay, "ping").await;
    assert!(text.starts_with("Error:"), "got {text}");
    assert!(text.contains("API_KEY"), "got {text}");
}

#[tokio::test]
async fn direct_success_returns_model_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_json(json!({ "contents": [{ "parts": [{ "text": "ping" }] }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("pong")))
        .expect(1)
        .mount(&server)
        .await;

    let settings = ProviderSettings {
        api_key: Some("test-key".into()),
        model: "gemini-2.5-flash".into(),
        base_url: server.uri(),
    };
    let relay = DirectRelay::new(&settings);
    assert_eq!(run_query(&relay, "ping").await, "pong");
}

#[tokio::test]
async fn direct_provider_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::new("bad-key", "gemini-2.5-flash", &server.uri()).unwrap();
    let relay = DirectRelay::from_client(client);
    assert_eq!(
        run_query(&relay, "ping").await,
        "Error: API key not valid. Please pass a valid API key."
    );
}

#[tokio::test]
async fn direct_provider_with_no_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let client = GeminiClient::new("k", "gemini-2.5-flash", &server.uri()).unwrap();
    let relay = DirectRelay::from_client(client);
    assert_eq!(
        run_query(&relay, "ping").await,
        "Error: Model returned no candidates"
    );
}

#[tokio::test]
async fn direct_safety_stop_without_text_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "SAFETY", "safetyRatings": [] }]
        })))
        .mount(&server)
        .await;

    let client = GeminiClient::new("k", "gemini-2.5-flash", &server.uri()).unwrap();
    let relay = DirectRelay::from_client(client);
    assert_eq!(
        relay.query("ping").await,
        Err(RelayError::Provider(
            "Model returned no text (finish reason: SAFETY)".into()
        ))
    );
    assert_eq!(
        run_query(&relay, "ping").await,
        "Error: Model returned no text (finish reason: SAFETY)"
    );
}
