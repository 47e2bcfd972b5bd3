//! Gemini client against a local mock server.

use std::time::Duration;

use ai_client::{AiError, Gemini};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/models/gemini-2.5-flash-image:generateContent";

fn gemini_for(server: &MockServer) -> Gemini {
    Gemini::new("test-key", "gemini-2.5-flash-image").with_base_url(server.uri())
}

#[tokio::test]
async fn edit_image_returns_first_inline_image() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{
                "parts": [
                    { "inlineData": { "mimeType": "image/jpeg", "data": "aGVsbG8=" } },
                    { "text": "make it blue" }
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "done" },
                        { "inlineData": { "mimeType": "image/png", "data": "cG5nIQ==" } }
                    ]
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gemini = gemini_for(&server);
    let image = gemini
        .edit_image("image/jpeg", "aGVsbG8=", "make it blue")
        .await
        .unwrap()
        .expect("image part");

    assert_eq!(image.data, "cG5nIQ==");
    assert_eq!(image.mime_type, "image/png");
}

#[tokio::test]
async fn edit_image_without_image_part_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't edit this photo." }] } }]
        })))
        .mount(&server)
        .await;

    let result = gemini_for(&server)
        .edit_image("image/png", "eA==", "anything")
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn non_success_status_is_api_error_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(
            ResponseTemplate::new(429).set_body_string("{\"error\":{\"message\":\"Quota exceeded\"}}"),
        )
        .mount(&server)
        .await;

    let err = gemini_for(&server)
        .edit_image("image/png", "eA==", "anything")
        .await
        .unwrap_err();

    match err {
        AiError::Api { status, message } => {
            assert_eq!(status, 429);
            assert!(message.contains("Quota exceeded"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = gemini_for(&server)
        .edit_image("image/png", "eA==", "anything")
        .await
        .unwrap_err();

    assert!(matches!(err, AiError::Parse(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    // Port 9 (discard) on localhost is not listening in test environments.
    let gemini = Gemini::new("k", "m").with_base_url("http://127.0.0.1:9");

    let err = gemini.edit_image("image/png", "eA==", "x").await.unwrap_err();

    assert!(matches!(err, AiError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_response_times_out_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "candidates": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let gemini = gemini_for(&server).with_timeout(Duration::from_millis(50));
    let err = gemini
        .edit_image("image/png", "aGVsbG8=", "make it blue")
        .await
        .unwrap_err();

    assert!(matches!(err, AiError::Network(_)), "got {err:?}");
}
