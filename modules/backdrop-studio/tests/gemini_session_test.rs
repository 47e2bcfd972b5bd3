//! End-to-end session flows against a mock Gemini endpoint.
//!
//! File on disk → Encoder → Session → EditPipeline → Gemini (wiremock).

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use ai_client::Gemini;
use backdrop_common::ErrorKind;
use backdrop_studio::{build_prompt, EditPipeline, Encoder, Phase, Session};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-2.5-flash-image";
const ENDPOINT: &str = "/models/gemini-2.5-flash-image:generateContent";

fn session_for(server: &MockServer) -> Session {
    let gemini = Gemini::new("test-key", MODEL).with_base_url(server.uri());
    Session::new(
        EditPipeline::new(Arc::new(gemini)),
        Encoder::default(),
        "make it blue",
    )
}

fn jpeg_file(len: usize) -> (tempfile::NamedTempFile, Vec<u8>) {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.resize(len, 0x42);
    let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
    file.write_all(&bytes).unwrap();
    (file, bytes)
}

#[tokio::test]
async fn ten_kb_jpeg_becomes_png_result() {
    let server = MockServer::start().await;
    let (file, bytes) = jpeg_file(10 * 1024);

    let session = session_for(&server);
    let snap = session.select_image_file(file.path(), "image/jpeg").await.unwrap();
    let source = snap.source_image.unwrap();
    assert!(source.data_url().starts_with("data:image/jpeg;base64,"));
    assert_eq!(source.decode().unwrap().len(), 10 * 1024);
    assert_eq!(source.decode().unwrap(), bytes);

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_partial_json(json!({
            "contents": [{
                "parts": [
                    { "inlineData": { "mimeType": "image/jpeg", "data": source.base64_payload() } },
                    { "text": build_prompt("make it blue") }
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "inlineData": { "mimeType": "image/png", "data": "cG5nLWJ5dGVz" } }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let snap = session.generate().await.unwrap();

    assert_eq!(snap.phase, Phase::Success);
    assert_eq!(
        snap.generated_image.unwrap().data_url(),
        "data:image/png;base64,cG5nLWJ5dGVz"
    );
}

#[tokio::test]
async fn service_error_puts_session_in_error_with_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503).set_body_string("model overloaded"))
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.select_image_bytes("image/png", b"\x89PNG").await.unwrap();

    let snap = session.generate().await.unwrap();

    assert_eq!(snap.phase, Phase::Error);
    assert_eq!(snap.error_kind, Some(ErrorKind::Service));
    let message = snap.error.unwrap();
    assert!(message.starts_with("Failed to generate image. Please try again."));
    assert!(message.contains("model overloaded"));
}

#[tokio::test]
async fn text_only_reply_is_empty_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Sorry, I can't help with that." }] } }]
        })))
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.select_image_bytes("image/png", b"\x89PNG").await.unwrap();

    let snap = session.generate().await.unwrap();

    assert_eq!(snap.phase, Phase::Error);
    assert_eq!(snap.error_kind, Some(ErrorKind::EmptyResult));
    assert!(snap.error.unwrap().contains("No image generated"));
}

#[tokio::test]
async fn retry_after_error_then_start_over() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": { "mimeType": "image/png", "data": "eA==" } }] } }]
        })))
        .mount(&server)
        .await;

    let session = session_for(&server);
    session.select_image_bytes("image/webp", b"RIFFxxxxWEBP").await.unwrap();

    assert_eq!(session.generate().await.unwrap().phase, Phase::Error);
    let snap = session.generate().await.unwrap();
    assert_eq!(snap.phase, Phase::Success);
    assert_eq!(snap.generated_image.unwrap().mime_type(), "image/png");

    let snap = session.reset().await;
    assert_eq!(snap.phase, Phase::Idle);
    assert!(snap.generated_image.is_none());
    assert_eq!(snap.source_image.unwrap().mime_type(), "image/webp");
    assert_eq!(snap.instruction, "make it blue");
}

#[tokio::test]
async fn service_timeout_is_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let gemini = Gemini::new("test-key", MODEL)
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(50));
    let session = Session::new(
        EditPipeline::new(Arc::new(gemini)),
        Encoder::default(),
        "make it blue",
    );
    session.select_image_bytes("image/png", b"\x89PNG").await.unwrap();

    let snap = session.generate().await.unwrap();

    assert_eq!(snap.phase, Phase::Error);
    assert_eq!(snap.error_kind, Some(ErrorKind::Service));
    assert!(snap.generated_image.is_none());
}
