use std::path::Path;

use razmetka_core::{
    GenerationRequest, MediaTransport, MultimodalModel, OmniClient, OmniConfig, RazmetkaError,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

const MODEL: &str = "Qwen/Qwen3-Omni-30B-A3B-Instruct";

async fn server_serving(model: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": model, "object": "model"}]
        })))
        .mount(&server)
        .await;
    server
}

fn config(server: &MockServer) -> OmniConfig {
    OmniConfig {
        api_base: format!("{}/v1", server.uri()),
        model: MODEL.to_string(),
        ..Default::default()
    }
}

async fn video(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("clip.mp4");
    tokio::fs::write(&path, b"\0\0\0\x18ftypmp42").await.unwrap();
    path
}

#[tokio::test]
async fn test_connect_requires_served_model() {
    let server = server_serving("some/other-model").await;

    let err = OmniClient::connect(config(&server)).await.err().unwrap();

    assert!(matches!(err, RazmetkaError::ModelUnavailable { .. }));
    assert!(err.to_string().contains("some/other-model"));
}

#[tokio::test]
async fn test_connect_fails_when_server_is_down() {
    let config = OmniConfig {
        api_base: "http://127.0.0.1:9/v1".to_string(),
        ..Default::default()
    };

    let err = OmniClient::connect(config).await.err().unwrap();

    assert!(matches!(err, RazmetkaError::ModelUnavailable { .. }));
}

#[tokio::test]
async fn test_generate_sends_video_and_prompt() {
    let dir = TempDir::new().unwrap();
    let video = video(dir.path()).await;
    let server = server_serving(MODEL).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "model": MODEL,
            "mm_processor_kwargs": {"use_audio_in_video": true, "max_pixels": 151200}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "```json\n{\"tone\": \"serious\"}\n```"}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OmniClient::connect(OmniConfig {
        api_key: Some("secret".to_string()),
        ..config(&server)
    })
    .await
    .unwrap();
    let text = client
        .generate(GenerationRequest {
            prompt: "Describe the video",
            video: &video,
            use_audio_in_video: true,
        })
        .await
        .unwrap();

    assert_eq!(client.model_id(), MODEL);
    assert_eq!(text, "```json\n{\"tone\": \"serious\"}\n```");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests
        .iter()
        .find(|r| r.url.path() == "/v1/chat/completions")
        .unwrap()
        .body_json()
        .unwrap();
    let content = &body["messages"][0]["content"];
    let url = content[0]["video_url"]["url"].as_str().unwrap();
    assert!(url.starts_with("file:///"));
    assert!(url.ends_with("clip.mp4"));
    assert_eq!(content[1]["text"], "Describe the video");
}

#[tokio::test]
async fn test_inline_media_is_base64_data_url() {
    let dir = TempDir::new().unwrap();
    let video = video(dir.path()).await;
    let server = server_serving(MODEL).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "{}"}}]
        })))
        .mount(&server)
        .await;

    let client = OmniClient::connect(OmniConfig {
        media: MediaTransport::Inline,
        ..config(&server)
    })
    .await
    .unwrap();
    client
        .generate(GenerationRequest {
            prompt: "p",
            video: &video,
            use_audio_in_video: false,
        })
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests.last().unwrap().body_json().unwrap();
    assert_eq!(
        body["messages"][0]["content"][0]["video_url"]["url"],
        "data:video/mp4;base64,AAAAGGZ0eXBtcDQy"
    );
    assert_eq!(body["mm_processor_kwargs"]["use_audio_in_video"], false);
}

#[tokio::test]
async fn test_bad_request_is_a_media_error() {
    let dir = TempDir::new().unwrap();
    let video = video(dir.path()).await;
    let server = server_serving(MODEL).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("Failed to load video: moov atom not found"),
        )
        .mount(&server)
        .await;

    let client = OmniClient::connect(config(&server)).await.unwrap();
    let err = client
        .generate(GenerationRequest {
            prompt: "p",
            video: &video,
            use_audio_in_video: true,
        })
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert!(err.to_string().contains("moov atom"));
}

#[tokio::test]
async fn test_server_error_is_fatal() {
    let dir = TempDir::new().unwrap();
    let video = video(dir.path()).await;
    let server = server_serving(MODEL).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
        .mount(&server)
        .await;

    let client = OmniClient::connect(config(&server)).await.unwrap();
    let err = client
        .generate(GenerationRequest {
            prompt: "p",
            video: &video,
            use_audio_in_video: true,
        })
        .await
        .unwrap_err();

    assert!(!err.is_transient());
    assert!(matches!(err, RazmetkaError::Generation { .. }));
}

#[tokio::test]
async fn test_unreadable_media_is_transient() {
    let dir = TempDir::new().unwrap();
    let server = server_serving(MODEL).await;

    let client = OmniClient::connect(config(&server)).await.unwrap();
    let err = client
        .generate(GenerationRequest {
            prompt: "p",
            video: &dir.path().join("vanished.mp4"),
            use_audio_in_video: true,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RazmetkaError::MediaPreprocessing { .. }));
}
