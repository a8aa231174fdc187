//! API endpoint integration tests

use std::path::Path;
use std::sync::Arc;

use ai_doctor::api::{ApiServerBuilder, ServiceInfo};
use ai_doctor::pipeline::{NO_AUDIO, NO_IMAGE};
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use tower::ServiceExt;

mod common;
use common::{FakeAnalyzer, FakeSynthesizer, FakeTranscriber};

const BOUNDARY: &str = "doctor-test-boundary";

/// Build a test API router over fake pipeline stages
fn build_test_router(output_dir: &Path) -> axum::Router {
    let pipeline = common::pipeline(
        FakeTranscriber::new("Is this mole normal?"),
        FakeAnalyzer::replying("With what I see, it looks like a harmless mole."),
        FakeSynthesizer::new(),
        output_dir,
    );

    let info = ServiceInfo {
        vision_model: common::MODEL.to_string(),
        stt_model: "whisper-large-v3".to_string(),
        tts_provider: "gtts",
        playback: "none",
        groq_key: true,
        elevenlabs_key: false,
    };

    ApiServerBuilder::new(Arc::new(pipeline), 0)
        .info(info)
        .build()
        .router()
}

/// Encode file parts as a multipart/form-data body
fn multipart_body(parts: &[(&str, &str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content_type, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn consult_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/consult")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_status_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["vision_model"], common::MODEL);
    assert_eq!(json["tts_provider"], "gtts");
    assert_eq!(json["groq_key"], true);
    assert_eq!(json["elevenlabs_key"], false);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_consult_and_fetch_reply() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(dir.path());

    let body = multipart_body(&[
        ("audio", "question.webm", "audio/webm", b"\x1a\x45\xdf\xa3webm"),
        ("image", "mole.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0]),
    ]);
    let response = app.clone().oneshot(consult_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["transcript"], "Is this mole normal?");
    assert_eq!(
        json["diagnosis"],
        "With what I see, it looks like a harmless mole."
    );

    let audio_url = json["audio_url"].as_str().unwrap().to_string();
    assert!(audio_url.starts_with("/api/audio/reply-"), "got: {audio_url}");

    let response = app
        .oneshot(
            Request::builder()
                .uri(&audio_url)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let audio = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&audio[..], b"ID3fake");
}

#[tokio::test]
async fn test_consult_without_files() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(dir.path());

    let response = app
        .oneshot(consult_request(multipart_body(&[])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["transcript"], NO_AUDIO);
    assert_eq!(json["diagnosis"], NO_IMAGE);
    assert!(json["audio_url"].is_null());
}

#[tokio::test]
async fn test_empty_image_part_counts_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(dir.path());

    let body = multipart_body(&[("image", "", "application/octet-stream", b"")]);
    let response = app.oneshot(consult_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["diagnosis"], NO_IMAGE);
}

#[tokio::test]
async fn test_consult_rejects_non_multipart() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/consult")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"image": "face.jpg"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "bad_request");
    assert!(json["error"]["message"].is_string());
}

#[tokio::test]
async fn test_consult_rejects_truncated_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(dir.path());

    let mut body = multipart_body(&[("image", "face.jpg", "image/jpeg", &[0xFF, 0xD8])]);
    body.truncate(body.len() / 2);
    let response = app.oneshot(consult_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_audio_rejects_foreign_names() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.mp3"), b"ID3").unwrap();
    let app = build_test_router(dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/audio/notes.mp3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_audio_missing_reply_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/audio/reply-67e55044-10b1-426f-9247-bb680e5fe0c8.mp3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "not_found");
}
