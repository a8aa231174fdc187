//! Consultation pipeline integration tests
//!
//! Runs the pipeline over fake stages, so no network or audio hardware is needed

use base64::Engine as _;

use ai_doctor::pipeline::{NO_AUDIO, NO_IMAGE};
use ai_doctor::voice::TRANSCRIPTION_FAILED;

mod common;
use common::{
    FakeAnalyzer, FakeSynthesizer, FakeTranscriber, MODEL, PERSONA, write_audio, write_image,
};

#[tokio::test]
async fn test_full_consultation() {
    let dir = tempfile::tempdir().unwrap();
    let audio = write_audio(dir.path(), "question.mp3");
    let image = write_image(dir.path(), "face.jpg");

    let transcriber = FakeTranscriber::new("Is there something wrong with my face?");
    let analyzer = FakeAnalyzer::replying("With what I see, I think you have acne.");
    let synthesizer = FakeSynthesizer::new();
    let replies = dir.path().join("replies");

    let pipeline = common::pipeline(
        transcriber.clone(),
        analyzer.clone(),
        synthesizer.clone(),
        &replies,
    );
    let result = pipeline.consult(Some(&audio), Some(&image)).await;

    assert_eq!(result.transcript, "Is there something wrong with my face?");
    assert_eq!(result.diagnosis, "With what I see, I think you have acne.");

    let (prompt, model, encoded) = analyzer.prompts.lock().unwrap()[0].clone();
    assert_eq!(prompt, format!("{PERSONA} Is there something wrong with my face?"));
    assert_eq!(model, MODEL);
    assert_eq!(encoded.mime_type, "image/jpeg");
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&encoded.data)
        .unwrap();
    assert_eq!(decoded, std::fs::read(&image).unwrap());

    let spoken = synthesizer.spoken.lock().unwrap().clone();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].0, result.diagnosis);

    let reply = result.reply_audio.unwrap();
    assert_eq!(reply, spoken[0].1);
    assert!(reply.starts_with(&replies));
    assert_eq!(std::fs::read(&reply).unwrap(), b"ID3fake");
    assert_eq!(transcriber.calls.lock().unwrap().as_slice(), [audio]);
}

#[tokio::test]
async fn test_image_without_audio() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "rash.jpg");

    let transcriber = FakeTranscriber::new("unused");
    let analyzer = FakeAnalyzer::replying("Looks like a mild rash.");
    let synthesizer = FakeSynthesizer::new();

    let pipeline = common::pipeline(
        transcriber.clone(),
        analyzer.clone(),
        synthesizer.clone(),
        dir.path(),
    );
    let result = pipeline.consult(None, Some(&image)).await;

    assert_eq!(result.transcript, NO_AUDIO);
    assert_eq!(result.diagnosis, "Looks like a mild rash.");
    assert!(result.reply_audio.is_some());
    assert!(transcriber.calls.lock().unwrap().is_empty());

    let prompt = analyzer.prompts.lock().unwrap()[0].0.clone();
    assert_eq!(prompt, format!("{PERSONA} {NO_AUDIO}"));
}

#[tokio::test]
async fn test_audio_without_image() {
    let dir = tempfile::tempdir().unwrap();
    let audio = write_audio(dir.path(), "question.wav");

    let analyzer = FakeAnalyzer::replying("unused");
    let synthesizer = FakeSynthesizer::new();

    let pipeline = common::pipeline(
        FakeTranscriber::new("My arm hurts"),
        analyzer.clone(),
        synthesizer.clone(),
        dir.path(),
    );
    let result = pipeline.consult(Some(&audio), None).await;

    assert_eq!(result.transcript, "My arm hurts");
    assert_eq!(result.diagnosis, NO_IMAGE);
    assert!(result.reply_audio.is_none());
    assert_eq!(analyzer.call_count(), 0);
    assert_eq!(synthesizer.call_count(), 0);
}

#[tokio::test]
async fn test_nothing_supplied() {
    let dir = tempfile::tempdir().unwrap();

    let pipeline = common::pipeline(
        FakeTranscriber::new("unused"),
        FakeAnalyzer::replying("unused"),
        FakeSynthesizer::new(),
        dir.path(),
    );
    let result = pipeline.consult(None, None).await;

    assert_eq!(result.transcript, NO_AUDIO);
    assert_eq!(result.diagnosis, NO_IMAGE);
    assert!(result.reply_audio.is_none());
}

#[tokio::test]
async fn test_vision_failure_is_reported_in_diagnosis() {
    let dir = tempfile::tempdir().unwrap();
    let image = write_image(dir.path(), "face.jpg");
    let synthesizer = FakeSynthesizer::new();

    let pipeline = common::pipeline(
        FakeTranscriber::new("unused"),
        FakeAnalyzer::failing("API error 500 Internal Server Error"),
        synthesizer.clone(),
        dir.path(),
    );
    let result = pipeline.consult(None, Some(&image)).await;

    assert!(result.diagnosis.starts_with("Error analyzing image: "));
    assert!(result.diagnosis.contains("500"));
    assert!(result.reply_audio.is_none());
    assert_eq!(synthesizer.call_count(), 0);
}

#[tokio::test]
async fn test_vision_failure_keeps_real_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let audio = write_audio(dir.path(), "question.mp3");
    let image = write_image(dir.path(), "face.jpg");

    let transcriber = FakeTranscriber::new("real question");
    let analyzer = FakeAnalyzer::failing("API error 503 Service Unavailable");
    let synthesizer = FakeSynthesizer::new();

    let pipeline = common::pipeline(
        transcriber.clone(),
        analyzer.clone(),
        synthesizer.clone(),
        dir.path(),
    );
    let result = pipeline.consult(Some(&audio), Some(&image)).await;

    assert_eq!(result.transcript, "real question");
    assert!(result.diagnosis.starts_with("Error analyzing image:"));
    assert!(result.reply_audio.is_none());
    assert_eq!(synthesizer.call_count(), 0);
    assert_eq!(transcriber.calls.lock().unwrap().as_slice(), [audio]);

    let prompt = analyzer.prompts.lock().unwrap()[0].0.clone();
    assert_eq!(prompt, format!("{PERSONA} real question"));
}

#[tokio::test]
async fn test_failed_transcript_still_reaches_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let audio = write_audio(dir.path(), "garbled.mp3");
    let image = write_image(dir.path(), "face.jpg");
    let analyzer = FakeAnalyzer::replying("Hard to say, but it looks fine.");

    let pipeline = common::pipeline(
        FakeTranscriber::new(TRANSCRIPTION_FAILED),
        analyzer.clone(),
        FakeSynthesizer::new(),
        dir.path(),
    );
    let result = pipeline.consult(Some(&audio), Some(&image)).await;

    assert_eq!(result.transcript, TRANSCRIPTION_FAILED);
    let prompt = analyzer.prompts.lock().unwrap()[0].0.clone();
    assert!(prompt.ends_with(TRANSCRIPTION_FAILED));
    assert!(result.reply_audio.is_some());
}

#[tokio::test]
async fn test_consultation_serializes() {
    let dir = tempfile::tempdir().unwrap();

    let pipeline = common::pipeline(
        FakeTranscriber::new("unused"),
        FakeAnalyzer::replying("unused"),
        FakeSynthesizer::new(),
        dir.path(),
    );
    let result = pipeline.consult(None, None).await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["transcript"], NO_AUDIO);
    assert_eq!(json["diagnosis"], NO_IMAGE);
    assert!(json["reply_audio"].is_null());
}

#[tokio::test]
async fn test_configured_pipeline_against_mock_services() {
    use ai_doctor::config::TtsProviderKind;
    use ai_doctor::{Config, Pipeline};
    use secrecy::SecretString;

    let mut server = mockito::Server::new_async().await;
    let stt = server
        .mock("POST", "/audio/transcriptions")
        .match_header("authorization", "Bearer gsk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"text": "What is this spot on my hand?"}"#)
        .create_async()
        .await;
    let vision = server
        .mock("POST", "/chat/completions")
        .match_body(mockito::Matcher::Regex("What is this spot on my hand\\?".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"content": "It looks like a freckle."}}]}"#)
        .create_async()
        .await;
    let tts = server
        .mock("GET", mockito::Matcher::Regex(r"^/translate_tts".to_string()))
        .with_status(200)
        .with_body(b"ID3reply")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let audio = write_audio(dir.path(), "question.mp3");
    let image = write_image(dir.path(), "hand.jpg");

    let mut config = Config::default();
    config.api_keys.groq = Some(SecretString::from("gsk-test"));
    config.tts.provider = TtsProviderKind::Gtts;
    config.http.groq_base_url = server.url();
    config.http.gtts_base_url = server.url();
    config.server.output_dir = dir.path().join("replies");

    let pipeline = Pipeline::from_config(&config).unwrap();
    let result = pipeline.consult(Some(&audio), Some(&image)).await;

    stt.assert_async().await;
    vision.assert_async().await;
    tts.assert_async().await;

    assert_eq!(result.transcript, "What is this spot on my hand?");
    assert_eq!(result.diagnosis, "It looks like a freckle.");
    let reply = result.reply_audio.unwrap();
    assert_eq!(std::fs::read(reply).unwrap(), b"ID3reply");
}

#[tokio::test]
async fn test_configured_pipeline_without_keys() {
    use ai_doctor::{Config, Pipeline};

    let dir = tempfile::tempdir().unwrap();
    let audio = write_audio(dir.path(), "question.mp3");
    let image = write_image(dir.path(), "hand.jpg");

    let mut config = Config::default();
    config.http.groq_base_url = "http://127.0.0.1:9".to_string();
    config.http.elevenlabs_base_url = "http://127.0.0.1:9".to_string();
    config.server.output_dir = dir.path().to_path_buf();

    let pipeline = Pipeline::from_config(&config).unwrap();
    let result = pipeline.consult(Some(&audio), Some(&image)).await;

    assert_eq!(result.transcript, TRANSCRIPTION_FAILED);
    assert!(result.diagnosis.starts_with("Error analyzing image: "));
    assert!(result.diagnosis.contains("GROQ_API_KEY"));
    assert!(result.reply_audio.is_none());
}
