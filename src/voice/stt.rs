//! Speech-to-text (STT) processing

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::GROQ_BASE_URL;
use crate::pipeline::Transcriber;
use crate::{Error, Result};

/// Transcript substituted when transcription fails for any reason
pub const TRANSCRIPTION_FAILED: &str = "Error in transcription";

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes recorded speech through a hosted Whisper endpoint
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    model: String,
    language: String,
    base_url: String,
}

impl SpeechToText {
    /// Create a new STT instance against Groq's Whisper endpoint
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_key: Option<SecretString>,
        model: String,
        language: String,
    ) -> Self {
        Self {
            client,
            api_key,
            model,
            language,
            base_url: GROQ_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Transcribe an audio file, substituting a fixed string on failure
    ///
    /// Every failure is logged and returned as [`TRANSCRIPTION_FAILED`] so a
    /// bad recording never aborts a consultation.
    pub async fn transcribe(&self, audio_path: &Path) -> String {
        match self.try_transcribe(audio_path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, path = %audio_path.display(), "transcription error");
                TRANSCRIPTION_FAILED.to_string()
            }
        }
    }

    /// Transcribe an audio file
    ///
    /// # Errors
    ///
    /// Returns error if the key is missing, the file can't be read, or the
    /// API call fails
    pub async fn try_transcribe(&self, audio_path: &Path) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("GROQ_API_KEY not set".to_string()))?;

        let audio = tokio::fs::read(audio_path).await?;
        let (file_name, mime_type) = upload_name(audio_path);

        tracing::debug!(
            audio_bytes = audio.len(),
            model = %self.model,
            "starting Whisper transcription"
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name(file_name)
                    .mime_str(mime_type)
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("failed to parse response: {e}")))?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &Path) -> String {
        Self::transcribe(self, audio).await
    }
}

/// File name and MIME type to upload a recording under
fn upload_name(path: &Path) -> (String, &'static str) {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let (extension, mime_type) = match extension.as_str() {
        "wav" => ("wav", "audio/wav"),
        "m4a" | "mp4" => ("m4a", "audio/mp4"),
        "ogg" | "oga" => ("ogg", "audio/ogg"),
        "webm" => ("webm", "audio/webm"),
        "flac" => ("flac", "audio/flac"),
        _ => ("mp3", "audio/mpeg"),
    };

    (format!("audio.{extension}"), mime_type)
}
