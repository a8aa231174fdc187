//! Consultation pipeline
//!
//! Turns an optional spoken question and an optional photo into a transcript,
//! a written diagnosis and a spoken reply. Each stage sits behind a trait so
//! the HTTP API and tests can swap in their own implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::attachments::{EncodedImage, VisionClient};
use crate::config::Config;
use crate::voice::{SpeechToText, TextToSpeech, player_for};
use crate::{Error, Result};

/// Transcript used when no audio was supplied
pub const NO_AUDIO: &str = "No audio provided";

/// Diagnosis used when no image was supplied
pub const NO_IMAGE: &str = "No image provided for me to analyze";

/// Prefix of the diagnosis when analysis or synthesis fails
pub const ANALYSIS_FAILED_PREFIX: &str = "Error analyzing image";

/// Turns recorded speech into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the file; failures come back as a placeholder transcript
    async fn transcribe(&self, audio: &Path) -> String;
}

/// Answers a prompt about an image
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Ask `model` about `image`
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or yields no text
    async fn analyze(&self, prompt: &str, model: &str, image: &EncodedImage) -> Result<String>;
}

/// Speaks text into an audio file
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Write speech for `text` to `output_path`
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or writing the file fails
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()>;
}

/// Outcome of one consultation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consultation {
    /// What the patient said, or a placeholder
    pub transcript: String,
    /// The doctor's reply, or a placeholder/error message
    pub diagnosis: String,
    /// Spoken reply, present only when analysis and synthesis both succeeded
    pub reply_audio: Option<PathBuf>,
}

/// Orchestrates transcription, image analysis and speech synthesis
pub struct Pipeline {
    transcriber: Arc<dyn Transcriber>,
    analyzer: Arc<dyn ImageAnalyzer>,
    synthesizer: Arc<dyn Synthesizer>,
    persona_prompt: String,
    vision_model: String,
    output_dir: PathBuf,
    reply_retention: Option<Duration>,
}

impl Pipeline {
    /// Assemble a pipeline from its stages
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        analyzer: Arc<dyn ImageAnalyzer>,
        synthesizer: Arc<dyn Synthesizer>,
        persona_prompt: impl Into<String>,
        vision_model: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transcriber,
            analyzer,
            synthesizer,
            persona_prompt: persona_prompt.into(),
            vision_model: vision_model.into(),
            output_dir: output_dir.into(),
            reply_retention: None,
        }
    }

    /// Delete replies older than `retention` before writing new ones
    #[must_use]
    pub fn with_reply_retention(mut self, retention: Option<Duration>) -> Self {
        self.reply_retention = retention;
        self
    }

    /// Wire the hosted clients described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client can't be built
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = config.http.client()?;

        let transcriber = SpeechToText::new(
            client.clone(),
            config.api_keys.groq.clone(),
            config.consult.stt_model.clone(),
            config.consult.stt_language.clone(),
        )
        .with_base_url(&config.http.groq_base_url);

        let analyzer = VisionClient::new(client.clone(), config.api_keys.groq.clone())
            .with_base_url(&config.http.groq_base_url);

        let synthesizer =
            TextToSpeech::from_config(config, client).with_player(player_for(config.playback));

        tracing::debug!(
            vision_model = %config.consult.vision_model,
            stt_model = %config.consult.stt_model,
            tts = synthesizer.provider_name(),
            output_dir = %config.server.output_dir.display(),
            "pipeline configured"
        );

        Ok(Self::new(
            Arc::new(transcriber),
            Arc::new(analyzer),
            Arc::new(synthesizer),
            config.consult.persona_prompt.clone(),
            config.consult.vision_model.clone(),
            config.server.output_dir.clone(),
        )
        .with_reply_retention(config.server.reply_retention))
    }

    /// Directory reply audio is written to
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run one consultation
    ///
    /// Never fails: every stage failure is folded into the returned text.
    pub async fn consult(&self, audio: Option<&Path>, image: Option<&Path>) -> Consultation {
        let transcript = match audio {
            Some(path) => self.transcriber.transcribe(path).await,
            None => NO_AUDIO.to_string(),
        };

        let Some(image) = image else {
            tracing::info!("no image supplied, skipping analysis");
            return Consultation {
                transcript,
                diagnosis: NO_IMAGE.to_string(),
                reply_audio: None,
            };
        };

        match self.diagnose(&transcript, image).await {
            Ok((diagnosis, reply)) => Consultation {
                transcript,
                diagnosis,
                reply_audio: Some(reply),
            },
            Err(e) => {
                tracing::error!(error = %e, "consultation failed");
                Consultation {
                    transcript,
                    diagnosis: format!("{ANALYSIS_FAILED_PREFIX}: {e}"),
                    reply_audio: None,
                }
            }
        }
    }

    async fn diagnose(&self, transcript: &str, image: &Path) -> Result<(String, PathBuf)> {
        let bytes = tokio::fs::read(image).await?;
        let encoded = EncodedImage::from_bytes(&bytes);
        let prompt = format!("{} {transcript}", self.persona_prompt);

        let diagnosis = self
            .analyzer
            .analyze(&prompt, &self.vision_model, &encoded)
            .await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        self.prune_replies().await;
        let reply = self.reply_path();

        self.synthesizer
            .synthesize(&diagnosis, &reply)
            .await
            .map_err(|e| match e {
                Error::Tts(_) => e,
                other => Error::Tts(other.to_string()),
            })?;

        Ok((diagnosis, reply))
    }

    /// Remove replies older than the retention window
    ///
    /// Only files named like a reply are touched. Returns how many were removed.
    pub async fn prune_replies(&self) -> usize {
        let Some(retention) = self.reply_retention else {
            return 0;
        };

        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(error = %e, "reply directory not readable, nothing to prune");
                return 0;
            }
        };

        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if !is_reply_name(&entry.file_name().to_string_lossy()) {
                continue;
            }

            let expired = entry
                .metadata()
                .await
                .ok()
                .and_then(|meta| meta.modified().ok())
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age >= retention);
            if !expired {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "failed to remove old reply"
                ),
            }
        }

        if removed > 0 {
            tracing::info!(removed, "pruned old replies");
        }
        removed
    }

    fn reply_path(&self) -> PathBuf {
        self.output_dir.join(format!("reply-{}.mp3", uuid::Uuid::new_v4()))
    }
}

/// Whether `name` is a file name the pipeline could have produced
#[must_use]
pub fn is_reply_name(name: &str) -> bool {
    name.strip_prefix("reply-")
        .and_then(|rest| rest.strip_suffix(".mp3"))
        .is_some_and(|id| uuid::Uuid::try_parse(id).is_ok())
}
