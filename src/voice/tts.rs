//! Text-to-speech (TTS) processing

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::playback::{AudioPlayer, NullPlayer, spawn_playback};
use crate::config::{Config, ELEVENLABS_BASE_URL, GTTS_BASE_URL, TtsProviderKind};
use crate::pipeline::Synthesizer;
use crate::{Error, Result};

/// Longest piece of text the Google Translate front-end accepts per request
const GTTS_MAX_CHARS: usize = 100;

/// TTS provider backend
#[derive(Debug)]
enum TtsProvider {
    Gtts {
        language: String,
        base_url: String,
    },
    ElevenLabs {
        api_key: Option<SecretString>,
        voice_id: String,
        model: String,
        output_format: String,
        base_url: String,
    },
}

/// Synthesizes speech from text and writes it to disk
pub struct TextToSpeech {
    client: reqwest::Client,
    provider: TtsProvider,
    player: Arc<dyn AudioPlayer>,
}

impl TextToSpeech {
    /// Create a new TTS instance using the free Google Translate front-end
    #[must_use]
    pub fn new_gtts(client: reqwest::Client, language: String) -> Self {
        Self {
            client,
            provider: TtsProvider::Gtts {
                language,
                base_url: GTTS_BASE_URL.to_string(),
            },
            player: Arc::new(NullPlayer),
        }
    }

    /// Create a new TTS instance using `ElevenLabs`
    ///
    /// A missing key is only reported when speech is requested.
    #[must_use]
    pub fn new_elevenlabs(
        client: reqwest::Client,
        api_key: Option<SecretString>,
        voice_id: String,
        model: String,
        output_format: String,
    ) -> Self {
        Self {
            client,
            provider: TtsProvider::ElevenLabs {
                api_key,
                voice_id,
                model,
                output_format,
                base_url: ELEVENLABS_BASE_URL.to_string(),
            },
            player: Arc::new(NullPlayer),
        }
    }

    /// Create the provider selected in configuration
    #[must_use]
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        match config.tts.provider {
            TtsProviderKind::Gtts => Self::new_gtts(client, config.tts.language.clone())
                .with_base_url(&config.http.gtts_base_url),
            TtsProviderKind::ElevenLabs => Self::new_elevenlabs(
                client,
                config.api_keys.elevenlabs.clone(),
                config.tts.voice_id.clone(),
                config.tts.model.clone(),
                config.tts.output_format.clone(),
            )
            .with_base_url(&config.http.elevenlabs_base_url),
        }
    }

    /// Point the provider at a different API base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        match &mut self.provider {
            TtsProvider::Gtts { base_url, .. } | TtsProvider::ElevenLabs { base_url, .. } => {
                *base_url = url;
            }
        }
        self
    }

    /// Hand written files to this player
    #[must_use]
    pub fn with_player(mut self, player: Arc<dyn AudioPlayer>) -> Self {
        self.player = player;
        self
    }

    /// Provider name for logging and status
    #[must_use]
    pub const fn provider_name(&self) -> &'static str {
        match self.provider {
            TtsProvider::Gtts { .. } => TtsProviderKind::Gtts.as_str(),
            TtsProvider::ElevenLabs { .. } => TtsProviderKind::ElevenLabs.as_str(),
        }
    }

    /// Synthesize text to an audio file and start playing it
    ///
    /// Playback runs in the background and its failures are only logged.
    ///
    /// # Errors
    ///
    /// Returns `Error::Tts` for any provider or file failure
    pub async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        let audio = self.synthesize_bytes(text).await.map_err(into_tts)?;

        tokio::fs::write(output_path, &audio).await.map_err(|e| {
            Error::Tts(format!("failed to write {}: {e}", output_path.display()))
        })?;

        tracing::info!(
            provider = self.provider_name(),
            path = %output_path.display(),
            bytes = audio.len(),
            "reply audio saved"
        );

        spawn_playback(Arc::clone(&self.player), output_path.to_path_buf());
        Ok(())
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize_bytes(&self, text: &str) -> Result<Vec<u8>> {
        match &self.provider {
            TtsProvider::Gtts { language, base_url } => {
                self.synthesize_gtts(text, language, base_url).await
            }
            TtsProvider::ElevenLabs {
                api_key,
                voice_id,
                model,
                output_format,
                base_url,
            } => {
                let api_key = api_key
                    .as_ref()
                    .ok_or_else(|| Error::Tts("ELEVENLABS_API_KEY not set".to_string()))?;
                self.synthesize_elevenlabs(text, api_key, voice_id, model, output_format, base_url)
                    .await
            }
        }
    }

    /// Synthesize through the Google Translate front-end, one request per chunk
    async fn synthesize_gtts(&self, text: &str, language: &str, base_url: &str) -> Result<Vec<u8>> {
        let chunks = split_text(text, GTTS_MAX_CHARS);
        if chunks.is_empty() {
            return Err(Error::Tts("no text to speak".to_string()));
        }

        let total = chunks.len().to_string();
        let url = format!("{base_url}/translate_tts");
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let query = [
                ("ie", "UTF-8".to_string()),
                ("client", "tw-ob".to_string()),
                ("tl", language.to_string()),
                ("ttsspeed", "1".to_string()),
                ("total", total.clone()),
                ("idx", idx.to_string()),
                ("textlen", chunk.chars().count().to_string()),
                ("q", chunk.clone()),
            ];

            let response = self.client.get(&url).query(&query).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Tts(format!("gTTS error {status}: {body}")));
            }

            audio.extend_from_slice(&response.bytes().await?);
        }

        tracing::debug!(chunks = chunks.len(), bytes = audio.len(), "gTTS synthesis complete");
        Ok(audio)
    }

    /// Synthesize using `ElevenLabs` TTS
    async fn synthesize_elevenlabs(
        &self,
        text: &str,
        api_key: &SecretString,
        voice_id: &str,
        model: &str,
        output_format: &str,
        base_url: &str,
    ) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{base_url}/v1/text-to-speech/{voice_id}");

        let request = ElevenLabsRequest {
            text,
            model_id: model,
        };

        let response = self
            .client
            .post(&url)
            .query(&[("output_format", output_format)])
            .header("xi-api-key", api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        Self::synthesize(self, text, output_path).await
    }
}

/// Fold any failure into the synthesis error variant
fn into_tts(e: Error) -> Error {
    match e {
        Error::Tts(_) => e,
        other => Error::Tts(other.to_string()),
    }
}

/// Split text into chunks of at most `max_chars` characters
///
/// Sentences are kept apart; long sentences are packed word by word and words
/// longer than the limit are cut.
fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();

    for sentence in text.split_inclusive(['.', '!', '?', ';', ':', '\n']) {
        let mut current = String::new();
        let mut current_len = 0;

        for word in sentence.split_whitespace() {
            let word_len = word.chars().count();

            if word_len > max_chars {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let chars: Vec<char> = word.chars().collect();
                chunks.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
                continue;
            }

            let needed = if current.is_empty() { word_len } else { word_len + 1 };
            if current_len + needed > max_chars {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }

            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }

        if !current.is_empty() {
            chunks.push(current);
        }
    }

    chunks
}
