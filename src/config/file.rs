//! TOML configuration file loading
//!
//! Supports `~/.config/ai-doctor/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DoctorConfigFile {
    /// Prompt and model configuration for a consultation
    #[serde(default)]
    pub consult: ConsultFileConfig,

    /// Speech synthesis configuration
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Playback configuration
    #[serde(default)]
    pub playback: PlaybackFileConfig,

    /// Outbound HTTP configuration
    #[serde(default)]
    pub http: HttpFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Consultation prompt and model configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConsultFileConfig {
    /// Role-play instructions prepended to the transcript
    pub persona_prompt: Option<String>,

    /// Multimodal chat model (e.g. "meta-llama/llama-4-scout-17b-16e-instruct")
    pub vision_model: Option<String>,

    /// Transcription model (e.g. "whisper-large-v3")
    pub stt_model: Option<String>,

    /// Transcription language hint (ISO 639-1)
    pub stt_language: Option<String>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Provider: "elevenlabs" or "gtts"
    pub provider: Option<String>,

    /// ElevenLabs voice identifier
    pub voice_id: Option<String>,

    /// ElevenLabs model identifier
    pub model: Option<String>,

    /// ElevenLabs output encoding (e.g. "mp3_22050_32")
    pub output_format: Option<String>,

    /// Language for the gTTS front-end
    pub language: Option<String>,
}

/// Playback configuration
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackFileConfig {
    /// Player: "none", "ffplay" or "device"
    pub player: Option<String>,
}

/// Outbound HTTP configuration
#[derive(Debug, Default, Deserialize)]
pub struct HttpFileConfig {
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Groq OpenAI-compatible API base URL
    pub groq_base_url: Option<String>,

    /// ElevenLabs API base URL
    pub elevenlabs_base_url: Option<String>,

    /// Google Translate TTS base URL
    pub gtts_base_url: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Directory holding the demo UI
    pub static_dir: Option<String>,

    /// Directory reply audio files are written to
    pub output_dir: Option<String>,

    /// Seconds a reply is kept before it is swept (0 keeps them forever)
    pub reply_retention_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub groq: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `DoctorConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> DoctorConfigFile {
    let Some(path) = config_file_path() else {
        return DoctorConfigFile::default();
    };

    load_config_file_from(&path)
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults.
pub fn load_config_file_from(path: &Path) -> DoctorConfigFile {
    if !path.exists() {
        return DoctorConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                DoctorConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            DoctorConfigFile::default()
        }
    }
}

/// Parse the contents of a config file
///
/// # Errors
///
/// Returns `Error::Toml` if the content isn't valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<DoctorConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/ai-doctor/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("ai-doctor").join("config.toml"))
}
