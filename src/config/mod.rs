//! Configuration management for the consultation gateway

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};

use file::DoctorConfigFile;

/// Role-play instructions sent ahead of the patient's transcript
///
/// Kept word for word, including its spelling, indentation and line breaks.
pub const DEFAULT_PERSONA_PROMPT: &str = "You have to act as a professional doctor, \
    i know you are not but this is for learning purpose. \
    \n            What's in this image?. Do you find anything wrong with it medically? \
    \n            If you make a differential, suggest some remedies for them. \
    Donot add any numbers or special characters in \
    \n            your response. Your response should be in one long paragraph. \
    Also always answer as if you are answering to a real person.\
    \n            Donot say 'In the image I see' but say 'With what I see, I think you have ....'\
    \n            Dont respond as an AI model in markdown, \
    your answer should mimic that of an actual doctor not an AI bot, \
    \n            Keep your answer concise (max 2 sentences). \
    No preamble, start your answer right away please";

pub const DEFAULT_VISION_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
pub const DEFAULT_STT_MODEL: &str = "whisper-large-v3";
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_TTS_MODEL: &str = "eleven_turbo_v2";
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_22050_32";

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
pub const GTTS_BASE_URL: &str = "https://translate.google.com";

const DEFAULT_PORT: u16 = 7860;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_REPLY_RETENTION_SECS: u64 = 60 * 60;

/// Gateway configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Prompt and model selection for consultations
    pub consult: ConsultConfig,

    /// Speech synthesis configuration
    pub tts: TtsConfig,

    /// Which player reply audio is handed to
    pub playback: PlaybackKind,

    /// Outbound HTTP configuration
    pub http: HttpConfig,

    /// HTTP API server configuration
    pub server: ServerConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Prompt and model selection for a consultation
#[derive(Debug, Clone)]
pub struct ConsultConfig {
    /// Role-play instructions prepended to the transcript
    pub persona_prompt: String,

    /// Multimodal chat model identifier
    pub vision_model: String,

    /// Transcription model identifier
    pub stt_model: String,

    /// Transcription language hint
    pub stt_language: String,
}

impl Default for ConsultConfig {
    fn default() -> Self {
        Self {
            persona_prompt: DEFAULT_PERSONA_PROMPT.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            stt_model: DEFAULT_STT_MODEL.to_string(),
            stt_language: "en".to_string(),
        }
    }
}

/// Speech synthesis provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProviderKind {
    /// Hosted ElevenLabs voices
    #[default]
    ElevenLabs,
    /// Free Google Translate speech front-end
    Gtts,
}

impl TtsProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ElevenLabs => "elevenlabs",
            Self::Gtts => "gtts",
        }
    }
}

impl FromStr for TtsProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "elevenlabs" | "eleven_labs" | "eleven" => Ok(Self::ElevenLabs),
            "gtts" | "google" => Ok(Self::Gtts),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: TtsProviderKind,

    /// ElevenLabs voice identifier
    pub voice_id: String,

    /// ElevenLabs model identifier
    pub model: String,

    /// ElevenLabs output encoding
    pub output_format: String,

    /// Language for the gTTS front-end
    pub language: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProviderKind::default(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model: DEFAULT_TTS_MODEL.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            language: "en".to_string(),
        }
    }
}

/// Where synthesized replies get played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackKind {
    /// Don't play replies (server deployments)
    #[default]
    None,
    /// Spawn `ffplay -nodisp -autoexit`
    Ffplay,
    /// Decode and play on the default output device
    Device,
}

impl PlaybackKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ffplay => "ffplay",
            Self::Device => "device",
        }
    }
}

impl FromStr for PlaybackKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" | "" => Ok(Self::None),
            "ffplay" => Ok(Self::Ffplay),
            "device" | "speaker" => Ok(Self::Device),
            other => Err(Error::Config(format!("unknown player: {other}"))),
        }
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout for every remote call
    pub timeout: Duration,

    pub groq_base_url: String,
    pub elevenlabs_base_url: String,
    pub gtts_base_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            groq_base_url: GROQ_BASE_URL.to_string(),
            elevenlabs_base_url: ELEVENLABS_BASE_URL.to_string(),
            gtts_base_url: GTTS_BASE_URL.to_string(),
        }
    }
}

impl HttpConfig {
    /// Build a `reqwest` client honoring the configured timeout
    ///
    /// # Errors
    ///
    /// Returns error if the TLS backend cannot be initialized
    pub fn client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(Error::from)
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to the demo UI directory
    pub static_dir: Option<PathBuf>,

    /// Directory reply audio files are written to
    pub output_dir: PathBuf,

    /// How long a reply stays in `output_dir`; `None` keeps replies forever
    pub reply_retention: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: None,
            output_dir: default_output_dir(),
            reply_retention: Some(Duration::from_secs(DEFAULT_REPLY_RETENTION_SECS)),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Groq key (vision + transcription)
    pub groq: Option<SecretString>,

    /// `ElevenLabs` key (hosted TTS)
    pub elevenlabs: Option<SecretString>,
}

/// Default reply directory: `~/.local/share/ai-doctor/replies`
fn default_output_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("replies"),
        |d| d.data_dir().join("ai-doctor").join("replies"),
    )
}

impl Config {
    /// Load configuration from `.env`, the process environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if a provider or player name is not recognized
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "failed to load .env"),
        }

        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with precedence env > file > default
    ///
    /// # Errors
    ///
    /// Returns error if a provider or player name is not recognized
    pub fn from_sources<F>(fc: DoctorConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // `KEY=` (a blank line in a .env template) counts as unset
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_keys = ApiKeys {
            groq: env("GROQ_API_KEY")
                .or(fc.api_keys.groq)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            elevenlabs: env("ELEVENLABS_API_KEY")
                .or(fc.api_keys.elevenlabs)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        };

        let consult_defaults = ConsultConfig::default();
        let consult = ConsultConfig {
            persona_prompt: env("DOCTOR_PERSONA_PROMPT")
                .or(fc.consult.persona_prompt)
                .unwrap_or(consult_defaults.persona_prompt),
            vision_model: env("DOCTOR_VISION_MODEL")
                .or(fc.consult.vision_model)
                .unwrap_or(consult_defaults.vision_model),
            stt_model: env("DOCTOR_STT_MODEL")
                .or(fc.consult.stt_model)
                .unwrap_or(consult_defaults.stt_model),
            stt_language: fc
                .consult
                .stt_language
                .unwrap_or(consult_defaults.stt_language),
        };

        let tts_defaults = TtsConfig::default();
        let tts = TtsConfig {
            provider: env("DOCTOR_TTS_PROVIDER")
                .or(fc.tts.provider)
                .map(|s| s.parse::<TtsProviderKind>())
                .transpose()?
                .unwrap_or(tts_defaults.provider),
            voice_id: env("DOCTOR_TTS_VOICE")
                .or(fc.tts.voice_id)
                .unwrap_or(tts_defaults.voice_id),
            model: env("DOCTOR_TTS_MODEL")
                .or(fc.tts.model)
                .unwrap_or(tts_defaults.model),
            output_format: fc.tts.output_format.unwrap_or(tts_defaults.output_format),
            language: fc.tts.language.unwrap_or(tts_defaults.language),
        };

        let playback = env("DOCTOR_PLAYER")
            .or(fc.playback.player)
            .map(|s| s.parse::<PlaybackKind>())
            .transpose()?
            .unwrap_or_default();

        let http_defaults = HttpConfig::default();
        let http = HttpConfig {
            timeout: env("DOCTOR_HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .or(fc.http.timeout_secs)
                .map_or(http_defaults.timeout, Duration::from_secs),
            groq_base_url: fc.http.groq_base_url.unwrap_or(http_defaults.groq_base_url),
            elevenlabs_base_url: fc
                .http
                .elevenlabs_base_url
                .unwrap_or(http_defaults.elevenlabs_base_url),
            gtts_base_url: fc.http.gtts_base_url.unwrap_or(http_defaults.gtts_base_url),
        };

        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            port: env("DOCTOR_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(server_defaults.port),
            static_dir: env("DOCTOR_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            output_dir: env("DOCTOR_OUTPUT_DIR")
                .or(fc.server.output_dir)
                .map_or(server_defaults.output_dir, PathBuf::from),
            // 0 disables the sweep
            reply_retention: env("DOCTOR_REPLY_RETENTION_SECS")
                .and_then(|s| s.parse().ok())
                .or(fc.server.reply_retention_secs)
                .map_or(server_defaults.reply_retention, |secs: u64| {
                    (secs > 0).then_some(Duration::from_secs(secs))
                }),
        };

        if api_keys.groq.is_none() {
            tracing::warn!("GROQ_API_KEY not set; vision and transcription calls will fail");
        }
        if tts.provider == TtsProviderKind::ElevenLabs && api_keys.elevenlabs.is_none() {
            tracing::warn!("ELEVENLABS_API_KEY not set; speech synthesis will fail");
        }

        Ok(Self {
            consult,
            tts,
            playback,
            http,
            server,
            api_keys,
        })
    }
}
