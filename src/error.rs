//! Error types for the consultation gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the consultation gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (including missing credentials)
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or player error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Vision API error
    #[error("vision error: {0}")]
    Vision(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error came out of speech synthesis
    #[must_use]
    pub const fn is_synthesis_failure(&self) -> bool {
        matches!(self, Self::Tts(_))
    }
}
