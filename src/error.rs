//! Error types for the Aura voice pipeline

use thiserror::Error;

/// Result type alias for Aura operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing/invalid cloud credentials, bad settings).
    /// Fails the specific operation immediately; never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transient backend failure (network error, rejected session, API error)
    #[error("backend error: {0}")]
    Backend(String),

    /// Microphone access denied or capture device unavailable.
    /// Fatal for the current recognition session.
    #[error("permission error: {0}")]
    Permission(String),

    /// No backend supports the requested capability
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Voice resolution error
    #[error("voice error: {0}")]
    Voice(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Short stable code for surfacing to a UI layer
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Backend(_) => "backend",
            Self::Permission(_) => "permission",
            Self::Unsupported(_) => "unsupported",
            Self::Voice(_) => "voice",
            Self::Audio(_) => "audio",
            Self::Stt(_) => "stt",
            Self::Tts(_) => "tts",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Serialization(_) => "serialization",
            Self::Toml(_) => "toml",
        }
    }
}
