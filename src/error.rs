//! Error types for Parley

use thiserror::Error;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parley
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error (open/stream failures)
    #[error("audio device error: {0}")]
    Device(String),

    /// No speech onset before the listening window closed
    #[error("no speech detected within the listening window")]
    CaptureTimeout,

    /// The recognizer returned no usable hypothesis
    #[error("could not understand audio")]
    Unrecognized,

    /// Speech recognition backend failure
    #[error("speech recognition error: {0}")]
    Stt(String),

    /// The inference endpoint rejected the credential
    #[error("invalid API credential")]
    Unauthorized,

    /// No inference reply within the request deadline
    #[error("inference request timed out")]
    InferenceTimeout,

    /// Inference backend failure (non-2xx or malformed response)
    #[error("inference error: {0}")]
    Inference(String),

    /// Speech synthesis failure
    #[error("speech synthesis error: {0}")]
    Tts(String),

    /// Audio playback failure
    #[error("playback error: {0}")]
    Playback(String),

    /// A turn is already in flight
    #[error("a turn is already in progress")]
    Busy,

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
