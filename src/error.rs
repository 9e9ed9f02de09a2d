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

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Microphone capture failure (fatal to the session)
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Speech-to-text failure
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    /// Completion backend failure
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Speech synthesis or playback failure
    #[error(transparent)]
    Playback(#[from] PlaybackError),

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

/// Microphone capture errors
///
/// These are fatal: the session cannot continue without a working input
/// device, so the loop terminates after flushing its logs.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No usable input device
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),

    /// The capture stream failed mid-session
    #[error("capture stream failed: {0}")]
    StreamFailed(String),
}

/// Speech-to-text errors
///
/// Recoverable: the phrase is discarded and the session stays in its
/// current listening state.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Audio contained no recognizable speech
    #[error("empty transcript")]
    EmptyTranscript,

    /// The STT backend rejected or failed the request
    #[error("transcription failed: {0}")]
    Backend(String),
}

/// Completion backend errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Retryable failure (network, rate limit, 5xx)
    #[error("transient engine error: {0}")]
    Transient(String),

    /// Credentials rejected; retrying cannot help
    #[error("engine authentication failed: {0}")]
    Authentication(String),

    /// Response body could not be interpreted
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),
}

impl EngineError {
    /// Whether this failure is eligible for the single bounded retry
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Speech synthesis and playback errors
///
/// Logged but non-fatal: the session returns to listening.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// TTS synthesis request failed
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    /// Local audio output failed
    #[error("audio playback failed: {0}")]
    Output(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(EngineError::Transient("timeout".into()).is_transient());
        assert!(!EngineError::Authentication("bad key".into()).is_transient());
        assert!(!EngineError::MalformedResponse("no choices".into()).is_transient());
    }
}
