//! Speech output error types.

use crate::config::ConfigError;

/// Errors that can occur while producing speech output.
///
/// None of these cross the [`SpeechOrchestrator`](crate::SpeechOrchestrator)
/// boundary: the orchestrator recovers from each of them (fallback or silent
/// abandonment) and only logs them.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// The remote synthesis service failed (transport, non-2xx status, or an
    /// unusable payload).
    #[error("Remote synthesis failed: {0}")]
    RemoteSynthesis(String),

    /// The local speech engine refused the utterance or is unavailable.
    #[error("Local synthesis failed: {0}")]
    LocalSynthesis(String),

    /// Failed to open the audio output device.
    #[error("Failed to open audio output stream: {0}")]
    OutputStreamError(String),

    /// The audio resource could not be decoded or played.
    #[error("Audio playback failed: {0}")]
    Playback(String),

    /// The dedicated audio thread exited unexpectedly.
    #[error("Audio thread died unexpectedly")]
    AudioThreadDied,

    /// Invalid speech configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for VoiceError {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteSynthesis(err.to_string())
    }
}
