//! Speech output for parley.
//!
//! Turns a stream of candidate utterances into at most one audible
//! utterance at a time. Text is rendered by a remote synthesis service and
//! played locally; if that fails the on-device speech engine speaks instead.
//! A newer utterance always interrupts the older one, and interested parties
//! observe [`PlaybackEvent::Started`] / [`PlaybackEvent::Ended`] to drive a
//! "speaking" indicator.
//!
//! ```no_run
//! use parley_voice::{OrchestratorOptions, SpeechBackends, SpeechConfig, SpeechOrchestrator};
//!
//! # async fn run() -> Result<(), parley_voice::VoiceError> {
//! let config = SpeechConfig::from_env();
//! let backends = SpeechBackends::from_config(&config)?;
//! let options = OrchestratorOptions::from(&config);
//! let (speech, mut events) = SpeechOrchestrator::new(backends, options);
//!
//! speech.speak("Hello there.", None);
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```
#![deny(unused_crate_dependencies)]

// Used only by integration tests.
#[cfg(test)]
use axum as _;
#[cfg(test)]
use tokio_test as _;

mod audio_thread;
pub mod backend;
pub mod config;
pub mod error;
pub mod indicator;
pub mod orchestrator;
mod playback;
pub mod player;
pub mod resource;
pub mod signal;
pub mod utterance;

// Re-export key types for convenience
pub use backend::http::HttpSynthesizer;
pub use backend::system::SystemSpeechEngine;
pub use backend::{LocalSpeechEngine, LocalUtterance, LocalVoice, RemoteSynthesizer, match_voice};
pub use config::{ConfigError, SpeechConfig, validate_config};
pub use error::VoiceError;
pub use indicator::SpeakingIndicator;
pub use orchestrator::{
    Backend, OrchestratorOptions, PlaybackEvent, SessionPhase, SpeechBackends, SpeechOrchestrator,
};
pub use player::{AudioPlayer, RodioPlayer};
pub use resource::{AudioFormat, AudioResource};
pub use signal::{BackendSignal, SessionId, SignalSender};
pub use utterance::Utterance;
