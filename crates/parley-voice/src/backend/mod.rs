//! Synthesis backend traits: engine-agnostic interfaces for speech output.
//!
//! The [`SpeechOrchestrator`](crate::SpeechOrchestrator) operates on trait
//! objects (`Arc<dyn RemoteSynthesizer>`, `Arc<dyn LocalSpeechEngine>`) so that
//! services and engines can be swapped without touching the orchestration
//! logic.
//!
//! ## Backend implementations
//!
//! | Module     | Kind   | Mechanism                                   |
//! |------------|--------|---------------------------------------------|
//! | [`http`]   | remote | `POST {base}/tts`, returns encoded audio    |
//! | [`system`] | local  | `espeak-ng` subprocess, start/end signals   |

pub mod http;
pub mod system;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VoiceError;
use crate::resource::{AudioFormat, AudioResource};
use crate::signal::SignalSender;

// ── Shared types ───────────────────────────────────────────────────

/// A voice offered by the local speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalVoice {
    /// Engine identifier passed back when speaking (e.g. `"en-gb"`).
    pub id: String,

    /// Human-readable name; voice hints are matched against this.
    pub name: String,

    /// Language tag.
    pub language: String,
}

/// One request to the local speech engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalUtterance {
    /// Text to speak (already trimmed).
    pub text: String,

    /// Voice to use; `None` means the engine default.
    pub voice: Option<LocalVoice>,

    /// Rate multiplier (1.0 = normal).
    pub rate: f32,
}

// ── Remote synthesis ───────────────────────────────────────────────

/// Service that renders text to a finite audio resource.
///
/// Implementations must tolerate a previous call being abandoned while still
/// in flight: the orchestrator does not cancel superseded requests, it drops
/// their results.
#[async_trait]
pub trait RemoteSynthesizer: Send + Sync {
    /// Render `text` in the requested container.
    ///
    /// `voice_hint` is forwarded as-is; its meaning belongs to the service.
    async fn synthesize(
        &self,
        text: &str,
        voice_hint: Option<&str>,
        format: AudioFormat,
    ) -> Result<AudioResource, VoiceError>;
}

// ── Local synthesis ────────────────────────────────────────────────

/// Stateful local speech engine with a single process-wide utterance queue.
///
/// Engines queue utterances by default; callers that need immediate
/// supersession must call [`cancel_all`](Self::cancel_all) before
/// [`speak`](Self::speak).
pub trait LocalSpeechEngine: Send + Sync {
    /// Cancel every queued or playing utterance.
    fn cancel_all(&self);

    /// Voices available on this machine.
    fn voices(&self) -> Vec<LocalVoice>;

    /// Start speaking. Progress is reported through `signals`
    /// ([`Started`](crate::BackendSignal::Started) on sound onset, then
    /// `Completed` or `Paused`).
    fn speak(&self, utterance: LocalUtterance, signals: SignalSender) -> Result<(), VoiceError>;
}

// ── Helpers ────────────────────────────────────────────────────────

/// Find the voice whose name equals `hint`, ignoring case.
///
/// Exact match only; returns `None` for a missing or blank hint so the engine
/// default is used.
#[must_use]
pub fn match_voice<'a>(voices: &'a [LocalVoice], hint: Option<&str>) -> Option<&'a LocalVoice> {
    let wanted = hint.map(str::trim).filter(|h| !h.is_empty())?.to_lowercase();
    voices.iter().find(|v| v.name.to_lowercase() == wanted)
}
