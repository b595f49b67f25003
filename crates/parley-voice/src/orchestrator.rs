//! Speech orchestrator: decides what to speak, on which backend, and when
//! to stop.
//!
//! Each accepted utterance gets one playback session:
//!
//! ```text
//!   idle → requestingRemote ─┬→ playingRemote ──────────────┬→ ended
//!                            └→ requestingLocal → playingLocal ┘
//!
//!   stop() / supersession / teardown: any state → idle (resources released)
//! ```
//!
//! Remote synthesis is always tried first; the local engine is used only when
//! the remote attempt fails, and only once. At most one session exists at a
//! time. Accepting an utterance, superseding the previous session and stopping
//! are synchronous; the remote request and all backend signals are handled
//! asynchronously on the tokio runtime.
//!
//! # Locking discipline
//!
//! All state lives behind one `std::sync::Mutex` that is never held across an
//! `.await`. Backends report progress through [`SignalSender`]s that enqueue
//! onto a channel drained by a pump task, so a backend calling back from inside
//! `play`/`speak` can never re-enter the lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::http::HttpSynthesizer;
use crate::backend::system::SystemSpeechEngine;
use crate::backend::{
    LocalSpeechEngine, LocalUtterance, LocalVoice, RemoteSynthesizer, match_voice,
};
use crate::config::SpeechConfig;
use crate::error::VoiceError;
use crate::player::{AudioPlayer, RodioPlayer};
use crate::resource::{AudioFormat, AudioResource};
use crate::signal::{self, BackendSignal, SessionId, SignalMessage, SignalSender};
use crate::utterance::Utterance;

// ── Public types ───────────────────────────────────────────────────

/// Events emitted for the current session only.
///
/// Consumers (e.g. a "speaking" indicator) should treat them as a boolean
/// toggle rather than counting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Audio is actually producing sound.
    Started,

    /// The session that emitted `Started` is over (completed, paused,
    /// stopped, or superseded).
    Ended,
}

/// Which synthesis mechanism a session is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Backend {
    Remote,
    Local,
}

/// Phase of the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Waiting for remote synthesis (or for the player to report onset).
    RequestingRemote,

    /// Remote audio is audible.
    PlayingRemote,

    /// Local engine asked to speak, onset not yet reported.
    RequestingLocal,

    /// Local engine is audible.
    PlayingLocal,
}

/// Tunables applied to every session.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Container requested from the remote synthesizer.
    pub format: AudioFormat,

    /// Rate passed to the local engine.
    pub local_rate: f32,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            format: AudioFormat::Mp3,
            local_rate: 1.0,
        }
    }
}

impl From<&SpeechConfig> for OrchestratorOptions {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            format: config.format,
            local_rate: config.local_rate,
        }
    }
}

/// The three collaborators an orchestrator drives.
#[derive(Clone)]
pub struct SpeechBackends {
    pub remote: Arc<dyn RemoteSynthesizer>,
    pub local: Arc<dyn LocalSpeechEngine>,
    pub player: Arc<dyn AudioPlayer>,
}

impl SpeechBackends {
    /// HTTP synthesis, espeak-ng fallback, and rodio output from `config`.
    pub fn from_config(config: &SpeechConfig) -> Result<Self, VoiceError> {
        Ok(Self {
            remote: Arc::new(HttpSynthesizer::from_config(config)?),
            local: Arc::new(SystemSpeechEngine::new(config.espeak_bin.clone())),
            player: Arc::new(RodioPlayer::new()),
        })
    }
}

// ── Internal state ─────────────────────────────────────────────────

struct Session {
    id: SessionId,
    backend: Option<Backend>,
    phase: SessionPhase,
    started: bool,
    /// Remote audio bound to this session; dropped exactly once, in
    /// [`Shared::release_session`].
    resource: Option<AudioResource>,
}

#[derive(Default)]
struct State {
    /// Trimmed text of the last accepted utterance (even if it failed).
    last_accepted: Option<String>,
    next_session: u64,
    session: Option<Session>,
    torn_down: bool,
}

impl State {
    fn begin_session(&mut self) -> SessionId {
        self.next_session += 1;
        let id = SessionId::new(self.next_session);
        self.session = Some(Session {
            id,
            backend: None,
            phase: SessionPhase::RequestingRemote,
            started: false,
            resource: None,
        });
        id
    }

    fn current_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.session.as_mut().filter(|s| s.id == id)
    }
}

/// Why a session is being released.
#[derive(Debug, Clone, Copy)]
enum ReleaseReason {
    Finished,
    Abandoned,
    Stopped,
    Superseded,
    TornDown,
}

enum RemoteOutcome {
    Playing,
    Stale,
    Failed(VoiceError),
}

struct Shared {
    state: Mutex<State>,
    /// Runtime captured at construction; sessions run here whichever thread
    /// calls `speak`.
    runtime: Handle,
    backends: SpeechBackends,
    options: OrchestratorOptions,
    event_tx: mpsc::UnboundedSender<PlaybackEvent>,
    signal_tx: mpsc::UnboundedSender<SignalMessage>,
}

// ── Orchestrator ───────────────────────────────────────────────────

/// Plays at most one utterance at a time, remote first with local fallback.
///
/// Never returns errors: backend failures are recovered (fallback) or
/// abandoned silently and logged at debug level.
pub struct SpeechOrchestrator {
    shared: Arc<Shared>,
    pump: JoinHandle<()>,
}

impl SpeechOrchestrator {
    /// Create an orchestrator and the receiver for its [`PlaybackEvent`]s.
    ///
    /// Must be called from within a tokio runtime. That runtime applies
    /// backend signals and runs every session, so the returned orchestrator
    /// may be used from any thread afterwards.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(
        backends: SpeechBackends,
        options: OrchestratorOptions,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = signal::channel();

        let runtime = Handle::current();
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            runtime,
            backends,
            options,
            event_tx,
            signal_tx,
        });

        let pump = shared
            .runtime
            .spawn(pump_signals(Arc::downgrade(&shared), signal_rx));

        (Self { shared, pump }, event_rx)
    }

    /// Offer a new candidate utterance.
    ///
    /// Blank text, text equal to the last accepted utterance, and calls after
    /// [`teardown`](Self::teardown) are ignored and return `None`. Otherwise
    /// the utterance is accepted and any current session superseded before
    /// this returns; synthesis continues on the returned task.
    ///
    /// Safe to call from threads outside the runtime.
    pub fn speak(&self, text: &str, voice_hint: Option<&str>) -> Option<JoinHandle<()>> {
        let utterance = Utterance::new(text, voice_hint)?;

        let id = {
            let mut state = self.shared.lock();
            if state.torn_down {
                tracing::debug!("Orchestrator torn down, ignoring utterance");
                return None;
            }
            if utterance.is_repeat_of(state.last_accepted.as_deref()) {
                tracing::debug!("Ignoring repeated utterance");
                return None;
            }
            state.last_accepted = Some(utterance.text().to_string());
            self.shared.release_session(&mut state, ReleaseReason::Superseded);
            state.begin_session()
        };

        tracing::info!(
            session = %id,
            chars = utterance.text().chars().count(),
            voice = utterance.voice_hint(),
            "Utterance accepted"
        );

        let shared = Arc::clone(&self.shared);
        Some(self.shared.runtime.spawn(async move {
            shared.run_session(id, utterance).await;
        }))
    }

    /// Silence whatever is playing and release the session's resources.
    ///
    /// Idempotent. `Ended` (if the session had started) is delivered through
    /// the event channel, not on this call's stack; callers that need their
    /// UI state updated synchronously must do it themselves.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        if state.session.is_none() {
            return;
        }
        self.shared.release_session(&mut state, ReleaseReason::Stopped);
        tracing::info!("Speech output stopped");
    }

    /// End-of-life release. Stops playback, drops every resource, and makes
    /// further [`speak`](Self::speak) calls no-ops. Also runs on drop.
    pub fn teardown(&self) {
        {
            let mut state = self.shared.lock();
            if state.torn_down {
                return;
            }
            state.torn_down = true;
            self.shared.release_session(&mut state, ReleaseReason::TornDown);
            // Nothing may keep talking after us, whoever queued it.
            self.shared.backends.local.cancel_all();
        }
        self.pump.abort();
        tracing::info!("Speech orchestrator torn down");
    }

    /// Whether a session currently exists (requesting or playing).
    pub fn is_active(&self) -> bool {
        self.shared.lock().session.is_some()
    }

    /// Backend of the current session, once chosen.
    pub fn backend(&self) -> Option<Backend> {
        self.shared.lock().session.as_ref().and_then(|s| s.backend)
    }

    /// Phase of the current session.
    pub fn phase(&self) -> Option<SessionPhase> {
        self.shared.lock().session.as_ref().map(|s| s.phase)
    }

    /// Identity of the current session.
    pub fn current_session(&self) -> Option<SessionId> {
        self.shared.lock().session.as_ref().map(|s| s.id)
    }

    /// Trimmed text of the last accepted utterance.
    pub fn last_accepted(&self) -> Option<String> {
        self.shared.lock().last_accepted.clone()
    }
}

impl Drop for SpeechOrchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ── Session driver ─────────────────────────────────────────────────

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, id: SessionId) -> bool {
        self.lock().session.as_ref().is_some_and(|s| s.id == id)
    }

    fn signal_sender(&self, id: SessionId) -> SignalSender {
        SignalSender::new(id, self.signal_tx.clone())
    }

    async fn run_session(&self, id: SessionId, utterance: Utterance) {
        if !self.is_current(id) {
            tracing::debug!(session = %id, "Superseded before remote request");
            return;
        }

        let result = self
            .backends
            .remote
            .synthesize(utterance.text(), utterance.voice_hint(), self.options.format)
            .await;

        let failure = match result {
            Ok(resource) => match self.start_remote(id, resource).await {
                RemoteOutcome::Playing | RemoteOutcome::Stale => return,
                RemoteOutcome::Failed(e) => e,
            },
            Err(e) => e,
        };
        tracing::debug!(
            session = %id,
            error = %failure,
            "Remote attempt failed, falling back to local engine"
        );

        if !self.is_current(id) {
            tracing::debug!(session = %id, "Superseded before local fallback");
            return;
        }
        let voices = self.local_voices().await;
        self.start_local(id, &utterance, &voices);
    }

    /// Open the output device off the runtime workers, then bind the resource
    /// to the session and hand it to the player. A resource for a superseded
    /// session is released without playing.
    async fn start_remote(&self, id: SessionId, resource: AudioResource) -> RemoteOutcome {
        let player = Arc::clone(&self.backends.player);
        let prepared = match tokio::task::spawn_blocking(move || player.prepare()).await {
            Ok(prepared) => prepared,
            Err(e) => Err(VoiceError::Playback(format!("output setup task failed: {e}"))),
        };
        if let Err(e) = prepared {
            return RemoteOutcome::Failed(e);
        }

        let mut state = self.lock();
        let Some(session) = state.current_mut(id) else {
            tracing::debug!(session = %id, "Discarding stale remote response");
            return RemoteOutcome::Stale;
        };

        match self.backends.player.play(&resource, self.signal_sender(id)) {
            Ok(()) => {
                session.backend = Some(Backend::Remote);
                session.resource = Some(resource);
                tracing::debug!(session = %id, "Remote audio handed to player");
                RemoteOutcome::Playing
            }
            Err(e) => RemoteOutcome::Failed(e),
        }
    }

    /// Voice listing may run the engine binary; keep it off the workers.
    async fn local_voices(&self) -> Vec<LocalVoice> {
        let local = Arc::clone(&self.backends.local);
        tokio::task::spawn_blocking(move || local.voices())
            .await
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Local voice listing task failed");
                Vec::new()
            })
    }

    /// Fallback: cancel the engine queue, pick a voice, speak. No further
    /// fallback exists; a failure here abandons the utterance.
    fn start_local(&self, id: SessionId, utterance: &Utterance, voices: &[LocalVoice]) {
        let voice = match_voice(voices, utterance.voice_hint()).cloned();
        if voice.is_none() && utterance.voice_hint().is_some() {
            tracing::debug!(
                session = %id,
                hint = utterance.voice_hint(),
                "No local voice matches hint, using default"
            );
        }
        let request = LocalUtterance {
            text: utterance.text().to_string(),
            voice,
            rate: self.options.local_rate,
        };

        let mut state = self.lock();
        let Some(session) = state.current_mut(id) else {
            tracing::debug!(session = %id, "Superseded while listing local voices");
            return;
        };
        session.backend = Some(Backend::Local);
        session.phase = SessionPhase::RequestingLocal;

        let local = &self.backends.local;
        local.cancel_all();
        if let Err(e) = local.speak(request, self.signal_sender(id)) {
            tracing::debug!(
                session = %id,
                error = %e,
                "Local synthesis failed, abandoning utterance"
            );
            self.release_session(&mut state, ReleaseReason::Abandoned);
        }
    }

    fn apply_signal(&self, id: SessionId, signal: BackendSignal) {
        let mut state = self.lock();
        let Some(session) = state.current_mut(id) else {
            tracing::trace!(session = %id, ?signal, "Ignoring signal from stale session");
            return;
        };

        match signal {
            BackendSignal::Started => {
                if session.started {
                    return;
                }
                session.started = true;
                session.phase = match session.backend {
                    Some(Backend::Local) => SessionPhase::PlayingLocal,
                    _ => SessionPhase::PlayingRemote,
                };
                tracing::debug!(session = %id, phase = ?session.phase, "Playback audible");
                self.emit(PlaybackEvent::Started);
            }
            BackendSignal::Paused | BackendSignal::Completed => {
                tracing::debug!(session = %id, ?signal, "Playback over");
                self.release_session(&mut state, ReleaseReason::Finished);
            }
        }
    }

    /// The single release path shared by completion, stop, supersession and
    /// teardown: halt the active backend, drop the resource, then emit
    /// `Ended` if (and only if) the session had started.
    fn release_session(&self, state: &mut State, reason: ReleaseReason) {
        let Some(session) = state.session.take() else {
            return;
        };

        match session.backend {
            Some(Backend::Remote) => self.backends.player.stop(),
            Some(Backend::Local) => self.backends.local.cancel_all(),
            None => {}
        }

        let Session {
            id,
            started,
            resource,
            ..
        } = session;
        let released = resource.is_some();
        drop(resource);

        tracing::debug!(session = %id, ?reason, released, "Session released");

        if started {
            self.emit(PlaybackEvent::Ended);
        }
    }

    /// Emit a playback event. Best-effort: if the receiver is dropped, we log
    /// and move on).
    fn emit(&self, event: PlaybackEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::warn!("Playback event receiver dropped");
        }
    }
}

/// Apply backend signals until the orchestrator goes away.
async fn pump_signals(shared: Weak<Shared>, mut rx: mpsc::UnboundedReceiver<SignalMessage>) {
    while let Some((session, signal)) = rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.apply_signal(session, signal);
    }
}
