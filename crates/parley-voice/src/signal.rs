//! Session-scoped backend signals.
//!
//! Backends never call back into the orchestrator directly. Each playback
//! attempt receives a [`SignalSender`] bound to one [`SessionId`]; signals are
//! queued on an unbounded channel and applied later by the orchestrator, which
//! drops any signal whose session is no longer current. This keeps backend
//! callbacks off the orchestrator's lock and makes late signals from a
//! superseded session harmless.

use std::fmt;

use tokio::sync::mpsc;

/// Identity of one playback session. Strictly increasing per orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a backend reports about the utterance it is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSignal {
    /// Audio is actually producing sound.
    Started,

    /// Playback halted before natural completion (treated as the end).
    Paused,

    /// Playback reached its natural end.
    Completed,
}

pub(crate) type SignalMessage = (SessionId, BackendSignal);

/// Sending half handed to a backend for one session.
#[derive(Debug, Clone)]
pub struct SignalSender {
    session: SessionId,
    tx: mpsc::UnboundedSender<SignalMessage>,
}

impl SignalSender {
    pub(crate) const fn new(session: SessionId, tx: mpsc::UnboundedSender<SignalMessage>) -> Self {
        Self { session, tx }
    }

    /// Session this sender reports for.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Report a signal. Best-effort: if the orchestrator is gone the signal
    /// is dropped.
    pub fn send(&self, signal: BackendSignal) {
        if self.tx.send((self.session, signal)).is_err() {
            tracing::trace!(session = %self.session, ?signal, "Signal dropped, orchestrator gone");
        }
    }
}

/// Create the channel carrying backend signals.
pub(crate) fn channel() -> (
    mpsc::UnboundedSender<SignalMessage>,
    mpsc::UnboundedReceiver<SignalMessage>,
) {
    mpsc::unbounded_channel()
}
