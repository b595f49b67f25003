//! [`AudioPlayer`] trait and the local `rodio` implementation.
//!
//! The player is the output half of the remote backend: it receives an
//! [`AudioResource`] produced by a [`RemoteSynthesizer`](crate::RemoteSynthesizer)
//! and reports sound onset and completion through a [`SignalSender`]. It only
//! borrows the resource; ownership stays with the orchestrator.

use std::sync::{Mutex, PoisonError};

use crate::audio_thread::AudioThreadHandle;
use crate::error::VoiceError;
use crate::resource::AudioResource;
use crate::signal::SignalSender;

/// Abstraction over an audio output for encoded speech.
///
/// All methods take `&self`; implementations use interior mutability.
pub trait AudioPlayer: Send + Sync {
    /// Acquire the output device ahead of [`play`](Self::play).
    ///
    /// May block; callers run it off the async workers. An error means
    /// nothing can be played.
    fn prepare(&self) -> Result<(), VoiceError> {
        Ok(())
    }

    /// Start playing `resource`, replacing anything currently playing.
    ///
    /// An error means no sound will be produced for this resource.
    fn play(&self, resource: &AudioResource, signals: SignalSender) -> Result<(), VoiceError>;

    /// Silence output immediately. Must be idempotent.
    fn stop(&self);
}

/// Plays audio on the default output device.
///
/// The output device is opened lazily by [`prepare`](AudioPlayer::prepare) or
/// the first [`play`](AudioPlayer::play),
/// so constructing a player never fails, and a machine without an output
/// device simply reports a playback error (which the orchestrator treats as a
/// remote failure).
#[derive(Default)]
pub struct RodioPlayer {
    audio: Mutex<Option<AudioThreadHandle>>,
}

impl RodioPlayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the output device has been opened and audio is playing.
    pub fn is_playing(&self) -> bool {
        self.audio
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(AudioThreadHandle::is_playing)
    }
}

impl AudioPlayer for RodioPlayer {
    fn prepare(&self) -> Result<(), VoiceError> {
        let mut audio = self.audio.lock().unwrap_or_else(PoisonError::into_inner);
        open_if_needed(&mut audio).map(|_| ())
    }

    fn play(&self, resource: &AudioResource, signals: SignalSender) -> Result<(), VoiceError> {
        let mut audio = self.audio.lock().unwrap_or_else(PoisonError::into_inner);

        let handle = open_if_needed(&mut audio)?;
        match handle.play(resource.bytes().clone(), signals) {
            Err(VoiceError::AudioThreadDied) => {
                // Reopen on the next attempt.
                audio.take();
                Err(VoiceError::AudioThreadDied)
            }
            other => other,
        }
    }

    fn stop(&self) {
        if let Some(handle) = self
            .audio
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            handle.stop();
        }
    }
}

fn open_if_needed(
    audio: &mut Option<AudioThreadHandle>,
) -> Result<&AudioThreadHandle, VoiceError> {
    if audio.is_none() {
        *audio = Some(AudioThreadHandle::spawn()?);
    }
    audio.as_ref().ok_or(VoiceError::AudioThreadDied)
}
