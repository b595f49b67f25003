//! Audio playback: remote TTS output via `rodio`.
//!
//! Owns the output stream and at most one sink. Lives on the dedicated audio
//! thread (see [`crate::audio_thread`]) because `rodio::OutputStream` is
//! `!Send` on some platforms.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

use crate::error::VoiceError;
use crate::signal::{BackendSignal, SignalSender};

/// Audio output for encoded (mp3/wav) speech.
pub struct AudioPlayback {
    /// rodio output stream (must be kept alive).
    _stream: OutputStream,

    /// Handle used to create sinks.
    stream_handle: OutputStreamHandle,

    /// Current playback sink (if any).
    sink: Option<Arc<Sink>>,

    /// Whether the current sink is still owned by a live playback.
    ///
    /// Replaced on every `play` so a watcher left over from an earlier sink
    /// can never report completion for a newer one.
    is_playing: Arc<AtomicBool>,
}

impl AudioPlayback {
    /// Open the default output device.
    pub fn new() -> Result<Self, VoiceError> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| VoiceError::OutputStreamError(e.to_string()))?;

        tracing::info!("Audio playback initialized on default output device");

        Ok(Self {
            _stream: stream,
            stream_handle,
            sink: None,
            is_playing: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Decode and play `bytes`, replacing anything currently playing.
    ///
    /// Sends `Started` once the decoded source is queued on a fresh sink and
    /// `Completed` when the sink drains naturally. Nothing is sent for a sink
    /// that is stopped.
    pub fn play(&mut self, bytes: Bytes, signals: SignalSender) -> Result<(), VoiceError> {
        self.stop();

        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|e| VoiceError::Playback(format!("decode failed: {e}")))?;

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| VoiceError::OutputStreamError(e.to_string()))?;
        sink.append(source);

        let is_playing = Arc::new(AtomicBool::new(true));
        let sink = Arc::new(sink);
        self.is_playing = Arc::clone(&is_playing);
        self.sink = Some(Arc::clone(&sink));

        tracing::debug!(session = %signals.session(), "Audio playback started");
        signals.send(BackendSignal::Started);

        Self::spawn_completion_watcher(sink, is_playing, signals);
        Ok(())
    }

    /// Block a helper thread until the sink drains or is stopped. Only a
    /// natural drain reports `Completed`.
    fn spawn_completion_watcher(
        sink: Arc<Sink>,
        is_playing: Arc<AtomicBool>,
        signals: SignalSender,
    ) {
        // `sleep_until_end()` returns immediately once `stop()` drops the
        // sink's sources, so the thread never outlives a stopped playback.
        std::thread::spawn(move || {
            sink.sleep_until_end();

            if !is_playing.swap(false, Ordering::SeqCst) {
                return;
            }

            tracing::debug!(session = %signals.session(), "Playback finished naturally");
            signals.send(BackendSignal::Completed);
        });
    }

    /// Stop any active playback immediately.
    pub fn stop(&mut self) {
        self.is_playing.store(false, Ordering::SeqCst);
        if let Some(sink) = self.sink.take() {
            sink.stop();
            tracing::debug!("Audio playback stopped");
        }
    }

    /// Check whether audio is currently playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| !sink.empty())
    }
}
