//! Dedicated audio output thread. Isolates `!Send` audio resources from the
//! async runtime.
//!
//! `rodio::OutputStream` is `!Send` on some platforms. Rather than using
//! `unsafe impl Send/Sync`, we confine it to a single OS thread and communicate
//! via channels. [`AudioThreadHandle`] is the `Send + Sync` proxy; every call is
//! routed through an [`AudioCommand`] sent to the actor thread.

use std::sync::mpsc;
use std::thread;

use bytes::Bytes;

use crate::error::VoiceError;
use crate::playback::AudioPlayback;
use crate::signal::SignalSender;

// ── Commands ───────────────────────────────────────────────────────

/// A command sent to the audio thread.
enum AudioCommand {
    /// Decode and play encoded audio, replacing the current sink.
    Play {
        bytes: Bytes,
        signals: SignalSender,
        reply: mpsc::Sender<Result<(), VoiceError>>,
    },

    /// Stop any active playback; replies once the sink is silenced.
    Stop { reply: mpsc::Sender<()> },

    /// Query whether audio is currently playing.
    IsPlaying { reply: mpsc::Sender<bool> },

    /// Shut down the audio thread, releasing the output device.
    Shutdown,
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `Send + Sync` handle to the dedicated audio output thread.
///
/// Request–reply methods block the caller until the audio thread responds;
/// the latency is a local channel round trip plus the audio operation itself.
pub struct AudioThreadHandle {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioThreadHandle {
    /// Spawn the audio thread, open the output device, and return the handle.
    ///
    /// Errors from [`AudioPlayback::new`] are propagated back through a
    /// one-shot init channel.
    pub fn spawn() -> Result<Self, VoiceError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), VoiceError>>();

        let thread = thread::Builder::new()
            .name("parley-audio".into())
            .spawn(move || Self::run(&cmd_rx, &init_tx))
            .map_err(|e| {
                VoiceError::OutputStreamError(format!("failed to spawn audio thread: {e}"))
            })?;

        init_rx.recv().map_err(|_| VoiceError::AudioThreadDied)??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    /// Decode and play encoded audio.
    pub fn play(&self, bytes: Bytes, signals: SignalSender) -> Result<(), VoiceError> {
        self.send_and_recv(|reply| AudioCommand::Play {
            bytes,
            signals,
            reply,
        })
    }

    /// Stop playback and wait until the sink is silenced.
    pub fn stop(&self) {
        let _ = self.query(|reply| AudioCommand::Stop { reply });
    }

    /// Check whether audio is currently playing.
    pub fn is_playing(&self) -> bool {
        self.query(|reply| AudioCommand::IsPlaying { reply })
            .unwrap_or(false)
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Send a command expecting a `Result<T, VoiceError>` reply. Channel
    /// failures map to [`VoiceError::AudioThreadDied`].
    fn send_and_recv<T>(
        &self,
        build: impl FnOnce(mpsc::Sender<Result<T, VoiceError>>) -> AudioCommand,
    ) -> Result<T, VoiceError> {
        let (tx, rx) = mpsc::channel();
        self.cmd_tx
            .send(build(tx))
            .map_err(|_| VoiceError::AudioThreadDied)?;
        rx.recv().map_err(|_| VoiceError::AudioThreadDied)?
    }

    /// Like `send_and_recv` for bare-value replies. `None` if the thread is dead.
    fn query<T>(&self, build: impl FnOnce(mpsc::Sender<T>) -> AudioCommand) -> Option<T> {
        let (tx, rx) = mpsc::channel();
        self.cmd_tx.send(build(tx)).ok()?;
        rx.recv().ok()
    }

    // ── Audio thread event loop ────────────────────────────────────

    /// Body of the audio thread. Owns [`AudioPlayback`] for its whole life.
    fn run(cmd_rx: &mpsc::Receiver<AudioCommand>, init_tx: &mpsc::Sender<Result<(), VoiceError>>) {
        let mut playback = match AudioPlayback::new() {
            Ok(p) => p,
            Err(e) => {
                let _ = init_tx.send(Err(e));
                return;
            }
        };

        if init_tx.send(Ok(())).is_err() {
            return;
        }

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::Play {
                    bytes,
                    signals,
                    reply,
                } => {
                    let _ = reply.send(playback.play(bytes, signals));
                }

                AudioCommand::Stop { reply } => {
                    playback.stop();
                    let _ = reply.send(());
                }

                AudioCommand::IsPlaying { reply } => {
                    let _ = reply.send(playback.is_playing());
                }

                AudioCommand::Shutdown => break,
            }
        }

        playback.stop();
        tracing::debug!("Audio thread shutting down");
    }
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
