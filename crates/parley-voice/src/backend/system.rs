//! Local speech engine driving the `espeak-ng` binary.
//!
//! Each utterance is one child process. The engine keeps a single-slot queue:
//! speaking a new utterance or calling [`cancel_all`](LocalSpeechEngine::cancel_all)
//! kills the previous child. Signals:
//!
//! - `Started` once the child is running (espeak starts emitting audio
//!   immediately, there is no finer-grained onset notification),
//! - `Completed` on a zero exit status,
//! - `Paused` when the child is killed or exits abnormally.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, OnceLock, PoisonError};

use tokio::sync::oneshot;

use super::{LocalSpeechEngine, LocalUtterance, LocalVoice};
use crate::error::VoiceError;
use crate::signal::{BackendSignal, SignalSender};

/// espeak-ng's default speed in words per minute (rate 1.0).
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Speed bounds accepted by espeak-ng.
const MIN_WORDS_PER_MINUTE: f32 = 80.0;
const MAX_WORDS_PER_MINUTE: f32 = 450.0;

/// Local engine backed by an `espeak-ng` subprocess per utterance.
#[derive(Debug)]
pub struct SystemSpeechEngine {
    binary: PathBuf,
    /// Kill switch for the utterance currently speaking, if any.
    current: Mutex<Option<oneshot::Sender<()>>>,
    voices: OnceLock<Vec<LocalVoice>>,
}

impl SystemSpeechEngine {
    /// Create an engine using `binary` (a name on `PATH` or a full path).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            current: Mutex::new(None),
            voices: OnceLock::new(),
        }
    }

    /// The binary this engine launches.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn take_current(&self) -> Option<oneshot::Sender<()>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn load_voices(&self) -> Vec<LocalVoice> {
        let output = std::process::Command::new(&self.binary)
            .arg("--voices")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        match output {
            Ok(out) if out.status.success() => {
                let voices = parse_voice_table(&String::from_utf8_lossy(&out.stdout));
                tracing::debug!(count = voices.len(), "Loaded local voices");
                voices
            }
            Ok(out) => {
                tracing::debug!(status = %out.status, "Voice listing failed");
                Vec::new()
            }
            Err(e) => {
                tracing::debug!(
                    binary = %self.binary.display(),
                    error = %e,
                    "Local engine unavailable"
                );
                Vec::new()
            }
        }
    }
}

impl Default for SystemSpeechEngine {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ESPEAK_BIN)
    }
}

impl LocalSpeechEngine for SystemSpeechEngine {
    fn cancel_all(&self) {
        if let Some(kill) = self.take_current() {
            // The watcher may already have finished; nothing to cancel then.
            let _ = kill.send(());
            tracing::debug!("Local utterance cancelled");
        }
    }

    fn voices(&self) -> Vec<LocalVoice> {
        self.voices.get_or_init(|| self.load_voices()).clone()
    }

    fn speak(&self, utterance: LocalUtterance, signals: SignalSender) -> Result<(), VoiceError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| VoiceError::LocalSynthesis(format!("no async runtime: {e}")))?;
        let _enter = runtime.enter();

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg("-s").arg(words_per_minute(utterance.rate).to_string());
        if let Some(ref voice) = utterance.voice {
            cmd.arg("-v").arg(&voice.id);
        }
        cmd.arg("--")
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            VoiceError::LocalSynthesis(format!("failed to launch {}: {e}", self.binary.display()))
        })?;

        let (kill_tx, kill_rx) = oneshot::channel();
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(kill_tx);
        if let Some(previous) = previous {
            let _ = previous.send(());
        }

        tracing::debug!(
            session = %signals.session(),
            voice = utterance.voice.as_ref().map(|v| v.id.as_str()),
            "Local utterance started"
        );
        signals.send(BackendSignal::Started);

        runtime.spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => signals.send(BackendSignal::Completed),
                    Ok(status) => {
                        tracing::debug!(%status, "Local engine exited abnormally");
                        signals.send(BackendSignal::Paused);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Lost track of local engine process");
                        signals.send(BackendSignal::Paused);
                    }
                },
                // Fires on cancel and when the engine itself is dropped.
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(error = %e, "Failed to kill local engine process");
                    }
                    signals.send(BackendSignal::Paused);
                }
            }
        });

        Ok(())
    }
}

/// Map a rate multiplier onto espeak-ng's words-per-minute scale.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn words_per_minute(rate: f32) -> u32 {
    let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
    (BASE_WORDS_PER_MINUTE * rate)
        .clamp(MIN_WORDS_PER_MINUTE, MAX_WORDS_PER_MINUTE)
        .round() as u32
}

/// Parse the table printed by `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
///  2  en-gb           --/M      English_(Great_Britain) gmw/en            (en 2)
/// ```
fn parse_voice_table(table: &str) -> Vec<LocalVoice> {
    table
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _priority = fields.next()?;
            let language = fields.next()?;
            let _age_gender = fields.next()?;
            let name = fields.next()?;
            Some(LocalVoice {
                id: language.to_string(),
                name: name.to_string(),
                language: language.to_string(),
            })
        })
        .collect()
}
