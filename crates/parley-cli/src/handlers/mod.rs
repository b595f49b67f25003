//! Command handlers.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that build an orchestrator (or call a backend directly)
//!   and format output for the terminal

pub mod health;
pub mod interrupt;
pub mod listen;
pub mod say;
pub mod voices;

use std::time::Duration;

use parley_voice::{PlaybackEvent, SpeakingIndicator, SpeechOrchestrator};
use tokio::sync::mpsc;

/// How often the drain loop checks whether the session is gone.
const SILENCE_POLL: Duration = Duration::from_millis(100);

/// Follow playback events until no session is left.
///
/// Returns `true` if anything was heard. Ctrl-C stops playback.
pub(crate) async fn wait_until_silent(
    speech: &SpeechOrchestrator,
    events: &mut mpsc::UnboundedReceiver<PlaybackEvent>,
    indicator: &mut SpeakingIndicator,
) -> bool {
    let mut heard = indicator.is_speaking();
    loop {
        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(event) = event else { break };
                indicator.apply(event);
                heard |= event == PlaybackEvent::Started;
            }
            _ = tokio::signal::ctrl_c() => {
                speech.stop();
                indicator.clear();
                break;
            }
            () = tokio::time::sleep(SILENCE_POLL) => {
                if !speech.is_active() && !indicator.is_speaking() {
                    break;
                }
            }
        }
    }
    heard
}
