//! Listen command handler.
//!
//! Reads utterances from stdin, one per line, the way a chat client feeds
//! completed assistant replies. Each new line interrupts the previous one;
//! repeated lines are ignored.

use anyhow::Result;
use parley_voice::{PlaybackEvent, SpeakingIndicator};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::bootstrap::CliContext;

/// Line commands understood while listening.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Speak(&'a str),
    Stop,
    Quit,
    Blank,
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Blank,
        "/stop" => Input::Stop,
        "/quit" | "/exit" => Input::Quit,
        text => Input::Speak(text),
    }
}

/// Run until `/quit`, end of input, or Ctrl-C.
pub async fn execute(ctx: &CliContext, voice: Option<&str>) -> Result<()> {
    let voice = ctx.voice_hint(voice);
    let (speech, mut events) = ctx.orchestrator();
    let mut indicator = SpeakingIndicator::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Reading utterances from stdin (/stop to silence, /quit to exit)");

    let mut drain = false;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    drain = true;
                    break;
                };
                match classify(&line) {
                    Input::Speak(text) => {
                        // Supersession is synchronous; the session task runs on its own.
                        let _ = speech.speak(text, voice);
                    }
                    Input::Stop => {
                        speech.stop();
                        if indicator.clear() {
                            eprintln!("[silent]");
                        }
                        if let Err(e) = ctx.remote.interrupt().await {
                            tracing::debug!(error = %e, "Server interrupt failed");
                        }
                    }
                    Input::Quit => break,
                    Input::Blank => {}
                }
            }
            Some(event) = events.recv() => {
                if indicator.apply(event) {
                    let label = if event == PlaybackEvent::Started {
                        "[speaking]"
                    } else {
                        "[silent]"
                    };
                    eprintln!("{label}");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if drain {
        // End of input: let the last utterance finish.
        super::wait_until_silent(&speech, &mut events, &mut indicator).await;
    }

    speech.teardown();
    Ok(())
}
