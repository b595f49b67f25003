//! Say command handler.

use anyhow::{Context, Result};
use parley_voice::SpeakingIndicator;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Speak `text` once and return when it has finished (or Ctrl-C).
pub async fn execute(ctx: &CliContext, text: &str, voice: Option<&str>) -> Result<()> {
    let (speech, mut events) = ctx.orchestrator();

    let Some(task) = speech.speak(text, ctx.voice_hint(voice)) else {
        return Err(CliError::Arguments("nothing to say".into()).into());
    };
    task.await.context("speech session task failed")?;

    let mut indicator = SpeakingIndicator::new();
    let heard = super::wait_until_silent(&speech, &mut events, &mut indicator).await;
    speech.teardown();

    if !heard {
        return Err(CliError::Unavailable(format!(
            "Could not speak: {} did not synthesize and {} is unavailable",
            ctx.config.api_base, ctx.config.espeak_bin
        ))
        .into());
    }
    Ok(())
}
