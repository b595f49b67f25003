//! Health command handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use parley_voice::LocalSpeechEngine;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Probe the server and the local engine. Fails only if neither can speak.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let server_up = ctx.remote.health().await;

    let engine = Arc::clone(&ctx.engine);
    let local_voices = tokio::task::spawn_blocking(move || engine.voices().len())
        .await
        .context("local engine probe failed")?;

    println!(
        "Server  {:<40} {}",
        ctx.remote.base_url(),
        if server_up { "up" } else { "unreachable" }
    );
    println!(
        "Engine  {:<40} {}",
        ctx.engine.binary().display(),
        if local_voices > 0 {
            format!("{local_voices} voices")
        } else {
            "unavailable".to_string()
        }
    );

    if !server_up && local_voices == 0 {
        return Err(CliError::Unavailable("No speech backend available".into()).into());
    }
    Ok(())
}
