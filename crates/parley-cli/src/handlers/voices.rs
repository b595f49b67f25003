//! Voices command handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use parley_voice::LocalSpeechEngine;

use crate::bootstrap::CliContext;

/// Print server voices, then local engine voices.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let remote = ctx.remote.voices().await;
    println!("Server voices ({}):", ctx.remote.base_url());
    if remote.is_empty() {
        println!("  (none reported)");
    }
    for name in &remote {
        println!("  {name}");
    }

    // Voice listing runs the engine binary synchronously.
    let engine = Arc::clone(&ctx.engine);
    let local = tokio::task::spawn_blocking(move || engine.voices())
        .await
        .context("local voice listing failed")?;

    println!();
    println!("Local voices ({}):", ctx.engine.binary().display());
    if local.is_empty() {
        println!("  (engine unavailable)");
        return Ok(());
    }
    println!("  {:<28} {:<10} Id", "Name", "Language");
    for voice in local {
        println!("  {:<28} {:<10} {}", voice.name, voice.language, voice.id);
    }
    Ok(())
}
