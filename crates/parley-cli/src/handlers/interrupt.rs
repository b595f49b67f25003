//! Interrupt command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;

pub async fn execute(ctx: &CliContext) -> Result<()> {
    ctx.remote.interrupt().await?;
    println!("Interrupt sent to {}", ctx.remote.base_url());
    Ok(())
}
