//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where speech backends are instantiated:
//! - HTTP synthesizer for the chat server
//! - `espeak-ng` local engine
//! - rodio player (output device opened lazily on first playback)
//!
//! Command handlers receive the composed [`CliContext`] and build an
//! orchestrator from it when they need one.

use std::sync::Arc;

use anyhow::Result;
use parley_voice::{
    HttpSynthesizer, OrchestratorOptions, PlaybackEvent, RodioPlayer, SpeechBackends,
    SpeechConfig, SpeechOrchestrator, SystemSpeechEngine, validate_config,
};
use tokio::sync::mpsc;

use crate::error::CliError;
use crate::parser::Cli;

/// Fully composed context for CLI commands.
pub struct CliContext {
    /// Effective configuration (defaults, then environment, then flags).
    pub config: SpeechConfig,
    /// Client for the chat server's speech endpoints.
    pub remote: Arc<HttpSynthesizer>,
    /// Local speech engine.
    pub engine: Arc<SystemSpeechEngine>,
    /// Audio output.
    pub player: Arc<RodioPlayer>,
}

impl CliContext {
    /// Voice hint for a command: the explicit flag, else the configured default.
    pub fn voice_hint<'a>(&'a self, flag: Option<&'a str>) -> Option<&'a str> {
        flag.or(self.config.voice.as_deref())
    }

    /// Build an orchestrator over this context's backends.
    ///
    /// Must be called from within the tokio runtime.
    pub fn orchestrator(&self) -> (SpeechOrchestrator, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let backends = SpeechBackends {
            remote: Arc::clone(&self.remote) as _,
            local: Arc::clone(&self.engine) as _,
            player: Arc::clone(&self.player) as _,
        };
        SpeechOrchestrator::new(backends, OrchestratorOptions::from(&self.config))
    }
}

/// Resolve configuration and compose the backends.
pub fn bootstrap(cli: &Cli) -> Result<CliContext> {
    let mut config = SpeechConfig::from_env();
    cli.apply_to(&mut config);
    validate_config(&config).map_err(CliError::from)?;

    tracing::debug!(
        api_base = %config.api_base,
        format = %config.format,
        engine = %config.espeak_bin,
        "Speech configuration resolved"
    );

    let remote = HttpSynthesizer::from_config(&config).map_err(CliError::from)?;

    Ok(CliContext {
        remote: Arc::new(remote),
        engine: Arc::new(SystemSpeechEngine::new(config.espeak_bin.clone())),
        player: Arc::new(RodioPlayer::new()),
        config,
    })
}
