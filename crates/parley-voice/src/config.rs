//! Speech output configuration and validation.
//!
//! [`SpeechConfig`] is a plain serde type with defaults for every field, so a
//! partially specified file or an empty environment still yields a usable
//! configuration. Environment overrides are applied through a lookup closure
//! to keep them testable without touching the process environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resource::AudioFormat;

/// Default base URL of the remote synthesis service.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Default binary used by the local speech engine.
pub const DEFAULT_ESPEAK_BIN: &str = "espeak-ng";

/// Environment variable overriding [`SpeechConfig::api_base`].
pub const ENV_API_BASE: &str = "PARLEY_API_BASE";

/// Environment variable overriding [`SpeechConfig::voice`].
pub const ENV_VOICE: &str = "PARLEY_VOICE";

/// Environment variable overriding [`SpeechConfig::espeak_bin`].
pub const ENV_ESPEAK_BIN: &str = "PARLEY_ESPEAK_BIN";

/// Environment variable overriding [`SpeechConfig::format`] (`mp3` or `wav`).
pub const ENV_FORMAT: &str = "PARLEY_TTS_FORMAT";

/// Speech output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    /// Base URL of the remote synthesis service (no trailing slash).
    pub api_base: String,

    /// Timeout for a single remote synthesis request, in seconds.
    pub remote_timeout_secs: u64,

    /// Audio format requested from the remote service.
    pub format: AudioFormat,

    /// Speaking rate for the local engine (0.5–2.0, 1.0 = normal).
    pub local_rate: f32,

    /// Local engine binary (name on `PATH` or absolute path).
    pub espeak_bin: String,

    /// Default voice hint passed to both backends.
    pub voice: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            remote_timeout_secs: 60,
            format: AudioFormat::Mp3,
            local_rate: 1.0,
            espeak_bin: DEFAULT_ESPEAK_BIN.to_string(),
            voice: None,
        }
    }
}

impl SpeechConfig {
    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Blank values are ignored. An unparseable format is logged and skipped.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base) = read(ENV_API_BASE) {
            self.api_base = normalize_base_url(&base);
        }
        if let Some(voice) = read(ENV_VOICE) {
            self.voice = Some(voice.trim().to_string());
        }
        if let Some(bin) = read(ENV_ESPEAK_BIN) {
            self.espeak_bin = bin.trim().to_string();
        }
        if let Some(format) = read(ENV_FORMAT) {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(e) => tracing::warn!(error = %e, "Ignoring {ENV_FORMAT}"),
            }
        }
    }

    /// Set the base URL, trimming trailing slashes.
    pub fn set_api_base(&mut self, base: &str) {
        self.api_base = normalize_base_url(base);
    }

    /// Remote request timeout as a [`Duration`].
    #[must_use]
    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}

/// Trim whitespace and trailing slashes from a base URL.
#[must_use]
pub fn normalize_base_url(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

/// Speech configuration validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("API base URL cannot be empty")]
    EmptyApiBase,

    #[error("API base URL must start with http:// or https://, got {0}")]
    InvalidApiBase(String),

    #[error("Remote timeout must be at least 1 second")]
    ZeroTimeout,

    #[error("Local speaking rate must be between 0.5 and 2.0, got {0}")]
    InvalidRate(f32),

    #[error("Local engine binary cannot be empty")]
    EmptyEngineBinary,

    #[error("Unknown audio format '{0}' (expected mp3 or wav)")]
    UnknownFormat(String),
}

/// Validate configuration values.
pub fn validate_config(config: &SpeechConfig) -> Result<(), ConfigError> {
    let base = config.api_base.trim();
    if base.is_empty() {
        return Err(ConfigError::EmptyApiBase);
    }
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ConfigError::InvalidApiBase(base.to_string()));
    }

    if config.remote_timeout_secs == 0 {
        return Err(ConfigError::ZeroTimeout);
    }

    if !(0.5..=2.0).contains(&config.local_rate) {
        return Err(ConfigError::InvalidRate(config.local_rate));
    }

    if config.espeak_bin.trim().is_empty() {
        return Err(ConfigError::EmptyEngineBinary);
    }

    Ok(())
}
