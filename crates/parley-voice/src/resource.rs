//! Audio resources produced by remote synthesis.
//!
//! An [`AudioResource`] is an exclusively owned handle to encoded audio bytes.
//! Releasing it means dropping it: the handle is neither `Clone` nor `Copy`,
//! so ownership guarantees it is released exactly once. An optional release
//! hook observes the moment of release (used by callers that track buffer
//! lifetimes, and by tests).

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Audio container requested from the remote synthesis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Wire name of the format (`"mp3"` / `"wav"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    /// MIME type used when the server does not report one.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}

/// Callback invoked once when an [`AudioResource`] is released.
pub type ReleaseHook = Box<dyn FnOnce() + Send + 'static>;

/// Encoded audio returned by a remote synthesizer.
pub struct AudioResource {
    bytes: Bytes,
    mime: String,
    on_release: Option<ReleaseHook>,
}

impl AudioResource {
    /// Wrap encoded audio bytes with their MIME type.
    pub fn new(bytes: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
            on_release: None,
        }
    }

    /// Attach a hook that runs when the resource is released.
    #[must_use]
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Encoded audio bytes. Cloning the returned [`Bytes`] is cheap and does
    /// not extend the resource's ownership.
    #[must_use]
    pub const fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// MIME type reported for the audio (e.g. `audio/mpeg`).
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for AudioResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioResource")
            .field("len", &self.bytes.len())
            .field("mime", &self.mime)
            .field("has_release_hook", &self.on_release.is_some())
            .finish()
    }
}

impl Drop for AudioResource {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
        tracing::trace!(len = self.bytes.len(), "Audio resource released");
    }
}
