//! HTTP remote synthesis backend.
//!
//! Talks to the chat server's speech endpoints:
//!
//! | Method | Path         | Use                                        |
//! |--------|--------------|--------------------------------------------|
//! | POST   | `/tts`       | `{ text, voice?, format }` → audio bytes   |
//! | POST   | `/interrupt` | stop server-side generation (404 = no-op)  |
//! | GET    | `/health`    | liveness probe                             |
//! | GET    | `/voices`    | array or `{ "voices": [...] }`             |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use super::RemoteSynthesizer;
use crate::config::{SpeechConfig, normalize_base_url, validate_config};
use crate::error::VoiceError;
use crate::resource::{AudioFormat, AudioResource};

/// Maximum number of response-body characters quoted in an error.
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
    format: AudioFormat,
}

/// Remote synthesizer backed by the chat server's `/tts` endpoint.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSynthesizer {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: normalize_base_url(base_url),
            client,
        })
    }

    /// Create a client from a validated [`SpeechConfig`].
    pub fn from_config(config: &SpeechConfig) -> Result<Self, VoiceError> {
        validate_config(config)?;
        Self::new(&config.api_base, config.remote_timeout())
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Ask the server to abandon in-flight generation.
    ///
    /// Servers without the route answer 404, which counts as success.
    pub async fn interrupt(&self) -> Result<(), VoiceError> {
        let res = self.client.post(self.endpoint("interrupt")).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Server has no /interrupt route, nothing to do");
            return Ok(());
        }
        if !res.status().is_success() {
            return Err(rich_error(res).await);
        }
        Ok(())
    }

    /// `true` if the server answers `/health` with a 2xx status.
    pub async fn health(&self) -> bool {
        match self.client.get(self.endpoint("health")).send().await {
            Ok(res) => res.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Health probe failed");
                false
            }
        }
    }

    /// Voice names the server can synthesize. Empty on any failure.
    pub async fn voices(&self) -> Vec<String> {
        let res = match self.client.get(self.endpoint("voices")).send().await {
            Ok(res) if res.status().is_success() => res,
            Ok(res) => {
                tracing::debug!(status = %res.status(), "Voice list unavailable");
                return Vec::new();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Voice list request failed");
                return Vec::new();
            }
        };

        match res.json::<serde_json::Value>().await {
            Ok(value) => parse_voice_list(&value),
            Err(e) => {
                tracing::debug!(error = %e, "Voice list was not JSON");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl RemoteSynthesizer for HttpSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice_hint: Option<&str>,
        format: AudioFormat,
    ) -> Result<AudioResource, VoiceError> {
        let body = TtsRequest {
            text,
            voice: voice_hint,
            format,
        };

        let res = self
            .client
            .post(self.endpoint("tts"))
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(rich_error(res).await);
        }

        let mime = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map_or_else(|| format.mime().to_string(), str::to_string);

        if mime.starts_with("text/") || mime.contains("json") {
            return Err(VoiceError::RemoteSynthesis(format!(
                "expected audio, got content type {mime}"
            )));
        }

        let bytes = res.bytes().await?;
        if bytes.is_empty() {
            return Err(VoiceError::RemoteSynthesis("empty audio payload".to_string()));
        }

        tracing::debug!(len = bytes.len(), %mime, "Remote synthesis succeeded");
        Ok(AudioResource::new(bytes, mime))
    }
}

/// Build an error quoting the status, URL, and the start of the body.
async fn rich_error(res: reqwest::Response) -> VoiceError {
    let status = res.status();
    let url = res.url().to_string();
    let body = res.text().await.unwrap_or_default();
    let hint: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    let hint = hint.trim();

    if hint.is_empty() {
        VoiceError::RemoteSynthesis(format!("HTTP {status} for {url}"))
    } else {
        VoiceError::RemoteSynthesis(format!("HTTP {status} for {url} — {hint}"))
    }
}

/// Accept either `[...]` or `{ "voices": [...] }`.
fn parse_voice_list(value: &serde_json::Value) -> Vec<String> {
    let items = value
        .as_array()
        .or_else(|| value.get("voices").and_then(serde_json::Value::as_array));

    items
        .map(|items| {
            items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}
