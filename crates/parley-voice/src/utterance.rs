//! Utterance normalization.

/// One accepted unit of text to be spoken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    text: String,
    voice_hint: Option<String>,
}

impl Utterance {
    /// Normalize a candidate value from the utterance source.
    ///
    /// Returns `None` for blank text. A blank voice hint becomes `None`.
    #[must_use]
    pub fn new(text: &str, voice_hint: Option<&str>) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let voice_hint = voice_hint
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .map(str::to_string);
        Some(Self {
            text: text.to_string(),
            voice_hint,
        })
    }

    /// Trimmed, non-empty text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn voice_hint(&self) -> Option<&str> {
        self.voice_hint.as_deref()
    }

    /// Identical utterances share trimmed text; the voice hint is ignored.
    #[must_use]
    pub fn is_repeat_of(&self, last_accepted: Option<&str>) -> bool {
        last_accepted == Some(self.text.as_str())
    }
}
