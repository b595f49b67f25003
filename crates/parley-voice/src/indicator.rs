//! "Speaking" indicator folded from orchestrator events.

use crate::orchestrator::PlaybackEvent;

/// Boolean view of the playback event stream.
///
/// Events are applied as a toggle, not counted: a stray `Ended` while already
/// silent changes nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeakingIndicator {
    speaking: bool,
}

impl SpeakingIndicator {
    #[must_use]
    pub const fn new() -> Self {
        Self { speaking: false }
    }

    #[must_use]
    pub const fn is_speaking(self) -> bool {
        self.speaking
    }

    /// Apply an event. Returns `true` if the indicator changed.
    pub const fn apply(&mut self, event: PlaybackEvent) -> bool {
        let next = matches!(event, PlaybackEvent::Started);
        let changed = self.speaking != next;
        self.speaking = next;
        changed
    }

    /// Force the indicator off, e.g. right after the caller interrupts.
    pub const fn clear(&mut self) -> bool {
        let changed = self.speaking;
        self.speaking = false;
        changed
    }
}
