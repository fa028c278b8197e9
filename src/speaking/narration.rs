use std::time::{Duration, Instant};

const MIN_NARRATION: Duration = Duration::from_millis(500);

/// Text-to-speech collaborator. The host polls `has_finished` on each tick and
/// forwards the end of playback to the session.
pub trait Narrator {
    fn is_supported(&self) -> bool;
    fn speak(&mut self, text: &str, now: Instant);
    fn has_finished(&self, now: Instant) -> bool;
    fn cancel(&mut self);
}

/// Estimates how long a reader at `words_per_minute` needs for the text and
/// reports the end once that time has passed. Stands in for a TTS engine on
/// hosts without one; the question is shown on screen meanwhile.
#[derive(Debug, Clone)]
pub struct PacedNarrator {
    words_per_minute: u32,
    ends_at: Option<Instant>,
}

impl PacedNarrator {
    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
            ends_at: None,
        }
    }

    pub fn estimate(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        let ms = words * 60_000 / u64::from(self.words_per_minute);
        Duration::from_millis(ms).max(MIN_NARRATION)
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.ends_at.map(|end| end.saturating_duration_since(now))
    }
}

impl Narrator for PacedNarrator {
    fn is_supported(&self) -> bool {
        true
    }

    fn speak(&mut self, text: &str, now: Instant) {
        self.ends_at = Some(now + self.estimate(text));
    }

    fn has_finished(&self, now: Instant) -> bool {
        self.ends_at.is_some_and(|end| now >= end)
    }

    fn cancel(&mut self) {
        self.ends_at = None;
    }
}

/// No speech available; every narration ends immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct MutedNarrator;

impl Narrator for MutedNarrator {
    fn is_supported(&self) -> bool {
        false
    }

    fn speak(&mut self, _text: &str, _now: Instant) {}

    fn has_finished(&self, _now: Instant) -> bool {
        true
    }

    fn cancel(&mut self) {}
}
