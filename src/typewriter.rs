//! Typewriter reveal of dialogue text
//!
//! A [`Typewriter`] is an explicit handle for one reveal. Time is fed in
//! through [`Typewriter::tick`]; there is no timer to leak, so cancelling
//! or dropping the handle stops the reveal for good.

use std::time::Duration;

/// Default delay between two revealed characters
pub const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(30);

/// Progress reported by a running reveal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reveal {
    /// Text revealed so far
    Partial(String),
    /// Full text; reported exactly once per reveal
    Finished(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevealState {
    Running,
    Finished,
    Cancelled,
}

/// Character-by-character reveal of one framed line
#[derive(Debug, Clone)]
pub struct Typewriter {
    speaker: Option<String>,
    text: String,
    total_chars: usize,
    revealed: usize,
    char_delay: Duration,
    carry: Duration,
    state: RevealState,
}

impl Typewriter {
    /// Start a reveal. `text` must already be interpolated.
    pub fn new(text: &str, speaker: Option<&str>, char_delay: Duration) -> Self {
        let text = frame(speaker, text);
        Self {
            speaker: speaker.map(str::to_string),
            total_chars: text.chars().count(),
            text,
            revealed: 0,
            char_delay,
            carry: Duration::ZERO,
            state: RevealState::Running,
        }
    }

    /// Advance the reveal by the elapsed time
    pub fn tick(&mut self, elapsed: Duration) -> Option<Reveal> {
        if self.state != RevealState::Running {
            return None;
        }

        if self.char_delay.is_zero() {
            self.revealed = self.total_chars;
        } else {
            self.carry += elapsed;
            let steps = (self.carry.as_nanos() / self.char_delay.as_nanos()) as usize;
            if steps > 0 {
                self.revealed = (self.revealed + steps).min(self.total_chars);
                self.carry = self
                    .carry
                    .saturating_sub(self.char_delay.saturating_mul(steps as u32));
            }
        }

        if self.revealed >= self.total_chars {
            return self.finish();
        }
        Some(Reveal::Partial(self.visible().to_string()))
    }

    /// Reveal everything now. Returns the finished event unless it already fired.
    pub fn skip_to_end(&mut self) -> Option<Reveal> {
        if self.state != RevealState::Running {
            return None;
        }
        self.revealed = self.total_chars;
        self.finish()
    }

    /// Stop without a finished event
    pub fn cancel(&mut self) {
        if self.state == RevealState::Running {
            self.state = RevealState::Cancelled;
        }
    }

    fn finish(&mut self) -> Option<Reveal> {
        self.state = RevealState::Finished;
        Some(Reveal::Finished(self.text.clone()))
    }

    /// Currently visible prefix of the framed text
    pub fn visible(&self) -> &str {
        match self.text.char_indices().nth(self.revealed) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.state == RevealState::Running
    }

    pub fn is_finished(&self) -> bool {
        self.state == RevealState::Finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == RevealState::Cancelled
    }
}

/// Terminal framing: `> text` for narration, `Speaker: text` otherwise
pub fn frame(speaker: Option<&str>, text: &str) -> String {
    match speaker {
        Some(speaker) => format!("{speaker}: {text}"),
        None => format!("> {text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    #[test]
    fn frames_narration_and_speech() {
        assert_eq!(frame(None, "Hello"), "> Hello");
        assert_eq!(frame(Some("Doctor"), "Hello"), "Doctor: Hello");
    }

    #[test]
    fn reveals_one_char_per_delay() {
        let mut tw = Typewriter::new("abc", None, TICK);
        assert_eq!(tw.tick(TICK), Some(Reveal::Partial(">".to_string())));
        assert_eq!(tw.tick(TICK), Some(Reveal::Partial("> ".to_string())));
        assert_eq!(tw.tick(TICK * 2), Some(Reveal::Partial("> ab".to_string())));
        assert_eq!(tw.tick(TICK), Some(Reveal::Finished("> abc".to_string())));
        assert!(tw.is_finished());
        assert_eq!(tw.tick(TICK), None);
    }

    #[test]
    fn short_ticks_accumulate() {
        let mut tw = Typewriter::new("abc", None, TICK);
        let half = TICK / 2;
        assert_eq!(tw.tick(half), Some(Reveal::Partial(String::new())));
        assert_eq!(tw.tick(half), Some(Reveal::Partial(">".to_string())));
    }

    #[test]
    fn skip_fires_finished_exactly_once() {
        let mut tw = Typewriter::new("Hello", None, TICK);
        tw.tick(TICK);
        assert_eq!(tw.skip_to_end(), Some(Reveal::Finished("> Hello".to_string())));
        assert_eq!(tw.skip_to_end(), None);
        assert_eq!(tw.tick(TICK), None);
        assert_eq!(tw.visible(), "> Hello");
    }

    #[test]
    fn cancel_suppresses_finished_event() {
        let mut tw = Typewriter::new("Hello", None, TICK);
        tw.tick(TICK);
        tw.cancel();
        assert!(tw.is_cancelled());
        assert_eq!(tw.tick(TICK * 100), None);
        assert_eq!(tw.skip_to_end(), None);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let mut tw = Typewriter::new("闇だ", None, TICK);
        tw.tick(TICK * 3);
        assert_eq!(tw.visible(), "> 闇");
    }

    #[test]
    fn zero_delay_reveals_immediately() {
        let mut tw = Typewriter::new("now", Some("Voice"), Duration::ZERO);
        assert_eq!(
            tw.tick(Duration::ZERO),
            Some(Reveal::Finished("Voice: now".to_string()))
        );
    }
}
