//! Trigger and stop phrase detection
//!
//! Pure matching over transcribed phrases: no side effects, no state. The
//! session loop decides what to do with the returned signal.

use crate::PersonaConfig;

/// What a phrase means to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Neither trigger nor stop phrase present
    None,
    /// Trigger word heard; arm command capture
    Triggered,
    /// Stop phrase heard; terminate the session
    Stopped,
}

/// Which phrases to check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectMode {
    /// Listening for the trigger word only
    AwaitTrigger,
    /// Listening for the stop phrase; applies while armed or capturing
    AwaitStop,
}

/// Matches transcribed phrases against the persona's trigger and stop phrases
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    trigger_word: String,
    stop_phrase: String,
}

impl TriggerDetector {
    /// Create a detector from the persona's configured phrases
    #[must_use]
    pub fn new(persona: &PersonaConfig) -> Self {
        Self {
            trigger_word: normalize(&persona.trigger_word),
            stop_phrase: normalize(&persona.stop_phrase),
        }
    }

    /// Evaluate a transcribed phrase in the given mode
    ///
    /// Matching is case-insensitive substring comparison over normalized
    /// text. The stop phrase always takes precedence: a phrase containing
    /// both the trigger word and the stop phrase yields [`Signal::Stopped`].
    #[must_use]
    pub fn evaluate(&self, text: &str, mode: DetectMode) -> Signal {
        let normalized = normalize(text);

        if normalized.contains(&self.stop_phrase) {
            return Signal::Stopped;
        }

        match mode {
            DetectMode::AwaitTrigger if normalized.contains(&self.trigger_word) => {
                Signal::Triggered
            }
            DetectMode::AwaitTrigger | DetectMode::AwaitStop => Signal::None,
        }
    }

    /// The normalized trigger word
    #[must_use]
    pub fn trigger_word(&self) -> &str {
        &self.trigger_word
    }

    /// The normalized stop phrase
    #[must_use]
    pub fn stop_phrase(&self) -> &str {
        &self.stop_phrase
    }
}

/// Lowercase, trim, and strip punctuation, collapsing runs of whitespace
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;

    for c in text.chars() {
        if c.is_alphanumeric() {
            for lower in c.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        } else if c.is_whitespace() && !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
        // Punctuation dropped entirely
    }

    while out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(trigger: &str, stop: &str) -> TriggerDetector {
        TriggerDetector::new(&PersonaConfig {
            trigger_word: trigger.to_string(),
            stop_phrase: stop.to_string(),
            ..PersonaConfig::default()
        })
    }

    #[test]
    fn normalizes_case_whitespace_and_punctuation() {
        assert_eq!(normalize("  Hey, Bob!  "), "hey bob");
        assert_eq!(normalize("STOP."), "stop");
        assert_eq!(normalize("what's   up"), "whats up");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn trigger_matches_as_substring() {
        let d = detector("bob", "stop");
        assert_eq!(d.evaluate("bob", DetectMode::AwaitTrigger), Signal::Triggered);
        assert_eq!(
            d.evaluate("Hey Bob, you there?", DetectMode::AwaitTrigger),
            Signal::Triggered
        );
        assert_eq!(
            d.evaluate("hello there", DetectMode::AwaitTrigger),
            Signal::None
        );
    }

    #[test]
    fn stop_detected_in_both_modes() {
        let d = detector("bob", "stop");
        assert_eq!(d.evaluate("stop", DetectMode::AwaitStop), Signal::Stopped);
        assert_eq!(d.evaluate("STOP!", DetectMode::AwaitTrigger), Signal::Stopped);
        assert_eq!(
            d.evaluate("please stop now", DetectMode::AwaitStop),
            Signal::Stopped
        );
    }

    #[test]
    fn stop_takes_precedence_over_trigger() {
        let d = detector("bob", "stop");
        assert_eq!(
            d.evaluate("bob stop", DetectMode::AwaitTrigger),
            Signal::Stopped
        );
    }

    #[test]
    fn trigger_not_reported_in_await_stop_mode() {
        let d = detector("bob", "stop");
        assert_eq!(d.evaluate("bob", DetectMode::AwaitStop), Signal::None);
    }

    #[test]
    fn multi_word_phrases() {
        let d = detector("hey nova", "that's all");
        assert_eq!(
            d.evaluate("Hey Nova, what's the time?", DetectMode::AwaitTrigger),
            Signal::Triggered
        );
        assert_eq!(
            d.evaluate("ok, that's all.", DetectMode::AwaitStop),
            Signal::Stopped
        );
    }
}
