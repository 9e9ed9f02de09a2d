//! Persona configuration
//!
//! The persona conditions both the completion backend (system prompt) and
//! speech synthesis (voice id), and carries the spoken trigger and stop
//! phrases. Immutable after load.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Identity and activation phrases for the assistant
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaConfig {
    /// Spoken phrase that arms command capture
    pub trigger_word: String,

    /// Spoken phrase that terminates the session from any listening state
    #[serde(default = "default_stop_phrase")]
    pub stop_phrase: String,

    /// System prompt sent to the completion backend on every request
    pub persona_prompt: String,

    /// TTS voice identifier
    #[serde(default)]
    pub voice_id: String,
}

fn default_stop_phrase() -> String {
    "stop".to_string()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            trigger_word: "bob".to_string(),
            stop_phrase: default_stop_phrase(),
            persona_prompt: "You're a nice guy called Bob. Keep replies short and spoken-friendly."
                .to_string(),
            voice_id: String::new(),
        }
    }
}

impl PersonaConfig {
    /// Validate the persona after load
    ///
    /// # Errors
    ///
    /// Returns error if the trigger word or stop phrase is empty, or if the
    /// two collide (a trigger that contains its own stop phrase could never
    /// arm the session).
    pub fn validate(&self) -> Result<()> {
        if self.trigger_word.trim().is_empty() {
            return Err(Error::Config("triggerWord must not be empty".to_string()));
        }
        if self.stop_phrase.trim().is_empty() {
            return Err(Error::Config("stopPhrase must not be empty".to_string()));
        }

        let trigger = self.trigger_word.trim().to_lowercase();
        let stop = self.stop_phrase.trim().to_lowercase();
        if trigger.contains(&stop) || stop.contains(&trigger) {
            return Err(Error::Config(format!(
                "triggerWord \"{}\" and stopPhrase \"{}\" overlap",
                self.trigger_word, self.stop_phrase
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_persona_is_valid() {
        assert!(PersonaConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_trigger_rejected() {
        let persona = PersonaConfig {
            trigger_word: "  ".to_string(),
            ..PersonaConfig::default()
        };
        assert!(persona.validate().is_err());
    }

    #[test]
    fn overlapping_phrases_rejected() {
        let persona = PersonaConfig {
            trigger_word: "stop it".to_string(),
            stop_phrase: "stop".to_string(),
            ..PersonaConfig::default()
        };
        assert!(persona.validate().is_err());
    }

    #[test]
    fn camel_case_serde() {
        let toml = r#"
            triggerWord = "hey nova"
            stopPhrase = "goodbye"
            personaPrompt = "You are Nova."
            voiceId = "nova-1"
        "#;
        let persona: PersonaConfig = toml::from_str(toml).unwrap();
        assert_eq!(persona.trigger_word, "hey nova");
        assert_eq!(persona.voice_id, "nova-1");
        assert!(persona.validate().is_ok());
    }
}
