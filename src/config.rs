//! Configuration management
//!
//! Settings come from a TOML file plus environment variables: the config
//! file carries the persona and voice settings, API keys are read from the
//! environment only and never written to disk.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, PersonaConfig, Result};

/// Parley configuration, immutable after load
#[derive(Debug, Clone)]
pub struct Config {
    /// Active persona
    pub persona: PersonaConfig,

    /// Voice pipeline settings
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Directory for transcript and error logs
    pub data_dir: PathBuf,

    /// Transcript log path (one line per recognized phrase)
    pub transcript_log: PathBuf,

    /// Error log path (one line per failure)
    pub error_log: PathBuf,
}

/// Voice pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceConfig {
    /// STT provider: "whisper" or "deepgram"
    pub stt_provider: String,

    /// STT model identifier
    pub stt_model: String,

    /// Chat completion model identifier
    pub chat_model: String,

    /// Base URL of the OpenAI-compatible chat API
    pub chat_base_url: String,

    /// TTS provider: "openai" or "elevenlabs"
    pub tts_provider: String,

    /// TTS model identifier
    pub tts_model: String,

    /// TTS speed multiplier (OpenAI only)
    pub tts_speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_provider: "whisper".to_string(),
            stt_model: "whisper-1".to_string(),
            chat_model: "llama-3.1-70b-versatile".to_string(),
            chat_base_url: "https://api.groq.com/openai/v1".to_string(),
            tts_provider: "elevenlabs".to_string(),
            tts_model: "eleven_turbo_v2_5".to_string(),
            tts_speed: 1.0,
        }
    }
}

/// API keys for external services, read from the environment
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper STT and `OpenAI` TTS)
    pub openai: Option<String>,

    /// Groq API key (chat completions)
    pub groq: Option<String>,

    /// `ElevenLabs` API key (TTS)
    pub elevenlabs: Option<String>,

    /// Deepgram API key (STT)
    pub deepgram: Option<String>,
}

/// On-disk config file shape
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigFile {
    persona: Option<PersonaConfig>,
    voice: VoiceConfig,
    data_dir: Option<PathBuf>,
}

/// Return the default data directory, creating it if needed
///
/// Uses `~/.local/share/parley/` on Linux.
pub fn default_data_dir() -> PathBuf {
    let data_dir = directories::ProjectDirs::from("dev", "parley", "parley")
        .map_or_else(|| PathBuf::from(".parley"), |d| d.data_dir().to_path_buf());

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::warn!(
            path = %data_dir.display(),
            error = %e,
            "failed to create data directory"
        );
    }

    data_dir
}

impl Config {
    /// Load configuration, optionally from an explicit config file
    ///
    /// When `path` is `None` the default location
    /// (`~/.config/parley/parley.toml`) is tried; a missing file falls back
    /// to the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be read or parsed,
    /// or if the resulting persona fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(Self::read_file(p)?),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Some(Self::read_file(&default_path)?)
                } else {
                    None
                }
            }
        };
        let file = file.unwrap_or_default();

        let persona = file.persona.unwrap_or_default();
        persona.validate()?;

        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok(),
            groq: std::env::var("GROQ_API_KEY").ok(),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY").ok(),
            deepgram: std::env::var("DEEPGRAM_API_KEY").ok(),
        };

        let data_dir = file.data_dir.unwrap_or_else(default_data_dir);
        let transcript_log = data_dir.join("transcript.log");
        let error_log = data_dir.join("error.log");

        Ok(Self {
            persona,
            voice: file.voice,
            api_keys,
            data_dir,
            transcript_log,
            error_log,
        })
    }

    fn read_file(path: &Path) -> Result<ConfigFile> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// API key for the configured chat backend
    ///
    /// Groq preferred; falls back to `OpenAI` when the base URL points there.
    #[must_use]
    pub fn chat_api_key(&self) -> Option<&str> {
        if self.voice.chat_base_url.contains("openai.com") {
            self.api_keys.openai.as_deref()
        } else {
            self.api_keys.groq.as_deref()
        }
    }
}

/// Default config file path (`~/.config/parley/parley.toml`)
#[must_use]
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "parley", "parley").map_or_else(
        || PathBuf::from("parley.toml"),
        |d| d.config_dir().join("parley.toml"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config_file() {
        let toml = r#"
            dataDir = "/tmp/parley-test"

            [persona]
            triggerWord = "bob"
            stopPhrase = "stop"
            personaPrompt = "You're a nice guy called Bob."
            voiceId = "vO7hjeAjmsdlGgUdvPpe"

            [voice]
            sttProvider = "deepgram"
            sttModel = "nova-2"
            chatModel = "llama-3.1-70b-versatile"
            ttsProvider = "elevenlabs"
        "#;
        let file: ConfigFile = toml::from_str(toml).unwrap();
        let persona = file.persona.unwrap();
        assert_eq!(persona.trigger_word, "bob");
        assert_eq!(file.voice.stt_provider, "deepgram");
        assert_eq!(file.voice.stt_model, "nova-2");
        // Unspecified fields keep defaults
        assert_eq!(file.voice.tts_model, "eleven_turbo_v2_5");
        assert_eq!(file.data_dir.unwrap(), PathBuf::from("/tmp/parley-test"));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file: ConfigFile = toml::from_str("").unwrap();
        assert!(file.persona.is_none());
        assert_eq!(file.voice.stt_provider, "whisper");
    }
}
