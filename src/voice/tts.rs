//! Text-to-speech (TTS) synthesis
//!
//! Renders reply text to MP3 bytes via ElevenLabs or OpenAI. The voice
//! identifier comes from the persona at call time, so one client serves any
//! persona.

use crate::error::PlaybackError;

/// TTS provider backend
#[derive(Clone, Copy, Debug)]
enum TtsProvider {
    OpenAi,
    ElevenLabs,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    model: String,
    speed: f32,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing.
    pub fn new_openai(api_key: &str, model: &str, speed: f32) -> crate::Result<Self> {
        if api_key.is_empty() {
            return Err(crate::Error::Config(
                "OpenAI API key required for TTS".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            speed,
            provider: TtsProvider::OpenAi,
        })
    }

    /// Create a TTS instance using `ElevenLabs`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing.
    pub fn new_elevenlabs(api_key: &str, model: &str) -> crate::Result<Self> {
        if api_key.is_empty() {
            return Err(crate::Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            speed: 1.0,
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Synthesize text with the given voice, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the synthesis request fails.
    pub async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, PlaybackError> {
        match self.provider {
            TtsProvider::OpenAi => self.synthesize_openai(text, voice_id).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text, voice_id).await,
        }
    }

    async fn synthesize_openai(&self, text: &str, voice: &str) -> Result<Vec<u8>, PlaybackError> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| PlaybackError::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PlaybackError::Synthesis(format!(
                "OpenAI TTS error {status}: {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| PlaybackError::Synthesis(e.to_string()))?;
        Ok(audio.to_vec())
    }

    async fn synthesize_elevenlabs(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<Vec<u8>, PlaybackError> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{voice_id}");
        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| PlaybackError::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PlaybackError::Synthesis(format!(
                "ElevenLabs TTS error {status}: {body}"
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| PlaybackError::Synthesis(e.to_string()))?;
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_rejected() {
        assert!(TextToSpeech::new_openai("", "tts-1", 1.0).is_err());
        assert!(TextToSpeech::new_elevenlabs("", "eleven_turbo_v2_5").is_err());
    }
}
