//! Speech-to-text (STT) adapter
//!
//! Uploads an utterance as WAV to OpenAI Whisper or Deepgram and returns
//! the transcript. Blank transcripts surface as
//! [`TranscriptionError::EmptyTranscript`] so the session loop can discard
//! them without logging a failure.

use async_trait::async_trait;

use crate::error::TranscriptionError;
use crate::session::{TranscribedPhrase, Transcriber, Utterance};
use crate::voice::segment::SAMPLE_RATE;

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from the Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
    confidence: Option<f32>,
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    Deepgram,
}

/// Transcribes utterances via a remote STT API
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create an STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing.
    pub fn new_whisper(api_key: &str, model: &str) -> crate::Result<Self> {
        if api_key.is_empty() {
            return Err(crate::Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            provider: SttProvider::Whisper,
        })
    }

    /// Create an STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing.
    pub fn new_deepgram(api_key: &str, model: &str) -> crate::Result<Self> {
        if api_key.is_empty() {
            return Err(crate::Error::Config("Deepgram API key required".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            provider: SttProvider::Deepgram,
        })
    }

    async fn transcribe_whisper(&self, wav: Vec<u8>) -> Result<TranscribedPhrase, TranscriptionError> {
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| TranscriptionError::Backend(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Backend(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Backend(e.to_string()))?;

        Ok(TranscribedPhrase::new(result.text))
    }

    async fn transcribe_deepgram(&self, wav: Vec<u8>) -> Result<TranscribedPhrase, TranscriptionError> {
        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(wav)
            .send()
            .await
            .map_err(|e| TranscriptionError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Backend(format!(
                "Deepgram API error {status}: {body}"
            )));
        }

        let result: DeepgramResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Backend(e.to_string()))?;

        let alternative = result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first());

        Ok(TranscribedPhrase {
            text: alternative.map(|a| a.transcript.clone()).unwrap_or_default(),
            confidence: alternative.and_then(|a| a.confidence),
        })
    }
}

#[async_trait(?Send)]
impl Transcriber for SpeechToText {
    async fn transcribe(
        &self,
        utterance: &Utterance,
    ) -> Result<TranscribedPhrase, TranscriptionError> {
        let wav = samples_to_wav(&utterance.samples, SAMPLE_RATE)?;
        tracing::debug!(bytes = wav.len(), provider = ?self.provider, "transcribing");

        let phrase = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(wav).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(wav).await?,
        };

        if phrase.is_blank() {
            return Err(TranscriptionError::EmptyTranscript);
        }

        tracing::info!(transcript = %phrase.text, "transcription complete");
        Ok(phrase)
    }
}

/// Encode f32 samples as 16-bit mono WAV for the STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, TranscriptionError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| TranscriptionError::Backend(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| TranscriptionError::Backend(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| TranscriptionError::Backend(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_and_size() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0, -1.0];
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > 44);
    }

    #[test]
    fn wav_samples_roundtrip() {
        let original = vec![0.0f32, 0.5, -0.5, 0.25];
        let wav = samples_to_wav(&original, SAMPLE_RATE).unwrap();

        let mut reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
        let read: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(read.len(), original.len());
    }

    #[test]
    fn missing_key_rejected() {
        assert!(SpeechToText::new_whisper("", "whisper-1").is_err());
        assert!(SpeechToText::new_deepgram("", "nova-2").is_err());
    }

    #[test]
    fn deepgram_response_parsing() {
        let json = r#"{
            "results": {
                "channels": [{
                    "alternatives": [{"transcript": "hello bob", "confidence": 0.98}]
                }]
            }
        }"#;
        let parsed: DeepgramResponse = serde_json::from_str(json).unwrap();
        let alt = &parsed.results.channels[0].alternatives[0];
        assert_eq!(alt.transcript, "hello bob");
        assert_eq!(alt.confidence, Some(0.98));
    }
}
