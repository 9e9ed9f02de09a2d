//! Speaker adapter: synthesis followed by local playback

use async_trait::async_trait;

use crate::error::PlaybackError;
use crate::session::Speaker;
use crate::voice::playback::AudioPlayback;
use crate::voice::tts::TextToSpeech;

/// Speaks reply text: network synthesis, then blocking playback
pub struct VoiceSpeaker {
    tts: TextToSpeech,
    playback: AudioPlayback,
}

impl VoiceSpeaker {
    /// Pair a TTS client with the default output device
    #[must_use]
    pub const fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self { tts, playback }
    }
}

#[async_trait(?Send)]
impl Speaker for VoiceSpeaker {
    async fn speak(&mut self, text: &str, voice_id: &str) -> Result<(), PlaybackError> {
        let audio = self.tts.synthesize(text, voice_id).await?;
        tracing::debug!(bytes = audio.len(), "synthesis complete, playing");
        self.playback.play_mp3(&audio)
    }
}
