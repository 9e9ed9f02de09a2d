//! Voice pipeline adapters
//!
//! Microphone capture and segmentation, STT, TTS, and playback. The session
//! loop only sees these through the seams in `session`.

mod capture;
mod playback;
mod segment;
mod speaker;
mod stt;
mod tts;

pub use capture::{AudioCapture, MicSource};
pub use playback::AudioPlayback;
pub use segment::{rms_energy, SilenceSegmenter, SAMPLE_RATE};
pub use speaker::VoiceSpeaker;
pub use stt::{samples_to_wav, SpeechToText};
pub use tts::TextToSpeech;
