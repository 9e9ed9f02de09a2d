//! Parley - voice-activated conversational assistant loop
//!
//! Parley listens to the microphone, waits for a spoken trigger word,
//! captures the following utterance as a command, asks a persona-conditioned
//! completion backend for a reply, and speaks the reply back.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                   SessionLoop                     │
//! │   Armed → CapturingCommand → Processing →         │
//! │   Speaking → Armed   (stop phrase → Terminated)   │
//! └──────┬──────────┬───────────┬──────────┬──────────┘
//!        │          │           │          │
//!   MicSource  SpeechToText  ChatClient  VoiceSpeaker
//!   (cpal)     (Whisper/     (Groq/      (ElevenLabs/
//!              Deepgram)     OpenAI)     OpenAI + cpal)
//! ```
//!
//! The loop is strictly sequential: one backend call at a time, so the
//! transcript stays ordered and capture never overlaps playback.

pub mod config;
pub mod engine;
pub mod error;
pub mod logbook;
pub mod persona;
pub mod session;
pub mod trigger;
pub mod voice;

pub use config::{ApiKeys, Config, VoiceConfig};
pub use engine::{ChatBackend, ChatClient, ConversationEngine, EchoBackend};
pub use error::{
    CaptureError, EngineError, Error, PlaybackError, Result, TranscriptionError,
};
pub use logbook::{LogRecord, Logbook, RecordKind};
pub use persona::PersonaConfig;
pub use session::{
    Role, SessionLoop, SessionState, Speaker, TranscribedPhrase, Transcriber, Turn, Utterance,
    UtteranceSource,
};
pub use trigger::{DetectMode, Signal, TriggerDetector};
