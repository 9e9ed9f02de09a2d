//! Session state machine and turn-taking loop
//!
//! Orchestrates capture, transcription, trigger detection, the completion
//! backend, and playback. Strictly sequential: no two backend calls are in
//! flight at once for the session, which keeps the transcript ordered and
//! stops the microphone from hearing the assistant's own voice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::engine::ConversationEngine;
use crate::error::{CaptureError, PlaybackError, TranscriptionError};
use crate::logbook::Logbook;
use crate::trigger::{DetectMode, Signal, TriggerDetector};
use crate::{PersonaConfig, Result};

/// A silence-delimited segment of captured audio
///
/// Ephemeral: discarded after transcription.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Mono f32 samples at the capture sample rate
    pub samples: Vec<f32>,

    /// When the segment completed
    pub captured_at: DateTime<Utc>,
}

impl Utterance {
    /// Wrap freshly captured samples with the current timestamp
    #[must_use]
    pub fn now(samples: Vec<f32>) -> Self {
        Self {
            samples,
            captured_at: Utc::now(),
        }
    }
}

/// Text produced by the transcriber for one utterance
#[derive(Debug, Clone)]
pub struct TranscribedPhrase {
    /// Transcript text
    pub text: String,

    /// Backend confidence, when reported
    pub confidence: Option<f32>,
}

impl TranscribedPhrase {
    /// A phrase with no confidence score
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }

    /// Whether the transcript is empty or whitespace-only
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat completion APIs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One utterance/response unit in the conversation history
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// A user turn stamped now
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// An assistant turn stamped now
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Session loop state
///
/// Exactly one state is active at a time; transitions happen only on the
/// loop's own control thread in response to a completed phrase, a backend
/// response, or playback finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet started
    Idle,
    /// Listening for the trigger word
    Armed,
    /// Trigger heard; the next utterance is the command
    CapturingCommand,
    /// Waiting on the completion backend
    Processing,
    /// Waiting on synthesis and playback
    Speaking,
    /// Terminal; logs flushed, capture released
    Terminated,
}

/// Source of silence-delimited utterances
///
/// Implementations may run a background capture thread; the session only
/// sees a blocking pull. Not `Send`: cpal streams are thread-bound, so the
/// loop runs on the main thread (as the production wiring does).
#[async_trait(?Send)]
pub trait UtteranceSource {
    /// Pull the next complete utterance
    async fn next_utterance(&mut self) -> std::result::Result<Utterance, CaptureError>;

    /// Release capture resources; any in-flight segment is discarded
    fn shutdown(&mut self);
}

/// Maps an utterance to text
#[async_trait(?Send)]
pub trait Transcriber {
    async fn transcribe(
        &self,
        utterance: &Utterance,
    ) -> std::result::Result<TranscribedPhrase, TranscriptionError>;
}

/// Converts reply text to audio and plays it to completion
#[async_trait(?Send)]
pub trait Speaker {
    async fn speak(
        &mut self,
        text: &str,
        voice_id: &str,
    ) -> std::result::Result<(), PlaybackError>;
}

/// The trigger-gated conversation loop
pub struct SessionLoop<S, T, P> {
    detector: TriggerDetector,
    engine: ConversationEngine,
    source: S,
    transcriber: T,
    speaker: P,
    voice_id: String,
    logbook: Logbook,
    state: SessionState,
    shutdown: mpsc::Receiver<()>,
}

impl<S, T, P> SessionLoop<S, T, P>
where
    S: UtteranceSource,
    T: Transcriber,
    P: Speaker,
{
    /// Wire up a session
    ///
    /// `shutdown` terminates the loop between utterances; a call already in
    /// flight to a backend runs to completion first.
    pub fn new(
        persona: &PersonaConfig,
        engine: ConversationEngine,
        source: S,
        transcriber: T,
        speaker: P,
        logbook: Logbook,
        shutdown: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            detector: TriggerDetector::new(persona),
            engine,
            source,
            transcriber,
            speaker,
            voice_id: persona.voice_id.clone(),
            logbook,
            state: SessionState::Idle,
            shutdown,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The conversation engine (turn history lives here)
    #[must_use]
    pub const fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Run until the stop phrase, a shutdown signal, or a fatal capture error
    ///
    /// Both logs are flushed and the capture source released before this
    /// returns, on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`CaptureError`] when the microphone fails;
    /// all other failures are absorbed into the error log.
    pub async fn run(&mut self) -> Result<()> {
        self.transition(SessionState::Armed);
        tracing::info!(
            trigger = self.detector.trigger_word(),
            stop = self.detector.stop_phrase(),
            "session armed"
        );

        let outcome = self.drive().await;

        if let Err(e) = &outcome {
            self.logbook.error(&e.to_string());
        }

        self.transition(SessionState::Terminated);
        self.source.shutdown();
        self.logbook.flush()?;
        outcome.map_err(Into::into)
    }

    /// The armed loop; returns on stop phrase, shutdown, or capture failure
    async fn drive(&mut self) -> std::result::Result<(), CaptureError> {
        loop {
            debug_assert_eq!(self.state, SessionState::Armed);

            let Some(utterance) = self.next_or_shutdown().await? else {
                tracing::info!("shutdown requested");
                return Ok(());
            };

            let phrase = match self.transcriber.transcribe(&utterance).await {
                Ok(p) if !p.is_blank() => p,
                Ok(_) | Err(TranscriptionError::EmptyTranscript) => {
                    tracing::trace!("discarding empty phrase");
                    continue;
                }
                Err(e) => {
                    self.logbook.error(&e.to_string());
                    continue;
                }
            };

            tracing::debug!(text = %phrase.text, "heard phrase");

            // Global stop check comes first, then the trigger.
            if self.detector.evaluate(&phrase.text, DetectMode::AwaitStop) == Signal::Stopped {
                self.logbook.transcript(&phrase.text);
                tracing::info!("stop phrase heard");
                return Ok(());
            }

            match self.detector.evaluate(&phrase.text, DetectMode::AwaitTrigger) {
                Signal::Triggered => {
                    tracing::info!(text = %phrase.text, "trigger word heard");
                    self.transition(SessionState::CapturingCommand);
                    if self.capture_and_respond().await? {
                        return Ok(());
                    }
                    self.transition(SessionState::Armed);
                }
                Signal::None | Signal::Stopped => {
                    // Not for us; discard without recording a turn.
                    tracing::trace!(text = %phrase.text, "no trigger, staying armed");
                }
            }
        }
    }

    /// One command cycle: capture, engine, playback
    ///
    /// Returns `Ok(true)` when the stop phrase ended the session mid-cycle.
    async fn capture_and_respond(&mut self) -> std::result::Result<bool, CaptureError> {
        let Some(utterance) = self.next_or_shutdown().await? else {
            return Ok(true);
        };

        let command = match self.transcriber.transcribe(&utterance).await {
            Ok(p) if !p.is_blank() => p,
            Ok(_) | Err(TranscriptionError::EmptyTranscript) => {
                tracing::debug!("empty command, rearming");
                return Ok(false);
            }
            Err(e) => {
                self.logbook.error(&e.to_string());
                return Ok(false);
            }
        };

        // The stop phrase halts the session even mid-command-capture.
        if self.detector.evaluate(&command.text, DetectMode::AwaitStop) == Signal::Stopped {
            self.logbook.transcript(&command.text);
            tracing::info!("stop phrase heard during command capture");
            return Ok(true);
        }

        tracing::info!(command = %command.text, "command received");
        self.engine.push_user(&command.text);
        self.logbook.transcript(&command.text);

        self.transition(SessionState::Processing);
        let reply = match self.engine.respond().await {
            Ok(turn) => turn,
            Err(e) => {
                // User turn stays in history for context; no assistant turn.
                tracing::warn!(error = %e, "engine failed, rearming");
                self.logbook.error(&e.to_string());
                return Ok(false);
            }
        };
        self.logbook.transcript(&reply.text);

        self.transition(SessionState::Speaking);
        if let Err(e) = self.speaker.speak(&reply.text, &self.voice_id).await {
            // Playback failure is non-fatal.
            tracing::warn!(error = %e, "playback failed");
            self.logbook.error(&e.to_string());
        }

        Ok(false)
    }

    /// Pull the next utterance, or `None` on shutdown
    async fn next_or_shutdown(
        &mut self,
    ) -> std::result::Result<Option<Utterance>, CaptureError> {
        tokio::select! {
            _ = self.shutdown.recv() => Ok(None),
            utterance = self.source.next_utterance() => utterance.map(Some),
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}
