//! Silence-based utterance segmentation
//!
//! Splits a continuous sample stream into discrete utterances: a segment
//! starts when RMS energy rises above the speech threshold and ends after
//! sustained silence. Short blips and long stretches of near-silence are
//! dropped without producing a segment.

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Minimum RMS energy to consider a chunk speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum accumulated speech for a valid segment (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4_800;

/// Trailing silence that ends a segment (0.5s at 16kHz)
const SILENCE_SAMPLES: usize = 8_000;

/// Segmenter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentState {
    /// Waiting for speech
    Idle,
    /// Speech heard, accumulating until trailing silence
    Accumulating,
}

/// Accumulates samples into silence-delimited segments
pub struct SilenceSegmenter {
    state: SegmentState,
    buffer: Vec<f32>,
    silence_run: usize,
}

impl Default for SilenceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SilenceSegmenter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SegmentState::Idle,
            buffer: Vec::new(),
            silence_run: 0,
        }
    }

    /// Feed a chunk of samples; returns a completed segment when one ends
    pub fn push(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let is_speech = rms_energy(samples) > ENERGY_THRESHOLD;

        match self.state {
            SegmentState::Idle => {
                if is_speech {
                    self.state = SegmentState::Accumulating;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.silence_run = 0;
                    tracing::trace!(chunk = samples.len(), "speech started");
                }
                None
            }
            SegmentState::Accumulating => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_run = 0;
                } else {
                    self.silence_run += samples.len();
                }

                let speech_len = self.buffer.len() - self.silence_run;
                if self.silence_run > SILENCE_SAMPLES && speech_len > MIN_SPEECH_SAMPLES {
                    tracing::debug!(samples = self.buffer.len(), "utterance complete");
                    self.state = SegmentState::Idle;
                    self.silence_run = 0;
                    return Some(std::mem::take(&mut self.buffer));
                }

                // Too much silence without enough speech: a blip, drop it.
                if self.silence_run > SILENCE_SAMPLES * 2 {
                    tracing::trace!("segment too short, resetting");
                    self.reset();
                }

                None
            }
        }
    }

    /// Discard any partial segment
    pub fn reset(&mut self) {
        self.state = SegmentState::Idle;
        self.buffer.clear();
        self.silence_run = 0;
    }

    /// Whether a segment is currently being accumulated
    #[must_use]
    pub fn is_accumulating(&self) -> bool {
        self.state == SegmentState::Accumulating
    }
}

/// RMS energy of a chunk of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
