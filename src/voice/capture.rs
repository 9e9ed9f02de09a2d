//! Audio capture from microphone
//!
//! A cpal input stream fills a shared buffer from its own audio thread;
//! [`MicSource`] drains that buffer through the silence segmenter and hands
//! the session loop one utterance at a time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::error::CaptureError;
use crate::session::{Utterance, UtteranceSource};
use crate::voice::segment::{SilenceSegmenter, SAMPLE_RATE};

/// How often the source polls the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captures audio from the default input device
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if no suitable input device is available.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();

        let device = host.default_input_device().ok_or_else(|| {
            CaptureError::DeviceUnavailable("no input device available".to_string())
        })?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| {
                CaptureError::DeviceUnavailable("no mono 16kHz input config found".to_string())
            })?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start the background capture stream
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be built or started.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::StreamFailed(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing; the buffered samples are discarded
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
        self.clear_buffer();
    }

    /// Take the samples captured since the last call
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Peek at the captured samples without draining them
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Drop any buffered samples
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Whether the capture stream is running
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

/// Microphone-backed utterance source
///
/// Polls the capture buffer and feeds the segmenter until a complete
/// silence-delimited utterance is available. Restartable: after a segment is
/// returned the next pull begins a fresh one.
pub struct MicSource {
    capture: AudioCapture,
    segmenter: SilenceSegmenter,
}

impl MicSource {
    /// Open the default microphone and start capturing
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or started.
    pub fn open() -> Result<Self, CaptureError> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;
        Ok(Self {
            capture,
            segmenter: SilenceSegmenter::new(),
        })
    }
}

#[async_trait(?Send)]
impl UtteranceSource for MicSource {
    async fn next_utterance(&mut self) -> Result<Utterance, CaptureError> {
        if !self.capture.is_capturing() {
            return Err(CaptureError::StreamFailed(
                "capture stream is not running".to_string(),
            ));
        }

        loop {
            let chunk = self.capture.take_buffer();
            if !chunk.is_empty() {
                if let Some(samples) = self.segmenter.push(&chunk) {
                    return Ok(Utterance::now(samples));
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn shutdown(&mut self) {
        self.capture.stop();
        self.segmenter.reset();
    }
}
