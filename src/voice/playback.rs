//! Audio playback to speakers
//!
//! Decodes synthesized MP3 audio and plays it on the default output device,
//! blocking until playback completes. The session loop stays out of the
//! armed state for the whole duration, so the microphone never hears the
//! assistant's own voice.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::error::PlaybackError;

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Plays audio to the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output device is available.
    pub fn new() -> Result<Self, PlaybackError> {
        let host = cpal::default_host();

        let device = host.default_output_device().ok_or_else(|| {
            PlaybackError::Output("no output device available".to_string())
        })?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| PlaybackError::Output(e.to_string()))?
            .find(|c| {
                (c.channels() == 1 || c.channels() == 2)
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .ok_or_else(|| {
                PlaybackError::Output("no suitable output config found".to_string())
            })?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Decode MP3 bytes and play them to completion
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails.
    pub fn play_mp3(&mut self, mp3_data: &[u8]) -> Result<(), PlaybackError> {
        let samples = decode_mp3(mp3_data)?;
        self.play_samples(samples)
    }

    /// Play f32 samples, blocking until the stream drains
    ///
    /// # Errors
    ///
    /// Returns error if the output stream fails.
    pub fn play_samples(&self, samples: Vec<f32>) -> Result<(), PlaybackError> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = self.config.channels as usize;
        let sample_count = samples.len();

        let samples = Arc::new(samples);
        let position = Arc::new(Mutex::new(0usize));
        let finished = Arc::new(Mutex::new(false));

        let cb_samples = Arc::clone(&samples);
        let cb_position = Arc::clone(&position);
        let cb_finished = Arc::clone(&finished);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut pos) = cb_position.lock() else {
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        let sample = if *pos < cb_samples.len() {
                            let s = cb_samples[*pos];
                            *pos += 1;
                            s
                        } else {
                            if let Ok(mut done) = cb_finished.lock() {
                                *done = true;
                            }
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| PlaybackError::Output(e.to_string()))?;

        stream
            .play()
            .map_err(|e| PlaybackError::Output(e.to_string()))?;

        // Poll for drain, bounded by the audio duration plus slack.
        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let deadline = std::time::Instant::now()
            + std::time::Duration::from_millis(duration_ms + 500);

        while !finished.lock().map(|done| *done).unwrap_or(true) {
            if std::time::Instant::now() > deadline {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        // Let the device ring out the last buffer.
        std::thread::sleep(std::time::Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");
        Ok(())
    }
}

/// Decode MP3 bytes into mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>, PlaybackError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.channels == 2 {
                    // Stereo: average the channels.
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        (left + right) / 2.0
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(PlaybackError::Output(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}
