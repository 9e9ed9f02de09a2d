//! Voice pipeline integration tests
//!
//! Exercises segmentation and WAV encoding without audio hardware.

use parley::voice::{rms_energy, samples_to_wav, SilenceSegmenter, SAMPLE_RATE};

/// Generate sine wave audio samples
fn sine(duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect()
}

fn silence(duration_secs: f32) -> Vec<f32> {
    vec![0.0; (SAMPLE_RATE as f32 * duration_secs) as usize]
}

#[test]
fn segmenter_handles_chunked_input_like_the_capture_poll() {
    // Feed the segmenter in 100ms chunks, the way MicSource drains the
    // capture buffer.
    let mut stream = Vec::new();
    stream.extend(silence(0.3));
    stream.extend(sine(0.6, 0.3));
    stream.extend(silence(0.8));

    let chunk_len = SAMPLE_RATE as usize / 10;
    let mut seg = SilenceSegmenter::new();
    let mut segments = Vec::new();

    for chunk in stream.chunks(chunk_len) {
        if let Some(segment) = seg.push(chunk) {
            segments.push(segment);
        }
    }

    assert_eq!(segments.len(), 1);
    // The segment holds the speech plus its trailing silence, nothing before.
    assert!(segments[0].len() >= (SAMPLE_RATE as f32 * 0.6) as usize);
    assert!(rms_energy(&segments[0]) > 0.01);
}

#[test]
fn two_utterances_yield_two_segments() {
    let mut stream = Vec::new();
    stream.extend(sine(0.5, 0.3));
    stream.extend(silence(0.7));
    stream.extend(sine(0.4, 0.3));
    stream.extend(silence(0.7));

    let chunk_len = SAMPLE_RATE as usize / 10;
    let mut seg = SilenceSegmenter::new();
    let count = stream
        .chunks(chunk_len)
        .filter(|chunk| seg.push(chunk).is_some())
        .count();

    assert_eq!(count, 2);
}

#[test]
fn segment_encodes_to_valid_wav() {
    let samples = sine(0.2, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");

    let mut reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(reader.samples::<i16>().count(), samples.len());
}
