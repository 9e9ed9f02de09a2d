use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use parley::engine::{ChatBackend, ChatClient, ConversationEngine, EchoBackend};
use parley::voice::{
    rms_energy, AudioCapture, AudioPlayback, MicSource, SpeechToText, TextToSpeech, VoiceSpeaker,
};
use parley::{Config, Logbook, SessionLoop};

/// Parley - voice-activated conversational assistant
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Config file path (defaults to ~/.config/parley/parley.toml)
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&config, &text).await,
        };
    }

    tracing::info!(
        trigger = %config.persona.trigger_word,
        stop = %config.persona.stop_phrase,
        "starting parley - say \"{}\"",
        config.persona.trigger_word
    );

    let transcriber = build_transcriber(&config)?;
    let backend = build_chat_backend(&config)?;
    let speaker = build_speaker(&config)?;
    let source = MicSource::open()?;
    let logbook = Logbook::open(&config.transcript_log, &config.error_log)?;
    let engine = ConversationEngine::new(&config.persona, backend);

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            let _ = shutdown_tx.send(()).await;
        }
    });

    let mut session = SessionLoop::new(
        &config.persona,
        engine,
        source,
        transcriber,
        speaker,
        logbook,
        shutdown_rx,
    );

    session.run().await?;
    tracing::info!("session terminated, logs flushed");
    Ok(())
}

fn build_transcriber(config: &Config) -> anyhow::Result<SpeechToText> {
    let voice = &config.voice;
    let stt = match voice.stt_provider.as_str() {
        "deepgram" => SpeechToText::new_deepgram(
            config.api_keys.deepgram.as_deref().unwrap_or_default(),
            &voice.stt_model,
        )?,
        _ => SpeechToText::new_whisper(
            config.api_keys.openai.as_deref().unwrap_or_default(),
            &voice.stt_model,
        )?,
    };
    Ok(stt)
}

fn build_chat_backend(config: &Config) -> anyhow::Result<Box<dyn ChatBackend>> {
    match config.chat_api_key() {
        Some(key) => Ok(Box::new(ChatClient::new(
            &config.voice.chat_base_url,
            key,
            &config.voice.chat_model,
        )?)),
        None => {
            tracing::warn!("no chat API key configured, running in echo mode");
            Ok(Box::new(EchoBackend))
        }
    }
}

fn build_speaker(config: &Config) -> anyhow::Result<VoiceSpeaker> {
    let voice = &config.voice;
    let tts = match voice.tts_provider.as_str() {
        "openai" => TextToSpeech::new_openai(
            config.api_keys.openai.as_deref().unwrap_or_default(),
            &voice.tts_model,
            voice.tts_speed,
        )?,
        _ => TextToSpeech::new_elevenlabs(
            config.api_keys.elevenlabs.as_deref().unwrap_or_default(),
            &voice.tts_model,
        )?,
    };
    Ok(VoiceSpeaker::new(tts, AudioPlayback::new()?))
}

/// Test microphone input with a live level meter
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = rms_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working.");
    Ok(())
}

/// Test speaker output with a 440Hz tone
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24_000_f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let num_samples = (sample_rate * 2.0) as usize;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3
        })
        .collect();

    playback.play_samples(samples)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working.");
    Ok(())
}

/// Test TTS synthesis and playback with the configured persona voice
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let mut speaker = build_speaker(config)?;
    use parley::Speaker as _;
    speaker.speak(text, &config.persona.voice_id).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working.");
    Ok(())
}
