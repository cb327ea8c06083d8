use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley::config::{SttProviderKind, TtsProviderKind};
use parley::voice::{AudioCapture, AudioPlayback, MicRecorder, SpeechToText, TextToSpeech};
use parley::{Config, ConversationController, InferenceClient, StatusBoard};

/// Parley - push-to-talk voice front end for chat-completion models
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Port for the web view (overrides config)
    #[arg(long)]
    port: Option<u16>,

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

    // Set up logging based on verbosity
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
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let config = Config::load()?;
    let port = cli.port.unwrap_or(config.port);

    tracing::info!(
        port,
        model = %config.llm.model,
        "starting parley"
    );

    let (controller, _status) = build_controller(&config)?;
    let state = Arc::new(parley::api::ApiState { controller });
    let app = parley::api::router(state);

    tracing::info!("parley ready - open http://localhost:{port} and press Speak");
    parley::api::serve(app, port).await?;

    Ok(())
}

/// Wire the live capabilities into a controller
fn build_controller(config: &Config) -> anyhow::Result<(Arc<ConversationController>, Arc<StatusBoard>)> {
    let status = Arc::new(StatusBoard::new());

    let stt = match config.voice.stt_provider {
        SttProviderKind::Whisper => SpeechToText::new_whisper(
            config.api_keys.openai.clone(),
            config.voice.stt_model.clone(),
        )?,
        SttProviderKind::Deepgram => SpeechToText::new_deepgram(
            config.api_keys.deepgram.clone(),
            config.voice.stt_model.clone(),
        )?,
    };

    let tts = match config.voice.tts_provider {
        TtsProviderKind::Openai => TextToSpeech::new_openai(
            config.api_keys.openai.clone(),
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
            config.voice.tts_model.clone(),
        )?,
        TtsProviderKind::Elevenlabs => TextToSpeech::new_elevenlabs(
            config.api_keys.elevenlabs.clone(),
            config.voice.tts_voice.clone(),
            config.voice.tts_model.clone(),
        )?,
    };

    let completer = InferenceClient::new(&config.llm, config.api_keys.openrouter.clone())?;
    let speaker = parley::voice::TtsSpeaker::new(tts, Arc::clone(&status));

    let controller = Arc::new(ConversationController::new(
        Arc::new(MicRecorder),
        Arc::new(stt),
        Arc::new(completer),
        Arc::new(speaker),
        Arc::clone(&status),
        &config.voice,
    ));

    Ok((controller, status))
}

/// Test microphone input with a live level meter
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let handle = tokio::task::spawn_blocking(move || -> parley::Result<()> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;
        println!("Sample rate: {} Hz", capture.sample_rate());
        println!("---");

        for i in 0..duration {
            std::thread::sleep(Duration::from_secs(1));

            let samples = capture.take_buffer();
            let energy = parley::voice::capture::rms(&samples);
            let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let meter_len = (energy * 100.0).min(50.0) as usize;
            let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

            println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
        }

        capture.stop();
        Ok(())
    });
    handle.await??;

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working.");
    println!("If RMS stayed near 0, check your input device and levels.");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let samples = sine_tone(24000, 440.0, 2.0);
    println!("Playing {} samples...", samples.len());

    let cancel = Arc::new(AtomicBool::new(false));
    tokio::task::spawn_blocking(move || -> parley::Result<()> {
        AudioPlayback::new()?.play_samples_blocking(samples, &cancel)
    })
    .await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working.");

    Ok(())
}

/// Test TTS synthesis and playback end to end
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = match config.voice.tts_provider {
        TtsProviderKind::Openai => TextToSpeech::new_openai(
            config.api_keys.openai.clone(),
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
            config.voice.tts_model.clone(),
        )?,
        TtsProviderKind::Elevenlabs => TextToSpeech::new_elevenlabs(
            config.api_keys.elevenlabs.clone(),
            config.voice.tts_voice.clone(),
            config.voice.tts_model.clone(),
        )?,
    };

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    let cancel = Arc::new(AtomicBool::new(false));
    tokio::task::spawn_blocking(move || -> parley::Result<()> {
        AudioPlayback::new()?.play_mp3_blocking(&mp3_data, &cancel)
    })
    .await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working.");

    Ok(())
}

/// Generate a sine test tone
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sine_tone(sample_rate: u32, frequency: f32, duration_secs: f32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect()
}
