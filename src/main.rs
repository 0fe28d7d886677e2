use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aura_voice::voice::{AudioCapture, rms_energy};
use aura_voice::{Config, SegmenterEvent, VoiceHint, VoiceService};

/// Aura - Real-time voice interaction pipeline for AI companions
#[derive(Parser)]
#[command(name = "aura", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen and print committed utterances (default)
    Run,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Speak text through the synthesis pipeline
    Speak {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the voice pipeline.")]
        text: String,

        /// Voice keyword to use instead of the configured preference
        #[arg(short, long)]
        voice: Option<String>,
    },
    /// List voice profiles and how the persona resolves
    Voices,
    /// Classify a persona description into a voice bucket
    Classify {
        /// Persona description text
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,aura_voice=info",
        1 => "info,aura_voice=debug",
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

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_loop(&config).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::Speak { text, voice } => speak(&config, &text, voice.as_deref()).await,
        Command::Voices => list_voices(&config),
        Command::Classify { text } => classify(&text),
    }
}

/// Interactive loop: listen, print committed utterances, repeat
async fn run_loop(config: &Config) -> anyhow::Result<()> {
    let service = VoiceService::new(config);
    let Some(mut events) = service.take_events() else {
        anyhow::bail!("event channel already taken");
    };

    match service.recognition_backend() {
        Some(backend) => tracing::info!(%backend, "aura ready - start speaking"),
        None => anyhow::bail!(
            "no recognition backend available - set AURA_SPEECH_KEY/AURA_SPEECH_REGION \
             or install a local transcriber"
        ),
    }

    service.start_recognition().await?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SegmenterEvent::Interim(text) => {
                        print!("\r… {text}");
                        use std::io::Write as _;
                        let _ = std::io::stdout().flush();
                    }
                    SegmenterEvent::Utterance(text) => {
                        println!("\r> {text}");
                        // One-shot sessions end after each turn; listen again.
                        service.start_recognition().await?;
                    }
                    SegmenterEvent::Listening(active) => {
                        tracing::debug!(active, "listening state changed");
                    }
                    SegmenterEvent::Error(code) => {
                        tracing::warn!(code, "recognition error");
                        service.start_recognition().await?;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                service.stop_recognition().await;
                break;
            }
        }
    }

    Ok(())
}

/// Test microphone input with a level meter
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.drain();
        let energy = rms_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    Ok(())
}

/// Speak text through the full synthesis path (cloud first, then platform)
async fn speak(config: &Config, text: &str, voice: Option<&str>) -> anyhow::Result<()> {
    let service = VoiceService::new(config);

    println!("Speaking: \"{text}\"");
    match voice {
        Some(keyword) => {
            service
                .speak_as(text, &VoiceHint::Keyword(keyword.to_ascii_lowercase()))
                .await?;
        }
        None => service.speak(text).await?,
    }

    println!("Done.");
    Ok(())
}

/// Show the catalog and the persona's resolved bucket
fn list_voices(config: &Config) -> anyhow::Result<()> {
    let catalog = aura_voice::VoiceProfileCatalog::new();

    println!("Known voice profiles:");
    for profile in catalog.profiles() {
        println!(
            "  {:10} {:22} {:6} {:?}",
            profile.keyword, profile.backend_name, profile.locale, profile.gender
        );
    }

    let gender = config
        .persona_description
        .as_deref()
        .map_or(aura_voice::PersonaGender::Unknown, aura_voice::persona::classify);
    println!("\nPreferred voice: {}", config.voice.preferred);
    println!("Locale restriction: {}", config.voice.locale);
    println!("Persona gender bucket: {gender:?}");

    Ok(())
}

/// Classify a persona description
fn classify(text: &str) -> anyhow::Result<()> {
    let gender = aura_voice::persona::classify(text);
    println!("{gender:?}");
    Ok(())
}
