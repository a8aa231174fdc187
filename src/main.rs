use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ai_doctor::api::{ApiServerBuilder, ServiceInfo};
use ai_doctor::config::PlaybackKind;
use ai_doctor::voice::{self, RecordOptions};
use ai_doctor::{Config, Pipeline, TextToSpeech};

/// AI Doctor - describe a symptom, show a photo, hear a diagnosis
#[derive(Parser)]
#[command(name = "doctor", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Speech provider: "elevenlabs" or "gtts" (overrides config)
    #[arg(long)]
    tts_provider: Option<String>,

    /// Reply player: "none", "ffplay" or "device" (overrides config)
    #[arg(long)]
    player: Option<String>,

    /// Directory holding the demo UI (overrides config)
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and demo UI (default)
    Serve,
    /// Run one consultation from files on disk
    Consult {
        /// Photo of the affected area
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// Recorded question
        #[arg(short, long)]
        audio: Option<PathBuf>,
    },
    /// Record a spoken question from the microphone
    Record {
        /// WAV file to write
        #[arg(short, long, default_value = "patient_voice.wav")]
        output: PathBuf,
        /// Seconds to wait for speech to start
        #[arg(short, long, default_value = "20")]
        timeout: u64,
        /// Longest phrase in seconds
        #[arg(long)]
        phrase_limit: Option<u64>,
    },
    /// Speak a sentence through the configured voice
    Speak {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
        /// File to write the speech to
        #[arg(short, long, default_value = "doctor_response.mp3")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,ai_doctor=info",
        1 => "info,ai_doctor=debug",
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
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Consult { image, audio } => {
            consult(config, image.as_deref(), audio.as_deref()).await
        }
        Command::Record {
            output,
            timeout,
            phrase_limit,
        } => record(output, timeout, phrase_limit).await,
        Command::Speak { text, output } => speak(&config, &text, &output).await,
    }
}

/// Load configuration and apply command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load()?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(provider) = &cli.tts_provider {
        config.tts.provider = provider.parse()?;
    }
    if let Some(player) = &cli.player {
        config.playback = player.parse()?;
    }
    if let Some(dir) = &cli.static_dir {
        config.server.static_dir = Some(dir.clone());
    }

    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Run the HTTP API until interrupted
async fn serve(config: Config) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.server.output_dir).await?;

    // Fall back to the bundled UI when run from the repository root
    let static_dir = config
        .server
        .static_dir
        .clone()
        .or_else(|| Path::new("web").is_dir().then(|| PathBuf::from("web")));

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    pipeline.prune_replies().await;

    let server = ApiServerBuilder::new(pipeline, config.server.port)
        .info(ServiceInfo::from_config(&config))
        .static_dir(static_dir)
        .build();

    tracing::info!(
        port = config.server.port,
        tts = config.tts.provider.as_str(),
        output_dir = %config.server.output_dir.display(),
        "ai doctor ready"
    );

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

/// One consultation from the command line, waiting for the reply to finish playing
async fn consult(
    mut config: Config,
    image: Option<&Path>,
    audio: Option<&Path>,
) -> anyhow::Result<()> {
    let player = voice::player_for(config.playback);
    config.playback = PlaybackKind::None;

    let pipeline = Pipeline::from_config(&config)?;
    let result = pipeline.consult(audio, image).await;

    println!("Speech to Text: {}", result.transcript);
    println!("Doctor's Response: {}", result.diagnosis);

    if let Some(reply) = &result.reply_audio {
        println!("Reply audio: {}", reply.display());
        if let Err(e) = player.play(reply).await {
            tracing::warn!(error = %e, "error playing audio");
        }
    }

    Ok(())
}

/// Record a question from the microphone
async fn record(output: PathBuf, timeout: u64, phrase_limit: Option<u64>) -> anyhow::Result<()> {
    let options = RecordOptions {
        timeout: Duration::from_secs(timeout),
        phrase_time_limit: phrase_limit.map(Duration::from_secs),
        ..RecordOptions::default()
    };

    let path = output.clone();
    tokio::task::spawn_blocking(move || voice::record_to_file(&path, &options)).await??;

    println!("Recorded question to {}", output.display());
    Ok(())
}

/// Synthesize a sentence and play it
async fn speak(config: &Config, text: &str, output: &Path) -> anyhow::Result<()> {
    println!("Synthesizing with {}: \"{text}\"", config.tts.provider.as_str());

    let client = config.http.client()?;
    let tts = TextToSpeech::from_config(config, client);
    tts.synthesize(text, output).await?;
    println!("Wrote {}", output.display());

    let kind = match config.playback {
        PlaybackKind::None => PlaybackKind::Ffplay,
        other => other,
    };
    voice::player_for(kind).play(output).await?;

    Ok(())
}
