mod config;
mod frames;
mod media;
mod presenter;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;

use interviewer_core::avatar::InterviewMode;
use interviewer_core::observation::{FrameSource, ObservationHttpClient};
use interviewer_core::session::{Collaborators, Input, Session, SessionConfig};

use crate::config::Config;
use crate::frames::DirFrameSource;
use crate::media::{LoggingRenderer, PacedSynthesizer, RecognizerUnavailable};
use crate::presenter::TerminalPresenter;

#[derive(Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    /// A single interviewer avatar.
    Individual,
    /// A rotating three-avatar panel.
    Multi,
}

#[derive(Parser)]
#[command(name = "interviewer", about = "Interactive interview session client")]
struct Cli {
    /// Interview panel mode.
    #[arg(long, value_enum, default_value = "individual")]
    mode: ModeArg,
    /// Re-activate the microphone automatically after each reply.
    #[arg(long)]
    continuous: bool,
    /// Directory of pre-captured JPEG frames to upload to the observation
    /// service. Frame upload is disabled when omitted.
    #[arg(long)]
    frames_dir: Option<PathBuf>,
    /// Behavioral analysis poll cadence in milliseconds.
    #[arg(long, default_value_t = 250)]
    poll_interval_ms: u64,
    /// Frame upload cadence in milliseconds.
    #[arg(long, default_value_t = 167)]
    frame_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 4. Assemble the Session ---
    let session_config = SessionConfig {
        channel: interviewer_channel::Config::builder()
            .with_base_url(&config.server_ws_url)
            .build(),
        mode: match args.mode {
            ModeArg::Individual => InterviewMode::Individual,
            ModeArg::Multi => InterviewMode::Multi,
        },
        continuous: args.continuous,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        frame_interval: Duration::from_millis(args.frame_interval_ms),
        ..SessionConfig::default()
    };

    let frames: Option<Arc<dyn FrameSource>> = match &args.frames_dir {
        Some(dir) => {
            let source = DirFrameSource::new(dir)
                .with_context(|| format!("Failed to load frames from {}", dir.display()))?;
            Some(Arc::new(source))
        }
        None => None,
    };

    let collaborators = Collaborators {
        presenter: Arc::new(TerminalPresenter::new()),
        renderer: Arc::new(LoggingRenderer),
        synthesizer: Arc::new(PacedSynthesizer),
        capture: Arc::new(RecognizerUnavailable),
        observation: Arc::new(ObservationHttpClient::new(&config.observation_base_url)),
        frames,
    };

    let (session, input_tx) = Session::new(session_config, collaborators);
    let mut session_task = tokio::spawn(session.run());

    // --- 5. Microphone Level Meter ---
    // cpal streams are not Send, so the meter lives on its own thread and
    // posts RMS levels into the session inbox.
    start_level_meter(input_tx.clone());

    // --- 6. Command Loop ---
    let stdin_tx = input_tx.clone();
    let mut stdin_task = tokio::spawn(async move { command_loop(stdin_tx).await });

    tokio::select! {
        _ = &mut session_task => {},
        _ = &mut stdin_task => {
            let _ = input_tx.send(Input::Shutdown).await;
            let _ = session_task.await;
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down...");
            let _ = input_tx.send(Input::Shutdown).await;
            let _ = session_task.await;
        }
    }
    tracing::info!("Shutting down...");
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  :start       request an interview session");
    println!("  :accept      grant camera/microphone consent");
    println!("  :decline     refuse camera/microphone consent");
    println!("  :mic         toggle speech capture");
    println!("  :continuous  toggle continuous conversation mode");
    println!("  :end         end the session and fetch the report");
    println!("  :quit        exit");
    println!("Any other line is submitted as your answer.");
}

async fn command_loop(tx: mpsc::Sender<Input>) {
    print_help();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let input = match line {
            ":start" => Input::StartRequested,
            ":accept" => Input::ConsentGranted,
            ":decline" => Input::ConsentDeclined,
            ":end" => Input::EndRequested,
            ":mic" => Input::MicToggled,
            ":continuous" => Input::ContinuousToggled,
            ":quit" => break,
            ":help" => {
                print_help();
                continue;
            }
            _ => Input::Submit(line.to_string()),
        };
        if tx.send(input).await.is_err() {
            break;
        }
    }
}

fn start_level_meter(tx: mpsc::Sender<Input>) {
    std::thread::spawn(move || {
        if let Err(e) = run_level_meter(tx) {
            tracing::warn!("microphone level meter unavailable: {:?}", e);
        }
    });
}

fn run_level_meter(tx: mpsc::Sender<Input>) -> Result<()> {
    let host = cpal::default_host();
    let input = host
        .default_input_device()
        .context("No default audio input device")?;
    tracing::info!("Using input device: {:?}", input.name()?);

    let input_config = input
        .default_input_config()
        .context("Failed to get default input config")?;
    if input_config.sample_format() != cpal::SampleFormat::F32 {
        anyhow::bail!(
            "unsupported input sample format: {:?}",
            input_config.sample_format()
        );
    }
    let stream_config: cpal::StreamConfig = input_config.config();
    let channel_count = stream_config.channels as usize;
    tracing::info!("Input stream config: {:?}", &stream_config);

    // Mix down to mono and post one RMS level per buffer.
    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        let mono = if channel_count > 1 {
            data.chunks(channel_count)
                .map(|c| c.iter().sum::<f32>() / channel_count as f32)
                .collect::<Vec<f32>>()
        } else {
            data.to_vec()
        };
        let rms =
            (mono.iter().map(|s| s * s).sum::<f32>() / mono.len().max(1) as f32).sqrt();
        if let Err(e) = tx.try_send(Input::AudioLevel(rms)) {
            tracing::trace!("Failed to send audio level: {:?}", e);
        }
    };

    let stream = input.build_input_stream(
        &stream_config,
        input_data_fn,
        move |err| tracing::error!("An error occurred on input stream: {}", err),
        None,
    )?;
    stream.play()?;

    // The stream stays alive as long as this thread does.
    loop {
        std::thread::park();
    }
}
