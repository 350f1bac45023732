use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vncast::config::{Codec, SessionConfig, DATA_DIR_ENV};
use vncast::error::Result;
use vncast::pipeline::PostProcessor;
use vncast::recorder::{Recorder, StopOutcome};

#[derive(Parser)]
#[command(name = "vncast", version, about = "Record a VNC session and post-process it for web playback")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a session, then post-process it
    Record {
        #[command(flatten)]
        session: SessionArgs,

        /// Stop automatically after this many seconds instead of waiting for Enter
        #[arg(long)]
        duration: Option<u64>,

        /// Skip post-processing, leaving the raw capture in place
        #[arg(long)]
        skip_process: bool,

        /// Downscale wide captures to 1024px during post-processing
        #[arg(long)]
        downscale: bool,
    },
    /// Post-process an existing capture
    Process {
        #[command(flatten)]
        session: SessionArgs,

        /// Downscale wide captures to 1024px
        #[arg(long)]
        downscale: bool,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Output filename
    #[arg(long, default_value = "vncast-video.flv")]
    output: String,

    /// Directory holding the capture and its working files
    #[arg(long, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// VNC server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// VNC display number
    #[arg(long, default_value_t = 0)]
    display: u32,

    /// Capture framerate
    #[arg(long, default_value_t = 12)]
    framerate: u32,

    /// Seconds between navigation cuepoints
    #[arg(long, default_value_t = 1)]
    cue_interval: u32,

    /// Capture region as WxH+X+Y
    #[arg(long)]
    clipping: Option<String>,

    /// VNC password file (defaults to ~/.vnc/passwd)
    #[arg(long)]
    passwd: Option<PathBuf>,

    /// VNC server port, when not derivable from the display
    #[arg(long)]
    port: Option<u16>,

    /// Encode with the constrained-baseline H.264 preset
    #[arg(long)]
    h264: bool,

    /// Seconds between forced keyframes in the encoded output
    #[arg(long, default_value_t = 5)]
    seconds_per_keyframe: u32,

    /// Per-tool timeout for post-processing steps, in seconds
    #[arg(long, default_value_t = 600)]
    tool_timeout: u64,
}

impl SessionArgs {
    fn into_config(self) -> SessionConfig {
        SessionConfig {
            filename: self.output,
            data_dir: self.data_dir,
            host: self.host,
            display: self.display,
            framerate: self.framerate,
            cue_interval: self.cue_interval,
            clipping: self.clipping,
            password_file: self.passwd.or_else(SessionConfig::default_password_file),
            port: self.port,
            codec: if self.h264 { Codec::H264 } else { Codec::Flv },
            seconds_per_keyframe: self.seconds_per_keyframe,
            tool_timeout_secs: self.tool_timeout,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Record {
            session,
            duration,
            skip_process,
            downscale,
        } => record(session.into_config(), duration, skip_process, downscale),
        Commands::Process { session, downscale } => process(session.into_config(), downscale),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn record(config: SessionConfig, duration: Option<u64>, skip_process: bool, downscale: bool) -> Result<()> {
    let mut recorder = Recorder::new(config)?;
    recorder.start()?;
    info!(path = %recorder.config().output_path().display(), "recording started");

    match duration {
        Some(secs) => countdown(secs),
        None => wait_for_enter()?,
    }

    match recorder.stop()? {
        StopOutcome::Graceful => info!("recording stopped"),
        StopOutcome::Forced => info!("recording stopped (capture process was force-killed)"),
    }

    if skip_process {
        info!(path = %recorder.config().output_path().display(), "raw capture left unprocessed");
        return Ok(());
    }
    process(recorder.config().clone(), downscale)
}

fn process(config: SessionConfig, downscale: bool) -> Result<()> {
    config.validate()?;
    let processor = PostProcessor::new(config)?;
    let output = processor.process(downscale)?;
    info!(path = %output.display(), "processing finished");
    Ok(())
}

fn countdown(secs: u64) {
    for remaining in (1..=secs).rev() {
        println!("{remaining}...");
        thread::sleep(Duration::from_secs(1));
    }
}

fn wait_for_enter() -> Result<()> {
    print!("Recording. Press Enter to stop... ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}
