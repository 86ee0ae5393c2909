use anyhow::{Context, Result};
use cardiac_recorder::audio::media_type_for_path;
use cardiac_recorder::{
    convert_to_wav, format_elapsed, AudioBlob, AudioSource, CaptureController, Config, Notice,
    NoticeKind, StopReason, VisualFrame,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, Level};

/// Width of the terminal level meter in characters
const METER_WIDTH: usize = 30;

#[derive(Parser)]
#[command(name = "cardiac-recorder")]
#[command(version, about = "Record heart sounds and send them for analysis")]
struct Cli {
    /// Config file (without extension is fine)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Server origin, overrides `upload.base_url`
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture audio, then upload it as a WAV recording
    Record {
        /// Stop automatically after this many seconds
        #[arg(short, long)]
        seconds: Option<u64>,

        /// Also write the encoded WAV here
        #[arg(long)]
        save: Option<String>,

        /// Keep the recording local
        #[arg(long)]
        no_upload: bool,

        /// Replay an audio file instead of using the microphone
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Validate and upload an existing WAV file
    Upload { file: PathBuf },

    /// Convert any supported audio file to 16-bit mono WAV
    Convert { input: PathBuf, output: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = Config::load(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        cfg.upload.base_url = endpoint;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Record {
            seconds,
            save,
            no_upload,
            input,
        } => {
            let source = match input {
                Some(path) => AudioSource::File(path),
                None => AudioSource::Microphone,
            };
            record(cfg, source, seconds, save, no_upload).await
        }
        Command::Upload { file } => upload(cfg, &file).await,
        Command::Convert { input, output } => convert(&input, &output).await,
    }
}

async fn record(
    cfg: Config,
    source: AudioSource,
    seconds: Option<u64>,
    save: Option<String>,
    no_upload: bool,
) -> Result<()> {
    let save_dir = cfg.recording.save_dir.clone();
    let (mut controller, notices) = CaptureController::new(&cfg, source)?;
    let printer = tokio::spawn(print_notices(notices));

    let result = run_recording(&mut controller, seconds, save, save_dir, no_upload).await;

    controller.shutdown().await;
    drop(controller);
    let _ = printer.await;

    result
}

async fn run_recording(
    controller: &mut CaptureController,
    seconds: Option<u64>,
    save: Option<String>,
    save_dir: Option<String>,
    no_upload: bool,
) -> Result<()> {
    controller.start_recording().await?;

    match seconds {
        Some(s) => eprintln!("Recording for up to {}s, press Enter or Ctrl+C to stop", s),
        None => eprintln!("Recording, press Enter or Ctrl+C to stop"),
    }

    let meter = tokio::spawn(draw_meter(controller.frames(), controller.elapsed()));
    let stopped = controller.run_until_stopped(stop_signal(seconds)).await;
    meter.abort();
    eprintln!();

    {
        let pending = stopped?;
        if pending.stop_reason == StopReason::InputEnded {
            eprintln!("Input ended, recording stopped");
        }
        info!(
            "Recorded {} ({} bytes, {:?})",
            format_elapsed(pending.duration),
            pending.wav.len(),
            pending.stop_reason
        );

        let target = save.map(PathBuf::from).or_else(|| {
            save_dir.map(|dir| {
                PathBuf::from(shellexpand::tilde(&dir).as_ref())
                    .join(format!("recording-{}.wav", pending.session_id))
            })
        });

        if let Some(target) = target {
            let target = PathBuf::from(shellexpand::tilde(&target.to_string_lossy()).as_ref());
            if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, pending.wav.bytes())
                .await
                .with_context(|| format!("Failed to save {}", target.display()))?;
            info!("Saved recording to {}", target.display());
        }
    }

    if no_upload {
        controller.discard();
        return Ok(());
    }

    controller.upload_pending().await?;
    Ok(())
}

async fn upload(cfg: Config, file: &Path) -> Result<()> {
    let (mut controller, notices) = CaptureController::new(&cfg, AudioSource::Microphone)?;
    let printer = tokio::spawn(print_notices(notices));

    let result = controller.submit_file(file).await;

    drop(controller);
    let _ = printer.await;

    result?;
    Ok(())
}

async fn convert(input: &Path, output: &Path) -> Result<()> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let blob = AudioBlob::new(bytes, media_type_for_path(input));

    let wav = tokio::task::spawn_blocking(move || convert_to_wav(&blob)).await??;

    tokio::fs::write(output, wav.bytes())
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Wrote {} ({:.1}s, {}Hz, {} bytes)",
        output.display(),
        wav.duration_seconds(),
        wav.sample_rate(),
        wav.len()
    );

    Ok(())
}

/// Resolves on Enter, Ctrl+C, or after `seconds`
async fn stop_signal(seconds: Option<u64>) {
    let limit = async {
        match seconds {
            Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = limit => {}
        _ = tokio::signal::ctrl_c() => {}
        _ = enter_pressed() => {}
    }
}

/// Stdin is read on a detached thread so a blocked read never holds up
/// runtime shutdown
async fn enter_pressed() {
    let (tx, rx) = oneshot::channel();

    std::thread::spawn(move || {
        let mut line = String::new();
        if let Ok(n) = std::io::stdin().read_line(&mut line) {
            if n > 0 {
                let _ = tx.send(());
            }
        }
    });

    if rx.await.is_err() {
        // stdin closed; only the other signals can stop us
        std::future::pending::<()>().await;
    }
}

async fn draw_meter(
    mut frames: watch::Receiver<VisualFrame>,
    elapsed: watch::Receiver<Duration>,
) {
    while frames.changed().await.is_ok() {
        let frame = frames.borrow_and_update().clone();
        let time = format_elapsed(*elapsed.borrow());
        let bars = ((frame.average / 255.0) * METER_WIDTH as f32).round() as usize;

        eprint!(
            "\r{} [{:<width$}] {:?}   ",
            time,
            "#".repeat(bars.min(METER_WIDTH)),
            frame.level,
            width = METER_WIDTH
        );
    }
}

async fn print_notices(mut notices: mpsc::UnboundedReceiver<Notice>) {
    while let Some(notice) = notices.recv().await {
        match &notice.kind {
            NoticeKind::Error => eprintln!("\rError: {}", notice.text),
            NoticeKind::Success => eprintln!("\r{}", notice.text),
            NoticeKind::Navigate(url) => eprintln!("\rResults: {}", url),
        }
    }
}
