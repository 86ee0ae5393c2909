use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame, FragmentAssembler};
use super::blob::{media_type_for_path, AudioBlob, WAV_MEDIA_TYPE};
use super::wav::{decode, quantize};
use crate::error::CaptureError;

/// A decoded audio file held in memory as interleaved 16-bit samples
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let (sample_rate, channels, samples) = match read_pcm16_wav(path)? {
            Some(parts) => parts,
            None => decode_interleaved(path)?,
        };

        let duration_seconds =
            samples.len() as f64 / (sample_rate as f64 * channels.max(1) as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            sample_rate,
            channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate,
            channels,
            samples,
        })
    }
}

/// 16-bit integer WAV is read sample for sample. `None` means the file
/// needs the general decoder.
fn read_pcm16_wav(path: &Path) -> Result<Option<(u32, u16, Vec<i16>)>> {
    if media_type_for_path(path) != WAV_MEDIA_TYPE {
        return Ok(None);
    }

    let reader = match WavReader::open(path) {
        Ok(reader) => reader,
        Err(hound::Error::IoError(e)) => {
            return Err(e)
                .with_context(|| format!("Failed to read audio file: {}", path.display()))
        }
        Err(_) => return Ok(None),
    };

    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Ok(None);
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read audio samples")?;

    Ok(Some((spec.sample_rate, spec.channels, samples)))
}

fn decode_interleaved(path: &Path) -> Result<(u32, u16, Vec<i16>)> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read audio file: {}", path.display()))?;

    let blob = AudioBlob::new(bytes, media_type_for_path(path));
    let decoded = decode(&blob).context("Failed to decode audio file")?;

    let channels = decoded.channel_count().max(1);
    let frames = decoded.frame_count();
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        for channel in &decoded.channels {
            samples.push(channel.get(i).copied().map_or(0, quantize));
        }
    }

    Ok((decoded.sample_rate, channels as u16, samples))
}

/// Replays an audio file through the capture pipeline as if it were a
/// live input
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    audio: Arc<AudioFile>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    is_capturing: Arc<AtomicBool>,
}

impl FileBackend {
    pub fn open(path: impl AsRef<Path>, config: AudioBackendConfig) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();
        let audio = AudioFile::open(&path)
            .map_err(|e| CaptureError::PermissionDenied(format!("{:#}", e)))?;

        Ok(Self {
            path,
            config,
            audio: Arc::new(audio),
            cancel: None,
            task: None,
            is_capturing: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<AudioFrame>, CaptureError> {
        if self.is_capturing.load(Ordering::SeqCst) {
            return Err(CaptureError::Stream(format!(
                "{} is already being replayed",
                self.path.display()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let audio = Arc::clone(&self.audio);
        let is_capturing = Arc::clone(&self.is_capturing);
        let interval_ms = self.config.buffer_duration_ms;
        let realtime = self.config.realtime;
        let token = cancel.clone();

        is_capturing.store(true, Ordering::SeqCst);

        let task = tokio::spawn(async move {
            let mut assembler =
                FragmentAssembler::new(audio.sample_rate, audio.channels, interval_ms, tx);
            let step = assembler.samples_per_fragment();
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));

            for chunk in audio.samples.chunks(step) {
                if realtime {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                } else if token.is_cancelled() {
                    break;
                }
                assembler.push(chunk);
            }

            assembler.flush();
            is_capturing.store(false, Ordering::SeqCst);
            info!("File replay finished: {}", audio.path);
        });

        self.cancel = Some(cancel);
        self.task = Some(task);

        info!("Replaying {} as live input", self.path.display());

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("File replay task panicked: {}", e);
            }
        }

        self.is_capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}
