use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::CaptureError;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Number of sample frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Samples of a single channel, de-interleaved
    pub fn channel_samples(&self, channel: usize) -> Vec<i16> {
        let channels = self.channels.max(1) as usize;
        if channel >= channels {
            return Vec::new();
        }
        self.samples
            .iter()
            .skip(channel)
            .step_by(channels)
            .copied()
            .collect()
    }
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Fragment cadence in milliseconds
    pub buffer_duration_ms: u64,
    /// Replay file input at wall-clock speed instead of as fast as possible
    pub realtime: bool,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            buffer_duration_ms: 100, // 100ms fragments
            realtime: true,
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal default input device
/// - File: replays a decoded audio file as if it were live input
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. The channel
    /// closes when capture ends, either through `stop` or because the input
    /// went away on its own.
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<AudioFrame>, CaptureError>;

    /// Stop capturing audio and release the input device.
    /// Every frame captured before this call is sent before the channel closes.
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Default microphone input
    Microphone,
    /// File input (simulated live capture, for testing/batch processing)
    File(PathBuf),
}

/// Audio backend factory
///
/// This is the permission gate: it either hands back an input handle or
/// fails with `CaptureError::PermissionDenied`.
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    pub fn create(
        source: &AudioSource,
        config: AudioBackendConfig,
    ) -> Result<Box<dyn AudioBackend>, CaptureError> {
        match source {
            AudioSource::Microphone => {
                let backend = super::microphone::MicrophoneBackend::new(config)?;
                Ok(Box::new(backend))
            }

            AudioSource::File(path) => {
                let backend = super::file::FileBackend::open(path, config)?;
                Ok(Box::new(backend))
            }
        }
    }
}

/// Groups interleaved samples into fixed-cadence frames
pub(crate) struct FragmentAssembler {
    pending: Vec<i16>,
    samples_per_fragment: usize,
    frames_emitted: u64,
    sample_rate: u32,
    channels: u16,
    tx: mpsc::UnboundedSender<AudioFrame>,
}

impl FragmentAssembler {
    pub(crate) fn new(
        sample_rate: u32,
        channels: u16,
        buffer_duration_ms: u64,
        tx: mpsc::UnboundedSender<AudioFrame>,
    ) -> Self {
        let frames = (sample_rate as u64 * buffer_duration_ms / 1000).max(1) as usize;
        let samples_per_fragment = frames * channels.max(1) as usize;

        Self {
            pending: Vec::with_capacity(samples_per_fragment),
            samples_per_fragment,
            frames_emitted: 0,
            sample_rate,
            channels,
            tx,
        }
    }

    pub(crate) fn samples_per_fragment(&self) -> usize {
        self.samples_per_fragment
    }

    pub(crate) fn push(&mut self, samples: &[i16]) {
        self.pending.extend_from_slice(samples);

        while self.pending.len() >= self.samples_per_fragment {
            let rest = self.pending.split_off(self.samples_per_fragment);
            let full = std::mem::replace(&mut self.pending, rest);
            self.emit(full);
        }
    }

    /// Send whatever is buffered as a final, possibly short, frame
    pub(crate) fn flush(&mut self) {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.emit(rest);
        }
    }

    fn emit(&mut self, samples: Vec<i16>) {
        let timestamp_ms = self.frames_emitted * 1000 / self.sample_rate.max(1) as u64;
        let frame = AudioFrame {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp_ms,
        };
        self.frames_emitted += frame.frame_count() as u64;

        if self.tx.send(frame).is_err() {
            debug!("Frame receiver dropped, discarding captured audio");
        }
    }
}
