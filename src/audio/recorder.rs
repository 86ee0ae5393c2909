use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backend::{AudioBackend, AudioFrame};
use super::fragment::AudioFragmentSequence;
use crate::error::CaptureError;

/// Capacity of the visualizer tap, in frames
pub const TAP_CAPACITY: usize = 64;

/// Sender side of the read-only sample tap (channel 0 samples)
pub type TapSender = mpsc::Sender<Vec<i16>>;

/// Receiver side of the read-only sample tap
pub type TapReceiver = mpsc::Receiver<Vec<i16>>;

pub fn create_tap() -> (TapSender, TapReceiver) {
    mpsc::channel(TAP_CAPACITY)
}

/// Fragments and bytes collected so far in the current recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureProgress {
    pub fragments: usize,
    pub bytes: usize,
}

/// Running totals kept by the collector task
#[derive(Debug, Default)]
struct CaptureCounters {
    fragments: AtomicUsize,
    bytes: AtomicUsize,
}

impl CaptureCounters {
    fn record(&self, bytes: usize) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.fragments.fetch_add(1, Ordering::Release);
    }

    fn snapshot(&self) -> CaptureProgress {
        CaptureProgress {
            fragments: self.fragments.load(Ordering::Acquire),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Stopped,
}

/// Capture recorder
///
/// Receives audio frames from a backend and accumulates them, in arrival
/// order, as an `AudioFragmentSequence`.
pub struct CaptureRecorder {
    state: RecorderState,
    backend: Option<Box<dyn AudioBackend>>,
    collector: Option<JoinHandle<AudioFragmentSequence>>,
    fragments: AudioFragmentSequence,
    counters: Arc<CaptureCounters>,
}

impl CaptureRecorder {
    pub fn new() -> Self {
        Self {
            state: RecorderState::Idle,
            backend: None,
            collector: None,
            fragments: AudioFragmentSequence::new(),
            counters: Arc::new(CaptureCounters::default()),
        }
    }

    /// Current state. A recorder whose input ended on its own reports
    /// `Stopped` even before `stop` is called.
    pub fn state(&self) -> RecorderState {
        match (&self.state, &self.collector) {
            (RecorderState::Recording, Some(collector)) if collector.is_finished() => {
                RecorderState::Stopped
            }
            (state, _) => *state,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Fragments collected by the last completed recording
    pub fn fragments(&self) -> &AudioFragmentSequence {
        &self.fragments
    }

    /// Totals for the current recording, live while the collector runs
    pub fn progress(&self) -> CaptureProgress {
        self.counters.snapshot()
    }

    /// Drop the fragments of the previous recording
    pub fn reset(&mut self) {
        if self.state == RecorderState::Recording {
            warn!("Ignoring reset while recording");
            return;
        }
        self.fragments = AudioFragmentSequence::new();
        self.counters = Arc::new(CaptureCounters::default());
        self.state = RecorderState::Idle;
    }

    /// Start recording from a granted input backend
    ///
    /// Channel 0 of every frame is also offered to `tap`, if given. The tap
    /// is lossy: a full tap drops samples instead of holding up capture.
    pub async fn start(
        &mut self,
        mut backend: Box<dyn AudioBackend>,
        tap: Option<TapSender>,
    ) -> Result<(), CaptureError> {
        if self.state == RecorderState::Recording {
            warn!("Recording already started");
            return Ok(());
        }

        let audio_rx = backend.start().await?;

        info!("Recording started from {} input", backend.name());

        self.fragments = AudioFragmentSequence::new();
        self.counters = Arc::new(CaptureCounters::default());
        self.collector = Some(tokio::spawn(collect_fragments(
            audio_rx,
            tap,
            Arc::clone(&self.counters),
        )));
        self.backend = Some(backend);
        self.state = RecorderState::Recording;

        Ok(())
    }

    /// Stop recording and hand back the complete fragment sequence
    ///
    /// Releases the input device, then waits until every pending fragment
    /// has been collected. When the recorder is idle or already stopped the
    /// existing (possibly empty) sequence is returned straight away.
    pub async fn stop(&mut self) -> &AudioFragmentSequence {
        if let Some(mut backend) = self.backend.take() {
            if let Err(e) = backend.stop().await {
                error!("Failed to stop {} input: {}", backend.name(), e);
            }
        }

        self.join_collector().await;

        if self.state == RecorderState::Recording {
            self.state = RecorderState::Stopped;
            info!(
                "Recording stopped: {} fragments, {} bytes",
                self.fragments.len(),
                self.fragments.total_bytes()
            );
        }

        &self.fragments
    }

    /// Resolves when the input ends on its own (device unplugged, file
    /// replay finished). Never resolves while idle.
    ///
    /// Cancel-safe: dropping the future leaves the recording untouched.
    pub async fn ended(&mut self) {
        match self.collector.as_mut() {
            Some(collector) => {
                let result = collector.await;
                self.collector = None;
                self.store_collected(result);
                self.state = RecorderState::Stopped;
                info!("Input track ended: {} fragments", self.fragments.len());
            }
            None => std::future::pending::<()>().await,
        }
    }

    async fn join_collector(&mut self) {
        if let Some(collector) = self.collector.take() {
            let result = collector.await;
            self.store_collected(result);
        }
    }

    fn store_collected(&mut self, result: Result<AudioFragmentSequence, tokio::task::JoinError>) {
        match result {
            Ok(sequence) => self.fragments = sequence,
            Err(e) => error!("Fragment collector panicked: {}", e),
        }
    }
}

impl Default for CaptureRecorder {
    fn default() -> Self {
        Self::new()
    }
}

async fn collect_fragments(
    mut audio_rx: mpsc::UnboundedReceiver<AudioFrame>,
    tap: Option<TapSender>,
    counters: Arc<CaptureCounters>,
) -> AudioFragmentSequence {
    let mut sequence = AudioFragmentSequence::new();

    while let Some(frame) = audio_rx.recv().await {
        if frame.samples.is_empty() {
            continue;
        }

        if let Some(tap) = &tap {
            if tap.try_send(frame.channel_samples(0)).is_err() {
                debug!("Visualizer tap full or closed, dropping tap samples");
            }
        }

        sequence.push_frame(&frame);
        counters.record(frame.samples.len() * 2);
        debug!(
            "Fragment {} received: {} bytes at {}ms",
            sequence.len() - 1,
            frame.samples.len() * 2,
            frame.timestamp_ms
        );
    }

    sequence
}
