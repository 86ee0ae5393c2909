//! Live waveform and volume level
//!
//! Reads the recorder's sample tap into a small ring buffer and, on every
//! tick, turns the latest window into a waveform trace plus a coarse volume
//! level. Frames are published on a `watch` channel for whatever is drawing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::recorder::TapReceiver;

/// Midpoint of the unsigned 8-bit time-domain scale
const TIME_DOMAIN_CENTER: f32 = 128.0;

/// Average level below which the input counts as quiet
const LOW_LEVEL_CEILING: f32 = 50.0;

/// Average level below which the input counts as moderate
const MEDIUM_LEVEL_CEILING: f32 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Samples per analysed window
    pub window: usize,
    /// Render interval in milliseconds (~30fps)
    pub tick_ms: u64,
    /// Drawing surface width
    pub width: f32,
    /// Drawing surface height
    pub height: f32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            window: 1024,
            tick_ms: 33,
            width: 600.0,
            height: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeLevel {
    Low,
    Medium,
    High,
}

impl VolumeLevel {
    /// Classify an average level on the 0..=255 scale
    pub fn from_average(average: f32) -> Self {
        if average < LOW_LEVEL_CEILING {
            VolumeLevel::Low
        } else if average < MEDIUM_LEVEL_CEILING {
            VolumeLevel::Medium
        } else {
            VolumeLevel::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub x: f32,
    pub y: f32,
}

/// One rendered tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualFrame {
    /// Polyline across the surface; empty when cleared
    pub trace: Vec<TracePoint>,
    /// Mean amplitude on the 0..=255 scale
    pub average: f32,
    pub level: VolumeLevel,
}

impl VisualFrame {
    /// Blank surface, drawn when visualization stops
    pub fn cleared() -> Self {
        Self {
            trace: Vec::new(),
            average: 0.0,
            level: VolumeLevel::Low,
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.trace.is_empty()
    }
}

impl Default for VisualFrame {
    fn default() -> Self {
        Self::cleared()
    }
}

/// Ring buffer holding the most recent tap samples
pub struct WaveformBuffer {
    samples: VecDeque<i16>,
    capacity: usize,
}

impl WaveformBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add samples, evicting the oldest once at capacity
    pub fn push_samples(&mut self, samples: &[i16]) {
        let len = samples.len();

        if len >= self.capacity {
            self.samples.clear();
            self.samples.extend(&samples[len - self.capacity..]);
            return;
        }

        let to_remove = (self.samples.len() + len).saturating_sub(self.capacity);
        if to_remove > 0 {
            self.samples.drain(0..to_remove);
        }

        self.samples.extend(samples);
    }

    /// The latest window, left-padded with silence until the buffer fills
    pub fn window(&self) -> Vec<i16> {
        let mut window = vec![0i16; self.capacity - self.samples.len()];
        window.extend(self.samples.iter().copied());
        window
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Map a sample to the unsigned 8-bit time-domain scale (silence = 128)
fn time_domain_byte(sample: i16) -> f32 {
    let normalized = sample as f32 / 32768.0;
    (TIME_DOMAIN_CENTER * (1.0 + normalized)).clamp(0.0, 255.0).floor()
}

/// Render one frame from a window of samples
pub fn render_frame(window: &[i16], width: f32, height: f32) -> VisualFrame {
    if window.is_empty() {
        return VisualFrame::cleared();
    }

    let slice_width = width / window.len() as f32;
    let mut trace = Vec::with_capacity(window.len() + 1);
    let mut deviation_sum = 0.0f32;

    for (i, &sample) in window.iter().enumerate() {
        let byte = time_domain_byte(sample);
        let v = byte / TIME_DOMAIN_CENTER;
        trace.push(TracePoint {
            x: i as f32 * slice_width,
            y: v * height / 2.0,
        });
        deviation_sum += (byte - TIME_DOMAIN_CENTER).abs();
    }

    trace.push(TracePoint {
        x: width,
        y: height / 2.0,
    });

    // Mean deviation from centre spans 0..=128; stretch it over 0..=255
    let average = (deviation_sum / window.len() as f32 * 2.0).min(255.0);

    VisualFrame {
        trace,
        average,
        level: VolumeLevel::from_average(average),
    }
}

/// Repeating render task with an explicit stop token
pub struct LiveVisualizer {
    config: VisualizerConfig,
    frames_tx: Arc<watch::Sender<VisualFrame>>,
    frames_rx: watch::Receiver<VisualFrame>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl LiveVisualizer {
    pub fn new(config: VisualizerConfig) -> Self {
        let (frames_tx, frames_rx) = watch::channel(VisualFrame::cleared());

        Self {
            config,
            frames_tx: Arc::new(frames_tx),
            frames_rx,
            cancel: None,
            task: None,
        }
    }

    /// Receiver of rendered frames
    pub fn subscribe(&self) -> watch::Receiver<VisualFrame> {
        self.frames_rx.clone()
    }

    /// Most recent frame
    pub fn current(&self) -> VisualFrame {
        self.frames_rx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start rendering from a sample tap. A running visualizer is stopped
    /// first.
    pub async fn start(&mut self, mut tap: TapReceiver) {
        self.stop().await;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let frames_tx = Arc::clone(&self.frames_tx);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            let mut buffer = WaveformBuffer::new(config.window);
            let mut ticker = tokio::time::interval(Duration::from_millis(config.tick_ms.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    Some(samples) = tap.recv() => buffer.push_samples(&samples),
                    _ = ticker.tick() => {
                        let frame = render_frame(&buffer.window(), config.width, config.height);
                        frames_tx.send_replace(frame);
                    }
                }
            }

            frames_tx.send_replace(VisualFrame::cleared());
            debug!("Visualizer loop exited");
        });

        self.cancel = Some(cancel);
        self.task = Some(task);
    }

    /// Stop rendering and clear the surface. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Visualizer task panicked: {}", e);
            }
        }

        self.frames_tx.send_replace(VisualFrame::cleared());
    }
}
