//! Microphone capture using CPAL
//!
//! The cpal stream lives on a dedicated thread for its whole lifetime; the
//! backend only holds the channels used to stop it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame, FragmentAssembler};
use super::wav::quantize;
use crate::error::CaptureError;

pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    device_name: String,
    stop_tx: Option<std_mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
    is_capturing: Arc<AtomicBool>,
}

impl MicrophoneBackend {
    /// Look up the default input device. Fails with `PermissionDenied`
    /// when there is none to hand out.
    pub fn new(config: AudioBackendConfig) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            CaptureError::PermissionDenied("no audio input device available".to_string())
        })?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Using audio input device: {}", device_name);

        Ok(Self {
            config,
            device_name,
            stop_tx: None,
            worker: None,
            is_capturing: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<AudioFrame>, CaptureError> {
        if self.is_capturing() {
            return Err(CaptureError::Stream("microphone is already capturing".to_string()));
        }

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), CaptureError>>();

        let interval_ms = self.config.buffer_duration_ms;
        let is_capturing = Arc::clone(&self.is_capturing);
        let interrupt_tx = stop_tx.clone();

        let worker = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                run_capture_thread(
                    frame_tx,
                    stop_rx,
                    interrupt_tx,
                    ready_tx,
                    interval_ms,
                    is_capturing,
                )
            })
            .map_err(|e| CaptureError::Stream(format!("Failed to spawn capture thread: {}", e)))?;

        let started = match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(CaptureError::Stream(
                "capture thread exited before the stream started".to_string(),
            )),
        };

        if let Err(e) = started {
            let _ = stop_tx.send(());
            let _ = tokio::task::spawn_blocking(move || worker.join()).await;
            return Err(e);
        }

        self.stop_tx = Some(stop_tx);
        self.worker = Some(worker);

        info!("Microphone capture started on {}", self.device_name);

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The thread may already be gone if the device disappeared
            let _ = stop_tx.send(());
        }

        if let Some(worker) = self.worker.take() {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => error!("Capture thread panicked"),
                Err(e) => error!("Failed to join capture thread: {}", e),
            }
            info!("Microphone released: {}", self.device_name);
        }

        self.is_capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

fn run_capture_thread(
    frame_tx: mpsc::UnboundedSender<AudioFrame>,
    stop_rx: std_mpsc::Receiver<()>,
    interrupt_tx: std_mpsc::Sender<()>,
    ready_tx: oneshot::Sender<Result<(), CaptureError>>,
    interval_ms: u64,
    is_capturing: Arc<AtomicBool>,
) {
    let setup = open_input_stream(frame_tx, interrupt_tx, interval_ms);

    let (stream, assembler) = match setup {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    is_capturing.store(true, Ordering::SeqCst);
    let _ = ready_tx.send(Ok(()));

    // Blocks until stop() or the stream error callback fires
    let _ = stop_rx.recv();
    drop(stream);

    match assembler.lock() {
        Ok(mut assembler) => assembler.flush(),
        Err(_) => error!("Fragment assembler poisoned, final fragment lost"),
    }

    is_capturing.store(false, Ordering::SeqCst);
}

fn open_input_stream(
    frame_tx: mpsc::UnboundedSender<AudioFrame>,
    interrupt_tx: std_mpsc::Sender<()>,
    interval_ms: u64,
) -> Result<(Stream, Arc<Mutex<FragmentAssembler>>), CaptureError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or_else(|| {
        CaptureError::PermissionDenied("no audio input device available".to_string())
    })?;

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::PermissionDenied(e.to_string()))?;

    info!(
        "Audio config: {} Hz, {} channels, {:?}",
        supported.sample_rate().0,
        supported.channels(),
        supported.sample_format()
    );

    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    let assembler = Arc::new(Mutex::new(FragmentAssembler::new(
        config.sample_rate.0,
        config.channels,
        interval_ms,
        frame_tx,
    )));

    let stream = match sample_format {
        SampleFormat::I16 => {
            build_stream::<i16>(&device, &config, Arc::clone(&assembler), interrupt_tx)
        }
        SampleFormat::U16 => {
            build_stream::<u16>(&device, &config, Arc::clone(&assembler), interrupt_tx)
        }
        SampleFormat::F32 => {
            build_stream::<f32>(&device, &config, Arc::clone(&assembler), interrupt_tx)
        }
        other => Err(CaptureError::Stream(format!(
            "Unsupported sample format: {:?}",
            other
        ))),
    }?;

    stream
        .play()
        .map_err(|e| CaptureError::PermissionDenied(format!("Failed to start stream: {}", e)))?;

    Ok((stream, assembler))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    assembler: Arc<Mutex<FragmentAssembler>>,
    interrupt_tx: std_mpsc::Sender<()>,
) -> Result<Stream, CaptureError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let err_fn = move |err: cpal::StreamError| {
        error!("Audio stream error: {}", err);
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            warn!("Input device went away, ending capture");
            let _ = interrupt_tx.send(());
        }
    };

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<i16> = data
                    .iter()
                    .map(|&s| quantize(f32::from_sample(s)))
                    .collect();

                if let Ok(mut assembler) = assembler.lock() {
                    assembler.push(&samples);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| CaptureError::PermissionDenied(e.to_string()))
}
