use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::notice::Notice;
use super::session::RecordingSession;
use super::stats::{format_elapsed, SessionStats};
use crate::audio::{
    convert_to_wav, create_tap, AudioBackendConfig, AudioBackendFactory, AudioBlob, AudioSource,
    CaptureRecorder, LiveVisualizer, VisualFrame, WavByteStream,
};
use crate::config::Config;
use crate::error::{CaptureError, ValidationError};
use crate::upload::{UploadClient, UploadOutcome};
use crate::validation::{
    validate_candidate, validate_recording, validate_wav_contents, FileCandidate,
    ValidationRules,
};

/// A finished, encoded recording waiting to be uploaded or discarded
#[derive(Debug, Clone)]
pub struct PendingRecording {
    pub session_id: Uuid,
    pub wav: WavByteStream,
    pub duration: Duration,
    pub stop_reason: StopReason,
}

/// Why a capture ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    LimitReached,
    InputEnded,
}

struct SessionTimer {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Drives one user's capture → preview → upload flow
///
/// Owns the recorder, visualizer, timer, and pending recording, so
/// independent controllers never share state. Failures are reported as
/// notices and leave the controller ready for the next action.
pub struct CaptureController {
    source: AudioSource,
    session_config: SessionConfig,
    rules: ValidationRules,
    recorder: CaptureRecorder,
    visualizer: LiveVisualizer,
    uploader: UploadClient,
    session: Option<RecordingSession>,
    timer: Option<SessionTimer>,
    elapsed_tx: Arc<watch::Sender<Duration>>,
    elapsed_rx: watch::Receiver<Duration>,
    pending: Option<PendingRecording>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl CaptureController {
    /// Create a controller and the receiver its notices are published on
    pub fn new(
        config: &Config,
        source: AudioSource,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notice>), CaptureError> {
        let uploader = UploadClient::new(&config.upload)?;
        let (notices, notices_rx) = mpsc::unbounded_channel();
        let (elapsed_tx, elapsed_rx) = watch::channel(Duration::ZERO);

        let controller = Self {
            source,
            session_config: config.recording.clone(),
            rules: config.validation.clone(),
            recorder: CaptureRecorder::new(),
            visualizer: LiveVisualizer::new(config.visualizer.clone()),
            uploader,
            session: None,
            timer: None,
            elapsed_tx: Arc::new(elapsed_tx),
            elapsed_rx,
            pending: None,
            notices,
        };

        Ok((controller, notices_rx))
    }

    pub fn is_recording(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(RecordingSession::is_recording)
    }

    /// Elapsed capture time, updated once per second
    pub fn elapsed(&self) -> watch::Receiver<Duration> {
        self.elapsed_rx.clone()
    }

    /// Live visualizer frames
    pub fn frames(&self) -> watch::Receiver<VisualFrame> {
        self.visualizer.subscribe()
    }

    pub fn pending(&self) -> Option<&PendingRecording> {
        self.pending.as_ref()
    }

    /// Stats of the current session, or of the last one once stopped
    pub fn stats(&self) -> Option<SessionStats> {
        self.session
            .as_ref()
            .map(|s| s.stats(self.recorder.progress()))
    }

    /// Acquire the input and start capture, visualization, and the timer
    pub async fn start_recording(&mut self) -> Result<(), CaptureError> {
        if self.is_recording() {
            warn!("Recording already started");
            return Ok(());
        }

        match self.try_start().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.reset_recording_state().await;
                Err(self.report(e))
            }
        }
    }

    async fn try_start(&mut self) -> Result<(), CaptureError> {
        let backend_config = AudioBackendConfig {
            buffer_duration_ms: self.session_config.fragment_interval_ms,
            realtime: self.session_config.realtime_replay,
        };

        let backend = AudioBackendFactory::create(&self.source, backend_config)?;
        let input = backend.name().to_string();

        if let Some(previous) = self.pending.take() {
            info!("Dropping unsent recording from session {}", previous.session_id);
        }

        self.recorder.reset();
        let (tap_tx, tap_rx) = create_tap();
        self.recorder.start(backend, Some(tap_tx)).await?;
        self.visualizer.start(tap_rx).await;

        self.session = Some(RecordingSession::start(input));
        self.start_timer();

        Ok(())
    }

    /// Wait for `stop_signal`, the duration cap, or the input ending,
    /// whichever comes first, then stop
    pub async fn run_until_stopped<F>(
        &mut self,
        stop_signal: F,
    ) -> Result<&PendingRecording, CaptureError>
    where
        F: Future<Output = ()>,
    {
        let limit = self.session_config.max_duration();

        let Some(remaining) = self
            .session
            .as_ref()
            .filter(|s| s.is_recording())
            .map(|s| s.remaining(limit))
        else {
            return self.finish(StopReason::Requested).await;
        };

        let reason = tokio::select! {
            _ = stop_signal => StopReason::Requested,
            _ = tokio::time::sleep(remaining) => StopReason::LimitReached,
            _ = self.recorder.ended() => StopReason::InputEnded,
        };

        info!("Stopping capture: {:?}", reason);

        if reason == StopReason::LimitReached {
            self.publish(Notice::error(format!(
                "Recording limit of {} reached",
                format_elapsed(limit)
            )));
        }

        self.finish(reason).await
    }

    /// Stop capture, encode the recording, and hold it for upload
    pub async fn stop_recording(&mut self) -> Result<&PendingRecording, CaptureError> {
        self.finish(StopReason::Requested).await
    }

    async fn finish(&mut self, reason: StopReason) -> Result<&PendingRecording, CaptureError> {
        let blob = {
            let fragments = self.recorder.stop().await;
            if fragments.is_empty() {
                None
            } else {
                Some(fragments.assemble())
            }
        };

        self.visualizer.stop().await;
        self.stop_timer().await;

        // The stopped session stays readable through `stats`
        let stopped = self
            .session
            .as_mut()
            .filter(|s| s.is_recording())
            .map(|s| {
                s.mark_stopped();
                (s.id(), s.elapsed())
            });

        let Some((session_id, duration)) = stopped else {
            if self.pending.is_some() {
                debug!("Stop requested with no active session, keeping pending recording");
                return self
                    .pending
                    .as_ref()
                    .ok_or(CaptureError::Validation(ValidationError::NoAudio));
            }
            return Err(self.report(ValidationError::NoAudio.into()));
        };

        self.elapsed_tx.send_replace(Duration::from_secs(duration.as_secs()));

        let Some(blob) = blob else {
            return Err(self.report(ValidationError::NoAudio.into()));
        };

        info!(
            "Session {} captured {} ({} bytes) in {}",
            session_id,
            blob.media_type,
            blob.len(),
            format_elapsed(duration)
        );

        let wav = match encode_off_thread(blob).await {
            Ok(wav) => wav,
            Err(e) => return Err(self.report(e)),
        };

        if let Err(e) = validate_recording(&wav, &self.rules) {
            return Err(self.report(e.into()));
        }

        let pending = self.pending.insert(PendingRecording {
            session_id,
            wav,
            duration,
            stop_reason: reason,
        });

        info!(
            "Recording ready for upload: {:.1}s, {} bytes",
            pending.wav.duration_seconds(),
            pending.wav.len()
        );

        Ok(&*pending)
    }

    /// Upload the pending recording; it is discarded once accepted
    pub async fn upload_pending(&mut self) -> Result<UploadOutcome, CaptureError> {
        let Some(pending) = self.pending.as_ref() else {
            return Err(self.report(ValidationError::NothingPending.into()));
        };

        let session_id = pending.session_id;
        let blob = pending.wav.to_blob();

        let result = self
            .uploader
            .upload(&blob, &self.session_config.upload_file_name)
            .await;

        match result {
            Ok(outcome) => {
                if self.pending.as_ref().map(|p| p.session_id) == Some(session_id) {
                    self.discard();
                }
                self.announce(&outcome, "Audio uploaded successfully");
                Ok(outcome)
            }
            Err(e) => Err(self.report(e.into())),
        }
    }

    /// Throw away the pending recording and reset the timer display
    pub fn discard(&mut self) {
        if let Some(pending) = self.pending.take() {
            info!("Recording from session {} discarded", pending.session_id);
        }
        if !self.is_recording() {
            self.recorder.reset();
            self.session = None;
        }
        self.elapsed_tx.send_replace(Duration::ZERO);
    }

    /// Validate a pre-recorded WAV and upload it under its own name
    pub async fn submit_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<UploadOutcome, CaptureError> {
        match self.try_submit_file(path.as_ref()).await {
            Ok(outcome) => {
                self.announce(&outcome, "File processed successfully");
                Ok(outcome)
            }
            Err(e) => Err(self.report(e)),
        }
    }

    async fn try_submit_file(&self, path: &Path) -> Result<UploadOutcome, CaptureError> {
        let candidate = FileCandidate::from_path(path)?;
        validate_candidate(&candidate, &self.rules)?;

        let bytes = tokio::fs::read(path).await?;
        let summary = validate_wav_contents(&bytes)?;

        info!(
            "Submitting {}: {} frames, {}Hz, {} channels",
            candidate.name, summary.frames, summary.sample_rate, summary.channels
        );

        let blob = AudioBlob::new(bytes, candidate.media_type.clone());
        Ok(self.uploader.upload(&blob, &candidate.name).await?)
    }

    /// Release everything a recording holds without producing a result
    pub async fn shutdown(&mut self) {
        self.reset_recording_state().await;
    }

    async fn reset_recording_state(&mut self) {
        let _ = self.recorder.stop().await;
        self.visualizer.stop().await;
        self.stop_timer().await;
        if let Some(mut session) = self.session.take() {
            session.mark_stopped();
            debug!("Session {} torn down", session.id());
        }
    }

    fn start_timer(&mut self) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let elapsed_tx = Arc::clone(&self.elapsed_tx);
        let started = Instant::now();

        elapsed_tx.send_replace(Duration::ZERO);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        elapsed_tx.send_replace(Duration::from_secs(started.elapsed().as_secs()));
                    }
                }
            }
        });

        self.timer = Some(SessionTimer { cancel, task });
    }

    async fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel.cancel();
            if let Err(e) = timer.task.await {
                error!("Session timer panicked: {}", e);
            }
        }
    }

    fn announce(&self, outcome: &UploadOutcome, default_message: &str) {
        match outcome.navigation() {
            Some(url) => self.publish(Notice::navigate(url.clone())),
            None => self.publish(Notice::success(
                outcome
                    .message
                    .clone()
                    .unwrap_or_else(|| default_message.to_string()),
            )),
        }
    }

    fn report(&self, error: CaptureError) -> CaptureError {
        error!("{}", error);
        self.publish(Notice::error(error.to_string()));
        error
    }

    fn publish(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            debug!("No notice listener attached");
        }
    }
}

async fn encode_off_thread(blob: AudioBlob) -> Result<WavByteStream, CaptureError> {
    match tokio::task::spawn_blocking(move || convert_to_wav(&blob)).await {
        Ok(result) => result,
        Err(e) => Err(CaptureError::Encode(format!("encoder task failed: {}", e))),
    }
}
