use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

use super::stats::SessionStats;
use crate::audio::CaptureProgress;

/// State of one capture, from start until stop or discard
#[derive(Debug, Clone)]
pub struct RecordingSession {
    id: Uuid,

    /// Name of the input backend in use
    input: String,

    /// When the session started
    started_at: DateTime<Utc>,

    started: Instant,

    /// Set once capture stops
    stopped_after: Option<Duration>,
}

impl RecordingSession {
    pub fn start(input: impl Into<String>) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            input: input.into(),
            started_at: Utc::now(),
            started: Instant::now(),
            stopped_after: None,
        };

        info!("Recording session {} started ({} input)", session.id, session.input);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_recording(&self) -> bool {
        self.stopped_after.is_none()
    }

    /// Freeze the elapsed time
    pub fn mark_stopped(&mut self) {
        if self.stopped_after.is_none() {
            self.stopped_after = Some(self.started.elapsed());
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.stopped_after.unwrap_or_else(|| self.started.elapsed())
    }

    /// Time left before `limit` is reached
    pub fn remaining(&self, limit: Duration) -> Duration {
        limit.saturating_sub(self.elapsed())
    }

    pub fn stats(&self, progress: CaptureProgress) -> SessionStats {
        SessionStats {
            session_id: self.id,
            is_recording: self.is_recording(),
            started_at: self.started_at,
            duration_secs: self.elapsed().as_secs_f64(),
            fragments_count: progress.fragments,
            bytes_captured: progress.bytes,
        }
    }
}
