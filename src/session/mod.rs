//! Capture session management
//!
//! This module ties the recorder, visualizer, encoder, validation, and upload
//! client into one flow:
//! - Start/stop capture with a hard duration cap
//! - Elapsed-time display and live frames
//! - A single pending recording that is uploaded or discarded
//! - Transient notices for every outcome

mod config;
mod controller;
mod notice;
mod session;
mod stats;

pub use config::SessionConfig;
pub use controller::{CaptureController, PendingRecording, StopReason};
pub use notice::{Notice, NoticeKind, NOTICE_DISPLAY_TIME};
pub use session::RecordingSession;
pub use stats::{format_elapsed, SessionStats};
