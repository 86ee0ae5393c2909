use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for recording sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capture is stopped automatically after this many seconds
    /// Default: 300 seconds (5 minutes)
    pub max_duration_secs: u64,

    /// Fragment cadence of the capture backend
    pub fragment_interval_ms: u64,

    /// Pace file inputs at their natural rate instead of replaying at once
    pub realtime_replay: bool,

    /// Filename sent with uploaded recordings
    pub upload_file_name: String,

    /// Directory where finished recordings are exported, if set (`~` allowed)
    pub save_dir: Option<String>,
}

impl SessionConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    pub fn fragment_interval(&self) -> Duration {
        Duration::from_millis(self.fragment_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 300,    // 5 minutes
            fragment_interval_ms: 100, // 100ms fragments
            realtime_replay: true,
            upload_file_name: "audio.wav".to_string(),
            save_dir: None,
        }
    }
}
