pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod upload;
pub mod validation;

pub use audio::{
    convert_to_wav, AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioBlob, AudioFile,
    AudioFragment, AudioFragmentSequence, AudioFrame, AudioSource, CaptureRecorder,
    DecodedAudioBuffer, LiveVisualizer, VisualFrame, VolumeLevel, WavByteStream,
};
pub use config::Config;
pub use error::{CaptureError, DecodeError, UploadError, ValidationError};
pub use session::{
    format_elapsed, CaptureController, Notice, NoticeKind, PendingRecording, RecordingSession,
    SessionConfig, SessionStats, StopReason,
};
pub use upload::{UploadClient, UploadConfig, UploadOutcome};
pub use validation::{FileCandidate, ValidationRules};
