use thiserror::Error;

/// Top-level error for the capture-to-upload pipeline.
///
/// Every variant is recoverable: the controller reports it as a notice
/// and returns to the ready state.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No input handle could be obtained (no device, or access refused)
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The input stream failed after it was granted
    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Failed to encode WAV: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The audio blob could not be turned into samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Unsupported audio format: {0}")]
    Unsupported(String),

    #[error("Corrupt audio data: {0}")]
    Corrupt(String),

    #[error("No decodable audio track found")]
    NoAudioTrack,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx HTTP status
    #[error("Error HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 2xx response whose `status` field was not "success"
    #[error("{0}")]
    Rejected(String),

    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    #[error("Invalid upload endpoint: {0}")]
    InvalidEndpoint(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Only .wav files are accepted. Your file: {name}")]
    NotWav { name: String },

    #[error("File is too large ({size} bytes). Maximum size: {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("File is not valid audio (media type {media_type:?}). Make sure to upload a .wav file")]
    NotAudio { media_type: String },

    #[error("File is corrupt or not a valid WAV: {0}")]
    InvalidWav(String),

    #[error("WAV file is empty")]
    EmptyWav,

    #[error("Recording is too short ({bytes} bytes). Try recording for longer")]
    TooShort { bytes: u64, min: u64 },

    #[error("No audio was recorded. Try again")]
    NoAudio,

    #[error("No audio to upload")]
    NothingPending,
}
