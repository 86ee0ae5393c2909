//! Acceptance rules for picked files and finished recordings

use std::io::Cursor;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::{media_type_for_path, WavByteStream};
use crate::error::ValidationError;

const WAV_EXTENSION: &str = ".wav";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    /// Largest file accepted for upload (50 MiB)
    pub max_file_bytes: u64,
    /// Encoded recordings smaller than this are "too short"
    pub min_wav_bytes: u64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * 1024 * 1024,
            min_wav_bytes: 1000,
        }
    }
}

/// What is known about a picked or dropped file before reading it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub name: String,
    pub size: u64,
    pub media_type: String,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, size: u64, media_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            media_type: media_type.into(),
        }
    }

    /// Describe a file on disk; the media type is guessed from its extension
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, metadata.len(), media_type_for_path(path)))
    }
}

/// Summary of a WAV that passed content validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSummary {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub frames: u32,
}

/// Check name, size, and media type, in that order
pub fn validate_candidate(
    candidate: &FileCandidate,
    rules: &ValidationRules,
) -> Result<(), ValidationError> {
    if !candidate.name.to_lowercase().ends_with(WAV_EXTENSION) {
        return Err(ValidationError::NotWav {
            name: candidate.name.clone(),
        });
    }

    if candidate.size > rules.max_file_bytes {
        return Err(ValidationError::TooLarge {
            size: candidate.size,
            max: rules.max_file_bytes,
        });
    }

    let media_type = candidate.media_type.to_lowercase();
    if !media_type.contains("audio") && !media_type.contains("wav") {
        return Err(ValidationError::NotAudio {
            media_type: candidate.media_type.clone(),
        });
    }

    debug!("Accepted {} ({} bytes)", candidate.name, candidate.size);
    Ok(())
}

/// The bytes must parse as WAV and hold at least one frame
pub fn validate_wav_contents(bytes: &[u8]) -> Result<WavSummary, ValidationError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| ValidationError::InvalidWav(e.to_string()))?;

    let spec = reader.spec();
    let frames = reader.duration();

    if frames == 0 {
        return Err(ValidationError::EmptyWav);
    }

    Ok(WavSummary {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames,
    })
}

/// Reject encoded recordings below the minimum size
pub fn validate_recording(
    wav: &WavByteStream,
    rules: &ValidationRules,
) -> Result<(), ValidationError> {
    let bytes = wav.len() as u64;
    if bytes < rules.min_wav_bytes {
        return Err(ValidationError::TooShort {
            bytes,
            min: rules.min_wav_bytes,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = ValidationRules::default();
        assert_eq!(rules.max_file_bytes, 52_428_800);
        assert_eq!(rules.min_wav_bytes, 1000);
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let rules = ValidationRules::default();
        let candidate = FileCandidate::new("HEART.WAV", 10, "audio/wav");
        assert!(validate_candidate(&candidate, &rules).is_ok());
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let rules = ValidationRules::default();
        let at_limit = FileCandidate::new("a.wav", rules.max_file_bytes, "audio/wav");
        let over = FileCandidate::new("a.wav", rules.max_file_bytes + 1, "audio/wav");

        assert!(validate_candidate(&at_limit, &rules).is_ok());
        assert!(matches!(
            validate_candidate(&over, &rules),
            Err(ValidationError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_wav_hint_in_media_type_is_enough() {
        let rules = ValidationRules::default();
        let candidate = FileCandidate::new("a.wav", 10, "application/x-wav");
        assert!(validate_candidate(&candidate, &rules).is_ok());
    }

    #[test]
    fn test_garbage_is_not_a_wav() {
        assert!(matches!(
            validate_wav_contents(b"definitely not riff data"),
            Err(ValidationError::InvalidWav(_))
        ));
    }
}
