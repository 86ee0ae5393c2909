use super::backend::AudioFrame;
use super::blob::{AudioBlob, PcmFormat, OCTET_STREAM};

/// One timed piece of captured audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFragment {
    /// Position in arrival order (0-indexed)
    pub sequence: usize,
    /// Start time in milliseconds since capture started
    pub timestamp_ms: u64,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl AudioFragment {
    /// Serialize a captured frame as raw s16le PCM
    pub fn from_frame(frame: &AudioFrame, sequence: usize) -> Self {
        let bytes = frame.samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        Self {
            sequence,
            timestamp_ms: frame.timestamp_ms,
            media_type: PcmFormat::new(frame.sample_rate, frame.channels).media_type(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Fragments of one recording, in the order the recorder received them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioFragmentSequence {
    fragments: Vec<AudioFragment>,
}

impl AudioFragmentSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Empty fragments are ignored.
    pub fn push(&mut self, fragment: AudioFragment) {
        if !fragment.is_empty() {
            self.fragments.push(fragment);
        }
    }

    pub(crate) fn push_frame(&mut self, frame: &AudioFrame) {
        let fragment = AudioFragment::from_frame(frame, self.fragments.len());
        self.push(fragment);
    }

    pub fn fragments(&self) -> &[AudioFragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.fragments.iter().map(AudioFragment::len).sum()
    }

    /// Media type of the recording, taken from the first fragment
    pub fn media_type(&self) -> &str {
        self.fragments
            .first()
            .map(|f| f.media_type.as_str())
            .unwrap_or(OCTET_STREAM)
    }

    /// Concatenate all fragment bytes in arrival order
    pub fn assemble(&self) -> AudioBlob {
        let mut bytes = Vec::with_capacity(self.total_bytes());
        for fragment in &self.fragments {
            bytes.extend_from_slice(&fragment.bytes);
        }
        AudioBlob::new(bytes, self.media_type())
    }
}
