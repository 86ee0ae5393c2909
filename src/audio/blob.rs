use std::path::Path;

/// Media type of the canonical encoder output
pub const WAV_MEDIA_TYPE: &str = "audio/wav";

/// Fallback when nothing better is known about a blob
pub const OCTET_STREAM: &str = "application/octet-stream";

const PCM_ESSENCE: &str = "audio/pcm";

/// An opaque audio payload tagged with its media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl AudioBlob {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Media type without parameters, lowercased (e.g. `audio/wav`)
    pub fn essence(&self) -> String {
        media_type_essence(&self.media_type)
    }
}

/// Raw interleaved signed 16-bit little-endian PCM, as emitted by the
/// capture backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// e.g. `audio/pcm;format=s16le;rate=48000;channels=2`
    pub fn media_type(&self) -> String {
        format!(
            "{};format=s16le;rate={};channels={}",
            PCM_ESSENCE, self.sample_rate, self.channels
        )
    }

    /// Parse a raw PCM media type. Returns `None` for any other media type
    /// or when the rate/channel parameters are missing or zero.
    pub fn parse(media_type: &str) -> Option<Self> {
        let mut parts = media_type.split(';');
        if parts.next()?.trim().to_ascii_lowercase() != PCM_ESSENCE {
            return None;
        }

        let mut sample_rate = None;
        let mut channels = None;

        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "rate" => sample_rate = value.trim().parse::<u32>().ok(),
                "channels" => channels = value.trim().parse::<u16>().ok(),
                "format" if !value.trim().eq_ignore_ascii_case("s16le") => return None,
                _ => {}
            }
        }

        match (sample_rate, channels) {
            (Some(rate), Some(ch)) if rate > 0 && ch > 0 => Some(Self::new(rate, ch)),
            _ => None,
        }
    }
}

pub fn media_type_essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Guess a media type from a file extension, the way a browser tags
/// picked files
pub fn media_type_for_path(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("wav") | Some("wave") => WAV_MEDIA_TYPE,
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("webm") => "audio/webm",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("m4a") | Some("mp4") => "audio/mp4",
        _ => OCTET_STREAM,
    }
}

/// File extension used as a probe hint for a media type
pub fn extension_for_media_type(media_type: &str) -> Option<&'static str> {
    match media_type_essence(media_type).as_str() {
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some("wav"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/webm" | "video/webm" => Some("webm"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        _ => None,
    }
}
