//! PCM/WAV encoder
//!
//! Decodes an arbitrary audio blob into normalized samples and re-encodes
//! channel 0 as a canonical 44-byte-header, 16-bit mono WAV.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

use super::blob::{extension_for_media_type, AudioBlob, PcmFormat, WAV_MEDIA_TYPE};
use crate::error::{CaptureError, DecodeError};

/// Size of the canonical RIFF/WAVE header
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = 2;

/// Per-channel normalized samples
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudioBuffer {
    pub sample_rate: u32,
    /// One vector per channel, samples nominally in -1.0..=1.0
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, vec![samples])
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Length of channel 0 in samples
    pub fn frame_count(&self) -> usize {
        self.channel(0).map_or(0, <[f32]>::len)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Canonical 16-bit mono WAV bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavByteStream {
    bytes: Vec<u8>,
    sample_rate: u32,
    sample_count: usize,
}

impl WavByteStream {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count as f64 / self.sample_rate as f64
    }

    pub fn media_type(&self) -> &'static str {
        WAV_MEDIA_TYPE
    }

    pub fn to_blob(&self) -> AudioBlob {
        AudioBlob::new(self.bytes.clone(), WAV_MEDIA_TYPE)
    }
}

/// Clamp to [-1, 1] and scale by 32767, truncating toward zero
pub fn quantize(sample: f32) -> i16 {
    let clamped = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    (clamped * i16::MAX as f32) as i16
}

/// Decode any supported blob into per-channel samples
pub fn decode(blob: &AudioBlob) -> Result<DecodedAudioBuffer, DecodeError> {
    if let Some(format) = PcmFormat::parse(&blob.media_type) {
        return decode_pcm(&blob.bytes, format);
    }
    decode_container(blob)
}

fn decode_pcm(bytes: &[u8], format: PcmFormat) -> Result<DecodedAudioBuffer, DecodeError> {
    let channel_count = format.channels as usize;
    let frame_bytes = channel_count * BLOCK_ALIGN as usize;

    if bytes.len() % frame_bytes != 0 {
        return Err(DecodeError::Corrupt(format!(
            "{} bytes is not a whole number of {}-channel s16le frames",
            bytes.len(),
            channel_count
        )));
    }

    let frames = bytes.len() / frame_bytes;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];

    for frame in bytes.chunks_exact(frame_bytes) {
        for (ch, sample) in frame.chunks_exact(2).enumerate() {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            channels[ch].push(value as f32 / i16::MAX as f32);
        }
    }

    debug!(
        "Decoded raw PCM: {} frames, {}Hz, {} channels",
        frames, format.sample_rate, channel_count
    );

    Ok(DecodedAudioBuffer::new(format.sample_rate, channels))
}

fn decode_container(blob: &AudioBlob) -> Result<DecodedAudioBuffer, DecodeError> {
    if blob.is_empty() {
        return Err(DecodeError::Corrupt("empty audio blob".to_string()));
    }

    let source = Cursor::new(blob.bytes.clone());
    let stream = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    hint.mime_type(&blob.essence());
    if let Some(ext) = extension_for_media_type(&blob.media_type) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Unsupported(format!("{} ({})", blob.media_type, e)))?;

    let mut format = probed.format;

    let (track_id, codec_params) = {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        (track.id, track.codec_params.clone())
    };

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        };

        let spec = *decoded.spec();
        let channel_count = spec.channels.count();
        if channel_count == 0 {
            continue;
        }
        sample_rate.get_or_insert(spec.rate);
        if channels.len() < channel_count {
            channels.resize_with(channel_count, Vec::new);
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        for frame in buffer.samples().chunks_exact(channel_count) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }
    }

    let sample_rate = sample_rate
        .ok_or_else(|| DecodeError::Corrupt("stream does not declare a sample rate".to_string()))?;

    if channels.is_empty() {
        channels.push(Vec::new());
    }

    Ok(DecodedAudioBuffer::new(sample_rate, channels))
}

/// Serialize channel 0 of a decoded buffer as 16-bit mono WAV
pub fn encode_wav(buffer: &DecodedAudioBuffer) -> Result<WavByteStream, CaptureError> {
    let samples = buffer.channel(0).unwrap_or(&[]);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(quantize(sample))
                .map_err(|e| CaptureError::Encode(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
    }

    let bytes = cursor.into_inner();
    debug_assert_eq!(bytes.len(), WAV_HEADER_LEN + samples.len() * BLOCK_ALIGN as usize);

    Ok(WavByteStream {
        bytes,
        sample_rate: buffer.sample_rate,
        sample_count: samples.len(),
    })
}

/// Decode a blob and re-encode it as canonical mono WAV
pub fn convert_to_wav(blob: &AudioBlob) -> Result<WavByteStream, CaptureError> {
    let decoded = decode(blob)?;

    if decoded.channel_count() > 1 {
        debug!(
            "Keeping channel 0 of {} decoded channels",
            decoded.channel_count()
        );
    }

    let wav = encode_wav(&decoded)?;

    info!(
        "Converted {} ({} bytes) to WAV: {:.2}s, {}Hz, {} bytes",
        blob.media_type,
        blob.len(),
        wav.duration_seconds(),
        wav.sample_rate(),
        wav.len()
    );

    Ok(wav)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), i16::MAX);
        assert_eq!(quantize(-1.0), -i16::MAX);

        // Test clamping
        assert_eq!(quantize(2.0), i16::MAX);
        assert_eq!(quantize(-2.0), -i16::MAX);
        assert_eq!(quantize(f32::NAN), 0);
    }

    #[test]
    fn test_quantize_truncates_toward_zero() {
        assert_eq!(quantize(0.5), 16383);
        assert_eq!(quantize(-0.5), -16383);
    }

    #[test]
    fn test_decode_pcm_rejects_partial_frame() {
        let blob = AudioBlob::new(vec![0, 0, 0], PcmFormat::new(8000, 1).media_type());
        assert!(matches!(decode(&blob), Err(DecodeError::Corrupt(_))));
    }

    #[test]
    fn test_decode_pcm_deinterleaves() {
        let samples: [i16; 4] = [i16::MAX, 0, -i16::MAX, 0];
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let blob = AudioBlob::new(bytes, PcmFormat::new(8000, 2).media_type());

        let decoded = decode(&blob).unwrap();
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.channel(0), Some(&[1.0f32, -1.0][..]));
        assert_eq!(decoded.channel(1), Some(&[0.0f32, 0.0][..]));
    }

    #[test]
    fn test_empty_buffer_encodes_header_only() {
        let wav = encode_wav(&DecodedAudioBuffer::new(8000, Vec::new())).unwrap();
        assert_eq!(wav.len(), WAV_HEADER_LEN);
        assert_eq!(wav.sample_count(), 0);
    }
}
