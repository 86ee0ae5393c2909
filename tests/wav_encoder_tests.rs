// Integration tests for WAV conversion
//
// These tests verify the byte layout of the encoder output and that
// container and raw PCM blobs both convert to 16-bit mono WAV.

use anyhow::Result;
use cardiac_recorder::audio::{
    convert_to_wav, encode_wav, AudioBlob, DecodedAudioBuffer, PcmFormat, WAV_MEDIA_TYPE,
};
use cardiac_recorder::{CaptureError, DecodeError};
use std::io::Cursor;

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
}

fn stereo_wav(sample_rate: u32, frames: &[(i16, i16)]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &(left, right) in frames {
            writer.write_sample(left).unwrap();
            writer.write_sample(right).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[test]
fn test_header_layout() -> Result<()> {
    let buffer = DecodedAudioBuffer::mono(16000, vec![0.0; 10]);
    let wav = encode_wav(&buffer)?;
    let bytes = wav.bytes();

    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(read_u32(bytes, 4), 36 + 20);
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[12..16], b"fmt ");
    assert_eq!(read_u32(bytes, 16), 16, "PCM fmt chunk size");
    assert_eq!(read_u16(bytes, 20), 1, "PCM format tag");
    assert_eq!(read_u16(bytes, 22), 1, "Mono");
    assert_eq!(read_u32(bytes, 24), 16000);
    assert_eq!(read_u32(bytes, 28), 32000, "Byte rate = rate * 2");
    assert_eq!(read_u16(bytes, 32), 2, "Block align");
    assert_eq!(read_u16(bytes, 34), 16, "Bits per sample");
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(read_u32(bytes, 40), 20);

    Ok(())
}

#[test]
fn test_length_is_header_plus_two_bytes_per_sample() -> Result<()> {
    for n in [0usize, 1, 441, 4410] {
        let wav = encode_wav(&DecodedAudioBuffer::mono(44100, vec![0.25; n]))?;
        assert_eq!(wav.len(), 44 + 2 * n);
        assert_eq!(wav.sample_count(), n);
    }
    Ok(())
}

#[test]
fn test_extremes_and_clamping() -> Result<()> {
    let buffer = DecodedAudioBuffer::mono(8000, vec![1.0, -1.0, 0.0, 2.5, -7.0]);
    let wav = encode_wav(&buffer)?;
    let data = &wav.bytes()[44..];

    let samples: Vec<i16> = data
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    assert_eq!(samples, vec![32767, -32767, 0, 32767, -32767]);
    Ok(())
}

#[test]
fn test_two_seconds_of_silence() -> Result<()> {
    let wav = encode_wav(&DecodedAudioBuffer::mono(44100, vec![0.0; 88200]))?;

    assert_eq!(wav.len(), 176_444);
    assert_eq!(read_u32(wav.bytes(), 24), 44100);
    assert_eq!(read_u32(wav.bytes(), 40), 176_400);
    assert!(wav.bytes()[44..].iter().all(|&b| b == 0));
    assert!((wav.duration_seconds() - 2.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_stereo_container_keeps_channel_zero_only() -> Result<()> {
    let frames = vec![(1000, -5000), (-2000, 6000), (32767, 0)];
    let blob = AudioBlob::new(stereo_wav(22050, &frames), WAV_MEDIA_TYPE);

    let wav = convert_to_wav(&blob)?;
    assert_eq!(wav.sample_rate(), 22050);
    assert_eq!(wav.len(), 44 + 2 * frames.len());

    let mut reader = hound::WavReader::new(Cursor::new(wav.into_bytes()))?;
    assert_eq!(reader.spec().channels, 1);

    let left: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(left.len(), 3);
    // Float round trip may shave one LSB off non-extreme values
    for (got, (want, _)) in left.iter().zip(&frames) {
        assert!((*got as i32 - *want as i32).abs() <= 1, "{} vs {}", got, want);
    }

    Ok(())
}

#[test]
fn test_raw_pcm_blob_converts() -> Result<()> {
    let format = PcmFormat::new(16000, 2);
    let mut bytes = Vec::new();
    for (l, r) in [(0i16, 100i16), (32767, -32767), (0, 0)] {
        bytes.extend_from_slice(&l.to_le_bytes());
        bytes.extend_from_slice(&r.to_le_bytes());
    }

    let wav = convert_to_wav(&AudioBlob::new(bytes, format.media_type()))?;

    assert_eq!(wav.sample_rate(), 16000);
    assert_eq!(wav.sample_count(), 3);
    assert_eq!(&wav.bytes()[44..46], &0i16.to_le_bytes());
    assert_eq!(&wav.bytes()[46..48], &32767i16.to_le_bytes());

    Ok(())
}

#[test]
fn test_corrupt_blob_fails_to_decode() {
    let blob = AudioBlob::new(b"definitely not audio".to_vec(), "audio/webm");

    match convert_to_wav(&blob) {
        Err(CaptureError::Decode(_)) => {}
        other => panic!("Expected a decode error, got {:?}", other.map(|w| w.len())),
    }
}

#[test]
fn test_truncated_pcm_fails_to_decode() {
    let blob = AudioBlob::new(vec![0u8; 3], PcmFormat::new(8000, 1).media_type());

    assert!(matches!(
        convert_to_wav(&blob),
        Err(CaptureError::Decode(DecodeError::Corrupt(_)))
    ));
}
