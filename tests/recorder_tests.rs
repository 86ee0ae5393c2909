// Integration tests for the capture recorder
//
// These tests verify that frames are collected in arrival order, that stop
// hands back the complete sequence exactly once, and that an input ending
// on its own is observed.

use anyhow::Result;
use cardiac_recorder::audio::{
    convert_to_wav, create_tap, AudioBackend, AudioBackendConfig, AudioFrame, CaptureProgress,
    CaptureRecorder, FileBackend, RecorderState,
};
use cardiac_recorder::CaptureError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Backend that emits a fixed list of frames
struct ScriptedBackend {
    frames: Vec<AudioFrame>,
    /// Close the frame channel right after the script, like an unplugged device
    ends_on_its_own: bool,
    tx: Option<mpsc::UnboundedSender<AudioFrame>>,
    released: Arc<AtomicBool>,
}

impl ScriptedBackend {
    fn new(frames: Vec<AudioFrame>, ends_on_its_own: bool) -> (Self, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        let backend = Self {
            frames,
            ends_on_its_own,
            tx: None,
            released: Arc::clone(&released),
        };
        (backend, released)
    }
}

#[async_trait::async_trait]
impl AudioBackend for ScriptedBackend {
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<AudioFrame>, CaptureError> {
        let (tx, rx) = mpsc::unbounded_channel();
        for frame in self.frames.drain(..) {
            let _ = tx.send(frame);
        }
        if !self.ends_on_its_own {
            self.tx = Some(tx);
        }
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.tx = None;
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn mono_frame(value: i16, len: usize, timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![value; len],
        sample_rate: 8000,
        channels: 1,
        timestamp_ms,
    }
}

#[tokio::test]
async fn test_fragments_kept_in_arrival_order() -> Result<()> {
    let frames: Vec<AudioFrame> = (0..5).map(|i| mono_frame(i as i16, 80, i * 10)).collect();
    let (backend, released) = ScriptedBackend::new(frames, false);

    let mut recorder = CaptureRecorder::new();
    recorder.start(Box::new(backend), None).await?;
    assert_eq!(recorder.state(), RecorderState::Recording);

    let fragments = recorder.stop().await.clone();
    assert!(released.load(Ordering::SeqCst), "Input must be released on stop");
    assert_eq!(recorder.state(), RecorderState::Stopped);

    assert_eq!(fragments.len(), 5);
    for (i, fragment) in fragments.fragments().iter().enumerate() {
        assert_eq!(fragment.sequence, i);
        assert_eq!(fragment.timestamp_ms, i as u64 * 10);
        assert_eq!(&fragment.bytes[0..2], &(i as i16).to_le_bytes());
    }

    let blob = fragments.assemble();
    assert_eq!(blob.len(), 5 * 80 * 2);
    assert_eq!(blob.media_type, "audio/pcm;format=s16le;rate=8000;channels=1");

    Ok(())
}

#[tokio::test]
async fn test_empty_frames_are_skipped() -> Result<()> {
    let frames = vec![
        mono_frame(1, 10, 0),
        mono_frame(0, 0, 10),
        mono_frame(2, 10, 20),
    ];
    let (backend, _) = ScriptedBackend::new(frames, false);

    let mut recorder = CaptureRecorder::new();
    recorder.start(Box::new(backend), None).await?;
    let fragments = recorder.stop().await;

    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments.fragments()[1].sequence, 1);

    Ok(())
}

#[tokio::test]
async fn test_stop_while_idle_returns_empty_sequence() {
    let mut recorder = CaptureRecorder::new();

    assert!(recorder.stop().await.is_empty());
    assert_eq!(recorder.state(), RecorderState::Idle);
}

#[tokio::test]
async fn test_stop_twice_returns_same_sequence() -> Result<()> {
    let (backend, _) = ScriptedBackend::new(vec![mono_frame(7, 40, 0)], false);

    let mut recorder = CaptureRecorder::new();
    recorder.start(Box::new(backend), None).await?;

    let first = recorder.stop().await.clone();
    let second = recorder.stop().await.clone();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);

    Ok(())
}

#[tokio::test]
async fn test_input_ending_on_its_own_stops_recorder() -> Result<()> {
    let frames = vec![mono_frame(3, 40, 0), mono_frame(4, 40, 5)];
    let (backend, _) = ScriptedBackend::new(frames, true);

    let mut recorder = CaptureRecorder::new();
    recorder.start(Box::new(backend), None).await?;

    tokio::time::timeout(std::time::Duration::from_secs(5), recorder.ended()).await?;
    assert_eq!(recorder.state(), RecorderState::Stopped);
    assert_eq!(recorder.fragments().len(), 2);

    let fragments = recorder.stop().await;
    assert_eq!(fragments.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_tap_receives_channel_zero() -> Result<()> {
    let frame = AudioFrame {
        samples: vec![10, -10, 20, -20],
        sample_rate: 8000,
        channels: 2,
        timestamp_ms: 0,
    };
    let (backend, _) = ScriptedBackend::new(vec![frame], false);
    let (tap_tx, mut tap_rx) = create_tap();

    let mut recorder = CaptureRecorder::new();
    recorder.start(Box::new(backend), Some(tap_tx)).await?;
    recorder.stop().await;

    assert_eq!(tap_rx.recv().await, Some(vec![10, 20]));

    Ok(())
}

#[tokio::test]
async fn test_progress_counts_while_recording() -> Result<()> {
    let frames: Vec<AudioFrame> = (0..3).map(|i| mono_frame(1, 800, i * 100)).collect();
    let (backend, _) = ScriptedBackend::new(frames, false);

    let mut recorder = CaptureRecorder::new();
    recorder.start(Box::new(backend), None).await?;

    // The channel stays open, so the collector is still running here
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while recorder.progress().fragments < 3 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await?;

    assert_eq!(recorder.state(), RecorderState::Recording);
    assert_eq!(
        recorder.progress(),
        CaptureProgress {
            fragments: 3,
            bytes: 3 * 800 * 2
        }
    );

    let total = recorder.stop().await.total_bytes();
    assert_eq!(recorder.progress().bytes, total);

    recorder.reset();
    assert_eq!(recorder.progress(), CaptureProgress::default());

    Ok(())
}

#[tokio::test]
async fn test_reset_clears_previous_recording() -> Result<()> {
    let (backend, _) = ScriptedBackend::new(vec![mono_frame(1, 20, 0)], false);

    let mut recorder = CaptureRecorder::new();
    recorder.start(Box::new(backend), None).await?;
    recorder.stop().await;
    assert!(!recorder.fragments().is_empty());

    recorder.reset();
    assert!(recorder.fragments().is_empty());
    assert_eq!(recorder.state(), RecorderState::Idle);

    Ok(())
}

#[tokio::test]
async fn test_file_replay_round_trips_silence() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("silence.wav");

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for _ in 0..4000 {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;

    let config = AudioBackendConfig {
        buffer_duration_ms: 100,
        realtime: false,
    };
    let backend = FileBackend::open(&path, config)?;

    let mut recorder = CaptureRecorder::new();
    recorder.start(Box::new(backend), None).await?;
    tokio::time::timeout(std::time::Duration::from_secs(5), recorder.ended()).await?;

    let fragments = recorder.stop().await;
    assert_eq!(fragments.len(), 5, "0.5s at 100ms per fragment");

    let wav = convert_to_wav(&fragments.assemble())?;
    assert_eq!(wav.len(), 44 + 2 * 4000);
    assert_eq!(wav.sample_rate(), 8000);
    assert!(wav.bytes()[44..].iter().all(|&b| b == 0));

    Ok(())
}

#[tokio::test]
async fn test_file_replay_is_sample_exact() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("extremes.wav");
    let written: Vec<i16> = vec![i16::MAX, i16::MIN, 12345, -12345, 1, -1, 0, 32766];

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for _ in 0..100 {
        for &sample in &written {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;

    let config = AudioBackendConfig {
        buffer_duration_ms: 100,
        realtime: false,
    };
    let backend = FileBackend::open(&path, config)?;

    let mut recorder = CaptureRecorder::new();
    recorder.start(Box::new(backend), None).await?;
    tokio::time::timeout(std::time::Duration::from_secs(5), recorder.ended()).await?;

    let blob = recorder.stop().await.assemble();
    assert_eq!(blob.media_type, "audio/pcm;format=s16le;rate=8000;channels=1");
    let replayed: Vec<i16> = blob
        .bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    assert_eq!(replayed.len(), written.len() * 100);
    for chunk in replayed.chunks_exact(written.len()) {
        assert_eq!(chunk, written.as_slice());
    }

    Ok(())
}
