pub mod backend;
pub mod blob;
pub mod file;
pub mod fragment;
pub mod microphone;
pub mod recorder;
pub mod visualizer;
pub mod wav;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use blob::{media_type_for_path, AudioBlob, PcmFormat, WAV_MEDIA_TYPE};
pub use file::{AudioFile, FileBackend};
pub use fragment::{AudioFragment, AudioFragmentSequence};
pub use microphone::MicrophoneBackend;
pub use recorder::{
    create_tap, CaptureProgress, CaptureRecorder, RecorderState, TapReceiver, TapSender,
};
pub use visualizer::{LiveVisualizer, VisualFrame, VisualizerConfig, VolumeLevel};
pub use wav::{convert_to_wav, decode, encode_wav, quantize, DecodedAudioBuffer, WavByteStream};
