//! Voice input and output
//!
//! Handles microphone recording and playback of assistant voice replies.
//! Transcription and synthesis happen on the backend.

mod capture;
mod device;
mod encoding;
mod microphone;
mod playback;

pub use capture::{AudioCapture, RecordingState};
pub use device::{CaptureDevice, ChunkSink, DeviceEvent};
pub use encoding::{AudioPayload, Encoding, StreamFormat, f32_to_pcm16};
pub use microphone::Microphone;
pub use playback::{AudioPlayer, SilentPlayer, SpeakerPlayer};
