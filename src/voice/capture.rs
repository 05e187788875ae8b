//! Microphone recording lifecycle
//!
//! Turns a start/stop gesture pair into a single [`AudioPayload`], owning the
//! device for exactly one recording at a time.

use std::time::Duration;

use tokio::sync::mpsc;

use super::device::{CaptureDevice, DeviceEvent};
use super::encoding::{AudioPayload, Encoding, StreamFormat};
use crate::config::AudioConfig;
use crate::{Error, Result};

/// Whether a recording is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

/// An open recording and its buffered chunks
struct Recording {
    encoding: Encoding,
    format: StreamFormat,
    events: mpsc::UnboundedReceiver<DeviceEvent>,
    chunks: Vec<Vec<u8>>,
}

/// Records from a capture device
pub struct AudioCapture<D: CaptureDevice> {
    device: D,
    prefer_compressed: bool,
    drain_timeout: Duration,
    recording: Option<Recording>,
    /// Device handle is open; cleared only once `release` has run
    acquired: bool,
}

impl<D: CaptureDevice> AudioCapture<D> {
    /// Create a capture around a device
    pub fn new(device: D, config: &AudioConfig) -> Self {
        Self {
            device,
            prefer_compressed: config.prefer_compressed,
            drain_timeout: config.drain_timeout,
            recording: None,
            acquired: false,
        }
    }

    /// Start recording
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRecording` if a recording is open, or the device's
    /// `PermissionDenied` / `DeviceUnavailable` error. The state stays idle
    /// on error.
    pub fn start(&mut self) -> Result<()> {
        if self.recording.is_some() {
            tracing::warn!("start requested while already recording");
            return Err(Error::AlreadyRecording);
        }

        // A stop that was cancelled mid-drain leaves the handle open
        self.release_device();

        let encoding = Encoding::negotiate(&self.device.supported_encodings(), self.prefer_compressed);
        let (sink, events) = mpsc::unbounded_channel();
        let format = self.device.acquire(encoding, sink)?;
        self.acquired = true;

        tracing::debug!(
            mime_type = encoding.mime_type(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            "recording started"
        );

        self.recording = Some(Recording {
            encoding,
            format,
            events,
            chunks: Vec::new(),
        });
        Ok(())
    }

    /// Stop recording and assemble the payload
    ///
    /// Waits for the device to report that its final chunk is flushed before
    /// assembling. Returns `None` if no recording was open, so a second call
    /// is harmless.
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be assembled; the device is
    /// released regardless
    pub async fn stop(&mut self) -> Result<Option<AudioPayload>> {
        let Some(mut recording) = self.recording.take() else {
            return Ok(None);
        };

        self.device.stop();

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while let Some(event) = recording.events.recv().await {
                match event {
                    DeviceEvent::Chunk(chunk) => recording.chunks.push(chunk),
                    DeviceEvent::Drained => return true,
                }
            }
            false
        })
        .await;

        match drained {
            Ok(true) => {}
            Ok(false) => tracing::warn!("capture device closed without draining"),
            Err(_) => tracing::warn!(
                timeout_ms = self.drain_timeout.as_millis(),
                chunks = recording.chunks.len(),
                "capture device did not drain in time, using partial recording"
            ),
        }

        self.release_device();

        let data = recording.encoding.assemble(recording.chunks, recording.format)?;
        tracing::debug!(bytes = data.len(), "recording stopped");

        Ok(Some(AudioPayload {
            data,
            encoding: recording.encoding,
        }))
    }

    /// Force-stop and release the device without waiting for a drain
    ///
    /// Also releases a device left open by a `stop` future that was dropped
    /// before it finished.
    pub fn teardown(&mut self) {
        if self.recording.take().is_some() {
            self.device.stop();
            tracing::debug!("recording discarded on teardown");
        }
        self.release_device();
    }

    fn release_device(&mut self) {
        if std::mem::take(&mut self.acquired) {
            self.device.release();
        }
    }

    /// Check if currently recording
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Current recording state
    #[must_use]
    pub const fn state(&self) -> RecordingState {
        if self.recording.is_some() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }
}

impl<D: CaptureDevice> Drop for AudioCapture<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
