//! Audio capture from the default input device

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleRate, Stream, StreamConfig};

use super::device::{CaptureDevice, ChunkSink, DeviceEvent};
use super::encoding::{Encoding, StreamFormat, f32_to_pcm16};
use crate::{Error, Result};

/// Native microphone backed by cpal
///
/// Produces WAV only: the audio callback converts f32 frames to mono
/// PCM16LE chunks.
pub struct Microphone {
    sample_rate: u32,
    stream: Option<Stream>,
    sink: Option<ChunkSink>,
}

impl Microphone {
    /// Create a microphone that records at `sample_rate` when the device allows it
    #[must_use]
    pub const fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            stream: None,
            sink: None,
        }
    }

    /// Find a mono config at the requested rate, else the device default
    fn stream_config(&self, device: &cpal::Device) -> Result<StreamConfig> {
        let wanted = SampleRate(self.sample_rate);
        let mono = device
            .supported_input_configs()
            .map_err(|e| classify(&e.to_string()))?
            .find(|c| c.channels() == 1 && c.min_sample_rate() <= wanted && c.max_sample_rate() >= wanted);

        if let Some(config) = mono {
            return Ok(config.with_sample_rate(wanted).config());
        }

        let fallback = device
            .default_input_config()
            .map_err(|e| classify(&e.to_string()))?;
        tracing::debug!(
            sample_rate = fallback.sample_rate().0,
            channels = fallback.channels(),
            "no mono config at requested rate, using device default"
        );
        Ok(fallback.config())
    }
}

impl CaptureDevice for Microphone {
    fn supported_encodings(&self) -> Vec<Encoding> {
        vec![Encoding::Wav]
    }

    fn acquire(&mut self, encoding: Encoding, sink: ChunkSink) -> Result<StreamFormat> {
        if encoding != Encoding::Wav {
            return Err(Error::Audio(format!(
                "microphone cannot produce {}",
                encoding.mime_type()
            )));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))?;

        let config = self.stream_config(&device)?;
        let channels = usize::from(config.channels.max(1));
        let chunk_sink = sink.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono: Vec<f32> = if channels == 1 {
                        data.to_vec()
                    } else {
                        #[allow(clippy::cast_precision_loss)]
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                            .collect()
                    };
                    // Receiver gone means the recording was torn down
                    let _ = chunk_sink.send(DeviceEvent::Chunk(f32_to_pcm16(&mono)));
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| match e {
                BuildStreamError::DeviceNotAvailable => {
                    Error::DeviceUnavailable("input device disappeared".to_string())
                }
                other => classify(&other.to_string()),
            })?;

        stream.play().map_err(|e| classify(&e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "microphone acquired"
        );

        self.stream = Some(stream);
        self.sink = Some(sink);

        Ok(StreamFormat {
            sample_rate: config.sample_rate.0,
            channels: 1,
        })
    }

    fn stop(&mut self) {
        // Dropping the stream joins the callback, so every chunk is queued
        // before the drained marker
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        if let Some(sink) = self.sink.take() {
            let _ = sink.send(DeviceEvent::Drained);
        }
    }

    fn release(&mut self) {
        let stream = self.stream.take();
        let sink = self.sink.take();
        if stream.is_some() || sink.is_some() {
            tracing::debug!("microphone released");
        }
    }
}

/// Map a platform error message onto the media error taxonomy
fn classify(message: &str) -> Error {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        Error::PermissionDenied
    } else if lower.contains("available") || lower.contains("no such device") {
        Error::DeviceUnavailable(message.to_string())
    } else {
        Error::Audio(message.to_string())
    }
}
