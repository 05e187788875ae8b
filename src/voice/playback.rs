//! Playback of assistant voice replies

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use url::Url;

use crate::{Error, Result};

/// Starts playback of a reply's audio reference
///
/// Playback is a best-effort enhancement: `play` returns once playback has
/// been scheduled, and later failures are only logged.
pub trait AudioPlayer: Send + Sync {
    /// Begin playing the audio at `url` (absolute or backend-relative)
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot be scheduled
    fn play(&self, url: &str) -> Result<()>;
}

/// Player that does nothing, for headless use
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPlayer;

impl AudioPlayer for SilentPlayer {
    fn play(&self, url: &str) -> Result<()> {
        tracing::debug!(url, "playback disabled, skipping reply audio");
        Ok(())
    }
}

/// Downloads mp3 replies from the backend and plays them on the default output device
#[derive(Debug, Clone)]
pub struct SpeakerPlayer {
    client: reqwest::Client,
    base_url: Url,
}

impl SpeakerPlayer {
    /// Create a player resolving relative references against `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is invalid
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// Resolve an audio reference against the backend base URL
    ///
    /// # Errors
    ///
    /// Returns error if the reference cannot be joined into a URL
    pub fn resolve(&self, reference: &str) -> Result<Url> {
        Ok(self.base_url.join(reference)?)
    }
}

impl AudioPlayer for SpeakerPlayer {
    fn play(&self, url: &str) -> Result<()> {
        let url = self.resolve(url)?;
        let client = self.client.clone();

        tokio::spawn(async move {
            if let Err(e) = fetch_and_play(client, url.clone()).await {
                tracing::warn!(url = %url, error = %e, "reply playback failed");
            }
        });

        Ok(())
    }
}

async fn fetch_and_play(client: reqwest::Client, url: Url) -> Result<()> {
    let response = client.get(url.clone()).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        return Err(Error::Playback(format!("audio fetch {url} returned {status}")));
    }

    let mp3 = response.bytes().await?;
    tracing::debug!(url = %url, bytes = mp3.len(), "downloaded reply audio");

    tokio::task::spawn_blocking(move || {
        let (samples, sample_rate) = decode_mp3(&mp3)?;
        play_samples_blocking(samples, sample_rate)
    })
    .await
    .map_err(|e| Error::Playback(e.to_string()))?
}

/// Play mono samples on the default output device, blocking until done
fn play_samples_blocking(samples: Vec<f32>, sample_rate: u32) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

    let config = output_config(&device, sample_rate)?;
    let channels = usize::from(config.channels.max(1));

    let sample_count = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position.load(Ordering::Relaxed);
                        let sample = samples.get(pos).copied().unwrap_or_else(|| {
                            finished.store(true, Ordering::Relaxed);
                            0.0
                        });
                        frame.fill(sample);
                        if pos < samples.len() {
                            position.store(pos + 1, Ordering::Relaxed);
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Playback(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Playback(e.to_string()))?;

    // Poll for completion with timeout
    let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate.max(1));
    let timeout = Duration::from_millis(duration_ms + 500);
    let start = Instant::now();

    while !finished.load(Ordering::Relaxed) && start.elapsed() < timeout {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
    tracing::debug!(samples = sample_count, "playback complete");

    Ok(())
}

/// Pick an output config at the decoded rate, mono first then stereo
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |channels: u16| -> Result<Option<StreamConfig>> {
        Ok(device
            .supported_output_configs()
            .map_err(|e| Error::Playback(e.to_string()))?
            .find(|c| c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .map(|c| c.with_sample_rate(rate).config()))
    };

    if let Some(config) = supports(1)? {
        return Ok(config);
    }
    supports(2)?.ok_or_else(|| Error::Playback(format!("no output config for {sample_rate} Hz")))
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(sample_rate);
                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() {
        return Err(Error::Playback("reply audio contained no frames".to_string()));
    }

    Ok((samples, sample_rate))
}
