//! Recording encodings and payload assembly

use crate::{Error, Result};

/// Encodings a capture device may produce, in preference order for compressed output
const COMPRESSED_PREFERENCE: [Encoding; 2] = [Encoding::WebmOpus, Encoding::OggOpus];

/// Audio encoding of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Opus in a WebM container
    WebmOpus,
    /// Opus in an Ogg container
    OggOpus,
    /// 16-bit PCM in a WAV container; chunks carry raw little-endian samples
    Wav,
}

impl Encoding {
    /// MIME type sent with the upload
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::WebmOpus => "audio/webm;codecs=opus",
            Self::OggOpus => "audio/ogg;codecs=opus",
            Self::Wav => "audio/wav",
        }
    }

    /// File extension used for the multipart file name
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::WebmOpus => "webm",
            Self::OggOpus => "ogg",
            Self::Wav => "wav",
        }
    }

    /// Pick the encoding for a recording
    ///
    /// Prefers opus-in-container when allowed and supported, otherwise the
    /// container default (WAV), which every device must be able to produce.
    #[must_use]
    pub fn negotiate(supported: &[Self], prefer_compressed: bool) -> Self {
        if prefer_compressed {
            if let Some(encoding) = COMPRESSED_PREFERENCE
                .iter()
                .copied()
                .find(|e| supported.contains(e))
            {
                return encoding;
            }
        }
        Self::Wav
    }

    /// Assemble buffered chunks into one payload body
    ///
    /// Stream containers are concatenated as-is. WAV chunks are raw PCM16LE
    /// and get wrapped with a header here, since the header needs the total
    /// length; a trailing partial sample is dropped. A recording without a
    /// single whole sample assembles to an empty body.
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn assemble(self, chunks: Vec<Vec<u8>>, format: StreamFormat) -> Result<Vec<u8>> {
        let mut data = chunks.concat();

        match self {
            Self::WebmOpus | Self::OggOpus => Ok(data),
            Self::Wav => {
                data.truncate(data.len() - data.len() % 2);
                if data.is_empty() {
                    return Ok(data);
                }
                pcm16_to_wav(&data, format)
            }
        }
    }
}

/// Format of the stream a device delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// A finished recording ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub data: Vec<u8>,
    pub encoding: Encoding,
}

impl AudioPayload {
    /// MIME type of the payload
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.encoding.mime_type()
    }

    /// File name for multipart uploads
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("recording.{}", self.encoding.extension())
    }

    /// True if nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }
}

/// Wrap raw PCM16LE samples in a WAV container
fn pcm16_to_wav(pcm: &[u8], format: StreamFormat) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        // A trailing odd byte cannot form a sample and is dropped
        for pair in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Convert f32 samples in [-1.0, 1.0] to PCM16LE bytes
#[must_use]
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}
