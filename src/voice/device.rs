//! Capability interface for platform capture devices

use tokio::sync::mpsc;

use super::encoding::{Encoding, StreamFormat};
use crate::Result;

/// Event delivered by a capture device while recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A chunk of encoded audio
    Chunk(Vec<u8>),
    /// The recorder flushed its final chunk after a stop request
    Drained,
}

/// Channel a device pushes its events into
pub type ChunkSink = mpsc::UnboundedSender<DeviceEvent>;

/// A platform microphone facility
///
/// Implementations push [`DeviceEvent::Chunk`]s into the sink from
/// whatever thread the platform delivers audio on. After [`stop`](Self::stop)
/// they must emit any remaining chunks followed by exactly one
/// [`DeviceEvent::Drained`].
pub trait CaptureDevice {
    /// Encodings this device can produce
    fn supported_encodings(&self) -> Vec<Encoding>;

    /// Open the microphone and start delivering chunks
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` or `DeviceUnavailable` if the platform refuses
    fn acquire(&mut self, encoding: Encoding, sink: ChunkSink) -> Result<StreamFormat>;

    /// Ask the recorder to flush and finish
    fn stop(&mut self);

    /// Close the device handle
    fn release(&mut self);
}
