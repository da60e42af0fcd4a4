use std::sync::Arc;

use crate::models::audio_models::EncodingDescriptor;
use crate::models::error::JournalError;
use crate::traits::capture_provider::MediaStream;

/// Callback receiving one encoded chunk.
pub type ChunkCallback = Arc<dyn Fn(Vec<u8>) + Send + Sync + 'static>;

/// Callback receiving an encoder failure.
pub type EncoderErrorCallback = Arc<dyn Fn(JournalError) + Send + Sync + 'static>;

/// Callbacks registered with an encoder at creation.
#[derive(Clone)]
pub struct EncoderEvents {
    pub on_chunk: ChunkCallback,
    pub on_error: EncoderErrorCallback,
}

/// Encodes audio from one capture stream into chunks.
///
/// Methods take `&self` so an encoder can be driven while a callback it
/// fired is still on the stack.
pub trait Encoder: Send + Sync {
    fn start(&self) -> Result<(), JournalError>;

    fn pause(&self);

    fn resume(&self);

    /// Emit whatever has been encoded since the last chunk via `on_chunk`.
    /// Emits nothing when there is no buffered data.
    fn request_data(&self);

    /// Flush the final buffered chunk through `on_chunk`, then stop.
    /// After this returns no further chunk is emitted.
    fn stop(&self) -> Result<(), JournalError>;
}

/// Factory for encoders, queried for format support.
pub trait EncoderProvider: Send + Sync {
    fn is_format_supported(&self, descriptor: &EncodingDescriptor) -> bool;

    fn create_encoder(
        &self,
        stream: Arc<dyn MediaStream>,
        descriptor: &EncodingDescriptor,
        events: EncoderEvents,
    ) -> Result<Arc<dyn Encoder>, JournalError>;
}

/// First descriptor in `preferences` the provider supports.
pub fn select_format(
    provider: &dyn EncoderProvider,
    preferences: &[EncodingDescriptor],
) -> Option<EncodingDescriptor> {
    preferences
        .iter()
        .find(|descriptor| provider.is_format_supported(descriptor))
        .cloned()
}
