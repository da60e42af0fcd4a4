use std::sync::Arc;

use crate::models::audio_models::{AudioSource, StreamConstraints};
use crate::models::error::JournalError;
use crate::models::permission::{PermissionStatus, SupportReport};

/// Callback invoked when a track of an open stream fails or ends unexpectedly.
pub type StreamErrorCallback = Arc<dyn Fn(JournalError) + Send + Sync + 'static>;

/// An open capture stream. Holding one keeps the device busy.
pub trait MediaStream: Send + Sync {
    /// Stable identifier of this stream, unique per provider.
    fn id(&self) -> &str;

    /// Whether any track is still live.
    fn is_active(&self) -> bool;

    /// Stop every track and release the device. Idempotent.
    fn stop_tracks(&self);

    /// Register the track-failure callback, replacing any previous one.
    fn on_track_error(&self, callback: StreamErrorCallback);
}

/// Interface to the host's audio capture capability.
///
/// Implemented by platform backends and by `sim::SimCaptureProvider`.
pub trait CaptureProvider: Send + Sync {
    /// Whether a capture API exists and the transport is secure.
    fn check_support(&self) -> SupportReport;

    /// Current authorization as reported by the platform, or `None` when the
    /// platform offers no permission introspection.
    fn query_permission(&self) -> Option<PermissionStatus>;

    /// Open a capture stream. May prompt the user.
    ///
    /// Errors are classified: `PermissionError::Denied` when the user or
    /// platform refuses, `DeviceError::NotFound`/`Busy` for hardware problems.
    fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn MediaStream>, JournalError>;

    /// Input devices currently visible to the platform.
    fn enumerate_devices(&self) -> Result<Vec<AudioSource>, JournalError>;
}
