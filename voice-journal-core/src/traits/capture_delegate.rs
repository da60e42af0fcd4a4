use crate::models::artifact::AudioArtifact;
use crate::models::error::JournalError;
use crate::models::state::CaptureState;

/// Event delegate for capture session notifications.
///
/// Methods are called from the event loop with no session lock held, so an
/// implementation may call back into the manager.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called on every elapsed-time tick while recording.
    fn on_tick(&self, elapsed_secs: u64);

    /// Called when an error aborts the session.
    fn on_error(&self, error: &JournalError);

    /// Called when `stop` has produced the artifact.
    fn on_capture_finished(&self, artifact: &AudioArtifact);
}
