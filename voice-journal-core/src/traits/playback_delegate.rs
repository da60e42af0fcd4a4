use crate::models::error::JournalError;

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The source played to the end.
    Completed,
    /// Playback was stopped explicitly or replaced by another entry.
    Stopped,
}

/// Event delegate for playback notifications.
///
/// Each started playback gets exactly one `on_finished` or `on_error`.
pub trait PlaybackDelegate: Send + Sync {
    fn on_started(&self, entry_id: &str);

    fn on_finished(&self, entry_id: &str, end: PlaybackEnd);

    fn on_error(&self, entry_id: &str, error: &JournalError);
}
